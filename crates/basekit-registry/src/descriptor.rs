//! Type descriptors: the declared shape of a registered type.

use std::collections::BTreeMap;

use basekit_model::{is_reserved_field, Base, GENERIC_TYPE};
use tracing::warn;

use crate::shape::Shape;

/// Serialization behavior of one declared property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub shape: Shape,
    /// Encode the value as its own document and keep a reference here.
    pub detach: bool,
    /// Split list values into chunk documents of this many elements.
    /// Implies `detach`.
    pub chunk: Option<usize>,
}

impl PropertySpec {
    pub fn new(shape: Shape) -> Self {
        PropertySpec {
            shape,
            detach: false,
            chunk: None,
        }
    }

    pub fn detached(shape: Shape) -> Self {
        PropertySpec {
            shape,
            detach: true,
            chunk: None,
        }
    }

    pub fn chunked(shape: Shape, chunk: usize) -> Self {
        PropertySpec {
            shape,
            detach: true,
            chunk: Some(chunk.max(1)),
        }
    }
}

/// Declared shape of a type: its ancestry chain and known properties.
///
/// Descriptors are data, not code; registering one never changes how an
/// object is stored in memory, only how the serializer treats it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    chain: Vec<String>,
    properties: BTreeMap<String, PropertySpec>,
}

impl TypeDescriptor {
    /// Creates a descriptor from a colon-separated chain, most-derived
    /// first, the same format [`Base::new`] takes.
    pub fn new(type_chain: &str) -> Self {
        let chain: Vec<String> = type_chain
            .split(':')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        TypeDescriptor {
            chain: if chain.is_empty() {
                vec![GENERIC_TYPE.to_string()]
            } else {
                chain
            },
            properties: BTreeMap::new(),
        }
    }

    /// Adds an inline declared property.
    pub fn with_property(self, name: impl Into<String>, shape: Shape) -> Self {
        self.with_spec(name, PropertySpec::new(shape))
    }

    /// Adds a declared property encoded as its own document.
    pub fn with_detached(self, name: impl Into<String>, shape: Shape) -> Self {
        self.with_spec(name, PropertySpec::detached(shape))
    }

    /// Adds a declared list property split into chunk documents of
    /// `chunk` elements.
    pub fn with_chunked(self, name: impl Into<String>, shape: Shape, chunk: usize) -> Self {
        self.with_spec(name, PropertySpec::chunked(shape, chunk))
    }

    pub fn with_spec(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        let name = name.into();
        if is_reserved_field(&name) {
            warn!(property = %name, "ignoring reserved property name on descriptor");
            return self;
        }
        self.properties.insert(name, spec);
        self
    }

    pub fn type_name(&self) -> &str {
        self.chain.first().map(String::as_str).unwrap_or(GENERIC_TYPE)
    }

    pub fn type_chain(&self) -> String {
        self.chain.join(":")
    }

    pub fn ancestry(&self) -> &[String] {
        &self.chain
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertySpec)> {
        self.properties.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Creates an empty instance carrying this descriptor's chain.
    pub fn instance(&self) -> Base {
        Base::new(&self.type_chain())
    }
}
