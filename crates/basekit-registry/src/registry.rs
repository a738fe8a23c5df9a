//! Chain resolution with ancestry fallback.
//!
//! Wire objects carry their full type chain, most-derived first. Resolution
//! walks the chain and picks the first segment some registered descriptor
//! claims; when nothing matches, the generic descriptor steps in. Results
//! are memoized per chain string, and the memo is dropped whenever a new
//! type is registered, since a later registration can upgrade a fallback
//! into a real match.

use std::collections::HashMap;
use std::sync::Arc;

use basekit_model::{Base, CHUNK_DATA_PROP, CHUNK_TYPE, GENERIC_TYPE};
use parking_lot::RwLock;
use tracing::debug;

use crate::descriptor::{PropertySpec, TypeDescriptor};
use crate::shape::Shape;

/// Outcome of resolving a type chain.
#[derive(Debug, Clone)]
pub struct TypeResolution {
    pub descriptor: Arc<TypeDescriptor>,
    /// The chain segment a registered descriptor claimed. `None` means the
    /// generic fallback was used and no segment was recognized.
    pub matched: Option<String>,
}

impl TypeResolution {
    /// True when resolution fell through to the generic descriptor.
    pub fn is_fallback(&self) -> bool {
        self.matched.is_none()
    }
}

#[derive(Debug)]
struct RegistryInner {
    /// Descriptors keyed by most-derived type name.
    types: HashMap<String, Arc<TypeDescriptor>>,
    /// Chain string -> resolution memo, fallbacks included.
    resolved: HashMap<String, TypeResolution>,
}

/// Thread-safe registry of type descriptors.
///
/// `Base` and `Core.DataChunk` are pre-registered; the engine depends on
/// both existing.
#[derive(Debug)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut types = HashMap::new();

        let generic = Arc::new(TypeDescriptor::new(GENERIC_TYPE));
        types.insert(GENERIC_TYPE.to_string(), generic);

        // Chunk documents keep their slice inline under `data`.
        let chunk = Arc::new(
            TypeDescriptor::new(CHUNK_TYPE)
                .with_spec(CHUNK_DATA_PROP, PropertySpec::new(Shape::list(Shape::Any))),
        );
        types.insert(CHUNK_TYPE.to_string(), chunk);

        TypeRegistry {
            inner: RwLock::new(RegistryInner {
                types,
                resolved: HashMap::new(),
            }),
        }
    }

    /// Registers (or replaces) a descriptor under its most-derived name.
    ///
    /// Drops the resolution memo: cached fallbacks may now resolve for real.
    pub fn register(&self, descriptor: TypeDescriptor) {
        let name = descriptor.type_name().to_string();
        let mut inner = self.inner.write();
        inner.types.insert(name.clone(), Arc::new(descriptor));
        inner.resolved.clear();
        debug!(type_name = %name, "registered type descriptor");
    }

    /// Resolves a chain to a descriptor, walking the ancestry and falling
    /// back to the generic descriptor. Never fails.
    pub fn resolve(&self, type_chain: &str) -> TypeResolution {
        if let Some(hit) = self.inner.read().resolved.get(type_chain) {
            return hit.clone();
        }

        let mut inner = self.inner.write();
        // Another thread may have resolved it while we waited for the lock.
        if let Some(hit) = inner.resolved.get(type_chain) {
            return hit.clone();
        }

        let resolution = Self::resolve_uncached(&inner.types, type_chain);
        inner
            .resolved
            .insert(type_chain.to_string(), resolution.clone());
        resolution
    }

    fn resolve_uncached(
        types: &HashMap<String, Arc<TypeDescriptor>>,
        type_chain: &str,
    ) -> TypeResolution {
        for segment in type_chain.split(':').map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            if let Some(descriptor) = types.get(segment) {
                return TypeResolution {
                    descriptor: Arc::clone(descriptor),
                    matched: Some(segment.to_string()),
                };
            }
        }

        let generic = types
            .get(GENERIC_TYPE)
            .cloned()
            .unwrap_or_else(|| Arc::new(TypeDescriptor::new(GENERIC_TYPE)));
        TypeResolution {
            descriptor: generic,
            matched: None,
        }
    }

    /// Creates an instance for a chain, preserving the incoming chain even
    /// when only an ancestor (or nothing) matched.
    pub fn instantiate(&self, type_chain: &str) -> Base {
        // Resolution decides the declared shape; the chain on the instance
        // must stay what the wire said so re-encoding reproduces it.
        let _ = self.resolve(type_chain);
        Base::new(type_chain)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.inner.read().types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::new("Mesh:Geometry:Base"));

        let resolution = registry.resolve("Mesh:Geometry:Base");
        assert_eq!(resolution.matched.as_deref(), Some("Mesh"));
        assert_eq!(resolution.descriptor.type_name(), "Mesh");
    }

    #[test]
    fn ancestor_match_when_derived_is_unknown() {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::new("Geometry:Base").with_property("units", Shape::Text),
        );

        let resolution = registry.resolve("FancyMesh:Geometry:Base");
        assert_eq!(resolution.matched.as_deref(), Some("Geometry"));
        assert!(!resolution.is_fallback());
        assert!(resolution.descriptor.property("units").is_some());
    }

    #[test]
    fn unknown_chain_falls_back_to_generic() {
        let registry = TypeRegistry::new();
        let resolution = registry.resolve("Martian:Artifact");
        assert!(resolution.is_fallback());
        assert_eq!(resolution.descriptor.type_name(), "Base");
    }

    #[test]
    fn generic_chain_is_not_a_fallback() {
        let registry = TypeRegistry::new();
        let resolution = registry.resolve("Base");
        assert!(!resolution.is_fallback());
        assert_eq!(resolution.matched.as_deref(), Some("Base"));
    }

    #[test]
    fn chunk_type_is_pre_registered() {
        let registry = TypeRegistry::new();
        let resolution = registry.resolve(CHUNK_TYPE);
        assert!(!resolution.is_fallback());
        assert!(resolution.descriptor.property(CHUNK_DATA_PROP).is_some());
    }

    #[test]
    fn registering_invalidates_cached_fallbacks() {
        let registry = TypeRegistry::new();

        let before = registry.resolve("Mesh:Geometry:Base");
        assert!(before.is_fallback());

        registry.register(TypeDescriptor::new("Geometry:Base"));

        let after = registry.resolve("Mesh:Geometry:Base");
        assert_eq!(after.matched.as_deref(), Some("Geometry"));
    }

    #[test]
    fn instantiate_preserves_the_incoming_chain() {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::new("Geometry:Base"));

        let instance = registry.instantiate("FancyMesh:Geometry:Base");
        assert_eq!(instance.type_chain(), "FancyMesh:Geometry:Base");
    }

    #[test]
    fn resolution_is_safe_across_threads() {
        let registry = std::sync::Arc::new(TypeRegistry::new());
        registry.register(TypeDescriptor::new("Geometry:Base"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = std::sync::Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            let r = registry.resolve("Mesh:Geometry:Base");
                            assert!(!r.is_fallback());
                        } else {
                            registry.register(TypeDescriptor::new(format!("T{}:Base", i).as_str()));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread");
        }
    }
}
