//! Graph decoding: stored documents back to object trees.
//!
//! Decoding is deliberately forgiving. A fresh instance comes from the type
//! registry even when the type chain is unknown, properties that fail their
//! declared shape are kept with a diagnostic, and references whose targets
//! are missing stay as unresolved [`ObjectReference`] values. Only structural
//! breakage is fatal: payloads that are not objects, reference loops between
//! stored documents, and cancellation.
//!
//! Reference wrappers survive the round trip unless the property is marked
//! detached (by descriptor or `@` name), which keeps re-encoding an untouched
//! graph byte-stable even for properties this process knows nothing about.

use std::collections::{HashMap, HashSet};

use basekit_model::{
    is_reserved_field, parse_prop_name, Base, BaseHandle, ClosureSummary, DecodeIssue, IssueKind,
    ObjectId, ObjectReference, PropValue, CHUNK_DATA_PROP, CHUNK_TYPE, GENERIC_TYPE, ID_FIELD,
    TYPE_FIELD,
};
use basekit_registry::{AbstractTypeRegistry, PropertySpec, Shape, TypeDescriptor, TypeRegistry};
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec;
use crate::error::DecodeError;

/// One diagnostic, attributed to the object that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIssue {
    /// Id of the carrying object, when it came from an addressable document.
    pub object_id: Option<ObjectId>,
    pub issue: DecodeIssue,
}

/// Decodes documents against a type registry.
#[derive(Debug, Clone)]
pub struct Deserializer<'a> {
    registry: &'a TypeRegistry,
    abstracts: Option<&'a AbstractTypeRegistry>,
}

impl<'a> Deserializer<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Deserializer {
            registry,
            abstracts: None,
        }
    }

    /// Attaches codecs for properties declared with an abstract shape.
    pub fn with_abstracts(mut self, abstracts: &'a AbstractTypeRegistry) -> Self {
        self.abstracts = Some(abstracts);
        self
    }

    /// Decodes a single document. References stay unresolved; use the
    /// receive path to pull a whole graph through a transport.
    pub fn decode_document(&self, json: &str) -> Result<BaseHandle, DecodeError> {
        let token: Value =
            serde_json::from_str(json).map_err(|e| DecodeError::malformed(None, e.to_string()))?;
        self.walk(None).decode_root(&token, None)
    }

    /// Decodes `token` as the root, resolving references out of `store`.
    pub(crate) fn decode_stored(
        &self,
        root_id: &ObjectId,
        token: &Value,
        store: &HashMap<ObjectId, Value>,
    ) -> Result<BaseHandle, DecodeError> {
        self.walk(Some(store)).decode_root(token, Some(root_id))
    }

    /// Decodes `token` as the root without resolving anything.
    pub(crate) fn decode_detached(
        &self,
        root_id: &ObjectId,
        token: &Value,
    ) -> Result<BaseHandle, DecodeError> {
        self.walk(None).decode_root(token, Some(root_id))
    }

    fn walk<'s>(&'s self, store: Option<&'s HashMap<ObjectId, Value>>) -> DecodeWalk<'s> {
        DecodeWalk {
            registry: self.registry,
            abstracts: self.abstracts,
            store,
            instances: HashMap::new(),
            in_progress: HashSet::new(),
            property: None,
            pending: Vec::new(),
        }
    }
}

pub(crate) struct DecodeWalk<'a> {
    registry: &'a TypeRegistry,
    abstracts: Option<&'a AbstractTypeRegistry>,
    /// Fetched documents by id; `None` leaves every reference unresolved.
    store: Option<&'a HashMap<ObjectId, Value>>,
    /// Documents already decoded in this walk, shared on re-reference.
    instances: HashMap<ObjectId, BaseHandle>,
    /// Document ids on the current resolution path.
    in_progress: HashSet<ObjectId>,
    /// Property being decoded, for issue attribution.
    property: Option<String>,
    /// Issue stack, one level per object being built.
    pending: Vec<Vec<DecodeIssue>>,
}

impl DecodeWalk<'_> {
    fn decode_root(
        &mut self,
        token: &Value,
        root_id: Option<&ObjectId>,
    ) -> Result<BaseHandle, DecodeError> {
        let map = token.as_object().ok_or_else(|| {
            DecodeError::malformed(root_id.cloned(), "document is not a JSON object")
        })?;
        if !map.get(TYPE_FIELD).is_some_and(Value::is_string) {
            return Err(DecodeError::malformed(
                root_id.cloned(),
                "document has no speckle_type",
            ));
        }
        // With the root id in progress, a stored chain leading back to the
        // root is reported as the cycle it is.
        if let Some(id) = root_id {
            self.in_progress.insert(id.clone());
        }
        let result = self.decode_object(map);
        if let Some(id) = root_id {
            self.in_progress.remove(id);
        }
        result
    }

    fn decode_object(&mut self, map: &Map<String, Value>) -> Result<BaseHandle, DecodeError> {
        let chain = map
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(GENERIC_TYPE);
        let resolution = self.registry.resolve(chain);
        let mut base = self.registry.instantiate(chain);
        base.id = map.get(ID_FIELD).and_then(Value::as_str).map(ObjectId::from);

        let saved_property = self.property.take();
        self.pending.push(Vec::new());
        if resolution.is_fallback() {
            self.issue(IssueKind::UnknownType {
                chain: chain.to_string(),
            });
        }

        let outcome = self.decode_properties(map, &resolution.descriptor, &mut base);

        let issues = self.pending.pop().unwrap_or_default();
        self.property = saved_property;
        outcome?;
        for issue in issues {
            base.push_issue(issue);
        }
        Ok(BaseHandle::new(base))
    }

    fn decode_properties(
        &mut self,
        map: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        base: &mut Base,
    ) -> Result<(), DecodeError> {
        for (name, token) in map {
            if is_reserved_field(name) {
                continue;
            }
            self.property = Some(name.clone());
            let spec = descriptor.property(name);
            let value = match spec.map(|spec| &spec.shape) {
                Some(Shape::Abstract(qualified_name)) => {
                    self.decode_abstract(qualified_name, token)?
                }
                _ => codec::decode_value(self, token)?,
            };
            let value = self.reassemble(spec, name, value);

            if let Some(spec) = spec {
                if !spec.shape.matches(&value) {
                    self.issue(IssueKind::ShapeMismatch {
                        expected: spec.shape.describe(),
                        found: value.kind().to_string(),
                    });
                }
                if let Err(error) = base.set_declared(name.as_str(), value) {
                    debug!(property = %name, %error, "dropping unsettable declared property");
                }
            } else if let Err(error) = base.set_dynamic(name.as_str(), value) {
                debug!(property = %name, %error, "dropping unsettable dynamic property");
            }
        }
        self.property = None;
        Ok(())
    }

    /// Post-processes a decoded value for its property position: detached
    /// references unwrap to their target and chunked lists splice back into
    /// one sequence. Everything else passes through.
    fn reassemble(
        &mut self,
        spec: Option<&PropertySpec>,
        name: &str,
        value: PropValue,
    ) -> PropValue {
        let marker = parse_prop_name(name);
        let detach = marker.detach || spec.is_some_and(|spec| spec.detach);
        match value {
            PropValue::Reference(reference) if detach => match reference.target {
                Some(target) => PropValue::Object(target),
                // A gap stays visible as the unresolved reference it is.
                None => PropValue::Reference(reference),
            },
            PropValue::List(items) => splice_chunks(items),
            other => other,
        }
    }

    fn decode_abstract(
        &mut self,
        qualified_name: &str,
        token: &Value,
    ) -> Result<PropValue, DecodeError> {
        match self.abstracts.and_then(|registry| registry.codec(qualified_name)) {
            Some(entry) => match entry.decode(token) {
                Ok(value) => Ok(value),
                Err(error) => {
                    debug!(qualified_name, %error, "abstract decode failed, keeping generic form");
                    self.issue(IssueKind::UnresolvedAbstractType {
                        qualified_name: qualified_name.to_string(),
                    });
                    codec::decode_value(self, token)
                }
            },
            None => {
                self.issue(IssueKind::UnresolvedAbstractType {
                    qualified_name: qualified_name.to_string(),
                });
                codec::decode_value(self, token)
            }
        }
    }

    /// Resolves a reference token against the store, decoding the target
    /// document on first sight and sharing the instance afterwards.
    pub(crate) fn resolve_reference(
        &mut self,
        id: &str,
        closure: Option<ClosureSummary>,
    ) -> Result<PropValue, DecodeError> {
        let id = ObjectId::from(id);
        let Some(store) = self.store else {
            return Ok(unresolved(id, closure));
        };
        if let Some(handle) = self.instances.get(&id) {
            return Ok(PropValue::Reference(ObjectReference {
                id,
                closure,
                target: Some(handle.clone()),
            }));
        }
        if self.in_progress.contains(&id) {
            return Err(DecodeError::CycleDetected { id });
        }
        let usable = store
            .get(&id)
            .and_then(Value::as_object)
            .filter(|map| map.get(TYPE_FIELD).is_some_and(Value::is_string));
        let Some(map) = usable else {
            self.issue(IssueKind::UnresolvedReference { id: id.clone() });
            return Ok(unresolved(id, closure));
        };

        self.in_progress.insert(id.clone());
        let decoded = self.decode_object(map);
        self.in_progress.remove(&id);
        let handle = decoded?;
        self.instances.insert(id.clone(), handle.clone());
        Ok(PropValue::Reference(ObjectReference {
            id,
            closure,
            target: Some(handle),
        }))
    }

    /// Decodes an inline object body nested inside another document.
    pub(crate) fn decode_nested(
        &mut self,
        map: &Map<String, Value>,
    ) -> Result<BaseHandle, DecodeError> {
        self.decode_object(map)
    }

    fn issue(&mut self, kind: IssueKind) {
        let issue = match &self.property {
            Some(name) => DecodeIssue::on_property(kind, name.clone()),
            None => DecodeIssue::new(kind),
        };
        if let Some(level) = self.pending.last_mut() {
            level.push(issue);
        }
    }
}

fn unresolved(id: ObjectId, closure: Option<ClosureSummary>) -> PropValue {
    PropValue::Reference(ObjectReference {
        id,
        closure,
        target: None,
    })
}

/// Splices a list of resolved chunk references back into one sequence.
///
/// The check is structural: every element must be a resolved reference to a
/// `Core.DataChunk` with a `data` list. Any other list passes through
/// unchanged, so ordinary lists of references are never mangled.
fn splice_chunks(items: Vec<PropValue>) -> PropValue {
    match try_splice(&items) {
        Some(spliced) => PropValue::List(spliced),
        None => PropValue::List(items),
    }
}

fn try_splice(items: &[PropValue]) -> Option<Vec<PropValue>> {
    if items.is_empty() {
        return None;
    }
    let mut spliced = Vec::new();
    for item in items {
        let reference = item.as_reference()?;
        let target = reference.target.as_ref()?;
        let guard = target.read();
        if !guard.is_of_type(CHUNK_TYPE) {
            return None;
        }
        let data = guard.get(CHUNK_DATA_PROP)?.as_list()?;
        spliced.extend(data.iter().cloned());
    }
    Some(spliced)
}

/// Walks a decoded graph and gathers every object's diagnostics.
pub fn collect_issues(root: &BaseHandle) -> Vec<ObjectIssue> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root.clone()];
    while let Some(handle) = stack.pop() {
        if !visited.insert(handle.addr()) {
            continue;
        }
        let guard = handle.read();
        for issue in guard.issues() {
            found.push(ObjectIssue {
                object_id: guard.id.clone(),
                issue: issue.clone(),
            });
        }
        for (_, value) in guard.properties() {
            queue_handles(value, &mut stack);
        }
    }
    found
}

fn queue_handles(value: &PropValue, stack: &mut Vec<BaseHandle>) {
    match value {
        PropValue::Object(handle) => stack.push(handle.clone()),
        PropValue::Reference(reference) => {
            if let Some(target) = &reference.target {
                stack.push(target.clone());
            }
        }
        PropValue::List(items) => {
            for item in items {
                queue_handles(item, stack);
            }
        }
        PropValue::Map(entries) => {
            for entry in entries.values() {
                queue_handles(entry, stack);
            }
        }
        _ => {}
    }
}
