//! Graph encoding: object trees to content-addressed documents.
//!
//! [`Serializer::encode`] walks a root handle depth-first and produces one
//! canonical JSON document per detached object, children before parents.
//! Detachment is driven by type descriptors and by `@` / `@(N)` property
//! name markers; long lists split into `Core.DataChunk` documents. Every
//! document id is the truncated SHA-256 of its canonical body, so equal
//! subtrees collapse to a single document no matter how often they appear.
//!
//! The walk is synchronous and allocation-bound. Moving the result through a
//! transport is a separate, async concern (see the `transfer` module).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use basekit_model::{
    Base, BaseHandle, ClosureSummary, ObjectDocument, ObjectId, ObjectReference, PropValue,
    parse_prop_name, CHUNK_TYPE, ID_FIELD, TYPE_FIELD,
};
use basekit_registry::{AbstractTypeRegistry, Shape, TypeDescriptor, TypeRegistry};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::canonical::{canonical_of_map, hash_canonical};
use crate::codec;
use crate::error::EncodeError;
use crate::options::SerializeOptions;

/// One encoded graph: the root id plus every document in its closure.
#[derive(Debug, Clone)]
pub struct EncodedGraph {
    pub root_id: ObjectId,
    /// Deduplicated documents; children precede parents, the root is last.
    pub documents: Vec<ObjectDocument>,
}

impl EncodedGraph {
    /// The document carrying the root object.
    pub fn root_document(&self) -> Option<&ObjectDocument> {
        self.documents.iter().find(|doc| doc.id == self.root_id)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

/// Encodes object graphs against a type registry.
#[derive(Debug, Clone)]
pub struct Serializer<'a> {
    registry: &'a TypeRegistry,
    abstracts: Option<&'a AbstractTypeRegistry>,
    options: SerializeOptions,
}

impl<'a> Serializer<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Serializer {
            registry,
            abstracts: None,
            options: SerializeOptions::default(),
        }
    }

    /// Attaches codecs for properties declared with an abstract shape.
    pub fn with_abstracts(mut self, abstracts: &'a AbstractTypeRegistry) -> Self {
        self.abstracts = Some(abstracts);
        self
    }

    pub fn with_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SerializeOptions {
        &self.options
    }

    /// Encodes the graph under `root`.
    pub fn encode(&self, root: &BaseHandle) -> Result<EncodedGraph, EncodeError> {
        self.encode_with(root, &CancelToken::new())
    }

    /// Encodes the graph under `root`, checking `cancel` at every object.
    ///
    /// On success every reachable object (the temporaries built for chunks
    /// included) has its `id` backfilled. On error no id is written, so a
    /// failed encode leaves the graph as it was.
    pub fn encode_with(
        &self,
        root: &BaseHandle,
        cancel: &CancelToken,
    ) -> Result<EncodedGraph, EncodeError> {
        let mut walk = EncodeWalk {
            registry: self.registry,
            abstracts: self.abstracts,
            options: self.options.clone(),
            cancel,
            in_progress: HashSet::new(),
            path: Vec::new(),
            memo: HashMap::new(),
            doc_sizes: HashMap::new(),
            documents: Vec::new(),
            frames: Vec::new(),
            backfill: Vec::new(),
        };
        let (root_id, _) = walk.detach_object(root)?;

        // Ids are written only after the walk fully succeeds.
        let EncodeWalk {
            documents, backfill, ..
        } = walk;
        for (handle, id) in backfill {
            handle.write().id = Some(id);
        }

        debug!(root = %root_id, documents = documents.len(), "graph encoded");
        Ok(EncodedGraph { root_id, documents })
    }
}

/// Closure bookkeeping for one detached document being built.
///
/// `children` collects descendant document ids as a set, so a document shared
/// along several paths counts once. Unresolved references get the same
/// treatment: `extras` keys their stored totals by referenced id, so the same
/// remote target reached through several properties contributes once.
#[derive(Default)]
struct Frame {
    children: HashSet<ObjectId>,
    extras: HashMap<ObjectId, ClosureSummary>,
}

/// Memo entry for an already-detached handle.
#[derive(Clone)]
struct EncodedNode {
    id: ObjectId,
    summary: ClosureSummary,
    closure_ids: Arc<HashSet<ObjectId>>,
    extras: Arc<HashMap<ObjectId, ClosureSummary>>,
}

pub(crate) struct EncodeWalk<'a> {
    registry: &'a TypeRegistry,
    abstracts: Option<&'a AbstractTypeRegistry>,
    options: SerializeOptions,
    cancel: &'a CancelToken,
    /// Handle addresses on the current root-to-here path.
    in_progress: HashSet<usize>,
    /// Type names on the current path, for cycle reports.
    path: Vec<String>,
    memo: HashMap<usize, EncodedNode>,
    doc_sizes: HashMap<ObjectId, u64>,
    documents: Vec<ObjectDocument>,
    frames: Vec<Frame>,
    /// Handles waiting for their id, applied after the walk succeeds. Holding
    /// the handles here also keeps memo addresses stable for the whole walk.
    backfill: Vec<(BaseHandle, ObjectId)>,
}

impl EncodeWalk<'_> {
    /// Encodes `handle` as its own document and returns its id and closure
    /// totals. Re-encoding a handle already seen in this walk is a memo hit.
    fn detach_object(
        &mut self,
        handle: &BaseHandle,
    ) -> Result<(ObjectId, ClosureSummary), EncodeError> {
        if self.cancel.is_canceled() {
            return Err(EncodeError::Canceled);
        }
        let addr = handle.addr();
        if let Some(node) = self.memo.get(&addr).cloned() {
            self.note_child(&node);
            return Ok((node.id, node.summary));
        }

        let type_name = handle.read().type_name().to_string();
        if self.in_progress.contains(&addr) {
            return Err(self.cycle_error(type_name));
        }
        self.in_progress.insert(addr);
        self.path.push(type_name);
        self.frames.push(Frame::default());

        let body = self.object_body(handle);

        let frame = self.frames.pop().unwrap_or_default();
        self.path.pop();
        self.in_progress.remove(&addr);
        let mut body = body?;

        // The id is the hash of the body without the id field; the stored
        // document then carries the id it hashes to.
        let id = hash_canonical(&canonical_of_map(&body));
        body.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        let json = canonical_of_map(&body);
        let size = json.len() as u64;

        if !self.doc_sizes.contains_key(&id) {
            self.doc_sizes.insert(id.clone(), size);
            self.documents.push(ObjectDocument::new(id.clone(), json));
        }

        let mut closure_size = size;
        for child in &frame.children {
            closure_size += self.doc_sizes.get(child).copied().unwrap_or(0);
        }
        // A target counted as a real child is not counted again through a
        // reference token pointing at it.
        let mut extra_count = 0;
        for (extra, totals) in &frame.extras {
            if frame.children.contains(extra) {
                continue;
            }
            closure_size += totals.size;
            extra_count += totals.count;
        }
        let summary = ClosureSummary {
            size: closure_size,
            count: 1 + frame.children.len() as u64 + extra_count,
        };

        let node = EncodedNode {
            id: id.clone(),
            summary,
            closure_ids: Arc::new(frame.children),
            extras: Arc::new(frame.extras),
        };
        self.memo.insert(addr, node.clone());
        self.backfill.push((handle.clone(), id.clone()));
        self.note_child(&node);
        Ok((id, summary))
    }

    /// Encodes `handle` as a nested body with no id of its own.
    pub(crate) fn inline_object(&mut self, handle: &BaseHandle) -> Result<Value, EncodeError> {
        let addr = handle.addr();
        let type_name = handle.read().type_name().to_string();
        if self.in_progress.contains(&addr) {
            return Err(self.cycle_error(type_name));
        }
        self.in_progress.insert(addr);
        self.path.push(type_name);

        let body = self.object_body(handle);

        self.path.pop();
        self.in_progress.remove(&addr);
        Ok(Value::Object(body?))
    }

    fn cycle_error(&self, repeated: String) -> EncodeError {
        let mut path = self.path.clone();
        path.push(repeated);
        EncodeError::CycleDetected { path }
    }

    fn object_body(&mut self, handle: &BaseHandle) -> Result<Map<String, Value>, EncodeError> {
        // Snapshot under the read lock, then recurse unlocked. A handle is
        // never locked while any of its descendants are being encoded.
        let (chain, is_chunk, props) = {
            let guard = handle.read();
            let props: Vec<(String, PropValue)> = guard
                .properties()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            (guard.type_chain(), guard.is_of_type(CHUNK_TYPE), props)
        };
        let resolution = self.registry.resolve(&chain);

        let mut body = Map::new();
        body.insert(TYPE_FIELD.to_string(), Value::String(chain));
        for (name, value) in &props {
            let token = self.emit_property(&resolution.descriptor, is_chunk, name, value)?;
            body.insert(name.clone(), token);
        }
        Ok(body)
    }

    fn emit_property(
        &mut self,
        descriptor: &TypeDescriptor,
        owner_is_chunk: bool,
        name: &str,
        value: &PropValue,
    ) -> Result<Value, EncodeError> {
        let spec = descriptor.property(name);
        if let Some(spec) = spec {
            if let Shape::Abstract(qualified_name) = &spec.shape {
                return self.encode_abstract(qualified_name, name, value);
            }
        }

        let marker = parse_prop_name(name);
        let detach = marker.detach || spec.is_some_and(|spec| spec.detach);
        let chunk = spec.and_then(|spec| spec.chunk).or(marker.chunk);

        match value {
            PropValue::List(items) => {
                let explicit = chunk.map(|size| size.max(1));
                let threshold = explicit.unwrap_or(self.options.chunk_size);
                // Marked lists always go out-of-line; plain lists split only
                // past the configured size. Chunk payloads never re-chunk,
                // and neither does a list that is already all references:
                // that is detached content and re-emits as the same tokens,
                // so a decoded document keeps its id.
                let already_detached = !items.is_empty()
                    && items
                        .iter()
                        .all(|item| matches!(item, PropValue::Reference(_)));
                let split = !owner_is_chunk
                    && !already_detached
                    && (explicit.is_some() || detach || items.len() > threshold);
                if split {
                    self.chunk_list(items, threshold)
                } else {
                    codec::encode_value(self, value)
                }
            }
            PropValue::Object(child) if detach => {
                let (id, summary) = self.detach_object(child)?;
                Ok(codec::reference_token(&id, Some(summary)))
            }
            _ => {
                if detach && !matches!(value, PropValue::Reference(_) | PropValue::Null) {
                    debug!(
                        property = name,
                        kind = value.kind(),
                        "detach marker on a non-detachable value, inlining"
                    );
                }
                codec::encode_value(self, value)
            }
        }
    }

    /// Splits `items` into `Core.DataChunk` documents of at most `size`
    /// elements and returns the list of reference tokens that replaces the
    /// original list.
    fn chunk_list(&mut self, items: &[PropValue], size: usize) -> Result<Value, EncodeError> {
        let mut tokens = Vec::with_capacity(items.len().div_ceil(size));
        for slice in items.chunks(size) {
            let chunk = BaseHandle::new(Base::data_chunk(slice.to_vec()));
            let (id, summary) = self.detach_object(&chunk)?;
            tokens.push(codec::reference_token(&id, Some(summary)));
        }
        Ok(Value::Array(tokens))
    }

    /// Re-emits a reference value. A resolved reference re-encodes its target
    /// (so edits under it produce a fresh id); an unresolved one passes
    /// through verbatim, contributing its stored totals to enclosing
    /// closures once per distinct target.
    pub(crate) fn encode_reference(
        &mut self,
        reference: &ObjectReference,
    ) -> Result<Value, EncodeError> {
        if let Some(target) = &reference.target {
            let (id, summary) = self.detach_object(target)?;
            return Ok(codec::reference_token(&id, Some(summary)));
        }
        if let Some(frame) = self.frames.last_mut() {
            // A reference with no stored totals still names one document.
            let totals = reference.closure.unwrap_or(ClosureSummary::new(0, 1));
            frame.extras.entry(reference.id.clone()).or_insert(totals);
        }
        Ok(codec::reference_token(&reference.id, reference.closure))
    }

    fn encode_abstract(
        &mut self,
        qualified_name: &str,
        property: &str,
        value: &PropValue,
    ) -> Result<Value, EncodeError> {
        match self.abstracts.and_then(|registry| registry.codec(qualified_name)) {
            Some(entry) => entry.encode(value).map_err(|source| EncodeError::Abstract {
                property: property.to_string(),
                source,
            }),
            None => {
                debug!(
                    qualified_name,
                    property, "no abstract codec registered, encoding generically"
                );
                codec::encode_value(self, value)
            }
        }
    }

    /// Records a finished child document in the enclosing frame, if any.
    fn note_child(&mut self, node: &EncodedNode) {
        if let Some(frame) = self.frames.last_mut() {
            frame.children.insert(node.id.clone());
            frame.children.extend(node.closure_ids.iter().cloned());
            for (extra, totals) in node.extras.iter() {
                frame.extras.entry(extra.clone()).or_insert(*totals);
            }
        }
    }
}
