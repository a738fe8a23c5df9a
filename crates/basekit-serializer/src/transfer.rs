//! Moving encoded graphs through transports.
//!
//! [`Serializer::send`] encodes a graph and uploads it with existence probes
//! first, so documents the transport already holds never travel again.
//! [`Deserializer::receive`] fetches a root and, in deep mode, its whole
//! reference closure before decoding with every reference resolved.
//!
//! Transport calls for disjoint documents run concurrently, capped by
//! `SerializeOptions::max_in_flight`; the cancel token is checked between
//! waves and batches, never mid-document.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use basekit_model::{BaseHandle, ObjectDocument, ObjectId, REFERENCE_ID_FIELD};
use basekit_transport::{Transport, TransportError};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::decode::{collect_issues, Deserializer, ObjectIssue};
use crate::encode::Serializer;
use crate::error::{DecodeError, EncodeError};
use crate::options::{ReceiveMode, SerializeOptions};

/// Outcome of a send: what was encoded, moved, skipped, and refused.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub root_id: ObjectId,
    /// Documents in the encoded closure.
    pub total: usize,
    /// Documents this send actually transferred.
    pub sent: usize,
    /// Documents the transport already had.
    pub skipped: usize,
    /// Documents the transport reported it could not persist.
    pub failed: Vec<ObjectId>,
}

impl SendReceipt {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A received root plus every diagnostic found below it.
#[derive(Debug)]
pub struct ReceivedGraph {
    pub root: BaseHandle,
    pub issues: Vec<ObjectIssue>,
}

impl ReceivedGraph {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Serializer<'_> {
    /// Encodes the graph under `root` and uploads it to `transport`.
    pub async fn send(
        &self,
        root: &BaseHandle,
        transport: Arc<dyn Transport>,
    ) -> Result<SendReceipt, EncodeError> {
        self.send_with(root, transport, &CancelToken::new()).await
    }

    /// [`send`](Serializer::send) with cooperative cancellation.
    ///
    /// Documents upload children first, in batches of
    /// `SerializeOptions::save_batch_size`, so an interrupted send leaves
    /// the store resumable: everything already saved is a complete subtree.
    pub async fn send_with(
        &self,
        root: &BaseHandle,
        transport: Arc<dyn Transport>,
        cancel: &CancelToken,
    ) -> Result<SendReceipt, EncodeError> {
        let graph = self.encode_with(root, cancel)?;
        let total = graph.documents.len();
        let root_id = graph.root_id.clone();

        let present = probe_existing(&graph.documents, &transport, self.options(), cancel).await?;
        let mut skipped = 0usize;
        let mut outgoing = Vec::new();
        for (document, have) in graph.documents.into_iter().zip(present) {
            if have {
                skipped += 1;
            } else {
                outgoing.push(document);
            }
        }

        let mut receipt = SendReceipt {
            root_id,
            total,
            sent: 0,
            skipped,
            failed: Vec::new(),
        };
        for batch in outgoing.chunks(self.options().save_batch_size.max(1)) {
            if cancel.is_canceled() {
                return Err(EncodeError::Canceled);
            }
            let report = transport.save_objects(batch).await?;
            receipt.sent += report.saved;
            receipt.failed.extend(report.failed);
        }
        debug!(
            transport = transport.name(),
            root = %receipt.root_id,
            total = receipt.total,
            sent = receipt.sent,
            skipped = receipt.skipped,
            "send finished"
        );
        Ok(receipt)
    }
}

impl Deserializer<'_> {
    /// Fetches and decodes the graph under `root_id`.
    pub async fn receive(
        &self,
        root_id: &ObjectId,
        transport: Arc<dyn Transport>,
        mode: ReceiveMode,
    ) -> Result<ReceivedGraph, DecodeError> {
        self.receive_with(
            root_id,
            transport,
            mode,
            &SerializeOptions::default(),
            &CancelToken::new(),
        )
        .await
    }

    /// [`receive`](Deserializer::receive) with explicit options and
    /// cancellation.
    ///
    /// The root must exist and parse; anything below it that cannot be
    /// fetched or read degrades to an unresolved reference with a
    /// diagnostic on the carrying object.
    pub async fn receive_with(
        &self,
        root_id: &ObjectId,
        transport: Arc<dyn Transport>,
        mode: ReceiveMode,
        options: &SerializeOptions,
        cancel: &CancelToken,
    ) -> Result<ReceivedGraph, DecodeError> {
        if cancel.is_canceled() {
            return Err(DecodeError::Canceled);
        }
        let Some(json) = transport.get_object(root_id).await? else {
            return Err(DecodeError::MissingRoot {
                id: root_id.clone(),
            });
        };
        let token: Value = serde_json::from_str(&json)
            .map_err(|e| DecodeError::malformed(Some(root_id.clone()), e.to_string()))?;

        let root = match mode {
            ReceiveMode::Shallow => self.decode_detached(root_id, &token)?,
            ReceiveMode::Deep => {
                let store = fetch_closure(root_id, &token, &transport, options, cancel).await?;
                self.decode_stored(root_id, &token, &store)?
            }
        };
        let issues = collect_issues(&root);
        debug!(
            transport = transport.name(),
            root = %root_id,
            issues = issues.len(),
            "receive finished"
        );
        Ok(ReceivedGraph { root, issues })
    }
}

/// Asks the transport which documents it already holds, with bounded
/// concurrency. A failed probe counts as missing, so the document is sent
/// rather than silently dropped.
async fn probe_existing(
    documents: &[ObjectDocument],
    transport: &Arc<dyn Transport>,
    options: &SerializeOptions,
    cancel: &CancelToken,
) -> Result<Vec<bool>, EncodeError> {
    let semaphore = Arc::new(Semaphore::new(options.max_in_flight.max(1)));
    let mut probes: JoinSet<(usize, Result<bool, TransportError>)> = JoinSet::new();
    for (index, document) in documents.iter().enumerate() {
        let transport = Arc::clone(transport);
        let semaphore = Arc::clone(&semaphore);
        let id = document.id.clone();
        probes.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, Err(TransportError::backend("send", "probe pool closed"))),
            };
            (index, transport.has_object(&id).await)
        });
    }

    let mut present = vec![false; documents.len()];
    while let Some(joined) = probes.join_next().await {
        if cancel.is_canceled() {
            return Err(EncodeError::Canceled);
        }
        match joined {
            Ok((index, Ok(have))) => present[index] = have,
            Ok((_, Err(error))) => warn!(%error, "existence probe failed, will send the document"),
            Err(error) => warn!(%error, "existence probe task failed"),
        }
    }
    Ok(present)
}

/// Fetches every document transitively referenced from `root_token`, wave by
/// wave. Fetch failures and missing ids are logged and left out of the
/// store; the decode pass marks them unresolved.
async fn fetch_closure(
    root_id: &ObjectId,
    root_token: &Value,
    transport: &Arc<dyn Transport>,
    options: &SerializeOptions,
    cancel: &CancelToken,
) -> Result<HashMap<ObjectId, Value>, DecodeError> {
    let mut store = HashMap::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();
    seen.insert(root_id.clone());

    let mut wave = Vec::new();
    collect_reference_ids(root_token, &mut wave);
    wave.retain(|id| seen.insert(id.clone()));

    let semaphore = Arc::new(Semaphore::new(options.max_in_flight.max(1)));
    while !wave.is_empty() {
        if cancel.is_canceled() {
            return Err(DecodeError::Canceled);
        }
        let mut fetches: JoinSet<(ObjectId, Result<Option<String>, TransportError>)> =
            JoinSet::new();
        for id in wave.drain(..) {
            let transport = Arc::clone(transport);
            let semaphore = Arc::clone(&semaphore);
            fetches.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (id, Err(TransportError::backend("receive", "fetch pool closed")))
                    }
                };
                let fetched = transport.get_object(&id).await;
                (id, fetched)
            });
        }

        let mut next = Vec::new();
        while let Some(joined) = fetches.join_next().await {
            if cancel.is_canceled() {
                return Err(DecodeError::Canceled);
            }
            let (id, fetched) = match joined {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(%error, "fetch task failed");
                    continue;
                }
            };
            match fetched {
                Ok(Some(json)) => match serde_json::from_str::<Value>(&json) {
                    Ok(token) => {
                        collect_reference_ids(&token, &mut next);
                        store.insert(id, token);
                    }
                    Err(error) => {
                        warn!(%id, %error, "stored document is not valid JSON, leaving unresolved")
                    }
                },
                Ok(None) => debug!(%id, "referenced document missing, leaving unresolved"),
                Err(error) => warn!(%id, %error, "fetch failed, leaving unresolved"),
            }
        }
        next.retain(|id| seen.insert(id.clone()));
        wave = next;
    }
    debug!(fetched = store.len(), "closure fetched");
    Ok(store)
}

/// Gathers every `referencedId` in a token tree.
fn collect_reference_ids(token: &Value, found: &mut Vec<ObjectId>) {
    match token {
        Value::Array(items) => {
            for item in items {
                collect_reference_ids(item, found);
            }
        }
        Value::Object(map) => {
            if let Some(id) = map.get(REFERENCE_ID_FIELD).and_then(Value::as_str) {
                found.push(ObjectId::from(id));
            }
            for entry in map.values() {
                collect_reference_ids(entry, found);
            }
        }
        _ => {}
    }
}
