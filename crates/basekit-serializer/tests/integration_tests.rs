//! Integration tests for end-to-end graph serialization
//!
//! Test coverage areas:
//! - Full pipeline: build graph -> send -> receive -> structural equality
//! - Content addressing: stable ids, edit bubbling, number forms
//! - Chunking: boundary math and ordered reassembly
//! - Closure totals on reference tokens
//! - Transfer behavior: dedup, shallow mode, gaps, filesystem stores
//! - Structural failures: cycles, malformed documents

use std::collections::BTreeMap;
use std::sync::Arc;

use basekit_model::{Base, BaseHandle, IssueKind, ObjectDocument, ObjectId, PropValue};
use basekit_registry::{AbstractCodec, AbstractTypeRegistry, Shape, TypeDescriptor, TypeRegistry};
use basekit_serializer::{DecodeError, Deserializer, EncodeError, ReceiveMode, Serializer};
use basekit_transport::{FsTransport, MemoryTransport};
use serde_json::{Number, Value};

// =============================================================================
// Fixtures
// =============================================================================

/// Registry with every type the fixtures below use, so deep receives come
/// back without diagnostics.
fn scene_registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry.register(
        TypeDescriptor::new("Scene.Assembly")
            .with_property("label", Shape::Text)
            .with_detached("anchor", Shape::Object),
    );
    registry.register(
        TypeDescriptor::new("Scene.Panel:Scene.Assembly").with_property("width", Shape::Number),
    );
    registry.register(TypeDescriptor::new("Trim"));
    registry
}

/// An assembly with a declared detached child, an inline child, a
/// detach-marked list, and a plain map.
fn sample_scene() -> (BaseHandle, BaseHandle) {
    let mut anchor = Base::new("Scene.Panel:Scene.Assembly");
    anchor.set_declared("width", 2.5f64.into()).expect("width");
    let anchor = BaseHandle::new(anchor);

    let mut trim = Base::new("Trim");
    trim.set_dynamic("kind", "edge".into()).expect("kind");

    let mut counts = BTreeMap::new();
    counts.insert("bolts".to_string(), 12i64.into());
    counts.insert("plates".to_string(), 3i64.into());

    let mut root = Base::new("Scene.Assembly");
    root.set_declared("label", "frame".into()).expect("label");
    root.set_declared("anchor", anchor.clone().into()).expect("anchor");
    root.set_dynamic("trim", BaseHandle::new(trim).into()).expect("trim");
    root.set_dynamic("@tags", PropValue::List(vec!["a".into(), "b".into()]))
        .expect("tags");
    root.set_dynamic("counts", PropValue::Map(counts)).expect("counts");
    (BaseHandle::new(root), anchor)
}

fn number_sample(n: PropValue) -> BaseHandle {
    let mut base = Base::new("Sample");
    base.set_dynamic("n", n).expect("n");
    BaseHandle::new(base)
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

mod round_trip_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_then_receive_preserves_structure() {
        let registry = scene_registry();
        let (root, anchor) = sample_scene();
        let transport = Arc::new(MemoryTransport::new());

        let receipt = Serializer::new(&registry)
            .send(&root, transport.clone())
            .await
            .expect("send should succeed");
        // Root, detached anchor, one chunk for the marked tag list.
        assert_eq!(receipt.total, 3);
        assert_eq!(receipt.sent, 3);
        assert!(receipt.is_complete());

        // Every detached object gets its id backfilled.
        assert_eq!(root.read().id.as_ref(), Some(&receipt.root_id));
        assert!(anchor.read().id.is_some());

        let received = Deserializer::new(&registry)
            .receive(&receipt.root_id, transport, ReceiveMode::Deep)
            .await
            .expect("receive should succeed");
        assert!(received.is_clean(), "issues: {:?}", received.issues);
        assert_eq!(received.root, root);
        assert_eq!(received.root.read().id, root.read().id);
    }

    #[tokio::test]
    async fn test_reencoding_a_received_graph_is_id_stable() {
        let registry = scene_registry();
        let (root, _) = sample_scene();
        let transport = Arc::new(MemoryTransport::new());

        let first = Serializer::new(&registry)
            .send(&root, transport.clone())
            .await
            .expect("send");
        let received = Deserializer::new(&registry)
            .receive(&first.root_id, transport, ReceiveMode::Deep)
            .await
            .expect("receive");

        let again = Serializer::new(&registry)
            .send(&received.root, Arc::new(MemoryTransport::new()))
            .await
            .expect("resend");
        assert_eq!(again.root_id, first.root_id);
        assert_eq!(again.total, first.total);
    }

    #[tokio::test]
    async fn test_unknown_registry_still_round_trips_to_the_same_id() {
        // Encode against a registry that knows the types.
        let rich = scene_registry();
        let (root, _) = sample_scene();
        let transport = Arc::new(MemoryTransport::new());
        let receipt = Serializer::new(&rich)
            .send(&root, transport.clone())
            .await
            .expect("send");

        // Receive with a registry that knows none of them.
        let empty = TypeRegistry::new();
        let received = Deserializer::new(&empty)
            .receive(&receipt.root_id, transport, ReceiveMode::Deep)
            .await
            .expect("receive");
        assert!(received
            .issues
            .iter()
            .any(|entry| matches!(entry.issue.kind, IssueKind::UnknownType { .. })));

        // Without a descriptor the detached edge keeps its reference
        // wrapper, resolved but not unwrapped.
        {
            let guard = received.root.read();
            let anchor = guard.get("anchor").expect("anchor survives");
            match anchor {
                PropValue::Reference(reference) => assert!(reference.is_resolved()),
                other => panic!("expected a reference wrapper, got {}", other.kind()),
            }
            assert_eq!(guard.get("label").and_then(PropValue::as_str), Some("frame"));
        }

        // Re-encoding reproduces the original documents bit for bit.
        let again = Serializer::new(&empty)
            .send(&received.root, Arc::new(MemoryTransport::new()))
            .await
            .expect("resend");
        assert_eq!(again.root_id, receipt.root_id);
        assert_eq!(again.total, receipt.total);
    }

    #[test]
    fn test_decoding_a_document_without_a_store_reencodes_to_the_same_id() {
        // Encode against a registry that knows the types.
        let rich = scene_registry();
        let (root, _) = sample_scene();
        let graph = Serializer::new(&rich).encode(&root).expect("encode");
        let root_json = graph.root_document().expect("root document").json.clone();

        // Decode the root document by itself: no store, no types. The
        // detached anchor and the tag chunk both stay reference wrappers.
        let empty = TypeRegistry::new();
        let decoded = Deserializer::new(&empty)
            .decode_document(&root_json)
            .expect("decode");
        {
            let guard = decoded.read();
            let tags = guard.get("@tags").and_then(PropValue::as_list).expect("tags");
            assert!(tags
                .iter()
                .all(|item| matches!(item, PropValue::Reference(r) if !r.is_resolved())));
        }

        // Re-encoding the partial object reproduces the root document
        // alone, byte for byte.
        let again = Serializer::new(&empty).encode(&decoded).expect("re-encode");
        assert_eq!(again.root_id, graph.root_id);
        assert_eq!(again.document_count(), 1);
        assert_eq!(again.root_document().expect("root document").json, root_json);
    }
}

// =============================================================================
// Content Addressing Tests
// =============================================================================

mod addressing_tests {
    use super::*;

    fn tower(value: i64) -> BaseHandle {
        let mut leaf = Base::new("Leaf");
        leaf.set_dynamic("value", value.into()).expect("value");
        let mut mid = Base::new("Mid");
        mid.set_dynamic("@leaf", BaseHandle::new(leaf).into()).expect("leaf");
        let mut top = Base::new("Top");
        top.set_dynamic("@mid", BaseHandle::new(mid).into()).expect("mid");
        BaseHandle::new(top)
    }

    #[test]
    fn test_equal_content_gets_equal_ids() {
        let registry = TypeRegistry::new();
        let a = Serializer::new(&registry).encode(&tower(1)).expect("encode");
        let b = Serializer::new(&registry).encode(&tower(1)).expect("encode");
        assert_eq!(a.root_id, b.root_id);

        let ids = |graph: &basekit_serializer::EncodedGraph| {
            let mut ids: Vec<ObjectId> = graph.documents.iter().map(|doc| doc.id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_a_leaf_edit_changes_every_ancestor_id() {
        let registry = TypeRegistry::new();
        let a = Serializer::new(&registry).encode(&tower(1)).expect("encode");
        let b = Serializer::new(&registry).encode(&tower(2)).expect("encode");

        assert_ne!(a.root_id, b.root_id);
        for doc in &a.documents {
            assert!(
                b.documents.iter().all(|other| other.id != doc.id),
                "document {} should not survive the edit",
                doc.id
            );
        }
    }

    #[test]
    fn test_integer_and_float_forms_hash_differently() {
        let registry = TypeRegistry::new();
        let serializer = Serializer::new(&registry);

        let int_graph = serializer
            .encode(&number_sample(PropValue::Number(Number::from(1))))
            .expect("encode");
        let float_graph = serializer
            .encode(&number_sample(PropValue::Number(
                Number::from_f64(1.0).expect("finite"),
            )))
            .expect("encode");

        let int_doc = int_graph.root_document().expect("doc");
        let float_doc = float_graph.root_document().expect("doc");
        assert!(int_doc.json.contains(r#""n":1,"speckle_type""#));
        assert!(float_doc.json.contains(r#""n":1.0,"speckle_type""#));
        assert_ne!(int_doc.id, float_doc.id);
    }

    #[test]
    fn test_non_finite_floats_store_as_null() {
        let registry = TypeRegistry::new();
        let graph = Serializer::new(&registry)
            .encode(&number_sample(f64::NAN.into()))
            .expect("encode");
        assert!(graph
            .root_document()
            .expect("doc")
            .json
            .contains(r#""n":null"#));
    }
}

// =============================================================================
// Chunking Tests
// =============================================================================

mod chunking_tests {
    use super::*;

    #[tokio::test]
    async fn test_chunk_boundary_produces_ceil_n_over_t_documents() {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::new("Data.Series").with_chunked(
                "values",
                Shape::list(Shape::Number),
                1000,
            ),
        );

        let mut series = Base::new("Data.Series");
        series
            .set_declared("values", PropValue::List((0..2500i64).map(PropValue::from).collect()))
            .expect("values");
        let root = BaseHandle::new(series);
        let transport = Arc::new(MemoryTransport::new());

        let receipt = Serializer::new(&registry)
            .send(&root, transport.clone())
            .await
            .expect("send");
        // ceil(2500 / 1000) chunks plus the root.
        assert_eq!(receipt.total, 4);

        let received = Deserializer::new(&registry)
            .receive(&receipt.root_id, transport, ReceiveMode::Deep)
            .await
            .expect("receive");
        assert!(received.is_clean(), "issues: {:?}", received.issues);

        let guard = received.root.read();
        assert!(guard.is_declared("values"));
        let values: Vec<i64> = guard
            .get("values")
            .and_then(PropValue::as_list)
            .expect("list")
            .iter()
            .filter_map(PropValue::as_i64)
            .collect();
        let expected: Vec<i64> = (0..2500).collect();
        assert_eq!(values, expected);
        drop(guard);

        // Splice then re-chunk lands on the same documents.
        let again = Serializer::new(&registry)
            .send(&received.root, Arc::new(MemoryTransport::new()))
            .await
            .expect("resend");
        assert_eq!(again.root_id, receipt.root_id);
        assert_eq!(again.total, 4);
    }

    #[test]
    fn test_chunks_carry_bounded_ordered_slices() {
        let registry = TypeRegistry::new();
        let mut base = Base::new("Data.Series");
        base.set_dynamic("@(1000)values", PropValue::List((0..2500i64).map(PropValue::from).collect()))
            .expect("values");

        let graph = Serializer::new(&registry)
            .encode(&BaseHandle::new(base))
            .expect("encode");
        assert_eq!(graph.document_count(), 4);

        // Chunks precede the root and keep list order.
        let mut lengths = Vec::new();
        let mut first_values = Vec::new();
        for doc in &graph.documents {
            let token: Value = serde_json::from_str(&doc.json).expect("chunk json");
            if token["speckle_type"] == "Core.DataChunk" {
                let data = token["data"].as_array().expect("data array");
                lengths.push(data.len());
                first_values.push(data[0].as_i64().expect("int"));
            }
        }
        assert_eq!(lengths, vec![1000, 1000, 500]);
        assert_eq!(first_values, vec![0, 1000, 2000]);
    }
}

// =============================================================================
// Closure Accounting Tests
// =============================================================================

mod closure_tests {
    use super::*;

    #[test]
    fn test_diamond_counts_the_shared_leaf_once() {
        let registry = TypeRegistry::new();

        let mut shared = Base::new("Leaf");
        shared.set_dynamic("value", 9i64.into()).expect("value");
        let shared = BaseHandle::new(shared);

        let mut left = Base::new("MidA");
        left.set_dynamic("@leaf", shared.clone().into()).expect("leaf");
        let mut right = Base::new("MidB");
        right.set_dynamic("@leaf", shared.clone().into()).expect("leaf");

        let mut top = Base::new("Top");
        top.set_dynamic("@left", BaseHandle::new(left).into()).expect("left");
        top.set_dynamic("@right", BaseHandle::new(right).into()).expect("right");
        let root = BaseHandle::new(top);

        let graph = Serializer::new(&registry).encode(&root).expect("encode");
        // Leaf, MidA, MidB, Top; the shared leaf appears once.
        assert_eq!(graph.document_count(), 4);

        let doc_by_type = |marker: &str| {
            graph
                .documents
                .iter()
                .find(|doc| doc.json.contains(marker))
                .expect("document")
        };
        let leaf_doc = doc_by_type(r#""speckle_type":"Leaf""#);
        let left_doc = doc_by_type(r#""speckle_type":"MidA""#);

        let root_token: Value =
            serde_json::from_str(&graph.root_document().expect("root").json).expect("json");
        // Documents never carry a top-level closure; reference tokens do.
        assert!(root_token.get("__closure").is_none());

        let left_ref = &root_token["@left"];
        assert_eq!(
            left_ref["referencedId"].as_str(),
            Some(left_doc.id.as_str())
        );
        assert_eq!(left_ref["__closure"]["count"].as_u64(), Some(2));
        assert_eq!(
            left_ref["__closure"]["size"].as_u64(),
            Some(left_doc.size() + leaf_doc.size())
        );
    }
}

// =============================================================================
// Transfer Tests
// =============================================================================

mod transfer_tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_subtrees_are_not_resent() {
        let registry = TypeRegistry::new();
        let mut leaf = Base::new("Leaf");
        leaf.set_dynamic("value", 5i64.into()).expect("value");
        let leaf = BaseHandle::new(leaf);

        let mut first = Base::new("Top");
        first.set_dynamic("@leaf", leaf.clone().into()).expect("leaf");
        let mut second = Base::new("Top");
        second.set_dynamic("@leaf", leaf.clone().into()).expect("leaf");
        second.set_dynamic("extra", 1i64.into()).expect("extra");

        let transport = Arc::new(MemoryTransport::new());
        let serializer = Serializer::new(&registry);

        let one = serializer
            .send(&BaseHandle::new(first), transport.clone())
            .await
            .expect("first send");
        assert_eq!(one.sent, 2);

        let two = serializer
            .send(&BaseHandle::new(second), transport.clone())
            .await
            .expect("second send");
        assert_eq!(two.total, 2);
        assert_eq!(two.skipped, 1, "the shared leaf is already stored");
        assert_eq!(two.sent, 1);
        assert_eq!(transport.len(), 3);
    }

    #[tokio::test]
    async fn test_shallow_receive_leaves_references_unresolved() {
        let registry = scene_registry();
        let (root, _) = sample_scene();
        let transport = Arc::new(MemoryTransport::new());
        let receipt = Serializer::new(&registry)
            .send(&root, transport.clone())
            .await
            .expect("send");

        let received = Deserializer::new(&registry)
            .receive(&receipt.root_id, transport, ReceiveMode::Shallow)
            .await
            .expect("receive");
        // Unfetched is not an error in shallow mode.
        assert!(received.is_clean(), "issues: {:?}", received.issues);

        let guard = received.root.read();
        match guard.get("anchor").expect("anchor") {
            PropValue::Reference(reference) => {
                assert!(!reference.is_resolved());
                let closure = reference.closure.expect("closure totals");
                assert_eq!(closure.count, 1);
            }
            other => panic!("expected an unresolved reference, got {}", other.kind()),
        }
        // Inline content is still right there.
        assert_eq!(guard.get("label").and_then(PropValue::as_str), Some("frame"));
    }

    #[tokio::test]
    async fn test_missing_child_degrades_to_an_unresolved_reference() {
        let registry = scene_registry();
        let (root, anchor) = sample_scene();
        let graph = Serializer::new(&registry).encode(&root).expect("encode");
        let anchor_id = anchor.read().id.clone().expect("anchor id");

        // Seed a store that lost the anchor document.
        let transport = Arc::new(MemoryTransport::new());
        for doc in &graph.documents {
            if doc.id != anchor_id {
                transport.insert(doc.clone());
            }
        }

        let received = Deserializer::new(&registry)
            .receive(&graph.root_id, transport, ReceiveMode::Deep)
            .await
            .expect("receive still succeeds");
        assert!(received.issues.iter().any(|entry| matches!(
            &entry.issue.kind,
            IssueKind::UnresolvedReference { id } if *id == anchor_id
        )));

        {
            let guard = received.root.read();
            match guard.get("anchor").expect("anchor") {
                PropValue::Reference(reference) => {
                    assert!(!reference.is_resolved());
                    assert_eq!(reference.id, anchor_id);
                    assert!(reference.closure.is_some());
                }
                other => panic!("expected the gap to stay visible, got {}", other.kind()),
            }
        }

        // The gap re-encodes verbatim, so the root id survives.
        let again = Serializer::new(&registry)
            .encode(&received.root)
            .expect("reencode");
        assert_eq!(again.root_id, graph.root_id);
    }

    #[tokio::test]
    async fn test_filesystem_store_round_trips() {
        let registry = scene_registry();
        let (root, _) = sample_scene();
        let dir = tempfile::TempDir::new().expect("tempdir");
        let transport = Arc::new(
            FsTransport::new(dir.path().join("store"))
                .await
                .expect("store"),
        );

        let receipt = Serializer::new(&registry)
            .send(&root, transport.clone())
            .await
            .expect("send");
        assert!(receipt.is_complete());

        // Documents land sharded under objects/.
        let objects = dir.path().join("store").join("objects");
        assert!(objects.is_dir());
        assert!(objects.read_dir().expect("read_dir").next().is_some());

        // A second send finds everything in place.
        let again = Serializer::new(&registry)
            .send(&root, transport.clone())
            .await
            .expect("resend");
        assert_eq!(again.sent, 0);
        assert_eq!(again.skipped, again.total);

        let received = Deserializer::new(&registry)
            .receive(&receipt.root_id, transport, ReceiveMode::Deep)
            .await
            .expect("receive");
        assert!(received.is_clean(), "issues: {:?}", received.issues);
        assert_eq!(received.root, root);
    }

    #[tokio::test]
    async fn test_concurrent_sends_share_registry_and_store() {
        let registry = Arc::new(TypeRegistry::new());
        let transport = Arc::new(MemoryTransport::new());

        let graph_for = |tag: &str| {
            let mut leaf = Base::new("Leaf");
            leaf.set_dynamic("value", 5i64.into()).expect("value");
            let mut top = Base::new("Top");
            top.set_dynamic("@leaf", BaseHandle::new(leaf).into()).expect("leaf");
            top.set_dynamic("tag", tag.into()).expect("tag");
            BaseHandle::new(top)
        };

        let left = {
            let registry = registry.clone();
            let transport = transport.clone();
            let root = graph_for("left");
            tokio::spawn(async move { Serializer::new(&registry).send(&root, transport).await })
        };
        let right = {
            let registry = registry.clone();
            let transport = transport.clone();
            let root = graph_for("right");
            tokio::spawn(async move { Serializer::new(&registry).send(&root, transport).await })
        };

        let one = left.await.expect("join").expect("send");
        let two = right.await.expect("join").expect("send");
        assert_ne!(one.root_id, two.root_id);
        // Both roots plus the one shared leaf document.
        assert_eq!(transport.len(), 3);
    }
}

// =============================================================================
// Abstract Type Tests
// =============================================================================

mod abstract_type_tests {
    use super::*;

    fn point_codecs() -> AbstractTypeRegistry {
        let abstracts = AbstractTypeRegistry::new();
        abstracts.register(
            "Geo.Point",
            AbstractCodec::new(
                |token| {
                    let pair = token
                        .as_array()
                        .ok_or_else(|| anyhow::anyhow!("point must be a pair"))?;
                    anyhow::ensure!(pair.len() == 2, "point must have two coordinates");
                    let mut point = BTreeMap::new();
                    point.insert(
                        "x".to_string(),
                        pair[0]
                            .as_f64()
                            .ok_or_else(|| anyhow::anyhow!("x must be a number"))?
                            .into(),
                    );
                    point.insert(
                        "y".to_string(),
                        pair[1]
                            .as_f64()
                            .ok_or_else(|| anyhow::anyhow!("y must be a number"))?
                            .into(),
                    );
                    Ok(PropValue::Map(point))
                },
                |value| {
                    let point = value
                        .as_map()
                        .ok_or_else(|| anyhow::anyhow!("point must be a map"))?;
                    let coord = |axis: &str| {
                        point
                            .get(axis)
                            .and_then(PropValue::as_f64)
                            .ok_or_else(|| anyhow::anyhow!("{axis} must be a number"))
                    };
                    Ok(serde_json::json!([coord("x")?, coord("y")?]))
                },
            ),
        );
        abstracts
    }

    fn drawing_registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::new("Drawing")
                .with_property("origin", Shape::abstract_type("Geo.Point")),
        );
        registry
    }

    fn drawing() -> BaseHandle {
        let mut point = BTreeMap::new();
        point.insert("x".to_string(), 1.5f64.into());
        point.insert("y".to_string(), 2.5f64.into());
        let mut base = Base::new("Drawing");
        base.set_declared("origin", PropValue::Map(point)).expect("origin");
        BaseHandle::new(base)
    }

    #[test]
    fn test_abstract_codec_owns_the_wire_form() {
        let registry = drawing_registry();
        let abstracts = point_codecs();

        let graph = Serializer::new(&registry)
            .with_abstracts(&abstracts)
            .encode(&drawing())
            .expect("encode");
        let doc = graph.root_document().expect("doc");
        assert!(doc.json.contains(r#""origin":[1.5,2.5]"#), "json: {}", doc.json);

        let decoded = Deserializer::new(&registry)
            .with_abstracts(&abstracts)
            .decode_document(&doc.json)
            .expect("decode");
        let guard = decoded.read();
        assert!(!guard.has_issues());
        let origin = guard.get("origin").and_then(PropValue::as_map).expect("map");
        assert_eq!(origin.get("x").and_then(PropValue::as_f64), Some(1.5));
        assert_eq!(origin.get("y").and_then(PropValue::as_f64), Some(2.5));
    }

    #[test]
    fn test_missing_codec_keeps_generic_form_with_a_diagnostic() {
        let registry = drawing_registry();
        let abstracts = point_codecs();

        let graph = Serializer::new(&registry)
            .with_abstracts(&abstracts)
            .encode(&drawing())
            .expect("encode");
        let doc = graph.root_document().expect("doc");

        // Decode with no codec attached at all.
        let decoded = Deserializer::new(&registry)
            .decode_document(&doc.json)
            .expect("decode");
        let guard = decoded.read();
        assert!(guard.issues().iter().any(|issue| matches!(
            &issue.kind,
            IssueKind::UnresolvedAbstractType { qualified_name } if qualified_name == "Geo.Point"
        )));
        // The raw pair is preserved, not dropped.
        let origin: Vec<f64> = guard
            .get("origin")
            .and_then(PropValue::as_list)
            .expect("list")
            .iter()
            .filter_map(PropValue::as_f64)
            .collect();
        assert_eq!(origin, vec![1.5, 2.5]);
    }
}

// =============================================================================
// Structural Failure Tests
// =============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_cycle_rejection_leaves_the_store_untouched() {
        let registry = TypeRegistry::new();
        let a = BaseHandle::new(Base::new("NodeA"));
        let b = BaseHandle::new(Base::new("NodeB"));
        a.write().set_dynamic("@next", b.clone().into()).expect("a -> b");
        b.write().set_dynamic("@next", a.clone().into()).expect("b -> a");

        let transport = Arc::new(MemoryTransport::new());
        let err = Serializer::new(&registry)
            .send(&a, transport.clone())
            .await
            .expect_err("cycle");
        match err {
            EncodeError::CycleDetected { path } => {
                assert_eq!(path, vec!["NodeA", "NodeB", "NodeA"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(transport.is_empty(), "no partial output on a failed encode");
        assert!(a.read().id.is_none());
        assert!(b.read().id.is_none());
    }

    #[tokio::test]
    async fn test_malformed_stored_root_is_fatal() {
        let registry = TypeRegistry::new();
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(ObjectDocument::new("badroot0", "{not json"));

        let err = Deserializer::new(&registry)
            .receive(&ObjectId::from("badroot0"), transport, ReceiveMode::Deep)
            .await
            .expect_err("malformed");
        assert!(matches!(err, DecodeError::Malformed { id: Some(id), .. } if id.as_str() == "badroot0"));
    }

    #[tokio::test]
    async fn test_untyped_stored_root_is_fatal() {
        let registry = TypeRegistry::new();
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(ObjectDocument::new("typeless", r#"{"n":1}"#));

        let err = Deserializer::new(&registry)
            .receive(&ObjectId::from("typeless"), transport, ReceiveMode::Shallow)
            .await
            .expect_err("untyped");
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }
}
