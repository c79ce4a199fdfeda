//! Property-based tests for three core invariants: op apply/invert
//! identity, the annotation index against a linear-scan oracle, and
//! undo/redo byte-identity.

use proptest::prelude::*;

use substance::node::{props, Node, NodeId, NodeKind, Path, PropertyValue, UpdateDiff};
use substance::schema::{BuiltinRole, NodeClass, Schema};
use substance::selection::Selection;
use substance::store::Store;
use substance::{Document, DocumentOptions, TransactionOutcome};

fn schema() -> Schema {
    Schema::builder()
        .register(NodeClass::new("paragraph").builtin(BuiltinRole::Text))
        .unwrap()
        .register(NodeClass::new("strong").builtin(BuiltinRole::Annotation))
        .unwrap()
        .default_text_type("paragraph")
        .freeze()
        .unwrap()
}

fn text_node(id: &str, content: &str) -> Node {
    Node::new(
        id,
        "paragraph",
        NodeKind::Text {
            content: content.to_string(),
        },
    )
}

/// Brute-force linear-scan oracle for the annotation index query.
fn linear_scan_overlap(entries: &[(NodeId, usize, usize)], start: usize, end: usize) -> Vec<NodeId> {
    let mut hits: Vec<NodeId> = entries
        .iter()
        .filter(|(_, s, e)| *s <= end && *e >= start)
        .map(|(id, _, _)| id.clone())
        .collect();
    hits.sort();
    hits
}

fn splice_strategy(len: usize) -> impl Strategy<Value = (usize, usize, String)> {
    (0..=len).prop_flat_map(move |pos| {
        (0..=(len - pos)).prop_flat_map(move |delete_count| {
            "[a-z]{0,5}".prop_map(move |insert| (pos, delete_count, insert))
        })
    })
}

proptest! {
    /// Applying a sequence of ops then the inverse of each op in reverse
    /// order yields a store byte-identical to the starting state,
    /// specialized to a sequence of string splices on one text node's
    /// content.
    #[test]
    fn string_splice_apply_then_invert_is_identity(
        splices in prop::collection::vec(splice_strategy(11), 0..6),
    ) {
        let schema = schema();
        let mut store = Store::new();
        store
            .apply_op(
                &schema,
                substance::Operation::Create { node: text_node("p1", "Hello World") },
            )
            .unwrap();
        let before = store.get(&NodeId::from("p1")).unwrap().clone();

        let path = Path::new("p1", props::CONTENT);
        let mut applied = Vec::new();
        let mut ok = true;
        for (pos, delete_count, insert) in &splices {
            let content_len = store.get(&NodeId::from("p1")).unwrap().content().unwrap().chars().count();
            if *pos > content_len || *pos + *delete_count > content_len {
                ok = false;
                break;
            }
            let result = store.apply_op(
                &schema,
                substance::Operation::Update {
                    path: path.clone(),
                    diff: UpdateDiff::StringSplice {
                        pos: *pos,
                        delete_count: *delete_count,
                        insert: insert.clone(),
                    },
                },
            );
            match result {
                Ok(a) => applied.push(a),
                Err(_) => { ok = false; break; }
            }
        }
        prop_assume!(ok);

        for a in applied.into_iter().rev() {
            store.apply_op(&schema, a.inverse).unwrap();
        }
        let after = store.get(&NodeId::from("p1")).unwrap().clone();
        prop_assert_eq!(before, after);
    }

    /// Annotation index `get` matches a linear-scan oracle for any query
    /// range, for any set of non-overlapping-construction-order annotations
    /// on one path.
    #[test]
    fn annotation_index_matches_linear_scan_oracle(
        ranges in prop::collection::vec((0usize..20, 0usize..20), 0..8),
        query in (0usize..20, 0usize..20),
    ) {
        let schema = schema();
        let mut store = Store::new();
        store
            .apply_op(&schema, substance::Operation::Create { node: text_node("p1", "01234567890123456789") })
            .unwrap();

        let mut entries = Vec::new();
        for (i, (a, b)) in ranges.iter().enumerate() {
            let (start, end) = if a <= b { (*a, *b) } else { (*b, *a) };
            let id = format!("s{i}");
            store
                .apply_op(
                    &schema,
                    substance::Operation::Create {
                        node: Node::new(
                            id.as_str(),
                            "strong",
                            NodeKind::Annotation {
                                path: Path::new("p1", props::CONTENT),
                                start_offset: start,
                                end_offset: end,
                            },
                        ),
                    },
                )
                .unwrap();
            entries.push((NodeId::from(id.as_str()), start, end));
        }

        let (qa, qb) = query;
        let (qstart, qend) = if qa <= qb { (qa, qb) } else { (qb, qa) };

        let mut got = store.annotations.get(&Path::new("p1", props::CONTENT), qstart, qend, None);
        got.sort();
        let expected = linear_scan_overlap(&entries, qstart, qend);
        prop_assert_eq!(got, expected);
    }

    /// Undo followed by redo restores the document byte-identically to
    /// the state after the original commit, for a short sequence of
    /// create/set/update/delete transactions.
    #[test]
    fn undo_then_redo_restores_state(content in "[a-z]{1,10}") {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.transaction(Default::default(), 0, |stage| {
            stage.create(text_node("p1", &content))?;
            Ok(TransactionOutcome::Commit(Default::default()))
        })
        .unwrap();

        doc.transaction(Default::default(), 1, |stage| {
            stage.set(
                Path::new("p1", props::CONTENT),
                PropertyValue::String(format!("{content}-edited")),
            )?;
            Ok(TransactionOutcome::Commit(Default::default()))
        })
        .unwrap();

        let after_commit = doc.store().get(&NodeId::from("p1")).unwrap().clone();

        doc.undo(2).unwrap();
        doc.redo(3).unwrap();

        let after_undo_redo = doc.store().get(&NodeId::from("p1")).unwrap().clone();
        prop_assert_eq!(after_commit, after_undo_redo);
    }
}

#[test]
fn container_annotation_selection_overlap_is_consistent_with_index() {
    let schema = Schema::builder()
        .register(NodeClass::new("paragraph").builtin(BuiltinRole::Text))
        .unwrap()
        .register(NodeClass::new("container").builtin(BuiltinRole::Container))
        .unwrap()
        .register(NodeClass::new("comment").builtin(BuiltinRole::ContainerAnnotation))
        .unwrap()
        .freeze()
        .unwrap();

    let mut store = Store::new();
    store
        .apply_op(&schema, substance::Operation::Create { node: text_node("p1", "one") })
        .unwrap();
    store
        .apply_op(&schema, substance::Operation::Create { node: text_node("p2", "two") })
        .unwrap();
    store
        .apply_op(
            &schema,
            substance::Operation::Create {
                node: Node::new(
                    "c1",
                    "container",
                    NodeKind::Container {
                        nodes: vec![NodeId::from("p1"), NodeId::from("p2")].into(),
                    },
                ),
            },
        )
        .unwrap();
    store
        .apply_op(
            &schema,
            substance::Operation::Create {
                node: Node::new(
                    "ca1",
                    "comment",
                    NodeKind::ContainerAnnotation {
                        container: NodeId::from("c1"),
                        start_path: Path::new("p1", props::CONTENT),
                        start_offset: 1,
                        end_path: Path::new("p2", props::CONTENT),
                        end_offset: 2,
                    },
                ),
            },
        )
        .unwrap();

    let query = Selection::container(
        NodeId::from("c1"),
        Path::new("p1", props::CONTENT),
        0,
        Path::new("p1", props::CONTENT),
        3,
        false,
    );
    let hits = store
        .container_annotations
        .get_overlapping(&NodeId::from("c1"), &query, None);
    assert_eq!(hits, vec![NodeId::from("ca1")]);
}
