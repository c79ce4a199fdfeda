//! Top-level document: wires schema, live store, transaction stage,
//! history, and event proxies into one owning type.
//!
//! This type owns a [`Store`], drives a [`Stage`], and wires up a
//! [`PathProxy`] plus a `document:changed` [`Observer`].

use std::rc::Rc;

use serde_json::Value as Json;
use tracing::{debug, trace, warn};

use crate::change::{DocumentChange, History, InfoBag, StateMap};
use crate::error::{Error, Result};
use crate::event::{ChangeEvent, Observer, PathProxy, Subscription};
use crate::node::{Node, NodeId, Path, PropertyValue, UpdateDiff};
use crate::ops::Operation;
use crate::schema::Schema;
use crate::store::Store;
use crate::transaction::{Stage, TransactionOutcome};

/// Construction-time document configuration.
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    /// When `true`, mutating the live document outside an active
    /// transaction returns `Err(Error::NoActiveTransaction)`; when
    /// `false` (default), it's mirrored into the stage instead (legacy
    /// behavior).
    pub force_transactions: bool,
    pub default_text_type: Option<String>,
}

/// The document: schema + live store + transaction stage + history + event
/// proxies, wired together.
pub struct Document {
    schema: Rc<Schema>,
    live: Store,
    stage: Stage,
    history: History,
    proxies: PathProxy,
    changed: Observer<ChangeEvent>,
    options: DocumentOptions,
}

impl Document {
    pub fn new(schema: Schema, options: DocumentOptions) -> Self {
        let schema = Rc::new(schema);
        Document {
            schema: schema.clone(),
            live: Store::new(),
            stage: Stage::new(schema, Store::new()),
            history: History::new(),
            proxies: PathProxy::new(),
            changed: Observer::new(),
            options,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &Store {
        &self.live
    }

    /// The transaction stage, for read access to its shadow store between
    /// [`Document::begin_transaction`] and commit/cancel (e.g. a host
    /// binding resolving a node's type before building a typed property
    /// value for [`Document::stage_mut`]).
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn subscribe_changed<F>(&self, f: F) -> Subscription<ChangeEvent>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.changed.subscribe(f)
    }

    pub fn subscribe_path<F>(&mut self, path: Path, f: F) -> Subscription<ChangeEvent>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.proxies.subscribe(path, f)
    }

    // ---- Outside-transaction mutation ----

    /// Mutates the live document directly, outside any transaction. Mirrors
    /// the op into the stage so both stay in sync, and does **not** record
    /// the op in history. Fails with `NoActiveTransaction` when
    /// `force_transactions` is set.
    fn apply_outside_transaction(&mut self, op: Operation) -> Result<Operation> {
        if self.stage.is_active() {
            return Err(Error::invalid_operation(
                "mutate through the active transaction's stage, not the document directly",
            ));
        }
        if self.options.force_transactions {
            return Err(Error::NoActiveTransaction);
        }
        let applied = self.live.apply_op(&self.schema, op)?;
        self.stage.mirror(applied.forward.clone())?;
        Ok(applied.forward)
    }

    pub fn create(&mut self, node: Node) -> Result<NodeId> {
        let op = self.apply_outside_transaction(Operation::Create { node })?;
        Ok(op.node_id().clone())
    }

    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        self.apply_outside_transaction(Operation::Delete { id })?;
        Ok(())
    }

    pub fn set(&mut self, path: Path, value: PropertyValue) -> Result<()> {
        self.apply_outside_transaction(Operation::Set { path, value })?;
        Ok(())
    }

    pub fn update(&mut self, path: Path, diff: UpdateDiff) -> Result<()> {
        self.apply_outside_transaction(Operation::Update { path, diff })?;
        Ok(())
    }

    // ---- Transactions ----

    /// Opens a transaction, runs `f` against the [`Stage`], and commits or
    /// cancels based on its [`TransactionOutcome`]. `before_state` is
    /// whatever caller-chosen snapshot (e.g. selection) should be restored
    /// on undo. `timestamp` is caller-supplied — the core never reads the
    /// system clock. Returns the resulting [`DocumentChange`] — empty
    /// (zero ops) if `f` made no changes, in which case it is not pushed
    /// to history.
    pub fn transaction(
        &mut self,
        before_state: StateMap,
        timestamp: i64,
        f: impl FnOnce(&mut Stage) -> Result<TransactionOutcome>,
    ) -> Result<DocumentChange> {
        self.begin_transaction(before_state)?;
        let outcome = match f(&mut self.stage) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.cancel_transaction(timestamp)?;
                debug!(%err, "transaction aborted, stage reverted");
                return Err(err);
            }
        };
        match outcome {
            TransactionOutcome::Cancel => self.cancel_transaction(timestamp),
            TransactionOutcome::Commit(after_partial) => self.commit_transaction(after_partial, timestamp),
        }
    }

    // ---- Explicit begin/stage/commit/cancel, driven step by step rather
    // than through a single closure — used by host bridges that cannot
    // hand a `&mut Stage` across a call boundary the way an in-process
    // closure can. Semantics are identical to [`Document::transaction`];
    // the closure-based API above is implemented in terms of these.

    /// Starts a transaction; subsequent mutation flows through
    /// [`Document::stage_mut`] until [`Document::commit_transaction`] or
    /// [`Document::cancel_transaction`].
    pub fn begin_transaction(&mut self, before_state: StateMap) -> Result<()> {
        self.stage.start(before_state)?;
        debug!("transaction start");
        Ok(())
    }

    /// The active transaction's stage, for direct mutation between
    /// [`Document::begin_transaction`] and commit/cancel.
    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    pub fn is_transaction_active(&self) -> bool {
        self.stage.is_active()
    }

    /// Reverts every op buffered since [`Document::begin_transaction`] and
    /// returns an empty, non-pushed [`DocumentChange`].
    pub fn cancel_transaction(&mut self, timestamp: i64) -> Result<DocumentChange> {
        self.stage.cancel()?;
        debug!("transaction cancelled");
        Ok(DocumentChange {
            ops: Vec::new(),
            before_state: StateMap::new(),
            after_state: StateMap::new(),
            timestamp,
            info: InfoBag::new(),
        })
    }

    /// Commits the active transaction: merges `after_partial` into the
    /// before-state, applies the buffered ops to the live store, dispatches
    /// proxies/the `document:changed` signal, and pushes to history (unless
    /// the change is empty).
    pub fn commit_transaction(&mut self, after_partial: StateMap, timestamp: i64) -> Result<DocumentChange> {
        let (before_state, after_state, ops) = self.stage.save(after_partial)?;
        for applied in &ops {
            self.live.apply_op(&self.schema, applied.forward.clone())?;
        }
        let change = DocumentChange {
            ops,
            before_state,
            after_state,
            timestamp,
            info: InfoBag::new(),
        };
        if change.is_empty() {
            debug!("empty transaction, not pushed to history");
            return Ok(change);
        }
        self.proxies.dispatch(&change, &change.info);
        self.changed.trigger(&ChangeEvent {
            change: Rc::new(change.clone()),
            info: Rc::new(change.info.clone()),
        });
        self.history.push(change.clone());
        debug!(op_count = change.ops.len(), "transaction committed");
        Ok(change)
    }

    // ---- Undo/redo ----

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self, timestamp: i64) -> Result<DocumentChange> {
        let change = match self.history.pop_undo() {
            Some(change) => change,
            None => {
                warn!("no change to undo");
                return Err(Error::NoChangeToUndo);
            }
        };
        let inverted = self.replay(&change, timestamp)?;
        self.history.push_undone(change);
        Ok(inverted)
    }

    pub fn redo(&mut self, timestamp: i64) -> Result<DocumentChange> {
        let change = match self.history.pop_redo() {
            Some(change) => change,
            None => {
                warn!("no change to redo");
                return Err(Error::NoChangeToRedo);
            }
        };
        let inverted = self.replay(&change, timestamp)?;
        self.history.push_done(change);
        Ok(inverted)
    }

    /// Applies the inverse of `change` to both stores as a non-recorded
    /// replay (`{replay:true}`, no history push). Undo/redo while a
    /// transaction is active would interleave two change streams, so it
    /// is rejected the same way a nested transaction start is.
    fn replay(&mut self, change: &DocumentChange, timestamp: i64) -> Result<DocumentChange> {
        if self.stage.is_active() {
            return Err(Error::NestedTransaction);
        }
        let inverted = change.inverted(timestamp);
        for applied in &inverted.ops {
            self.live.apply_op(&self.schema, applied.forward.clone())?;
            self.stage.mirror(applied.forward.clone())?;
        }
        self.proxies.dispatch(&inverted, &inverted.info);
        self.changed.trigger(&ChangeEvent {
            change: Rc::new(inverted.clone()),
            info: Rc::new(inverted.info.clone()),
        });
        Ok(inverted)
    }

    // ---- Snapshot load/save ----

    /// Serializes the live store to the persisted snapshot form:
    /// `{schema: {name, version}, nodes: [Node]}`.
    pub fn save_snapshot(&self, schema_name: &str, schema_version: &str) -> Json {
        serde_json::json!({
            "schema": {"name": schema_name, "version": schema_version},
            "nodes": self.live.iter().map(Node::to_json).collect::<Vec<_>>(),
        })
    }

    /// Container annotations overlapping `sel` within `container`, or an
    /// empty `Vec` if `container` is `None`.
    pub fn container_annotations_for_selection(
        &self,
        container: Option<&NodeId>,
        sel: &crate::selection::Selection,
        type_name: Option<&str>,
    ) -> Vec<NodeId> {
        match container {
            Some(container) => self
                .live
                .container_annotations
                .get_overlapping(container, sel, type_name),
            None => Vec::new(),
        }
    }

    /// Loads nodes from a previously-saved snapshot's `nodes` array inside
    /// an implicit transaction that is not pushed to history. Expects
    /// each entry in the persisted `{id, type, ...properties}`
    /// shape produced by [`Node::to_json`]; this is a best-effort loader
    /// for the subset the document model itself defines (typed `kind`
    /// fields are reconstructed from the schema's builtin role for each
    /// node's `type`).
    ///
    /// A snapshot's `nodes` array isn't guaranteed to list a referenced
    /// node (a container's child, an annotation's anchor) before the node
    /// that references it — `HashMap` iteration order at save time is
    /// unordered — so nodes are inserted as trusted, without the
    /// reference validation a live `create` op performs.
    pub fn load_snapshot_nodes(&mut self, nodes: Vec<Node>) -> Result<()> {
        if self.stage.is_active() {
            return Err(Error::NestedTransaction);
        }
        trace!(count = nodes.len(), "loading snapshot");
        for node in nodes {
            self.live.insert_trusted(&self.schema, node.clone())?;
            self.stage.mirror_trusted(node)?;
        }
        Ok(())
    }

    /// Parses a full snapshot as produced by [`Document::save_snapshot`]
    /// (`{schema, nodes}`) and loads its `nodes` array, converting each
    /// persisted `{id, type, ...properties}` entry back into a typed
    /// [`Node`] via [`Node::from_json`] before delegating to
    /// [`Document::load_snapshot_nodes`].
    pub fn load_snapshot(&mut self, snapshot: &Json) -> Result<()> {
        let nodes = snapshot
            .get("nodes")
            .and_then(Json::as_array)
            .ok_or_else(|| Error::invalid_operation("snapshot JSON missing `nodes` array"))?;
        let parsed = nodes
            .iter()
            .map(|raw| Node::from_json(&self.schema, raw))
            .collect::<Result<Vec<_>>>()?;
        self.load_snapshot_nodes(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{props, NodeKind};
    use crate::schema::{BuiltinRole, NodeClass};
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    fn schema() -> Schema {
        Schema::builder()
            .register(NodeClass::new("paragraph").builtin(BuiltinRole::Text))
            .unwrap()
            .register(NodeClass::new("strong").builtin(BuiltinRole::Annotation))
            .unwrap()
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

    #[test]
    fn create_annotation_then_splice_shifts_offsets() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.transaction(StateMap::new(), 0, |stage| {
            stage.create(text_node("p1", "Hello World"))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        doc.transaction(StateMap::new(), 1, |stage| {
            stage.create(Node::new(
                "s1",
                "strong",
                NodeKind::Annotation {
                    path: Path::new("p1", props::CONTENT),
                    start_offset: 6,
                    end_offset: 11,
                },
            ))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        let hits = doc.store().annotations.get(
            &Path::new("p1", props::CONTENT),
            0,
            11,
            None,
        );
        assert_eq!(hits, vec![NodeId::from("s1")]);

        doc.transaction(StateMap::new(), 2, |stage| {
            stage.update(
                Path::new("p1", props::CONTENT),
                UpdateDiff::StringSplice {
                    pos: 6,
                    delete_count: 0,
                    insert: "brave ".into(),
                },
            )?;
            stage.set(
                Path::new("s1", props::START_OFFSET),
                PropertyValue::Integer(12),
            )?;
            stage.set(Path::new("s1", props::END_OFFSET), PropertyValue::Integer(17))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        assert_eq!(
            doc.store().get(&NodeId::from("p1")).unwrap().content().unwrap(),
            "Hello brave World"
        );
        let s1 = doc.store().get(&NodeId::from("s1")).unwrap();
        assert_eq!(
            s1.get(props::START_OFFSET).unwrap().as_integer().unwrap(),
            12
        );
        assert_eq!(s1.get(props::END_OFFSET).unwrap().as_integer().unwrap(), 17);
        let hits_after = doc
            .store()
            .annotations
            .get(&Path::new("p1", props::CONTENT), 0, 20, None);
        assert_eq!(hits_after, vec![NodeId::from("s1")]);
    }

    /// Set then delete within one transaction, then undo restores both.
    #[test]
    fn undo_restores_set_and_delete_from_one_transaction() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.transaction(StateMap::new(), 0, |stage| {
            stage.create(text_node("p1", "Hello World"))?;
            stage.create(Node::new(
                "s1",
                "strong",
                NodeKind::Annotation {
                    path: Path::new("p1", props::CONTENT),
                    start_offset: 6,
                    end_offset: 11,
                },
            ))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        doc.transaction(StateMap::new(), 1, |stage| {
            stage.set(
                Path::new("p1", props::CONTENT),
                PropertyValue::String("Hi".into()),
            )?;
            stage.delete(NodeId::from("s1"))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();
        assert!(!doc.store().contains(&NodeId::from("s1")));

        doc.undo(2).unwrap();
        assert_eq!(
            doc.store().get(&NodeId::from("p1")).unwrap().content().unwrap(),
            "Hello World"
        );
        assert!(doc.store().contains(&NodeId::from("s1")));
    }

    /// Attempting to start a transaction while one is already active
    /// fails with `NestedTransaction`, and the active transaction is left
    /// uncorrupted (its buffered ops still apply cleanly on commit).
    #[test]
    fn nested_transaction_is_rejected_and_outer_stays_intact() {
        let mut stage = Stage::new(Rc::new(schema()), Store::new());
        stage.start(StateMap::new()).unwrap();
        stage.create(text_node("p1", "hi")).unwrap();

        let result = stage.start(StateMap::new());
        assert!(matches!(result, Err(Error::NestedTransaction)));

        let (_, _, ops) = stage.save(StateMap::new()).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(stage.store().contains(&NodeId::from("p1")));
    }

    /// Outside-transaction mutation mirrors into the stage as a legacy
    /// affordance when `force_transactions` is off.
    #[test]
    fn outside_transaction_mutation_mirrors_into_stage() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.transaction(StateMap::new(), 0, |stage| {
            stage.create(text_node("p1", "hi"))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();
        // outside-transaction mutation mirrors into the stage, no active txn here.
        doc.create(text_node("p2", "legacy")).unwrap();
        assert!(doc.store().contains(&NodeId::from("p2")));
    }

    #[test]
    fn force_transactions_rejects_outside_mutation() {
        let mut doc = Document::new(
            schema(),
            DocumentOptions {
                force_transactions: true,
                default_text_type: None,
            },
        );
        let result = doc.create(text_node("p1", "hi"));
        assert!(matches!(result, Err(Error::NoActiveTransaction)));
    }

    #[test]
    fn empty_transaction_is_not_pushed_to_history() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        let change = doc
            .transaction(StateMap::new(), 0, |_stage| Ok(TransactionOutcome::Commit(StateMap::new())))
            .unwrap();
        assert!(change.is_empty());
        assert!(!doc.can_undo());
    }

    #[test]
    fn path_proxy_fires_on_document_changed() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.transaction(StateMap::new(), 0, |stage| {
            stage.create(text_node("p1", "hi"))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        let hits = StdRc::new(Cell::new(0));
        let hits2 = hits.clone();
        let _sub = doc.subscribe_path(Path::new("p1", props::CONTENT), move |_| {
            hits2.set(hits2.get() + 1);
        });

        doc.transaction(StateMap::new(), 1, |stage| {
            stage.set(
                Path::new("p1", props::CONTENT),
                PropertyValue::String("bye".into()),
            )?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn snapshot_save_then_load_round_trips_into_a_fresh_document() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.transaction(StateMap::new(), 0, |stage| {
            stage.create(text_node("p1", "Hello World"))?;
            stage.create(Node::new(
                "s1",
                "strong",
                NodeKind::Annotation {
                    path: Path::new("p1", props::CONTENT),
                    start_offset: 0,
                    end_offset: 5,
                },
            ))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        let snapshot = doc.save_snapshot("substance-demo", "1");

        let mut loaded = Document::new(schema(), DocumentOptions::default());
        loaded.load_snapshot(&snapshot).unwrap();

        assert_eq!(
            loaded.store().get(&NodeId::from("p1")).unwrap().content().unwrap(),
            "Hello World"
        );
        assert_eq!(
            loaded
                .store()
                .annotations
                .get(&Path::new("p1", props::CONTENT), 0, 5, None),
            vec![NodeId::from("s1")]
        );
        assert!(!loaded.can_undo());
    }

    /// The explicit begin/stage/commit surface (used by `substance-wasm`,
    /// which can't hold a `&mut Stage` across a JS call the way the
    /// closure-based API above does) produces the same committed state and
    /// history entry as `transaction()`.
    #[test]
    fn explicit_transaction_api_commits_like_the_closure_form() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.begin_transaction(StateMap::new()).unwrap();
        assert!(doc.is_transaction_active());
        doc.stage_mut().create(text_node("p1", "hi")).unwrap();
        let change = doc.commit_transaction(StateMap::new(), 0).unwrap();

        assert!(!doc.is_transaction_active());
        assert_eq!(change.ops.len(), 1);
        assert!(doc.store().contains(&NodeId::from("p1")));
        assert!(doc.can_undo());
    }

    /// `cancel_transaction` reverts every buffered op and leaves the live
    /// store untouched.
    #[test]
    fn explicit_cancel_reverts_buffered_ops() {
        let mut doc = Document::new(schema(), DocumentOptions::default());
        doc.transaction(StateMap::new(), 0, |stage| {
            stage.create(text_node("p1", "hi"))?;
            Ok(TransactionOutcome::Commit(StateMap::new()))
        })
        .unwrap();

        doc.begin_transaction(StateMap::new()).unwrap();
        doc.stage_mut()
            .set(Path::new("p1", props::CONTENT), PropertyValue::String("bye".into()))
            .unwrap();
        let change = doc.cancel_transaction(1).unwrap();

        assert!(change.is_empty());
        assert!(!doc.is_transaction_active());
        assert!(doc.can_undo());
        assert!(!doc.can_redo());
        assert_eq!(
            doc.stage().store().get(&NodeId::from("p1")).unwrap().content().unwrap(),
            "hi"
        );
        assert_eq!(
            doc.store().get(&NodeId::from("p1")).unwrap().content().unwrap(),
            "hi"
        );
    }
}
