//! Transaction stage: a shadow document that buffers ops atomically, to
//! be committed or cancelled as one unit.
//!
//! ```text
//! idle --start(beforeState)--> active --op*--> active
//! active --save(afterState, info)--> idle  (commit)
//! active --cancel()--> idle                 (discard)
//! ```

use tracing::debug;

use crate::change::StateMap;
use crate::container;
use crate::error::{Error, Result};
use crate::node::{props, Node, NodeId, PropertyValue, UpdateDiff};
use crate::ops::{AppliedOp, Operation};
use crate::schema::Schema;
use crate::store::Store;
use std::rc::Rc;

/// What a transformation closure decided to do with its transaction.
pub enum TransactionOutcome {
    /// Commit with this (partial) after-state.
    Commit(StateMap),
    /// Discard every buffered op.
    Cancel,
}

enum StageState {
    Idle,
    Active {
        before_state: StateMap,
        ops: Vec<AppliedOp>,
    },
}

/// The transaction shadow document. Shares the schema with the owning
/// [`crate::document::Document`] and carries a full clone of the live
/// store's data; outside an active transaction it mirrors the live store
/// byte-for-byte.
pub struct Stage {
    schema: Rc<Schema>,
    store: Store,
    state: StageState,
}

impl Stage {
    pub(crate) fn new(schema: Rc<Schema>, store: Store) -> Self {
        Stage {
            schema,
            store,
            state: StageState::Idle,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, StageState::Active { .. })
    }

    pub(crate) fn start(&mut self, before_state: StateMap) -> Result<()> {
        if self.is_active() {
            return Err(Error::NestedTransaction);
        }
        self.state = StageState::Active {
            before_state,
            ops: Vec::new(),
        };
        Ok(())
    }

    /// Reverts every buffered op, in reverse order, and returns to idle.
    pub(crate) fn cancel(&mut self) -> Result<()> {
        let StageState::Active { ops, .. } = std::mem::replace(&mut self.state, StageState::Idle)
        else {
            return Err(Error::NoActiveTransaction);
        };
        for applied in ops.into_iter().rev() {
            self.store.apply_op(&self.schema, applied.inverse)?;
        }
        Ok(())
    }

    /// Commits: merges `after_partial` into the before-state (dropping
    /// unknown keys) and returns the buffered ops for the caller (the
    /// [`crate::document::Document`]) to replay onto the live store. The
    /// stage itself is **not** reset — applying the ops already leaves it
    /// at the new state.
    pub(crate) fn save(&mut self, after_partial: StateMap) -> Result<(StateMap, StateMap, Vec<AppliedOp>)> {
        let StageState::Active { before_state, ops } =
            std::mem::replace(&mut self.state, StageState::Idle)
        else {
            return Err(Error::NoActiveTransaction);
        };
        let mut after_state = before_state.clone();
        for (key, value) in after_partial {
            if before_state.contains_key(&key) {
                after_state.insert(key, value);
            }
        }
        debug!(op_count = ops.len(), "transaction commit");
        Ok((before_state, after_state, ops))
    }

    fn record(&mut self, applied: AppliedOp) {
        if let StageState::Active { ops, .. } = &mut self.state {
            ops.push(applied);
        }
    }

    pub fn create(&mut self, node: Node) -> Result<NodeId> {
        let applied = self.store.apply_op(&self.schema, Operation::Create { node })?;
        let id = applied.forward.node_id().clone();
        self.record(applied);
        Ok(id)
    }

    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        let applied = self.store.apply_op(&self.schema, Operation::Delete { id })?;
        self.record(applied);
        Ok(())
    }

    pub fn set(&mut self, path: crate::node::Path, value: PropertyValue) -> Result<()> {
        let applied = self.store.apply_op(&self.schema, Operation::Set { path, value })?;
        self.record(applied);
        Ok(())
    }

    pub fn update(&mut self, path: crate::node::Path, diff: UpdateDiff) -> Result<()> {
        let applied = self.store.apply_op(&self.schema, Operation::Update { path, diff })?;
        self.record(applied);
        Ok(())
    }

    /// Shows `child` in `container` at `pos` (default: append). Compiles to
    /// an `update` op on `nodes`.
    pub fn show(&mut self, container_id: NodeId, child: NodeId, pos: Option<usize>) -> Result<()> {
        let node = self
            .store
            .get(&container_id)
            .ok_or_else(|| Error::unknown_node(&container_id))?;
        let diff = container::show_diff(node, child, pos);
        self.update(crate::node::Path::new(container_id, props::NODES), diff)
    }

    /// Hides the first occurrence of `child` in `container`; a no-op if
    /// absent, returning whether anything changed.
    pub fn hide(&mut self, container_id: NodeId, child: &NodeId) -> Result<bool> {
        let node = self
            .store
            .get(&container_id)
            .ok_or_else(|| Error::unknown_node(&container_id))?;
        match container::hide_diff(node, child) {
            Some(diff) => {
                self.update(crate::node::Path::new(container_id, props::NODES), diff)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Applies an op directly to the shadow store without recording it in
    /// any buffer — used to mirror an outside-transaction live mutation
    /// into the stage. Only valid while idle; the caller
    /// ([`crate::document::Document`]) is responsible for ensuring that.
    pub(crate) fn mirror(&mut self, op: Operation) -> Result<()> {
        debug_assert!(!self.is_active(), "mirror must only run while idle");
        self.store.apply_op(&self.schema, op)?;
        Ok(())
    }

    /// Mirrors a trusted-snapshot node load into the shadow store, the
    /// same way [`Stage::mirror`] mirrors a live outside-transaction op —
    /// without `validate_references`, since snapshot array order isn't
    /// guaranteed to be dependency order.
    pub(crate) fn mirror_trusted(&mut self, node: Node) -> Result<()> {
        debug_assert!(!self.is_active(), "mirror must only run while idle");
        self.store.insert_trusted(&self.schema, node)
    }
}
