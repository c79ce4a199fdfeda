//! Document change & history.
//!
//! A [`DocumentChange`] packages a committed op sequence with before/after
//! state and an info bag for listeners. [`History`] keeps `done`/`undone`
//! stacks; any non-replay commit clears `undone`.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::ops::AppliedOp;

/// Arbitrary before/after state snapshot attached to a change (e.g.
/// selections), keyed by caller-chosen field name.
pub type StateMap = HashMap<String, Json>;

/// Info bag passed alongside a change to listeners; carries at least
/// `replay` so proxies can distinguish undo/redo replays from fresh
/// commits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoBag {
    pub replay: bool,
    pub fields: HashMap<String, Json>,
}

impl InfoBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replay() -> Self {
        InfoBag {
            replay: true,
            ..Default::default()
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Json) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// A committed sequence of applied operations plus before/after state.
/// `timestamp` is caller-supplied (milliseconds since epoch or
/// any monotonically comparable unit the host chooses) rather than read
/// from the system clock, keeping the core free of I/O side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub ops: Vec<AppliedOp>,
    pub before_state: StateMap,
    pub after_state: StateMap,
    pub timestamp: i64,
    pub info: InfoBag,
}

impl DocumentChange {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Builds the change that undoes this one: ops inverted in reverse
    /// order, before/after state swapped.
    pub fn inverted(&self, timestamp: i64) -> DocumentChange {
        let ops = self
            .ops
            .iter()
            .rev()
            .map(|applied| AppliedOp {
                forward: applied.inverse.clone(),
                inverse: applied.forward.clone(),
            })
            .collect();
        DocumentChange {
            ops,
            before_state: self.after_state.clone(),
            after_state: self.before_state.clone(),
            timestamp,
            info: InfoBag::replay(),
        }
    }
}

/// Undo/redo stacks. Only committed changes are ever recorded here.
#[derive(Debug, Clone, Default)]
pub struct History {
    done: Vec<DocumentChange>,
    undone: Vec<DocumentChange>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly committed, non-replay change: clears `undone`.
    pub fn push(&mut self, change: DocumentChange) {
        self.done.push(change);
        self.undone.clear();
    }

    pub fn pop_undo(&mut self) -> Option<DocumentChange> {
        self.done.pop()
    }

    pub fn push_undone(&mut self, change: DocumentChange) {
        self.undone.push(change);
    }

    pub fn pop_redo(&mut self) -> Option<DocumentChange> {
        self.undone.pop()
    }

    pub fn push_done(&mut self, change: DocumentChange) {
        self.done.push(change);
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_clears_redo_stack() {
        let mut history = History::new();
        history.push_undone(DocumentChange {
            ops: vec![],
            before_state: StateMap::new(),
            after_state: StateMap::new(),
            timestamp: 0,
            info: InfoBag::new(),
        });
        assert!(history.can_redo());
        history.push(DocumentChange {
            ops: vec![],
            before_state: StateMap::new(),
            after_state: StateMap::new(),
            timestamp: 1,
            info: InfoBag::new(),
        });
        assert!(!history.can_redo());
        assert!(history.can_undo());
    }
}
