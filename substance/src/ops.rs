//! Operation primitives: four invertible mutations.
//!
//! An [`Operation`] as constructed by a caller carries only what's needed to
//! *perform* the mutation; [`Store::apply_op`](crate::store::Store::apply_op)
//! captures whatever additional state is needed to produce the inverse and
//! returns it as an [`AppliedOp`]. Inverses are generated at apply time, not
//! at undo time, so history survives concurrent tails.

use crate::node::{Node, NodeId, Path, PropertyValue, UpdateDiff};

/// A single invertible mutation, as submitted by a caller (pre-apply).
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create { node: Node },
    Delete { id: NodeId },
    Set { path: Path, value: PropertyValue },
    Update { path: Path, diff: UpdateDiff },
}

impl Operation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Operation::Set { path, .. } | Operation::Update { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        match self {
            Operation::Create { node } => &node.id,
            Operation::Delete { id } => id,
            Operation::Set { path, .. } | Operation::Update { path, .. } => &path.node,
        }
    }
}

/// An operation after it has been applied to a store: the forward op as
/// submitted, paired with the inverse op captured at apply time.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOp {
    pub forward: Operation,
    pub inverse: Operation,
}

impl AppliedOp {
    /// Operation to apply in order to undo this one.
    pub fn as_inverse(&self) -> Operation {
        self.inverse.clone()
    }
}

/// The wire form used for replay/collaboration integration.
/// Serialization lives behind `serde_json` conversions here rather than a
/// derived `Serialize` impl, since `Operation::Delete`'s captured node and
/// `Set`'s captured original value only exist on [`AppliedOp`], not on the
/// bare [`Operation`] a caller submits.
pub mod wire {
    use super::*;
    use serde_json::{json, Value};

    pub fn operation_to_json(op: &Operation) -> Value {
        match op {
            Operation::Create { node } => json!({"op": "create", "node": node.to_json()}),
            Operation::Delete { id } => json!({"op": "delete", "id": id.as_str()}),
            Operation::Set { path, value } => json!({
                "op": "set",
                "path": [path.node.as_str(), path.property.as_str()],
                "value": value.to_json(),
            }),
            Operation::Update { path, diff } => json!({
                "op": "update",
                "path": [path.node.as_str(), path.property.as_str()],
                "diff": update_diff_to_json(diff),
            }),
        }
    }

    fn update_diff_to_json(diff: &UpdateDiff) -> Value {
        match diff {
            UpdateDiff::StringSplice {
                pos,
                delete_count,
                insert,
            } => json!({"type": "string-splice", "pos": pos, "deleteCount": delete_count, "insert": insert}),
            UpdateDiff::ListSplice {
                pos,
                delete_count,
                insert,
            } => json!({
                "type": "list-splice",
                "pos": pos,
                "deleteCount": delete_count,
                "insert": insert.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            }),
            UpdateDiff::NumberDelta(delta) => json!({"type": "number-delta", "delta": delta}),
        }
    }
}
