//! Container model: ordered child id list with show/hide semantics that
//! compile down to `update` ops on `nodes` — these are convenience helpers,
//! not new store primitives.

use crate::node::{IdList, Node, NodeId, UpdateDiff};

/// Current position of `id` in `container`'s child list, if present.
pub fn position(container: &Node, id: &NodeId) -> Option<usize> {
    container.nodes().ok()?.iter().position(|n| n == id)
}

/// Diff that appends (or inserts at `pos`) `id` into the container.
/// Idempotent at the list level: the caller is responsible for not
/// double-showing.
pub fn show_diff(container: &Node, id: NodeId, pos: Option<usize>) -> UpdateDiff {
    let nodes = container.nodes().map(|n| n.len()).unwrap_or(0);
    let pos = pos.unwrap_or(nodes).min(nodes);
    let mut insert = IdList::new();
    insert.push(id);
    UpdateDiff::ListSplice {
        pos,
        delete_count: 0,
        insert,
    }
}

/// Diff that removes the first occurrence of `id`, or `None` if it isn't
/// present (hide is then a no-op).
pub fn hide_diff(container: &Node, id: &NodeId) -> Option<UpdateDiff> {
    let pos = position(container, id)?;
    Some(UpdateDiff::ListSplice {
        pos,
        delete_count: 1,
        insert: IdList::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn container_with(ids: &[&str]) -> Node {
        Node::new(
            "c1",
            "container",
            NodeKind::Container {
                nodes: ids.iter().map(|s| NodeId::from(*s)).collect(),
            },
        )
    }

    #[test]
    fn show_then_hide_is_a_no_op_on_order() {
        let mut container = container_with(&["a", "b"]);
        let diff = show_diff(&container, NodeId::from("x"), None);
        let inverse = container.update("nodes", &diff).unwrap();
        assert_eq!(container.nodes().unwrap().as_slice(), ["a", "b", "x"]);

        let hide = hide_diff(&container, &NodeId::from("x")).unwrap();
        container.update("nodes", &hide).unwrap();
        assert_eq!(container.nodes().unwrap().as_slice(), ["a", "b"]);
        let _ = inverse;
    }

    #[test]
    fn hide_missing_id_is_none() {
        let container = container_with(&["a", "b"]);
        assert!(hide_diff(&container, &NodeId::from("z")).is_none());
    }

    #[test]
    fn show_at_explicit_position() {
        let mut container = container_with(&["a", "b"]);
        let diff = show_diff(&container, NodeId::from("x"), Some(1));
        container.update("nodes", &diff).unwrap();
        assert_eq!(container.nodes().unwrap().as_slice(), ["a", "x", "b"]);
    }
}
