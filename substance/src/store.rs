//! Data store: `id -> Node` plus the secondary indices that must stay
//! derivable from the node table. Nodes reference each other only by id,
//! never by pointer.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{Error, Result};
use crate::index::{AnnotationIndex, ContainerAnnotationIndex, Index, TypeIndex};
use crate::node::{Node, NodeId, NodeKind, Path, PropertyValue, UpdateDiff};
use crate::ops::{AppliedOp, Operation};
use crate::schema::Schema;

/// `id -> Node` store plus the required indices (by-type, property-scoped
/// annotations, container annotations). Cheap to [`Clone`] so it can serve
/// as both the live store and the transaction stage's shadow copy.
#[derive(Debug, Clone, Default)]
pub struct Store {
    nodes: HashMap<NodeId, Node>,
    pub by_type: TypeIndex,
    pub annotations: AnnotationIndex,
    pub container_annotations: ContainerAnnotationIndex,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_path(&self, path: &Path) -> Result<PropertyValue> {
        self.get(&path.node)
            .ok_or_else(|| Error::unknown_node(&path.node))?
            .get(&path.property)
    }

    /// Applies one operation, dispatching the change to every index, and
    /// returns the applied op paired with its inverse. Inverses are
    /// captured at apply time, not at undo time.
    pub fn apply_op(&mut self, schema: &Schema, op: Operation) -> Result<AppliedOp> {
        match op {
            Operation::Create { node } => self.apply_create(schema, node),
            Operation::Delete { id } => self.apply_delete(id),
            Operation::Set { path, value } => self.apply_set(path, value),
            Operation::Update { path, diff } => self.apply_update(path, diff),
        }
    }

    fn dispatch_create(&mut self, node: &Node) {
        self.by_type.on_create(node);
        self.annotations.on_create(node);
        self.container_annotations.on_create(node);
    }

    fn dispatch_delete(&mut self, node: &Node) {
        self.by_type.on_delete(node);
        self.annotations.on_delete(node);
        self.container_annotations.on_delete(node);
    }

    fn dispatch_set(&mut self, node: &Node, property: &str, old: &PropertyValue, new: &PropertyValue) {
        self.by_type.on_set(node, property, old, new);
        self.annotations.on_set(node, property, old, new);
        self.container_annotations.on_set(node, property, old, new);
    }

    fn dispatch_update(&mut self, node: &Node, property: &str, diff: &UpdateDiff) {
        self.by_type.on_update(node, property, diff);
        self.annotations.on_update(node, property, diff);
        self.container_annotations.on_update(node, property, diff);
    }

    fn apply_create(&mut self, schema: &Schema, node: Node) -> Result<AppliedOp> {
        self.create_checked(schema, node, true)
    }

    /// Inserts `node` into the table, optionally skipping
    /// `validate_references`. Used directly (with `validate_refs: false`)
    /// by [`Store::insert_trusted`] to load a snapshot whose entries may
    /// reference a node that appears later in the array — a snapshot's
    /// array order isn't guaranteed to be dependency order, unlike a live
    /// `create` op, which always targets an already-consistent store.
    fn create_checked(&mut self, schema: &Schema, node: Node, validate_refs: bool) -> Result<AppliedOp> {
        if self.nodes.contains_key(&node.id) {
            return Err(Error::invalid_operation(format!(
                "node `{}` already exists",
                node.id
            )));
        }
        schema.get_node_class(node.type_name.as_str())?;
        if validate_refs {
            self.validate_references(&node)?;
        }
        trace!(id = %node.id, type_name = %node.type_name, "create");
        self.dispatch_create(&node);
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node.clone());
        Ok(AppliedOp {
            forward: Operation::Create { node },
            inverse: Operation::Delete { id },
        })
    }

    /// Inserts `node` without validating that its references (container
    /// children, annotation/container-annotation paths) already exist in
    /// the table — used to load a trusted snapshot, whose nodes may not be
    /// serialized in dependency order. Indices are still dispatched so
    /// they stay in sync with the table; the duplicate-id and unknown-type
    /// checks still apply.
    pub fn insert_trusted(&mut self, schema: &Schema, node: Node) -> Result<()> {
        self.create_checked(schema, node, false)?;
        Ok(())
    }

    fn apply_delete(&mut self, id: NodeId) -> Result<AppliedOp> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| Error::unknown_node(&id))?;
        trace!(%id, "delete");
        self.dispatch_delete(&node);
        Ok(AppliedOp {
            forward: Operation::Delete { id },
            inverse: Operation::Create { node },
        })
    }

    fn apply_set(&mut self, path: Path, value: PropertyValue) -> Result<AppliedOp> {
        let node = self
            .nodes
            .get_mut(&path.node)
            .ok_or_else(|| Error::unknown_node(&path.node))?;
        let old = node.set(&path.property, value.clone())?;
        let node_snapshot = node.clone();
        trace!(path = %path, "set");
        self.dispatch_set(&node_snapshot, &path.property, &old, &value);
        Ok(AppliedOp {
            forward: Operation::Set {
                path: path.clone(),
                value,
            },
            inverse: Operation::Set { path, value: old },
        })
    }

    fn apply_update(&mut self, path: Path, diff: UpdateDiff) -> Result<AppliedOp> {
        let node = self
            .nodes
            .get_mut(&path.node)
            .ok_or_else(|| Error::unknown_node(&path.node))?;
        let inverse_diff = node.update(&path.property, &diff)?;
        let node_snapshot = node.clone();
        trace!(path = %path, "update");
        self.dispatch_update(&node_snapshot, &path.property, &diff);
        Ok(AppliedOp {
            forward: Operation::Update {
                path: path.clone(),
                diff,
            },
            inverse: Operation::Update {
                path,
                diff: inverse_diff,
            },
        })
    }

    /// Spec §3 invariant 2: every reference targets an existing node.
    fn validate_references(&self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::Container { nodes } => {
                for id in nodes {
                    if !self.nodes.contains_key(id) {
                        return Err(Error::invalid_operation(format!(
                            "container `{}` references unknown node `{}`",
                            node.id, id
                        )));
                    }
                }
            }
            NodeKind::Annotation { path, .. } => {
                if !self.nodes.contains_key(&path.node) {
                    return Err(Error::invalid_operation(format!(
                        "annotation `{}` references unknown node `{}`",
                        node.id, path.node
                    )));
                }
            }
            NodeKind::ContainerAnnotation {
                container,
                start_path,
                end_path,
                ..
            } => {
                for id in [container, &start_path.node, &end_path.node] {
                    if !self.nodes.contains_key(id) {
                        return Err(Error::invalid_operation(format!(
                            "container annotation `{}` references unknown node `{}`",
                            node.id, id
                        )));
                    }
                }
            }
            NodeKind::Text { .. } | NodeKind::Generic => {}
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::props;
    use crate::schema::{BuiltinRole, NodeClass};

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
    fn create_then_delete_round_trips_to_empty_store() {
        let schema = schema();
        let mut store = Store::new();
        let applied = store
            .apply_op(&schema, Operation::Create { node: text_node("p1", "hi") })
            .unwrap();
        assert_eq!(store.len(), 1);
        store.apply_op(&schema, applied.inverse).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn set_inverse_restores_old_value() {
        let schema = schema();
        let mut store = Store::new();
        store
            .apply_op(&schema, Operation::Create { node: text_node("p1", "hi") })
            .unwrap();
        let path = Path::new("p1", props::CONTENT);
        let applied = store
            .apply_op(
                &schema,
                Operation::Set {
                    path: path.clone(),
                    value: PropertyValue::String("bye".into()),
                },
            )
            .unwrap();
        assert_eq!(store.get_path(&path).unwrap().as_str().unwrap(), "bye");
        store.apply_op(&schema, applied.inverse).unwrap();
        assert_eq!(store.get_path(&path).unwrap().as_str().unwrap(), "hi");
    }

    #[test]
    fn annotation_referencing_unknown_node_is_rejected() {
        let schema = schema();
        let mut store = Store::new();
        let annotation = Node::new(
            "s1",
            "strong",
            NodeKind::Annotation {
                path: Path::new("missing", props::CONTENT),
                start_offset: 0,
                end_offset: 1,
            },
        );
        let result = store.apply_op(&schema, Operation::Create { node: annotation });
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn update_then_inverse_is_identity() {
        let schema = schema();
        let mut store = Store::new();
        store
            .apply_op(&schema, Operation::Create { node: text_node("p1", "Hello World") })
            .unwrap();
        let path = Path::new("p1", props::CONTENT);
        let applied = store
            .apply_op(
                &schema,
                Operation::Update {
                    path: path.clone(),
                    diff: UpdateDiff::StringSplice {
                        pos: 6,
                        delete_count: 0,
                        insert: "brave ".into(),
                    },
                },
            )
            .unwrap();
        assert_eq!(
            store.get_path(&path).unwrap().as_str().unwrap(),
            "Hello brave World"
        );
        store.apply_op(&schema, applied.inverse).unwrap();
        assert_eq!(store.get_path(&path).unwrap().as_str().unwrap(), "Hello World");
    }
}
