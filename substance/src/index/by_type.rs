//! By-type index: returns the set of ids per type name.

use std::collections::{HashMap, HashSet};

use super::Index;
use crate::node::{Node, NodeId, PropertyValue, UpdateDiff};

#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    by_type: HashMap<String, HashSet<NodeId>>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_name: &str) -> impl Iterator<Item = &NodeId> {
        self.by_type
            .get(type_name)
            .into_iter()
            .flat_map(|ids| ids.iter())
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.by_type.get(type_name).map(|ids| ids.len()).unwrap_or(0)
    }
}

impl Index for TypeIndex {
    fn on_create(&mut self, node: &Node) {
        self.by_type
            .entry(node.type_name.to_string())
            .or_default()
            .insert(node.id.clone());
    }

    fn on_delete(&mut self, node: &Node) {
        if let Some(ids) = self.by_type.get_mut(node.type_name.as_str()) {
            ids.remove(&node.id);
        }
    }

    fn on_set(&mut self, _node: &Node, _property: &str, _old: &PropertyValue, _new: &PropertyValue) {
        // node type is immutable after create; nothing to update.
    }

    fn on_update(&mut self, _node: &Node, _property: &str, _diff: &UpdateDiff) {}
}
