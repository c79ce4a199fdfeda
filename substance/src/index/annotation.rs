//! Property-scoped annotation index.
//!
//! Maintains, per text [`Path`], a list of annotations sorted by
//! `startOffset`. `get` returns every annotation whose `[start,end]`
//! intersects the query range, closed on both ends — a zero-length query
//! at offset `k` matches annotations containing `k`.

use std::collections::HashMap;

use super::Index;
use crate::node::{Node, NodeId, NodeKind, Path, PropertyValue, UpdateDiff};

#[derive(Debug, Clone)]
struct Entry {
    id: NodeId,
    type_name: String,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
    by_path: HashMap<Path, Vec<Entry>>,
}

impl AnnotationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns ids of annotations at `path` whose `[startOffset,endOffset]`
    /// intersects `[start,end]` (closed interval), ordered by `startOffset`,
    /// optionally filtered by `type_name`.
    pub fn get(&self, path: &Path, start: usize, end: usize, type_name: Option<&str>) -> Vec<NodeId> {
        let Some(entries) = self.by_path.get(path) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| e.start <= end && e.end >= start)
            .filter(|e| type_name.map_or(true, |t| e.type_name == t))
            .map(|e| e.id.clone())
            .collect()
    }

    fn insert_entry(&mut self, path: Path, entry: Entry) {
        let list = self.by_path.entry(path).or_default();
        let pos = list.partition_point(|e| e.start <= entry.start);
        list.insert(pos, entry);
    }

    fn remove_entry(&mut self, path: &Path, id: &NodeId) {
        if let Some(list) = self.by_path.get_mut(path) {
            list.retain(|e| &e.id != id);
            if list.is_empty() {
                self.by_path.remove(path);
            }
        }
    }

    fn resort(&mut self, path: &Path) {
        if let Some(list) = self.by_path.get_mut(path) {
            list.sort_by_key(|e| e.start);
        }
    }
}

impl Index for AnnotationIndex {
    fn on_create(&mut self, node: &Node) {
        if let NodeKind::Annotation {
            path,
            start_offset,
            end_offset,
        } = &node.kind
        {
            self.insert_entry(
                path.clone(),
                Entry {
                    id: node.id.clone(),
                    type_name: node.type_name.to_string(),
                    start: *start_offset,
                    end: *end_offset,
                },
            );
        }
    }

    fn on_delete(&mut self, node: &Node) {
        if let NodeKind::Annotation { path, .. } = &node.kind {
            self.remove_entry(path, &node.id);
        }
    }

    fn on_set(&mut self, node: &Node, property: &str, _old: &PropertyValue, _new: &PropertyValue) {
        let NodeKind::Annotation {
            path,
            start_offset,
            end_offset,
        } = &node.kind
        else {
            return;
        };
        match property {
            crate::node::props::START_OFFSET | crate::node::props::END_OFFSET => {
                if let Some(list) = self.by_path.get_mut(path) {
                    if let Some(entry) = list.iter_mut().find(|e| e.id == node.id) {
                        entry.start = *start_offset;
                        entry.end = *end_offset;
                    }
                }
                self.resort(path);
            }
            _ => {}
        }
    }

    fn on_update(&mut self, node: &Node, property: &str, _diff: &UpdateDiff) {
        let NodeKind::Annotation {
            path,
            start_offset,
            end_offset,
        } = &node.kind
        else {
            return;
        };
        match property {
            crate::node::props::START_OFFSET | crate::node::props::END_OFFSET => {
                if let Some(list) = self.by_path.get_mut(path) {
                    if let Some(entry) = list.iter_mut().find(|e| e.id == node.id) {
                        entry.start = *start_offset;
                        entry.end = *end_offset;
                    }
                }
                self.resort(path);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::props;

    fn annotation(id: &str, node: &str, start: usize, end: usize) -> Node {
        Node::new(
            id,
            "strong",
            NodeKind::Annotation {
                path: Path::new(node, props::CONTENT),
                start_offset: start,
                end_offset: end,
            },
        )
    }

    #[test]
    fn overlap_query_is_closed_interval() {
        let mut idx = AnnotationIndex::new();
        idx.on_create(&annotation("s1", "p1", 6, 11));
        let path = Path::new("p1", props::CONTENT);

        assert_eq!(idx.get(&path, 0, 11, None), vec![NodeId::from("s1")]);
        // zero-length query at a boundary offset still matches (closed interval)
        assert_eq!(idx.get(&path, 6, 6, None), vec![NodeId::from("s1")]);
        assert_eq!(idx.get(&path, 11, 11, None), vec![NodeId::from("s1")]);
        assert!(idx.get(&path, 12, 20, None).is_empty());
    }

    #[test]
    fn type_filter_narrows_results() {
        let mut idx = AnnotationIndex::new();
        idx.on_create(&annotation("s1", "p1", 0, 5));
        let path = Path::new("p1", props::CONTENT);
        assert!(idx.get(&path, 0, 5, Some("emphasis")).is_empty());
        assert_eq!(idx.get(&path, 0, 5, Some("strong")).len(), 1);
    }

    #[test]
    fn delete_removes_entry() {
        let mut idx = AnnotationIndex::new();
        let node = annotation("s1", "p1", 0, 5);
        idx.on_create(&node);
        idx.on_delete(&node);
        assert!(idx.get(&Path::new("p1", props::CONTENT), 0, 5, None).is_empty());
    }
}
