//! Container-annotation index.
//!
//! Maintains all container annotations by id plus a reverse lookup by
//! `container`. There is no spatial acceleration structure — overlap
//! queries iterate the candidates of a given container and delegate the
//! actual spatial test to [`crate::selection::Selection::overlaps`], since
//! the spatial extent depends on the container's current child order.

use std::collections::HashMap;

use super::Index;
use crate::node::{Node, NodeId, NodeKind, Path, PropertyValue, UpdateDiff};
use crate::selection::Selection;

#[derive(Debug, Clone)]
struct Record {
    type_name: String,
    container: NodeId,
    start_path: Path,
    start_offset: usize,
    end_path: Path,
    end_offset: usize,
}

impl Record {
    fn selection(&self) -> Selection {
        Selection::container(
            self.container.clone(),
            self.start_path.clone(),
            self.start_offset,
            self.end_path.clone(),
            self.end_offset,
            false,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContainerAnnotationIndex {
    records: HashMap<NodeId, Record>,
    by_container: HashMap<NodeId, Vec<NodeId>>,
}

impl ContainerAnnotationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns ids of container annotations in `container` whose selection
    /// overlaps `sel`, optionally filtered by type. Queries without a
    /// named container aren't expressible here (the caller always
    /// supplies one); see
    /// [`crate::document::Document::container_annotations_for_selection`]
    /// for the "no container given" policy.
    pub fn get_overlapping(
        &self,
        container: &NodeId,
        sel: &Selection,
        type_name: Option<&str>,
    ) -> Vec<NodeId> {
        let Some(ids) = self.by_container.get(container) else {
            return Vec::new();
        };
        ids.iter()
            .filter(|id| {
                let record = &self.records[*id];
                type_name.map_or(true, |t| record.type_name == t) && record.selection().overlaps(sel)
            })
            .cloned()
            .collect()
    }

    pub fn by_container(&self, container: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.by_container
            .get(container)
            .into_iter()
            .flat_map(|ids| ids.iter())
    }
}

impl Index for ContainerAnnotationIndex {
    fn on_create(&mut self, node: &Node) {
        if let NodeKind::ContainerAnnotation {
            container,
            start_path,
            start_offset,
            end_path,
            end_offset,
        } = &node.kind
        {
            self.records.insert(
                node.id.clone(),
                Record {
                    type_name: node.type_name.to_string(),
                    container: container.clone(),
                    start_path: start_path.clone(),
                    start_offset: *start_offset,
                    end_path: end_path.clone(),
                    end_offset: *end_offset,
                },
            );
            self.by_container
                .entry(container.clone())
                .or_default()
                .push(node.id.clone());
        }
    }

    fn on_delete(&mut self, node: &Node) {
        if let NodeKind::ContainerAnnotation { container, .. } = &node.kind {
            self.records.remove(&node.id);
            if let Some(ids) = self.by_container.get_mut(container) {
                ids.retain(|id| id != &node.id);
            }
        }
    }

    fn on_set(&mut self, node: &Node, property: &str, _old: &PropertyValue, _new: &PropertyValue) {
        let NodeKind::ContainerAnnotation {
            container,
            start_path,
            start_offset,
            end_path,
            end_offset,
        } = &node.kind
        else {
            return;
        };
        if let Some(record) = self.records.get_mut(&node.id) {
            match property {
                crate::node::props::START_OFFSET => record.start_offset = *start_offset,
                crate::node::props::END_OFFSET => record.end_offset = *end_offset,
                crate::node::props::START_PATH => record.start_path = start_path.clone(),
                crate::node::props::END_PATH => record.end_path = end_path.clone(),
                crate::node::props::CONTAINER => {
                    if &record.container != container {
                        if let Some(ids) = self.by_container.get_mut(&record.container) {
                            ids.retain(|id| id != &node.id);
                        }
                        self.by_container
                            .entry(container.clone())
                            .or_default()
                            .push(node.id.clone());
                        record.container = container.clone();
                    }
                }
                _ => {}
            }
        }
    }

    fn on_update(&mut self, node: &Node, property: &str, _diff: &UpdateDiff) {
        let NodeKind::ContainerAnnotation {
            start_offset,
            end_offset,
            ..
        } = &node.kind
        else {
            return;
        };
        if let Some(record) = self.records.get_mut(&node.id) {
            match property {
                crate::node::props::START_OFFSET => record.start_offset = *start_offset,
                crate::node::props::END_OFFSET => record.end_offset = *end_offset,
                _ => {}
            }
        }
    }
}
