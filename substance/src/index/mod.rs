//! Secondary index interface: `{onCreate, onDelete, onSet, onUpdate}`,
//! dispatched by the store after every applied op so indices stay
//! derivable from the node table.

pub mod annotation;
pub mod by_type;
pub mod container_annotation;

use crate::node::{Node, PropertyValue, UpdateDiff};

pub trait Index {
    fn on_create(&mut self, node: &Node);
    fn on_delete(&mut self, node: &Node);
    fn on_set(&mut self, node: &Node, property: &str, old: &PropertyValue, new: &PropertyValue);
    fn on_update(&mut self, node: &Node, property: &str, diff: &UpdateDiff);
}

pub use annotation::AnnotationIndex;
pub use by_type::TypeIndex;
pub use container_annotation::ContainerAnnotationIndex;
