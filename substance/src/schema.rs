//! Schema & node registry.
//!
//! A declarative, name-keyed registry of node types. Modeled as tagged
//! variants with a `type` field and a per-type class record, with parent
//! chains resolved through [`Schema::builtin_role`] rather than runtime
//! prototype walks.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::node::PropertyName;

/// The built-in semantic role a node type ultimately resolves to by walking
/// its parent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinRole {
    Text,
    Container,
    Annotation,
    ContainerAnnotation,
}

/// Declared type of a custom property (beyond the built-in role's own
/// fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Integer,
    Boolean,
    Date,
    Id,
    IdList,
    Json,
}

#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub name: PropertyName,
    pub prop_type: PropertyType,
}

impl PropertySpec {
    pub fn new(name: impl Into<PropertyName>, prop_type: PropertyType) -> Self {
        PropertySpec {
            name: name.into(),
            prop_type,
        }
    }
}

/// Declaration of one node type: its parent (for inheritance of the
/// built-in role), its own built-in role if it introduces one directly, and
/// any additional typed properties.
#[derive(Debug, Clone)]
pub struct NodeClass {
    pub name: String,
    pub parent: Option<String>,
    pub builtin_role: Option<BuiltinRole>,
    pub properties: Vec<PropertySpec>,
}

impl NodeClass {
    pub fn new(name: impl Into<String>) -> Self {
        NodeClass {
            name: name.into(),
            parent: None,
            builtin_role: None,
            properties: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn builtin(mut self, role: BuiltinRole) -> Self {
        self.builtin_role = Some(role);
        self
    }

    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    pub fn property_spec(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name.as_str() == name)
    }
}

/// Immutable, frozen registry of node classes.
#[derive(Debug, Clone)]
pub struct Schema {
    classes: HashMap<String, NodeClass>,
    default_text_type: Option<String>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn get_node_class(&self, type_name: &str) -> Result<&NodeClass> {
        self.classes
            .get(type_name)
            .ok_or_else(|| Error::UnknownNodeType(type_name.to_string()))
    }

    pub fn get_default_text_type(&self) -> Option<&str> {
        self.default_text_type.as_deref()
    }

    /// Resolves the built-in role of `type_name` by walking the parent
    /// chain until one is declared.
    pub fn builtin_role(&self, type_name: &str) -> Result<Option<BuiltinRole>> {
        let mut current = self.get_node_class(type_name)?;
        loop {
            if let Some(role) = current.builtin_role {
                return Ok(Some(role));
            }
            match &current.parent {
                Some(parent) => current = self.get_node_class(parent)?,
                None => return Ok(None),
            }
        }
    }

    pub fn is_annotation_type(&self, type_name: &str) -> bool {
        matches!(self.builtin_role(type_name), Ok(Some(BuiltinRole::Annotation)))
    }

    pub fn is_container_annotation_type(&self, type_name: &str) -> bool {
        matches!(
            self.builtin_role(type_name),
            Ok(Some(BuiltinRole::ContainerAnnotation))
        )
    }

    pub fn is_container_type(&self, type_name: &str) -> bool {
        matches!(self.builtin_role(type_name), Ok(Some(BuiltinRole::Container)))
    }

    pub fn is_text_type(&self, type_name: &str) -> bool {
        matches!(self.builtin_role(type_name), Ok(Some(BuiltinRole::Text)))
    }

    /// Resolves the declared type of a non-built-in property by walking the
    /// parent chain, used for generic `set`/`update` validation.
    pub fn property_spec(&self, type_name: &str, property: &str) -> Result<Option<&PropertySpec>> {
        let mut current = self.get_node_class(type_name)?;
        loop {
            if let Some(spec) = current.property_spec(property) {
                return Ok(Some(spec));
            }
            match &current.parent {
                Some(parent) => current = self.get_node_class(parent)?,
                None => return Ok(None),
            }
        }
    }
}

/// Builder for a [`Schema`]; call [`SchemaBuilder::freeze`] to obtain an
/// immutable schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    classes: HashMap<String, NodeClass>,
    default_text_type: Option<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder {
            classes: HashMap::new(),
            default_text_type: None,
        }
    }

    pub fn register(mut self, class: NodeClass) -> Result<Self> {
        if self.classes.contains_key(&class.name) {
            return Err(Error::SchemaConflict(class.name));
        }
        self.classes.insert(class.name.clone(), class);
        Ok(self)
    }

    pub fn default_text_type(mut self, type_name: impl Into<String>) -> Self {
        self.default_text_type = Some(type_name.into());
        self
    }

    /// Validates that every declared parent exists, then freezes the
    /// registry.
    pub fn freeze(self) -> Result<Schema> {
        for class in self.classes.values() {
            if let Some(parent) = &class.parent {
                if !self.classes.contains_key(parent) {
                    return Err(Error::UnknownNodeType(parent.clone()));
                }
            }
        }
        Ok(Schema {
            classes: self.classes,
            default_text_type: self.default_text_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::builder()
            .register(NodeClass::new("text").builtin(BuiltinRole::Text))
            .unwrap()
            .register(NodeClass::new("paragraph").extends("text"))
            .unwrap()
            .register(NodeClass::new("annotation").builtin(BuiltinRole::Annotation))
            .unwrap()
            .register(NodeClass::new("strong").extends("annotation"))
            .unwrap()
            .default_text_type("paragraph")
            .freeze()
            .unwrap()
    }

    #[test]
    fn resolves_builtin_role_through_parent_chain() {
        let schema = sample_schema();
        assert_eq!(schema.builtin_role("paragraph").unwrap(), Some(BuiltinRole::Text));
        assert!(schema.is_annotation_type("strong"));
        assert!(!schema.is_annotation_type("paragraph"));
    }

    #[test]
    fn duplicate_registration_is_a_conflict() {
        let result = Schema::builder()
            .register(NodeClass::new("text"))
            .unwrap()
            .register(NodeClass::new("text"));
        assert!(matches!(result, Err(Error::SchemaConflict(_))));
    }

    #[test]
    fn unknown_parent_fails_freeze() {
        let result = Schema::builder()
            .register(NodeClass::new("paragraph").extends("missing"))
            .unwrap()
            .freeze();
        assert!(matches!(result, Err(Error::UnknownNodeType(_))));
    }

    #[test]
    fn unknown_type_lookup_errors() {
        let schema = sample_schema();
        assert!(matches!(
            schema.get_node_class("nope"),
            Err(Error::UnknownNodeType(_))
        ));
    }
}
