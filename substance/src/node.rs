//! Node/property data model.
//!
//! Nodes are plain value records keyed by [`NodeId`]; there are no pointers
//! between nodes, only ids. The four built-in roles (text, container,
//! annotation, container-annotation) get typed fields on [`NodeKind`];
//! everything else lives in the generic `properties` map, addressed the
//! same way through [`Node::get`]/[`Node::set`].

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as Json;
use smallstr::SmallString;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::schema::{BuiltinRole, PropertyType, Schema};

/// Globally unique node id. Short ids are common in editor documents, so we
/// inline up to 16 bytes before spilling to the heap.
pub type NodeId = SmallString<[u8; 16]>;

/// A node-type or property name.
pub type PropertyName = SmallString<[u8; 16]>;

/// Inline list of child/reference ids, as used by containers and
/// `IdList`-typed properties.
pub type IdList = SmallVec<[NodeId; 4]>;

/// `(nodeId, property)` — addresses a single property slot on a node.
/// Used both as the addressing scheme for ops and as the value of an
/// [`Annotation`](NodeKind::Annotation)'s own `path` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    pub node: NodeId,
    pub property: PropertyName,
}

impl Path {
    pub fn new(node: impl Into<NodeId>, property: impl Into<PropertyName>) -> Self {
        Path {
            node: node.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.node, self.property)
    }
}

/// Well-known property names for the built-in roles.
pub mod props {
    pub const CONTENT: &str = "content";
    pub const NODES: &str = "nodes";
    pub const START_OFFSET: &str = "startOffset";
    pub const END_OFFSET: &str = "endOffset";
    pub const PATH: &str = "path";
    pub const START_PATH: &str = "startPath";
    pub const END_PATH: &str = "endPath";
    pub const CONTAINER: &str = "container";
}

/// Typed property value. `Date` is kept as its ISO-8601 string
/// representation rather than pulling in a date/time crate.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Date(String),
    Id(NodeId),
    IdList(IdList),
    Json(Json),
}

impl PropertyValue {
    pub fn as_str(&self) -> Result<&str> {
        match self {
            PropertyValue::String(s) => Ok(s),
            _ => Err(Error::invalid_operation("expected a string property value")),
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            PropertyValue::Integer(i) => Ok(*i),
            _ => Err(Error::invalid_operation("expected an integer property value")),
        }
    }

    pub fn as_id(&self) -> Result<&NodeId> {
        match self {
            PropertyValue::Id(id) => Ok(id),
            _ => Err(Error::invalid_operation("expected an id property value")),
        }
    }

    pub fn as_id_list(&self) -> Result<&IdList> {
        match self {
            PropertyValue::IdList(ids) => Ok(ids),
            _ => Err(Error::invalid_operation("expected an id-list property value")),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            PropertyValue::String(s) => Json::String(s.clone()),
            PropertyValue::Integer(i) => Json::from(*i),
            PropertyValue::Boolean(b) => Json::from(*b),
            PropertyValue::Date(d) => Json::String(d.clone()),
            PropertyValue::Id(id) => Json::String(id.to_string()),
            PropertyValue::IdList(ids) => {
                Json::Array(ids.iter().map(|id| Json::String(id.to_string())).collect())
            }
            PropertyValue::Json(v) => v.clone(),
        }
    }
}

/// A typed diff for `update` ops. Each variant carries enough
/// information to be inverted without consulting the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDiff {
    /// Replace `content[pos..pos+delete_count]` with `insert` (character
    /// offsets, matching the annotation index's character-indexed offsets).
    StringSplice {
        pos: usize,
        delete_count: usize,
        insert: String,
    },
    /// Replace `nodes[pos..pos+delete_count]` with `insert`.
    ListSplice {
        pos: usize,
        delete_count: usize,
        insert: IdList,
    },
    /// Add `delta` to an integer property.
    NumberDelta(i64),
}

/// The built-in semantic role of a node, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Plain node with no special role; all data lives in `properties`.
    Generic,
    Text {
        content: String,
    },
    Container {
        nodes: IdList,
    },
    Annotation {
        path: Path,
        start_offset: usize,
        end_offset: usize,
    },
    ContainerAnnotation {
        container: NodeId,
        start_path: Path,
        start_offset: usize,
        end_path: Path,
        end_offset: usize,
    },
}

/// A node in the document. Ids are unique and stable; nodes reference
/// each other only by id, never by pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub type_name: PropertyName,
    pub kind: NodeKind,
    pub properties: HashMap<PropertyName, PropertyValue>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, type_name: impl Into<PropertyName>, kind: NodeKind) -> Self {
        Node {
            id: id.into(),
            type_name: type_name.into(),
            kind,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<PropertyName>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text { .. })
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container { .. })
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self.kind, NodeKind::Annotation { .. })
    }

    pub fn is_container_annotation(&self) -> bool {
        matches!(self.kind, NodeKind::ContainerAnnotation { .. })
    }

    pub fn content(&self) -> Result<&str> {
        match &self.kind {
            NodeKind::Text { content } => Ok(content),
            _ => Err(Error::invalid_operation(format!(
                "node `{}` is not a text node",
                self.id
            ))),
        }
    }

    pub fn nodes(&self) -> Result<&IdList> {
        match &self.kind {
            NodeKind::Container { nodes } => Ok(nodes),
            _ => Err(Error::invalid_operation(format!(
                "node `{}` is not a container",
                self.id
            ))),
        }
    }

    /// Generic property read, covering both built-in role fields (by
    /// well-known name) and the generic `properties` map: specialized
    /// read sites over a generic write path.
    pub fn get(&self, property: &str) -> Result<PropertyValue> {
        match (&self.kind, property) {
            (NodeKind::Text { content }, props::CONTENT) => {
                Ok(PropertyValue::String(content.clone()))
            }
            (NodeKind::Container { nodes }, props::NODES) => {
                Ok(PropertyValue::IdList(nodes.clone()))
            }
            (NodeKind::Annotation { path, .. }, props::PATH) => {
                Ok(PropertyValue::Json(serde_json::json!([
                    path.node.as_str(),
                    path.property.as_str()
                ])))
            }
            (NodeKind::Annotation { start_offset, .. }, props::START_OFFSET) => {
                Ok(PropertyValue::Integer(*start_offset as i64))
            }
            (NodeKind::Annotation { end_offset, .. }, props::END_OFFSET) => {
                Ok(PropertyValue::Integer(*end_offset as i64))
            }
            (NodeKind::ContainerAnnotation { container, .. }, props::CONTAINER) => {
                Ok(PropertyValue::Id(container.clone()))
            }
            (NodeKind::ContainerAnnotation { start_path, .. }, props::START_PATH) => {
                Ok(PropertyValue::Json(serde_json::json!([
                    start_path.node.as_str(),
                    start_path.property.as_str()
                ])))
            }
            (NodeKind::ContainerAnnotation { end_path, .. }, props::END_PATH) => {
                Ok(PropertyValue::Json(serde_json::json!([
                    end_path.node.as_str(),
                    end_path.property.as_str()
                ])))
            }
            (NodeKind::ContainerAnnotation { start_offset, .. }, props::START_OFFSET) => {
                Ok(PropertyValue::Integer(*start_offset as i64))
            }
            (NodeKind::ContainerAnnotation { end_offset, .. }, props::END_OFFSET) => {
                Ok(PropertyValue::Integer(*end_offset as i64))
            }
            _ => self.properties.get(property).cloned().ok_or_else(|| {
                Error::invalid_operation(format!(
                    "node `{}` has no property `{}`",
                    self.id, property
                ))
            }),
        }
    }

    /// Whole-property replace. Returns the previous value so the caller
    /// can build the inverse op (`Set(path, old)`); a property with no
    /// prior value has no such inverse, so it is rejected up front,
    /// before any mutation — a failed `set` must never leave the node
    /// partially changed.
    pub fn set(&mut self, property: &str, value: PropertyValue) -> Result<PropertyValue> {
        let old = self
            .get(property)
            .ok()
            .ok_or_else(|| Error::invalid_operation(format!("unknown property `{}`", property)))?;
        match (&mut self.kind, property, &value) {
            (NodeKind::Text { content }, props::CONTENT, PropertyValue::String(s)) => {
                *content = s.clone();
            }
            (NodeKind::Container { nodes }, props::NODES, PropertyValue::IdList(ids)) => {
                *nodes = ids.clone();
            }
            (NodeKind::Annotation { start_offset, .. }, props::START_OFFSET, _) => {
                *start_offset = value.as_integer()? as usize;
            }
            (NodeKind::Annotation { end_offset, .. }, props::END_OFFSET, _) => {
                *end_offset = value.as_integer()? as usize;
            }
            (NodeKind::ContainerAnnotation { start_offset, .. }, props::START_OFFSET, _) => {
                *start_offset = value.as_integer()? as usize;
            }
            (NodeKind::ContainerAnnotation { end_offset, .. }, props::END_OFFSET, _) => {
                *end_offset = value.as_integer()? as usize;
            }
            _ if self.properties.contains_key(property) => {
                self.properties.insert(property.into(), value);
            }
            _ => {
                return Err(Error::invalid_operation(format!(
                    "cannot set built-in property `{}` to a mismatched value",
                    property
                )));
            }
        }
        Ok(old)
    }

    /// Typed diff application. Returns the inverse diff.
    pub fn update(&mut self, property: &str, diff: &UpdateDiff) -> Result<UpdateDiff> {
        match (&mut self.kind, property, diff) {
            (
                NodeKind::Text { content },
                props::CONTENT,
                UpdateDiff::StringSplice {
                    pos,
                    delete_count,
                    insert,
                },
            ) => {
                let chars: Vec<char> = content.chars().collect();
                if *pos > chars.len() || *pos + *delete_count > chars.len() {
                    return Err(Error::invalid_operation(
                        "string splice out of range".to_string(),
                    ));
                }
                let removed: String = chars[*pos..*pos + *delete_count].iter().collect();
                let mut new_chars = chars[..*pos].to_vec();
                new_chars.extend(insert.chars());
                new_chars.extend(chars[*pos + *delete_count..].iter());
                *content = new_chars.into_iter().collect();
                Ok(UpdateDiff::StringSplice {
                    pos: *pos,
                    delete_count: insert.chars().count(),
                    insert: removed,
                })
            }
            (
                NodeKind::Container { nodes },
                props::NODES,
                UpdateDiff::ListSplice {
                    pos,
                    delete_count,
                    insert,
                },
            ) => {
                if *pos > nodes.len() || *pos + *delete_count > nodes.len() {
                    return Err(Error::invalid_operation(
                        "list splice out of range".to_string(),
                    ));
                }
                let removed: IdList = nodes[*pos..*pos + *delete_count].iter().cloned().collect();
                nodes.splice(*pos..*pos + *delete_count, insert.iter().cloned());
                Ok(UpdateDiff::ListSplice {
                    pos: *pos,
                    delete_count: insert.len(),
                    insert: removed,
                })
            }
            (
                NodeKind::Annotation { start_offset, .. },
                props::START_OFFSET,
                UpdateDiff::NumberDelta(delta),
            ) => {
                *start_offset = apply_delta(*start_offset, *delta)?;
                Ok(UpdateDiff::NumberDelta(-delta))
            }
            (
                NodeKind::Annotation { end_offset, .. },
                props::END_OFFSET,
                UpdateDiff::NumberDelta(delta),
            ) => {
                *end_offset = apply_delta(*end_offset, *delta)?;
                Ok(UpdateDiff::NumberDelta(-delta))
            }
            (_, _, UpdateDiff::NumberDelta(delta)) if self.properties.contains_key(property) => {
                let cur = self.properties.get(property).unwrap().as_integer()?;
                let new_val = cur
                    .checked_add(*delta)
                    .ok_or_else(|| Error::invalid_operation("integer overflow"))?;
                self.properties
                    .insert(property.into(), PropertyValue::Integer(new_val));
                Ok(UpdateDiff::NumberDelta(-delta))
            }
            _ => Err(Error::invalid_operation(format!(
                "update diff does not match property `{}`",
                property
            ))),
        }
    }

    /// Serializes to the persisted Node JSON form: `{id, type,
    /// ...properties}`, built-in role fields flattened under their
    /// well-known names.
    pub fn to_json(&self) -> Json {
        let mut map = serde_json::Map::new();
        map.insert("id".into(), Json::String(self.id.to_string()));
        map.insert("type".into(), Json::String(self.type_name.to_string()));
        match &self.kind {
            NodeKind::Generic => {}
            NodeKind::Text { content } => {
                map.insert(props::CONTENT.into(), Json::String(content.clone()));
            }
            NodeKind::Container { nodes } => {
                map.insert(
                    props::NODES.into(),
                    Json::Array(nodes.iter().map(|id| Json::String(id.to_string())).collect()),
                );
            }
            NodeKind::Annotation {
                path,
                start_offset,
                end_offset,
            } => {
                map.insert(
                    props::PATH.into(),
                    serde_json::json!([path.node.as_str(), path.property.as_str()]),
                );
                map.insert(props::START_OFFSET.into(), Json::from(*start_offset));
                map.insert(props::END_OFFSET.into(), Json::from(*end_offset));
            }
            NodeKind::ContainerAnnotation {
                container,
                start_path,
                start_offset,
                end_path,
                end_offset,
            } => {
                map.insert(props::CONTAINER.into(), Json::String(container.to_string()));
                map.insert(
                    props::START_PATH.into(),
                    serde_json::json!([start_path.node.as_str(), start_path.property.as_str()]),
                );
                map.insert(props::START_OFFSET.into(), Json::from(*start_offset));
                map.insert(
                    props::END_PATH.into(),
                    serde_json::json!([end_path.node.as_str(), end_path.property.as_str()]),
                );
                map.insert(props::END_OFFSET.into(), Json::from(*end_offset));
            }
        }
        for (name, value) in &self.properties {
            map.insert(name.to_string(), value.to_json());
        }
        Json::Object(map)
    }

    /// Parses the persisted Node JSON form: `{id, type, ...properties}`.
    /// The built-in role's own fields (`content`, `nodes`,
    /// `path`/`startOffset`/`endOffset`, etc.) are read per `type`'s
    /// schema-resolved [`BuiltinRole`]; everything else is read back
    /// through the schema's declared [`PropertyType`] for that type
    /// (`property_spec`), falling back to opaque JSON for undeclared
    /// keys.
    pub fn from_json(schema: &Schema, value: &Json) -> Result<Node> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::invalid_operation("node JSON must be an object"))?;
        let id = obj
            .get("id")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::invalid_operation("node JSON missing `id`"))?;
        let type_name = obj
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::invalid_operation("node JSON missing `type`"))?;
        schema.get_node_class(type_name)?;

        let role = schema.builtin_role(type_name)?;
        let reserved: &[&str] = match role {
            Some(BuiltinRole::Text) => &[props::CONTENT],
            Some(BuiltinRole::Container) => &[props::NODES],
            Some(BuiltinRole::Annotation) => &[props::PATH, props::START_OFFSET, props::END_OFFSET],
            Some(BuiltinRole::ContainerAnnotation) => &[
                props::CONTAINER,
                props::START_PATH,
                props::START_OFFSET,
                props::END_PATH,
                props::END_OFFSET,
            ],
            None => &[],
        };

        let kind = match role {
            Some(BuiltinRole::Text) => NodeKind::Text {
                content: field_str(obj, props::CONTENT)?.to_string(),
            },
            Some(BuiltinRole::Container) => NodeKind::Container {
                nodes: field_id_list(obj, props::NODES)?,
            },
            Some(BuiltinRole::Annotation) => NodeKind::Annotation {
                path: field_path(obj, props::PATH)?,
                start_offset: field_usize(obj, props::START_OFFSET)?,
                end_offset: field_usize(obj, props::END_OFFSET)?,
            },
            Some(BuiltinRole::ContainerAnnotation) => NodeKind::ContainerAnnotation {
                container: NodeId::from(field_str(obj, props::CONTAINER)?),
                start_path: field_path(obj, props::START_PATH)?,
                start_offset: field_usize(obj, props::START_OFFSET)?,
                end_path: field_path(obj, props::END_PATH)?,
                end_offset: field_usize(obj, props::END_OFFSET)?,
            },
            None => NodeKind::Generic,
        };

        let mut node = Node::new(id, type_name, kind);
        for (key, raw) in obj {
            if key == "id" || key == "type" || reserved.contains(&key.as_str()) {
                continue;
            }
            let value = match schema.property_spec(type_name, key)? {
                Some(spec) => property_value_from_json(spec.prop_type, raw)?,
                None => PropertyValue::Json(raw.clone()),
            };
            node.properties.insert(key.as_str().into(), value);
        }
        Ok(node)
    }
}

fn field_str<'a>(obj: &'a serde_json::Map<String, Json>, key: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::invalid_operation(format!("node JSON missing `{key}`")))
}

fn field_usize(obj: &serde_json::Map<String, Json>, key: &str) -> Result<usize> {
    obj.get(key)
        .and_then(Json::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| Error::invalid_operation(format!("node JSON missing integer `{key}`")))
}

fn field_id_list(obj: &serde_json::Map<String, Json>, key: &str) -> Result<IdList> {
    let array = obj
        .get(key)
        .and_then(Json::as_array)
        .ok_or_else(|| Error::invalid_operation(format!("node JSON missing array `{key}`")))?;
    array
        .iter()
        .map(|v| {
            v.as_str()
                .map(NodeId::from)
                .ok_or_else(|| Error::invalid_operation(format!("`{key}` entries must be strings")))
        })
        .collect()
}

fn field_path(obj: &serde_json::Map<String, Json>, key: &str) -> Result<Path> {
    let array = obj
        .get(key)
        .and_then(Json::as_array)
        .ok_or_else(|| Error::invalid_operation(format!("node JSON missing path `{key}`")))?;
    match array.as_slice() {
        [node, property] => {
            let node = node
                .as_str()
                .ok_or_else(|| Error::invalid_operation(format!("`{key}[0]` must be a string")))?;
            let property = property
                .as_str()
                .ok_or_else(|| Error::invalid_operation(format!("`{key}[1]` must be a string")))?;
            Ok(Path::new(node, property))
        }
        _ => Err(Error::invalid_operation(format!("`{key}` must be a 2-element array"))),
    }
}

fn property_value_from_json(prop_type: PropertyType, raw: &Json) -> Result<PropertyValue> {
    match prop_type {
        PropertyType::String => Ok(PropertyValue::String(
            raw.as_str()
                .ok_or_else(|| Error::invalid_operation("expected a string property"))?
                .to_string(),
        )),
        PropertyType::Integer => Ok(PropertyValue::Integer(
            raw.as_i64()
                .ok_or_else(|| Error::invalid_operation("expected an integer property"))?,
        )),
        PropertyType::Boolean => Ok(PropertyValue::Boolean(
            raw.as_bool()
                .ok_or_else(|| Error::invalid_operation("expected a boolean property"))?,
        )),
        PropertyType::Date => Ok(PropertyValue::Date(
            raw.as_str()
                .ok_or_else(|| Error::invalid_operation("expected a date string property"))?
                .to_string(),
        )),
        PropertyType::Id => Ok(PropertyValue::Id(NodeId::from(
            raw.as_str()
                .ok_or_else(|| Error::invalid_operation("expected an id property"))?,
        ))),
        PropertyType::IdList => {
            let array = raw
                .as_array()
                .ok_or_else(|| Error::invalid_operation("expected an id-list property"))?;
            let ids: IdList = array
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(NodeId::from)
                        .ok_or_else(|| Error::invalid_operation("id-list entries must be strings"))
                })
                .collect::<Result<_>>()?;
            Ok(PropertyValue::IdList(ids))
        }
        PropertyType::Json => Ok(PropertyValue::Json(raw.clone())),
    }
}

fn apply_delta(value: usize, delta: i64) -> Result<usize> {
    let new_val = value as i64 + delta;
    if new_val < 0 {
        return Err(Error::invalid_operation("number delta underflows offset"));
    }
    Ok(new_val as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BuiltinRole, NodeClass, PropertySpec, PropertyType};

    fn schema() -> Schema {
        Schema::builder()
            .register(
                NodeClass::new("paragraph")
                    .builtin(BuiltinRole::Text)
                    .property(PropertySpec::new("align", PropertyType::String)),
            )
            .unwrap()
            .register(NodeClass::new("strong").builtin(BuiltinRole::Annotation))
            .unwrap()
            .register(NodeClass::new("container").builtin(BuiltinRole::Container))
            .unwrap()
            .freeze()
            .unwrap()
    }

    #[test]
    fn text_node_json_round_trips() {
        let schema = schema();
        let node = Node::new(
            "p1",
            "paragraph",
            NodeKind::Text {
                content: "hi".to_string(),
            },
        )
        .with_property("align", PropertyValue::String("center".into()));

        let json = node.to_json();
        let parsed = Node::from_json(&schema, &json).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn annotation_node_json_round_trips() {
        let schema = schema();
        let node = Node::new(
            "s1",
            "strong",
            NodeKind::Annotation {
                path: Path::new("p1", props::CONTENT),
                start_offset: 2,
                end_offset: 5,
            },
        );
        let parsed = Node::from_json(&schema, &node.to_json()).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn container_node_json_round_trips() {
        let schema = schema();
        let node = Node::new(
            "c1",
            "container",
            NodeKind::Container {
                nodes: [NodeId::from("a"), NodeId::from("b")].into_iter().collect(),
            },
        );
        let parsed = Node::from_json(&schema, &node.to_json()).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn from_json_rejects_unknown_type() {
        let schema = schema();
        let json = serde_json::json!({"id": "x1", "type": "nope"});
        assert!(matches!(
            Node::from_json(&schema, &json),
            Err(Error::UnknownNodeType(_))
        ));
    }

    #[test]
    fn set_on_a_generic_property_with_no_prior_value_is_rejected_without_mutation() {
        let mut node = Node::new(
            "p1",
            "paragraph",
            NodeKind::Text {
                content: "hi".to_string(),
            },
        );
        let before = node.clone();
        let result = node.set("align", PropertyValue::String("center".into()));
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
        assert_eq!(node, before);
    }

    #[test]
    fn set_on_an_already_present_generic_property_replaces_it() {
        let mut node = Node::new(
            "p1",
            "paragraph",
            NodeKind::Text {
                content: "hi".to_string(),
            },
        )
        .with_property("align", PropertyValue::String("center".into()));

        let old = node.set("align", PropertyValue::String("right".into())).unwrap();
        assert_eq!(old, PropertyValue::String("center".into()));
        assert_eq!(
            node.get("align").unwrap(),
            PropertyValue::String("right".into())
        );
    }
}
