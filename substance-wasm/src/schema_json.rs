//! Parses the JSON schema declaration shape a JS host passes into
//! [`Document::new`](crate::WasmDocument::new) into a frozen
//! [`substance::Schema`].
//!
//! Wire shape:
//! ```json
//! {
//!   "defaultTextType": "paragraph",
//!   "classes": [
//!     {"name": "text", "builtinRole": "text"},
//!     {"name": "paragraph", "parent": "text"},
//!     {"name": "annotation", "builtinRole": "annotation"},
//!     {"name": "strong", "parent": "annotation"},
//!     {"name": "container", "builtinRole": "container"},
//!     {"name": "comment", "builtinRole": "containerAnnotation"}
//!   ]
//! }
//! ```
//! `properties` on a class entry (`[{"name": ..., "type": "string"|"integer"|
//! "boolean"|"date"|"id"|"idList"|"json"}]`) declares additional typed
//! properties beyond the built-in role's own fields.

use serde::Deserialize;
use serde_json::Value as Json;

use substance::schema::{BuiltinRole, NodeClass, PropertySpec, PropertyType, Schema, SchemaBuilder};
use substance::Error;

use crate::error::{JsError, JsResult};

#[derive(Debug, Deserialize)]
struct PropertySchema {
    name: String,
    #[serde(rename = "type")]
    prop_type: String,
}

#[derive(Debug, Deserialize)]
struct ClassSchema {
    name: String,
    parent: Option<String>,
    #[serde(rename = "builtinRole")]
    builtin_role: Option<String>,
    #[serde(default)]
    properties: Vec<PropertySchema>,
}

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    #[serde(rename = "defaultTextType")]
    default_text_type: Option<String>,
    classes: Vec<ClassSchema>,
}

fn parse_builtin_role(raw: &str) -> JsResult<BuiltinRole> {
    match raw {
        "text" => Ok(BuiltinRole::Text),
        "container" => Ok(BuiltinRole::Container),
        "annotation" => Ok(BuiltinRole::Annotation),
        "containerAnnotation" => Ok(BuiltinRole::ContainerAnnotation),
        other => Err(JsError(Error::UnknownNodeType(format!(
            "unknown builtin role `{other}`"
        )))),
    }
}

fn parse_property_type(raw: &str) -> JsResult<PropertyType> {
    match raw {
        "string" => Ok(PropertyType::String),
        "integer" => Ok(PropertyType::Integer),
        "boolean" => Ok(PropertyType::Boolean),
        "date" => Ok(PropertyType::Date),
        "id" => Ok(PropertyType::Id),
        "idList" => Ok(PropertyType::IdList),
        "json" => Ok(PropertyType::Json),
        other => Err(JsError(Error::InvalidOperation(format!(
            "unknown property type `{other}`"
        )))),
    }
}

pub fn parse_schema(value: Json) -> JsResult<Schema> {
    let doc: SchemaDoc = serde_json::from_value(value)
        .map_err(|err| JsError(Error::InvalidOperation(format!("invalid schema JSON: {err}"))))?;

    let mut builder: SchemaBuilder = Schema::builder();
    for class in doc.classes {
        let mut node_class = NodeClass::new(class.name);
        if let Some(parent) = class.parent {
            node_class = node_class.extends(parent);
        }
        if let Some(role) = class.builtin_role {
            node_class = node_class.builtin(parse_builtin_role(&role)?);
        }
        for prop in class.properties {
            node_class = node_class.property(PropertySpec::new(prop.name, parse_property_type(&prop.prop_type)?));
        }
        builder = builder.register(node_class)?;
    }
    if let Some(default_text_type) = doc.default_text_type {
        builder = builder.default_text_type(default_text_type);
    }
    Ok(builder.freeze()?)
}
