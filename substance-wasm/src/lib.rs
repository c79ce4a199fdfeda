//! wasm-bindgen surface for [`substance`]: the core crate stays free of
//! any JS/DOM dependency, and this crate is a thin binding layer
//! translating JS values at the boundary.
//!
//! Values cross the boundary as plain JSON (`JsValue` <-> `serde_json::Value`
//! via `js_sys::JSON`, since the workspace doesn't carry `serde_wasm_bindgen`)
//! rather than as individually wasm-bindgen-typed structs — the document
//! core's wire shapes are already JSON, so this avoids a second, parallel
//! typed surface.

mod dom;
mod error;
mod schema_json;

use serde_json::Value as Json;
use wasm_bindgen::prelude::*;

use substance::coordinate::{self, ModelCoordinate, SearchDirection};
use substance::event::{ChangeEvent, Subscription};
use substance::{
    Document, DocumentOptions, Node, NodeId, Path, PropertyName, PropertyType, PropertyValue, Schema, Selection,
    StateMap, UpdateDiff,
};

use dom::WebDomNode;
use error::{JsError, JsResult};

/// Installs a panic hook that forwards Rust panics to `console.error`
/// instead of the default trap, via the standard `console_error_panic_hook`
/// convention.
#[wasm_bindgen(js_name = setPanicHook)]
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_to_json(value: &JsValue) -> JsResult<Json> {
    let text = js_sys::JSON::stringify(value)
        .map_err(|_| JsError(substance::Error::invalid_operation("value is not JSON-serializable")))?;
    let text: String = text.into();
    serde_json::from_str(&text)
        .map_err(|err| JsError(substance::Error::invalid_operation(format!("invalid JSON: {err}"))))
}

fn json_to_js(value: &Json) -> JsValue {
    let text = serde_json::to_string(value).expect("serde_json::Value always serializes");
    js_sys::JSON::parse(&text).expect("round-tripped JSON value always reparses")
}

fn parse_options(raw: &JsValue) -> JsResult<DocumentOptions> {
    if raw.is_undefined() || raw.is_null() {
        return Ok(DocumentOptions::default());
    }
    let json = js_to_json(raw)?;
    Ok(DocumentOptions {
        force_transactions: json.get("forceTransactions").and_then(Json::as_bool).unwrap_or(false),
        default_text_type: json
            .get("defaultTextType")
            .and_then(Json::as_str)
            .map(str::to_string),
    })
}

/// Converts a raw JSON property value into a typed [`PropertyValue`] using
/// `type_name`'s declared property spec, falling back to
/// [`PropertyValue::Json`] for properties the schema leaves untyped —
/// mirrors `Node::from_json`'s own property loop.
fn property_value_from_js(schema: &Schema, type_name: &str, property: &str, raw: &Json) -> JsResult<PropertyValue> {
    let spec = schema.property_spec(type_name, property).map_err(JsError)?;
    let value = match spec {
        Some(spec) => match spec.prop_type {
            PropertyType::String => PropertyValue::String(
                raw.as_str()
                    .ok_or_else(|| JsError(substance::Error::invalid_operation("expected a string property")))?
                    .to_string(),
            ),
            PropertyType::Integer => PropertyValue::Integer(
                raw.as_i64()
                    .ok_or_else(|| JsError(substance::Error::invalid_operation("expected an integer property")))?,
            ),
            PropertyType::Boolean => PropertyValue::Boolean(
                raw.as_bool()
                    .ok_or_else(|| JsError(substance::Error::invalid_operation("expected a boolean property")))?,
            ),
            PropertyType::Date => PropertyValue::Date(
                raw.as_str()
                    .ok_or_else(|| JsError(substance::Error::invalid_operation("expected a date property")))?
                    .to_string(),
            ),
            PropertyType::Id => PropertyValue::Id(NodeId::from(
                raw.as_str()
                    .ok_or_else(|| JsError(substance::Error::invalid_operation("expected an id property")))?,
            )),
            PropertyType::IdList => {
                let array = raw
                    .as_array()
                    .ok_or_else(|| JsError(substance::Error::invalid_operation("expected an id-list property")))?;
                PropertyValue::IdList(
                    array
                        .iter()
                        .map(|v| {
                            v.as_str().map(NodeId::from).ok_or_else(|| {
                                JsError(substance::Error::invalid_operation("id-list entries must be strings"))
                            })
                        })
                        .collect::<JsResult<_>>()?,
                )
            }
            PropertyType::Json => PropertyValue::Json(raw.clone()),
        },
        None => PropertyValue::Json(raw.clone()),
    };
    Ok(value)
}

fn update_diff_from_js(raw: &Json) -> JsResult<UpdateDiff> {
    let kind = raw
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| JsError(substance::Error::invalid_operation("diff JSON missing `type`")))?;
    match kind {
        "string-splice" => Ok(UpdateDiff::StringSplice {
            pos: field_usize(raw, "pos")?,
            delete_count: field_usize(raw, "deleteCount")?,
            insert: raw
                .get("insert")
                .and_then(Json::as_str)
                .ok_or_else(|| JsError(substance::Error::invalid_operation("diff JSON missing `insert`")))?
                .to_string(),
        }),
        "list-splice" => {
            let insert = raw
                .get("insert")
                .and_then(Json::as_array)
                .ok_or_else(|| JsError(substance::Error::invalid_operation("diff JSON missing `insert` array")))?
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(NodeId::from)
                        .ok_or_else(|| JsError(substance::Error::invalid_operation("`insert` entries must be strings")))
                })
                .collect::<JsResult<_>>()?;
            Ok(UpdateDiff::ListSplice {
                pos: field_usize(raw, "pos")?,
                delete_count: field_usize(raw, "deleteCount")?,
                insert,
            })
        }
        "number-delta" => Ok(UpdateDiff::NumberDelta(
            raw.get("delta")
                .and_then(Json::as_i64)
                .ok_or_else(|| JsError(substance::Error::invalid_operation("diff JSON missing `delta`")))?,
        )),
        other => Err(JsError(substance::Error::invalid_operation(format!(
            "unknown diff type `{other}`"
        )))),
    }
}

fn field_usize(raw: &Json, key: &str) -> JsResult<usize> {
    raw.get(key)
        .and_then(Json::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| JsError(substance::Error::invalid_operation(format!("diff JSON missing integer `{key}`"))))
}

fn state_map_from_js(raw: &JsValue) -> JsResult<StateMap> {
    if raw.is_undefined() || raw.is_null() {
        return Ok(StateMap::new());
    }
    let json = js_to_json(raw)?;
    let obj = json
        .as_object()
        .ok_or_else(|| JsError(substance::Error::invalid_operation("state must be a JSON object")))?;
    Ok(obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn state_map_to_json(state: &StateMap) -> Json {
    Json::Object(state.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn document_change_to_json(change: &substance::DocumentChange) -> Json {
    serde_json::json!({
        "ops": change.ops.iter().map(|applied| substance::ops::wire::operation_to_json(&applied.forward)).collect::<Vec<_>>(),
        "beforeState": state_map_to_json(&change.before_state),
        "afterState": state_map_to_json(&change.after_state),
        "timestamp": change.timestamp,
        "replay": change.info.replay,
    })
}

fn direction_from_js(raw: &str) -> JsResult<SearchDirection> {
    match raw {
        "left" => Ok(SearchDirection::Left),
        "right" => Ok(SearchDirection::Right),
        other => Err(JsError(substance::Error::invalid_operation(format!(
            "unknown search direction `{other}`"
        )))),
    }
}

fn coordinate_to_json(coordinate: &ModelCoordinate) -> Json {
    serde_json::json!({
        "node": coordinate.path.node.as_str(),
        "property": coordinate.path.property.as_str(),
        "offset": coordinate.offset,
    })
}

fn selection_from_js(raw: &Json) -> JsResult<Selection> {
    let kind = raw
        .get("kind")
        .and_then(Json::as_str)
        .ok_or_else(|| JsError(substance::Error::invalid_operation("selection JSON missing `kind`")))?;
    match kind {
        "null" => Ok(Selection::Null),
        "property" => Ok(Selection::property(
            path_from_js(raw, "node", "property")?,
            field_usize(raw, "startOffset")?,
            field_usize(raw, "endOffset")?,
            raw.get("reversed").and_then(Json::as_bool).unwrap_or(false),
        )),
        "container" => {
            let container = raw
                .get("container")
                .and_then(Json::as_str)
                .ok_or_else(|| JsError(substance::Error::invalid_operation("selection JSON missing `container`")))?;
            Ok(Selection::container(
                NodeId::from(container),
                array_path(raw, "startPath")?,
                field_usize(raw, "startOffset")?,
                array_path(raw, "endPath")?,
                field_usize(raw, "endOffset")?,
                raw.get("reversed").and_then(Json::as_bool).unwrap_or(false),
            ))
        }
        other => Err(JsError(substance::Error::invalid_operation(format!(
            "unknown selection kind `{other}`"
        )))),
    }
}

fn path_from_js(raw: &Json, node_key: &str, property_key: &str) -> JsResult<Path> {
    let node = raw
        .get(node_key)
        .and_then(Json::as_str)
        .ok_or_else(|| JsError(substance::Error::invalid_operation(format!("selection JSON missing `{node_key}`"))))?;
    let property = raw
        .get(property_key)
        .and_then(Json::as_str)
        .ok_or_else(|| {
            JsError(substance::Error::invalid_operation(format!(
                "selection JSON missing `{property_key}`"
            )))
        })?;
    Ok(Path::new(node, PropertyName::from(property)))
}

fn array_path(raw: &Json, key: &str) -> JsResult<Path> {
    let array = raw
        .get(key)
        .and_then(Json::as_array)
        .ok_or_else(|| JsError(substance::Error::invalid_operation(format!("selection JSON missing `{key}`"))))?;
    match array.as_slice() {
        [node, property] => {
            let node = node
                .as_str()
                .ok_or_else(|| JsError(substance::Error::invalid_operation(format!("`{key}[0]` must be a string"))))?;
            let property = property
                .as_str()
                .ok_or_else(|| JsError(substance::Error::invalid_operation(format!("`{key}[1]` must be a string"))))?;
            Ok(Path::new(node, property))
        }
        _ => Err(JsError(substance::Error::invalid_operation(format!(
            "`{key}` must be a 2-element array"
        )))),
    }
}

/// A live subscription handle; dropping it (explicitly via
/// [`WasmSubscription::unsubscribe`], or by letting the JS wrapper object be
/// garbage collected) unregisters the callback.
#[wasm_bindgen]
pub struct WasmSubscription {
    _inner: Subscription<ChangeEvent>,
}

#[wasm_bindgen]
impl WasmSubscription {
    pub fn unsubscribe(self) {}
}

/// The document: schema-bound node store, transaction stage, history, and
/// event proxies (spec components A-K), exposed as one wasm-bindgen class.
#[wasm_bindgen]
pub struct WasmDocument {
    inner: Document,
}

#[wasm_bindgen]
impl WasmDocument {
    /// `schema` is the JSON shape documented in [`schema_json::parse_schema`];
    /// `options` is `{forceTransactions?: bool, defaultTextType?: string}` or
    /// `undefined` for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(schema: JsValue, options: JsValue) -> JsResult<WasmDocument> {
        let schema = schema_json::parse_schema(js_to_json(&schema)?)?;
        let options = parse_options(&options)?;
        Ok(WasmDocument {
            inner: Document::new(schema, options),
        })
    }

    fn type_name_of(&self, id: &NodeId) -> JsResult<String> {
        let node = if self.inner.is_transaction_active() {
            self.inner.stage().store().get(id)
        } else {
            self.inner.store().get(id)
        };
        node.map(|n| n.type_name.to_string())
            .ok_or_else(|| JsError(substance::Error::unknown_node(id)))
    }

    fn property_value(&self, node: &str, property: &str, raw: JsValue) -> JsResult<PropertyValue> {
        let id = NodeId::from(node);
        let type_name = self.type_name_of(&id)?;
        property_value_from_js(self.inner.schema(), &type_name, property, &js_to_json(&raw)?)
    }

    // ---- Outside-transaction mutation ----

    pub fn create(&mut self, node: JsValue) -> JsResult<String> {
        let node = Node::from_json(self.inner.schema(), &js_to_json(&node)?)?;
        Ok(self.inner.create(node)?.to_string())
    }

    pub fn delete(&mut self, id: String) -> JsResult<()> {
        self.inner.delete(NodeId::from(id.as_str()))?;
        Ok(())
    }

    pub fn set(&mut self, node: String, property: String, value: JsValue) -> JsResult<()> {
        let pv = self.property_value(&node, &property, value)?;
        self.inner.set(Path::new(node.as_str(), property.as_str()), pv)?;
        Ok(())
    }

    pub fn update(&mut self, node: String, property: String, diff: JsValue) -> JsResult<()> {
        let diff = update_diff_from_js(&js_to_json(&diff)?)?;
        self.inner.update(Path::new(node.as_str(), property.as_str()), diff)?;
        Ok(())
    }

    // ---- Explicit transaction API (driven step by step since a
    // JS callback can't hold a `&mut Stage` the way an in-process Rust
    // closure can) ----

    #[wasm_bindgen(js_name = beginTransaction)]
    pub fn begin_transaction(&mut self, before_state: JsValue) -> JsResult<()> {
        self.inner.begin_transaction(state_map_from_js(&before_state)?)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = isTransactionActive)]
    pub fn is_transaction_active(&self) -> bool {
        self.inner.is_transaction_active()
    }

    #[wasm_bindgen(js_name = stageCreate)]
    pub fn stage_create(&mut self, node: JsValue) -> JsResult<String> {
        let node = Node::from_json(self.inner.schema(), &js_to_json(&node)?)?;
        Ok(self.inner.stage_mut().create(node)?.to_string())
    }

    #[wasm_bindgen(js_name = stageDelete)]
    pub fn stage_delete(&mut self, id: String) -> JsResult<()> {
        self.inner.stage_mut().delete(NodeId::from(id.as_str()))?;
        Ok(())
    }

    #[wasm_bindgen(js_name = stageSet)]
    pub fn stage_set(&mut self, node: String, property: String, value: JsValue) -> JsResult<()> {
        let pv = self.property_value(&node, &property, value)?;
        self.inner.stage_mut().set(Path::new(node.as_str(), property.as_str()), pv)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = stageUpdate)]
    pub fn stage_update(&mut self, node: String, property: String, diff: JsValue) -> JsResult<()> {
        let diff = update_diff_from_js(&js_to_json(&diff)?)?;
        self.inner
            .stage_mut()
            .update(Path::new(node.as_str(), property.as_str()), diff)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = stageShow)]
    pub fn stage_show(&mut self, container: String, child: String, pos: Option<usize>) -> JsResult<()> {
        self.inner
            .stage_mut()
            .show(NodeId::from(container.as_str()), NodeId::from(child.as_str()), pos)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = stageHide)]
    pub fn stage_hide(&mut self, container: String, child: String) -> JsResult<bool> {
        Ok(self
            .inner
            .stage_mut()
            .hide(NodeId::from(container.as_str()), &NodeId::from(child.as_str()))?)
    }

    #[wasm_bindgen(js_name = commitTransaction)]
    pub fn commit_transaction(&mut self, after_partial: JsValue, timestamp: f64) -> JsResult<JsValue> {
        let change = self
            .inner
            .commit_transaction(state_map_from_js(&after_partial)?, timestamp as i64)?;
        Ok(json_to_js(&document_change_to_json(&change)))
    }

    #[wasm_bindgen(js_name = cancelTransaction)]
    pub fn cancel_transaction(&mut self, timestamp: f64) -> JsResult<JsValue> {
        let change = self.inner.cancel_transaction(timestamp as i64)?;
        Ok(json_to_js(&document_change_to_json(&change)))
    }

    // ---- Undo/redo ----

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.inner.can_redo()
    }

    pub fn undo(&mut self, timestamp: f64) -> JsResult<JsValue> {
        Ok(json_to_js(&document_change_to_json(&self.inner.undo(timestamp as i64)?)))
    }

    pub fn redo(&mut self, timestamp: f64) -> JsResult<JsValue> {
        Ok(json_to_js(&document_change_to_json(&self.inner.redo(timestamp as i64)?)))
    }

    // ---- Snapshot load/save ----

    #[wasm_bindgen(js_name = saveSnapshot)]
    pub fn save_snapshot(&self, schema_name: String, schema_version: String) -> JsValue {
        json_to_js(&self.inner.save_snapshot(&schema_name, &schema_version))
    }

    #[wasm_bindgen(js_name = loadSnapshot)]
    pub fn load_snapshot(&mut self, snapshot: JsValue) -> JsResult<()> {
        self.inner.load_snapshot(&js_to_json(&snapshot)?)?;
        Ok(())
    }

    // ---- Selection-scoped container annotations ----

    #[wasm_bindgen(js_name = containerAnnotationsForSelection)]
    pub fn container_annotations_for_selection(
        &self,
        container: Option<String>,
        selection: JsValue,
        type_name: Option<String>,
    ) -> JsResult<js_sys::Array> {
        let selection = selection_from_js(&js_to_json(&selection)?)?;
        let container = container.map(|id| NodeId::from(id.as_str()));
        let ids = self
            .inner
            .container_annotations_for_selection(container.as_ref(), &selection, type_name.as_deref());
        Ok(ids.iter().map(|id| JsValue::from_str(id.as_str())).collect())
    }

    // ---- Events ----

    #[wasm_bindgen(js_name = subscribeChanged)]
    pub fn subscribe_changed(&self, callback: js_sys::Function) -> WasmSubscription {
        let subscription = self.inner.subscribe_changed(move |event: &ChangeEvent| {
            let payload = json_to_js(&document_change_to_json(event.change.as_ref()));
            let _ = callback.call1(&JsValue::NULL, &payload);
        });
        WasmSubscription { _inner: subscription }
    }

    #[wasm_bindgen(js_name = subscribePath)]
    pub fn subscribe_path(&mut self, node: String, property: String, callback: js_sys::Function) -> WasmSubscription {
        let path = Path::new(node.as_str(), property.as_str());
        let subscription = self.inner.subscribe_path(path, move |event: &ChangeEvent| {
            let payload = json_to_js(&document_change_to_json(event.change.as_ref()));
            let _ = callback.call1(&JsValue::NULL, &payload);
        });
        WasmSubscription { _inner: subscription }
    }

    // ---- DOM <-> model coordinates ----

    #[wasm_bindgen(js_name = domToModel)]
    pub fn dom_to_model(&self, dom_node: web_sys::Node, dom_offset: usize, direction: String) -> JsResult<JsValue> {
        let node: WebDomNode = dom_node.into();
        let coordinate = coordinate::dom_to_model(&node, dom_offset, direction_from_js(&direction)?)?;
        Ok(json_to_js(&coordinate_to_json(&coordinate)))
    }

    #[wasm_bindgen(js_name = modelToDom)]
    pub fn model_to_dom(
        &self,
        root: web_sys::Node,
        node: String,
        property: String,
        offset: usize,
    ) -> JsResult<js_sys::Array> {
        let root: WebDomNode = root.into();
        let coordinate = ModelCoordinate {
            path: Path::new(node.as_str(), property.as_str()),
            offset,
        };
        let (dom_node, dom_offset) = coordinate::model_to_dom(&root, &coordinate)?;
        let out = js_sys::Array::new();
        out.push(&dom_node.0);
        out.push(&JsValue::from_f64(dom_offset as f64));
        Ok(out)
    }
}
