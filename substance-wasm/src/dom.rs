//! `impl DomNode for web_sys::Node`: the production binding for
//! `substance::coordinate`'s generic DOM walk, backing a live browser
//! surface. `substance` itself stays DOM-free.

use wasm_bindgen::JsCast;
use web_sys::{CharacterData, Element, Node as SysNode};

use substance::coordinate::{DomNode, DomNodeType};

/// Newtype over `web_sys::Node` so the orphan rule lets us implement the
/// core's `DomNode` trait for it. `PartialEq` is JS reference identity
/// (`web_sys::Node`'s underlying `JsValue` compares by `===`), which is
/// exactly what the "has this exact text node been reached yet" walk
/// needs.
#[derive(Debug, Clone, PartialEq)]
pub struct WebDomNode(pub SysNode);

impl From<SysNode> for WebDomNode {
    fn from(node: SysNode) -> Self {
        WebDomNode(node)
    }
}

impl DomNode for WebDomNode {
    fn node_type(&self) -> DomNodeType {
        if self.0.node_type() == SysNode::TEXT_NODE {
            DomNodeType::Text
        } else {
            DomNodeType::Element
        }
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent_node().map(WebDomNode)
    }

    fn children(&self) -> Vec<Self> {
        let list = self.0.child_nodes();
        let mut out = Vec::with_capacity(list.length() as usize);
        for i in 0..list.length() {
            if let Some(child) = list.item(i) {
                out.push(WebDomNode(child));
            }
        }
        out
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn text_data(&self) -> Option<String> {
        self.0.dyn_ref::<CharacterData>().map(CharacterData::data)
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn wraps_text_node_type() {
        let document = web_sys::window().unwrap().document().unwrap();
        let text = document.create_text_node("hi");
        let node: WebDomNode = SysNode::from(text).into();
        assert_eq!(node.node_type(), DomNodeType::Text);
        assert_eq!(node.text_data().as_deref(), Some("hi"));
    }

    #[wasm_bindgen_test]
    fn reads_data_path_attribute() {
        let document = web_sys::window().unwrap().document().unwrap();
        let el = document.create_element("span").unwrap();
        el.set_attribute("data-path", "p1.content").unwrap();
        let node: WebDomNode = SysNode::from(el).into();
        assert_eq!(node.attribute("data-path").as_deref(), Some("p1.content"));
    }
}
