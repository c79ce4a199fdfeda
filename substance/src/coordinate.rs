//! DOM ↔ model coordinate resolver.
//!
//! The surface holds a DOM subtree whose property leaves carry
//! `data-path="nodeId.property"`; non-model decorations carry
//! `data-external="1"`. A model coordinate is `(path, offset)`, where
//! `offset` counts characters over the non-external text descendants of the
//! `data-path` element, depth-first.
//!
//! The walk/search algorithms below are generic over [`DomNode`] so they can
//! be unit-tested natively against [`test_dom::VNode`] without a browser.
//! `substance-wasm` supplies the production `impl DomNode for web_sys::Node`.

use crate::error::{Error, Result};
use crate::node::{NodeId, Path, PropertyName};

pub const DATA_PATH: &str = "data-path";
pub const DATA_EXTERNAL: &str = "data-external";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomNodeType {
    Element,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Left,
    Right,
}

/// A resolved model coordinate: a property path plus a character offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCoordinate {
    pub path: Path,
    pub offset: usize,
}

/// Abstraction over a DOM node. Implementors must
/// expose enough structure to walk ancestors, enumerate children in
/// document order, and read the two attributes the resolver cares about.
/// `PartialEq` is required for node-identity comparisons during the walk
/// (e.g. "has this exact text node been reached yet"); real DOM bindings
/// get this from `wasm_bindgen::JsValue`'s reference-identity `PartialEq`.
pub trait DomNode: Clone + PartialEq {
    fn node_type(&self) -> DomNodeType;
    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attribute(&self, name: &str) -> Option<String>;
    /// `Some(text)` for a `Text` node; `None` for an `Element`.
    fn text_data(&self) -> Option<String>;
}

fn is_external<N: DomNode>(node: &N) -> bool {
    node.attribute(DATA_EXTERNAL).as_deref() == Some("1")
}

fn data_path_of<N: DomNode>(node: &N) -> Option<Path> {
    parse_data_path(&node.attribute(DATA_PATH)?)
}

fn parse_data_path(raw: &str) -> Option<Path> {
    let (node_id, property) = raw.rsplit_once('.')?;
    Some(Path::new(
        NodeId::from(node_id),
        PropertyName::from(property),
    ))
}

/// Walks up from `node` to the nearest ancestor (inclusive) carrying
/// `data-path`.
fn nearest_data_path_ancestor<N: DomNode>(node: &N) -> Option<(N, Path)> {
    let mut current = node.clone();
    loop {
        if let Some(path) = data_path_of(&current) {
            return Some((current, path));
        }
        current = current.parent()?;
    }
}

/// Sums the character lengths of every non-external text descendant of
/// `root`, depth-first.
fn accumulate_text_offset<N: DomNode>(root: &N) -> usize {
    let mut total = 0usize;
    walk_text_descendants(root, &mut |_node, len| {
        total += len;
    });
    total
}

/// Depth-first visitor over `root`'s text descendants, skipping any
/// subtree rooted at an external span (external spans contribute no
/// model offset).
fn walk_text_descendants<N: DomNode>(root: &N, visit: &mut impl FnMut(&N, usize)) {
    if is_external(root) {
        return;
    }
    match root.node_type() {
        DomNodeType::Text => {
            let len = root.text_data().unwrap_or_default().chars().count();
            visit(root, len);
        }
        DomNodeType::Element => {
            for child in root.children() {
                walk_text_descendants(&child, visit);
            }
        }
    }
}

/// DOM -> model. `dom_offset` is interpreted according to `dom_node`'s
/// kind: a character offset into a `Text` node, or a child index into
/// an `Element`.
pub fn dom_to_model<N: DomNode>(
    dom_node: &N,
    dom_offset: usize,
    direction: SearchDirection,
) -> Result<ModelCoordinate> {
    if let Some((ancestor, path)) = nearest_data_path_ancestor(dom_node) {
        let offset = offset_within_property(&ancestor, dom_node, dom_offset);
        return Ok(ModelCoordinate { path, offset });
    }
    coordinate_search(dom_node, direction)
}

/// Computes the model offset of `(target, target_offset)` within the
/// `data-path` element `ancestor`, via the depth-first, external-skipping
/// walk above.
fn offset_within_property<N: DomNode>(ancestor: &N, target: &N, target_offset: usize) -> usize {
    match target.node_type() {
        DomNodeType::Text => {
            let mut total = 0usize;
            let mut done = false;
            walk_text_descendants(ancestor, &mut |node, len| {
                if done {
                    return;
                }
                if node == target {
                    total += target_offset.min(len);
                    done = true;
                } else {
                    total += len;
                }
            });
            total
        }
        DomNodeType::Element => {
            // `target_offset` is a child index into `target`'s own child
            // list (e.g. caret placed between children). Sum the text of
            // every non-external descendant strictly before that child.
            if target.children().is_empty() {
                // Empty property: offset 0 regardless of whether `target`
                // is the wrapper or a text node.
                return 0;
            }
            target
                .children()
                .iter()
                .take(target_offset)
                .map(accumulate_text_offset)
                .sum()
        }
    }
}

/// Coordinate search: no `data-path` ancestor exists, so walk the surface
/// in document order and return the first property boundary in
/// `direction`.
fn coordinate_search<N: DomNode>(dom_node: &N, direction: SearchDirection) -> Result<ModelCoordinate> {
    let root = {
        let mut node = dom_node.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    };
    let mut properties = Vec::new();
    let mut anchor = None;
    collect_properties_and_anchor(&root, dom_node, &mut properties, &mut anchor);
    let anchor_index = anchor.unwrap_or(properties.len());

    match direction {
        SearchDirection::Right => {
            let (_, path) = properties.get(anchor_index).ok_or(Error::CoordinateNotFound)?;
            Ok(ModelCoordinate {
                path: path.clone(),
                offset: 0,
            })
        }
        SearchDirection::Left => {
            let index = anchor_index
                .checked_sub(1)
                .ok_or(Error::CoordinateNotFound)?;
            let (node, path) = properties.get(index).ok_or(Error::CoordinateNotFound)?;
            Ok(ModelCoordinate {
                path: path.clone(),
                offset: accumulate_text_offset(node),
            })
        }
    }
}

/// Depth-first traversal of the surface that both collects every
/// `data-path` element in document order and records, the first time
/// `target` itself is encountered, how many properties had already been
/// fully visited at that point (`anchor`). `anchor` is then "the number of
/// property boundaries to the left of `target`" — exactly what
/// `coordinate_search` needs for its left/right lookup, regardless of
/// whether `target` sits between two properties or off to one side of all
/// of them.
fn collect_properties_and_anchor<N: DomNode>(
    root: &N,
    target: &N,
    out: &mut Vec<(N, Path)>,
    anchor: &mut Option<usize>,
) {
    if anchor.is_none() && root == target {
        *anchor = Some(out.len());
    }
    if let Some(path) = data_path_of(root) {
        out.push((root.clone(), path));
        return;
    }
    for child in root.children() {
        collect_properties_and_anchor(&child, target, out, anchor);
    }
}

/// Model -> DOM: locate the `data-path` element matching
/// `coordinate.path`, then accumulate non-external text descendants until
/// `coordinate.offset` is reached; return the text node and local offset.
pub fn model_to_dom<N: DomNode>(root: &N, coordinate: &ModelCoordinate) -> Result<(N, usize)> {
    let element = find_property_element(root, &coordinate.path).ok_or(Error::CoordinateNotFound)?;
    let mut remaining = coordinate.offset;
    let mut result = None;
    walk_text_descendants(&element, &mut |node, len| {
        if result.is_some() {
            return;
        }
        if remaining <= len {
            result = Some((node.clone(), remaining));
        } else {
            remaining -= len;
        }
    });
    match result {
        Some((node, offset)) => Ok((node, offset)),
        None if coordinate.offset == 0 => Ok((element, 0)),
        None => Err(Error::CoordinateNotFound),
    }
}

fn find_property_element<N: DomNode>(root: &N, path: &Path) -> Option<N> {
    if let Some(candidate) = data_path_of(root) {
        if &candidate == path {
            return Some(root.clone());
        }
        return None;
    }
    for child in root.children() {
        if let Some(found) = find_property_element(&child, path) {
            return Some(found);
        }
    }
    None
}

/// In-memory reference [`DomNode`] implementation used for native unit
/// tests and for server-side preview without a browser. Not exported
/// outside test/dev use within this crate's own tests; `substance-wasm`
/// provides the production binding.
pub mod test_dom {
    use super::{DomNode, DomNodeType};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone)]
    struct Inner {
        node_type: DomNodeType,
        attributes: Vec<(String, String)>,
        text: Option<String>,
        children: Vec<VNode>,
        parent: RefCell<Option<VNode>>,
    }

    /// A tiny owned DOM tree node, reference-counted so children can carry
    /// a parent back-pointer without lifetimes.
    #[derive(Debug, Clone)]
    pub struct VNode(Rc<Inner>);

    impl PartialEq for VNode {
        fn eq(&self, other: &Self) -> bool {
            Rc::ptr_eq(&self.0, &other.0)
        }
    }

    impl VNode {
        pub fn element(attributes: &[(&str, &str)], children: Vec<VNode>) -> Self {
            let node = VNode(Rc::new(Inner {
                node_type: DomNodeType::Element,
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text: None,
                children,
                parent: RefCell::new(None),
            }));
            for child in &node.0.children {
                *child.0.parent.borrow_mut() = Some(node.clone());
            }
            node
        }

        pub fn text(data: &str) -> Self {
            VNode(Rc::new(Inner {
                node_type: DomNodeType::Text,
                attributes: Vec::new(),
                text: Some(data.to_string()),
                children: Vec::new(),
                parent: RefCell::new(None),
            }))
        }
    }

    impl DomNode for VNode {
        fn node_type(&self) -> DomNodeType {
            self.0.node_type
        }

        fn parent(&self) -> Option<Self> {
            self.0.parent.borrow().clone()
        }

        fn children(&self) -> Vec<Self> {
            self.0.children.clone()
        }

        fn attribute(&self, name: &str) -> Option<String> {
            self.0
                .attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }

        fn text_data(&self) -> Option<String> {
            self.0.text.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_dom::VNode;
    use super::*;
    use crate::node::props;

    /// `<span data-path="p1.content"><span>ab</span><span data-external="1">·</span><span>cd</span></span>`
    fn scenario_tree() -> VNode {
        let ab = VNode::element(&[], vec![VNode::text("ab")]);
        let dot = VNode::element(&[("data-external", "1")], vec![VNode::text("\u{b7}")]);
        let cd = VNode::element(&[], vec![VNode::text("cd")]);
        VNode::element(&[("data-path", "p1.content")], vec![ab, dot, cd])
    }

    #[test]
    fn dom_offset_skips_external_span() {
        // Scenario 4: offset 3 in the last inner span ("cd"'s text node,
        // local offset 1) should resolve to model offset 3 ("ab" contributes
        // 2, the external dot contributes 0, + 1 into "cd").
        let tree = scenario_tree();
        let cd_span = &tree.children()[2];
        let cd_text = &cd_span.children()[0];
        let coord = dom_to_model(cd_text, 1, SearchDirection::Right).unwrap();
        assert_eq!(coord.path, Path::new("p1", props::CONTENT));
        assert_eq!(coord.offset, 3);
    }

    #[test]
    fn empty_property_resolves_to_offset_zero() {
        let empty = VNode::element(&[("data-path", "p1.content")], vec![]);
        let coord = dom_to_model(&empty, 0, SearchDirection::Right).unwrap();
        assert_eq!(coord.offset, 0);
    }

    #[test]
    fn coordinate_search_between_paragraphs() {
        // Scenario 5: clicking structural chrome between two paragraphs.
        let p1 = VNode::element(&[("data-path", "p1.content")], vec![VNode::text("Hello")]);
        let p2 = VNode::element(&[("data-path", "p2.content")], vec![VNode::text("World")]);
        let gap = VNode::element(&[], vec![]);
        let root = VNode::element(&[], vec![p1.clone(), gap.clone(), p2.clone()]);
        let _ = &root;

        let left = dom_to_model(&gap, 0, SearchDirection::Left).unwrap();
        assert_eq!(left.path, Path::new("p1", props::CONTENT));
        assert_eq!(left.offset, 5);

        let right = dom_to_model(&gap, 0, SearchDirection::Right).unwrap();
        assert_eq!(right.path, Path::new("p2", props::CONTENT));
        assert_eq!(right.offset, 0);
    }

    #[test]
    fn model_to_dom_round_trips_through_text_node() {
        let tree = scenario_tree();
        let coordinate = ModelCoordinate {
            path: Path::new("p1", props::CONTENT),
            offset: 3,
        };
        let (node, offset) = model_to_dom(&tree, &coordinate).unwrap();
        assert_eq!(node.text_data().as_deref(), Some("cd"));
        assert_eq!(offset, 1);
    }

    #[test]
    fn coordinate_not_found_outside_any_property() {
        let lone = VNode::element(&[], vec![]);
        let result = dom_to_model(&lone, 0, SearchDirection::Right);
        assert!(matches!(result, Err(Error::CoordinateNotFound)));
    }
}
