//! In-memory document the widget renders into.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Detached elements
//! are built as plain [`Element`] trees and then attached with
//! [`Document::append_child`] or [`Document::insert_after`]. Slots of cleared
//! subtrees are recycled, so a `NodeId` is only valid while its node is attached.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use crate::error::DocumentError;

pub const CITIES_ID: &str = "cities";
pub const SEARCH_INPUT_ID: &str = "search-input";
pub const FORECAST_CONTAINER_ID: &str = "forecast-container";
pub const WEEKDAYS_ID: &str = "weekdays";
pub const HIDDEN_CLASS: &str = "hidden";

/// A detached element tree, ready to be inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub text: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: String,
    classes: Vec<String>,
    text: String,
    attrs: BTreeMap<String, String>,
}

impl Node {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    id_index: HashMap<String, NodeId>,
    free: Vec<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a `body` root.
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            tag: "body".to_string(),
            classes: Vec::new(),
            text: String::new(),
            attrs: BTreeMap::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
            free: Vec::new(),
        }
    }

    /// Skeleton page with the anchors the widget expects.
    pub fn widget_page() -> Self {
        let mut doc = Self::new();
        let root = doc.root;

        let form = Element::new("form")
            .with_attr("id", "search-form")
            .with_child(
                Element::new("input")
                    .with_attr("id", SEARCH_INPUT_ID)
                    .with_attr("type", "text")
                    .with_attr("value", ""),
            );
        doc.append_child(root, form);
        doc.append_child(root, Element::new("ul").with_attr("id", CITIES_ID));

        let mut modal = Element::new("div").with_attr("id", FORECAST_CONTAINER_ID);
        modal.classes.push(HIDDEN_CLASS.to_string());
        modal.children.push(Element::new("ul").with_attr("id", WEEKDAYS_ID));
        doc.append_child(root, modal);

        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub fn require_id(&self, id: &str) -> Result<NodeId, DocumentError> {
        self.get_element_by_id(id)
            .ok_or_else(|| DocumentError::MissingId(id.to_string()))
    }

    /// All attached elements carrying `class`, in document order.
    pub fn query_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.node(*id).has_class(class))
            .collect()
    }

    /// First attached element whose attribute `name` equals `value`.
    pub fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.node(*id).attr(name) == Some(value))
    }

    pub fn child_with_class(&self, parent: NodeId, class: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|id| self.node(*id).has_class(class))
    }

    pub fn append_child(&mut self, parent: NodeId, element: Element) -> NodeId {
        let id = self.materialize(Some(parent), element);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Inserts `element` as the next sibling of `reference`.
    ///
    /// Returns `None` and inserts nothing when `reference` has no parent
    /// (the root or a detached node).
    pub fn insert_after(&mut self, reference: NodeId, element: Element) -> Option<NodeId> {
        let parent = self.nodes[reference.0].parent?;
        let id = self.materialize(Some(parent), element);
        let siblings = &mut self.nodes[parent.0].children;
        let pos = siblings
            .iter()
            .position(|s| *s == reference)
            .map_or(siblings.len(), |p| p + 1);
        siblings.insert(pos, id);
        Some(id)
    }

    /// Removes every child of `id` and frees their slots.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            for removed in self.subtree(child) {
                let node = std::mem::take(&mut self.nodes[removed.0]);
                if let Some(element_id) = node.attrs.get("id") {
                    if self.id_index.get(element_id) == Some(&removed) {
                        self.id_index.remove(element_id);
                    }
                }
                self.free.push(removed);
            }
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        let node = &mut self.nodes[id.0];
        if !node.has_class(class) {
            node.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        self.nodes[id.0].classes.retain(|c| c != class);
    }

    /// Current value of a form control.
    pub fn value(&self, id: NodeId) -> &str {
        self.node(id).attr("value").unwrap_or_default()
    }

    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) {
        self.nodes[id.0].attrs.insert("value".to_string(), value.into());
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        self.subtree(id)
            .into_iter()
            .map(|n| self.node(n).text.as_str())
            .collect()
    }

    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// Indented outline, one element per line: `tag.class#id "text"`.
    pub fn to_text_tree(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_tree(id, 0, &mut out);
        out
    }

    fn materialize(&mut self, parent: Option<NodeId>, element: Element) -> NodeId {
        let Element {
            tag,
            classes,
            text,
            attrs,
            children,
        } = element;

        let node = Node {
            parent,
            children: Vec::new(),
            tag,
            classes,
            text,
            attrs,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot.0] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        if let Some(element_id) = self.nodes[id.0].attrs.get("id") {
            self.id_index.insert(element_id.clone(), id);
        }

        for child in children {
            let child_id = self.materialize(Some(id), child);
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = self.subtree(id);
        out.remove(0);
        out
    }

    // Pre-order, starting with `id` itself.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        let _ = write!(out, "<{}", node.tag);
        if !node.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape(&node.classes.join(" ")));
        }
        for (name, value) in &node.attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        out.push('>');
        if is_void(&node.tag) {
            return;
        }
        out.push_str(&escape(&node.text));
        for child in &node.children {
            self.write_html(*child, out);
        }
        let _ = write!(out, "</{}>", node.tag);
    }

    fn write_tree(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.tag);
        for class in &node.classes {
            out.push('.');
            out.push_str(class);
        }
        if let Some(element_id) = node.attr("id") {
            out.push('#');
            out.push_str(element_id);
        }
        if let Some(src) = node.attr("src") {
            let _ = write!(out, " src={src}");
        }
        if !node.text.is_empty() {
            let _ = write!(out, " {:?}", node.text);
        }
        out.push('\n');
        for child in &node.children {
            self.write_tree(*child, depth + 1, out);
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "img" | "input" | "br" | "hr")
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
