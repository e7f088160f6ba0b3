use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::node::{Node, NodeType};
use super::{DOMError, Result};
use crate::core::css::Selector;
use crate::core::layout::{LayoutEngine, LayoutMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1300.0,
            height: 900.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DOMRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl DOMRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            top: y,
            right: x + width,
            bottom: y + height,
            left: x,
        }
    }

    pub fn from_layout_data(layout: &super::node::LayoutData) -> Self {
        Self::new(layout.x, layout.y, layout.width, layout.height)
    }
}

/// Arena-backed document tree shared between the frame scheduler, the
/// placement routines and the host page.
pub struct Document {
    nodes: DashMap<NodeId, Arc<RwLock<Node>>>,
    next_id: AtomicU64,
    root: NodeId,
    document_element: NodeId,
    body: NodeId,
    viewport: RwLock<Viewport>,
    selector_cache: DashMap<String, Arc<Selector>>,
    layout: LayoutEngine,
}

impl Document {
    pub fn new() -> Self {
        Self::with_viewport(Viewport::default())
    }

    pub fn with_viewport(viewport: Viewport) -> Self {
        let nodes = DashMap::new();
        let root = NodeId(0);
        let document_element = NodeId(1);
        let body = NodeId(2);

        let mut root_node = Node::new_document(root);
        root_node.children.push(document_element);
        let mut html = Node::new_element("html".to_string(), document_element);
        html.parent = Some(root);
        html.children.push(body);
        let mut body_node = Node::new_element("body".to_string(), body);
        body_node.parent = Some(document_element);

        nodes.insert(root, Arc::new(RwLock::new(root_node)));
        nodes.insert(document_element, Arc::new(RwLock::new(html)));
        nodes.insert(body, Arc::new(RwLock::new(body_node)));

        Self {
            nodes,
            next_id: AtomicU64::new(3),
            root,
            document_element,
            body,
            viewport: RwLock::new(viewport),
            selector_cache: DashMap::new(),
            layout: LayoutEngine::new(),
        }
    }

    pub fn get_root_node(&self) -> NodeId {
        self.root
    }

    pub fn document_element(&self) -> NodeId {
        self.document_element
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn viewport(&self) -> Viewport {
        *self.viewport.read()
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.write() = viewport;
        self.layout.invalidate();
    }

    /// Height of the visible area, `documentElement.clientHeight` in page terms.
    pub fn client_height(&self) -> f64 {
        self.viewport.read().height
    }

    fn allocate(&self, node: impl FnOnce(NodeId) -> Node) -> NodeId {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.nodes.insert(id, Arc::new(RwLock::new(node(id))));
        id
    }

    pub fn create_element(&self, tag_name: &str) -> NodeId {
        self.allocate(|id| Node::new_element(tag_name.to_string(), id))
    }

    pub fn create_text(&self, content: &str) -> NodeId {
        self.allocate(|id| Node::new_text(content.to_string(), id))
    }

    pub fn create_comment(&self, content: &str) -> NodeId {
        self.allocate(|id| Node::new_comment(content.to_string(), id))
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<Arc<RwLock<Node>>> {
        self.nodes.get(&node_id).map(|e| Arc::clone(e.value()))
    }

    fn require(&self, node_id: NodeId) -> Result<Arc<RwLock<Node>>> {
        self.get_node(node_id).ok_or(DOMError::NodeNotFound(node_id))
    }

    pub fn with_node<R>(&self, node_id: NodeId, f: impl FnOnce(&Node) -> R) -> Option<R> {
        let node = self.get_node(node_id)?;
        let guard = node.read();
        Some(f(&guard))
    }

    pub fn append_child(&self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        self.insert_before(parent_id, child_id, None)
    }

    /// Inserts `child_id` into `parent_id` before `reference`, or at the end
    /// when `reference` is `None`. A child that already has a parent is moved.
    pub fn insert_before(
        &self,
        parent_id: NodeId,
        child_id: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        let parent = self.require(parent_id)?;
        let child = self.require(child_id)?;

        if parent.read().is_text() {
            return Err(DOMError::HierarchyRequest(format!(
                "{parent_id} cannot have children"
            )));
        }
        if child_id == parent_id || self.is_inclusive_ancestor(child_id, parent_id) {
            return Err(DOMError::HierarchyRequest(format!(
                "{child_id} is an ancestor of {parent_id}"
            )));
        }
        if let Some(reference_id) = reference {
            if self.get_parent(reference_id) != Some(parent_id) {
                return Err(DOMError::NotAChild {
                    parent: parent_id,
                    child: reference_id,
                });
            }
        }

        let old_parent = child.read().parent;
        if let Some(old_parent_id) = old_parent {
            if let Some(old) = self.get_node(old_parent_id) {
                old.write().children.retain(|id| *id != child_id);
            }
        }

        {
            let mut parent_guard = parent.write();
            let index = reference
                .and_then(|r| parent_guard.children.iter().position(|id| *id == r))
                .unwrap_or(parent_guard.children.len());
            parent_guard.children.insert(index, child_id);
        }
        child.write().parent = Some(parent_id);

        self.layout.invalidate();
        Ok(())
    }

    /// Inserts `child_id` directly after `reference_id` in the reference's parent.
    pub fn insert_after(&self, reference_id: NodeId, child_id: NodeId) -> Result<()> {
        let parent_id = self
            .get_parent(reference_id)
            .ok_or(DOMError::Detached(reference_id))?;
        let next = self.next_sibling(reference_id);
        self.insert_before(parent_id, child_id, next)
    }

    pub fn remove_child(&self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        if self.get_parent(child_id) != Some(parent_id) {
            return Err(DOMError::NotAChild {
                parent: parent_id,
                child: child_id,
            });
        }
        self.require(parent_id)?
            .write()
            .children
            .retain(|id| *id != child_id);
        self.require(child_id)?.write().parent = None;
        self.layout.invalidate();
        Ok(())
    }

    pub fn get_children(&self, node_id: NodeId) -> Vec<NodeId> {
        self.with_node(node_id, |n| n.children.to_vec())
            .unwrap_or_default()
    }

    pub fn get_parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.with_node(node_id, |n| n.parent).flatten()
    }

    pub fn previous_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.get_parent(node_id)?;
        let siblings = self.get_children(parent);
        let idx = siblings.iter().position(|&id| id == node_id)?;
        idx.checked_sub(1).map(|i| siblings[i])
    }

    pub fn next_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.get_parent(node_id)?;
        let siblings = self.get_children(parent);
        let idx = siblings.iter().position(|&id| id == node_id)?;
        siblings.get(idx + 1).copied()
    }

    pub fn first_element_child(&self, node_id: NodeId) -> Option<NodeId> {
        self.get_children(node_id)
            .into_iter()
            .find(|&id| self.is_element(id))
    }

    pub fn child_element_count(&self, node_id: NodeId) -> usize {
        self.get_children(node_id)
            .into_iter()
            .filter(|&id| self.is_element(id))
            .count()
    }

    pub fn is_element(&self, node_id: NodeId) -> bool {
        self.with_node(node_id, Node::is_element).unwrap_or(false)
    }

    /// True when `node_id` is `ancestor` or sits somewhere below it.
    pub fn contains(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        self.is_inclusive_ancestor(ancestor, node_id)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get_parent(id);
        }
        false
    }

    /// True when the node can be reached from the document root.
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, node_id)
    }

    pub fn get_attribute(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.with_node(node_id, |n| n.get_attribute(name)).flatten()
    }

    pub fn set_attribute(&self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        self.require(node_id)?.write().set_attribute(name, value);
        if name == "hidden" {
            self.layout.invalidate();
        }
        Ok(())
    }

    pub fn has_class(&self, node_id: NodeId, class: &str) -> bool {
        self.with_node(node_id, |n| n.matches_class(class))
            .unwrap_or(false)
    }

    pub fn add_class(&self, node_id: NodeId, class: &str) -> Result<()> {
        self.require(node_id)?.write().add_class(class);
        Ok(())
    }

    /// Sets the height a node occupies before its children are counted.
    pub fn set_intrinsic_height(&self, node_id: NodeId, height: f64) -> Result<()> {
        self.require(node_id)?.write().layout.intrinsic_height = Some(height.max(0.0));
        self.layout.invalidate();
        Ok(())
    }

    pub fn set_margins(&self, node_id: NodeId, top: f64, bottom: f64) -> Result<()> {
        {
            let node = self.require(node_id)?;
            let mut guard = node.write();
            guard.layout.margin_top = top;
            guard.layout.margin_bottom = bottom;
        }
        self.layout.invalidate();
        Ok(())
    }

    /// Nodes below `root` in tree order, `root` excluded.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.get_children(root).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            result.push(id);
            stack.extend(self.get_children(id).into_iter().rev());
        }
        result
    }

    fn parse_selector(&self, selector: &str) -> Result<Arc<Selector>> {
        if let Some(cached) = self.selector_cache.get(selector) {
            return Ok(Arc::clone(cached.value()));
        }
        let parsed = Arc::new(Selector::parse(selector)?);
        self.selector_cache
            .insert(selector.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Connected elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let parsed = self.parse_selector(selector)?;
        Ok(self
            .descendants(self.root)
            .into_iter()
            .filter(|&id| self.is_element(id) && parsed.matches(id, self))
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.first().copied())
    }

    pub fn matches(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        let parsed = self.parse_selector(selector)?;
        Ok(self.is_element(node_id) && parsed.matches(node_id, self))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&node_id| self.with_node(node_id, |n| n.matches_id(id)).unwrap_or(false))
    }

    /// Page-coordinate border box. Nodes that are unknown or not connected
    /// report an empty rectangle.
    pub fn bounding_rect(&self, node_id: NodeId) -> DOMRect {
        self.layout.ensure_layout(self);
        if !self.is_connected(node_id) {
            return DOMRect::default();
        }
        self.with_node(node_id, |n| DOMRect::from_layout_data(&n.layout))
            .unwrap_or_default()
    }

    pub fn layout_metrics(&self) -> LayoutMetrics {
        self.layout.metrics()
    }

    pub fn outer_html(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(node_id, &mut out);
        out
    }

    fn serialize_into(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.get_node(node_id) else {
            return;
        };
        let (node_type, tag, text, attrs, children) = {
            let guard = node.read();
            (
                guard.node_type,
                guard.tag_name.clone(),
                guard.text_content.clone(),
                guard
                    .attributes
                    .entries()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>(),
                guard.children.to_vec(),
            )
        };
        match node_type {
            NodeType::Text => out.push_str(&escape_text(&text)),
            NodeType::Comment => {
                out.push_str("<!--");
                out.push_str(&text);
                out.push_str("-->");
            }
            NodeType::Document => {
                for child in children {
                    self.serialize_into(child, out);
                }
            }
            NodeType::Element => {
                out.push('<');
                out.push_str(&tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(&name);
                    out.push_str("=\"");
                    out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
                    out.push('"');
                }
                out.push('>');
                for child in children {
                    self.serialize_into(child, out);
                }
                out.push_str("</");
                out.push_str(&tag);
                out.push('>');
            }
        }
    }

}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("node_count", &self.nodes.len())
            .field("viewport", &self.viewport())
            .finish()
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
