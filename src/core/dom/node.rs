use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::document::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    map: SmallVec<[(String, String); 8]>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self {
            map: SmallVec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        self.map.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Insertion order is preserved; serialisation relies on it.
    pub fn set(&mut self, name: String, value: String) {
        if let Some((_, v)) = self.map.iter_mut().find(|(k, _)| k == &name) {
            *v = value;
        } else {
            self.map.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.map.iter().position(|(k, _)| k == name)?;
        Some(self.map.remove(pos).1)
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.iter().any(|(k, _)| k == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.map.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &String)> {
        self.map.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Box geometry for one node, in page coordinates.
#[derive(Debug, Clone)]
pub struct LayoutData {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    /// Content height the node reports before its children are counted
    /// (replaced content, loaded images, rendered creatives).
    pub intrinsic_height: Option<f64>,
}

impl Default for LayoutData {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            margin_top: 0.0,
            margin_bottom: 0.0,
            intrinsic_height: None,
        }
    }
}

impl LayoutData {
    pub fn get_margin_box_height(&self) -> f64 {
        self.height + self.margin_top + self.margin_bottom
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub tag_name: String,
    pub text_content: String,
    pub attributes: AttributeMap,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 8]>,
    pub layout: LayoutData,
}

impl Node {
    fn with_type(id: NodeId, node_type: NodeType, tag_name: String, text_content: String) -> Self {
        Self {
            id,
            node_type,
            tag_name,
            text_content,
            attributes: AttributeMap::new(),
            parent: None,
            children: SmallVec::new(),
            layout: LayoutData::default(),
        }
    }

    pub fn new_element(tag_name: String, id: NodeId) -> Self {
        Self::with_type(id, NodeType::Element, tag_name.to_lowercase(), String::new())
    }

    pub fn new_text(content: String, id: NodeId) -> Self {
        Self::with_type(id, NodeType::Text, "#text".to_string(), content)
    }

    pub fn new_comment(content: String, id: NodeId) -> Self {
        Self::with_type(id, NodeType::Comment, "#comment".to_string(), content)
    }

    pub fn new_document(id: NodeId) -> Self {
        Self::with_type(id, NodeType::Document, "#document".to_string(), String::new())
    }

    pub fn get_tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.set(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.has(name)
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Hidden nodes take no space in block flow.
    pub fn is_out_of_flow(&self) -> bool {
        !self.is_element() || self.has_attribute("hidden")
    }

    pub fn matches_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    pub fn matches_id(&self, id: &str) -> bool {
        self.attributes.get("id").is_some_and(|v| v == id)
    }

    pub fn matches_class(&self, class: &str) -> bool {
        self.attributes
            .get("class")
            .is_some_and(|c| c.split_whitespace().any(|s| s == class))
    }

    pub fn get_classes(&self) -> Vec<String> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn add_class(&mut self, class: &str) {
        let mut list = self.get_classes();
        if !list.iter().any(|c| c == class) {
            list.push(class.to_string());
            self.set_attribute("class", &list.join(" "));
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        let mut list = self.get_classes();
        list.retain(|c| c != class);
        if list.is_empty() {
            self.remove_attribute("class");
        } else {
            self.set_attribute("class", &list.join(" "));
        }
    }
}
