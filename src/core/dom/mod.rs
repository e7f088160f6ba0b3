pub mod document;
pub mod node;

pub use document::{DOMRect, Document, NodeId, Viewport};
pub use node::{AttributeMap, LayoutData, Node, NodeType};

use crate::core::css::SelectorError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DOMError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("Hierarchy request failed: {0}")]
    HierarchyRequest(String),
    #[error("Node {0} is not attached to a parent")]
    Detached(NodeId),
    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),
}

pub type Result<T> = std::result::Result<T, DOMError>;
