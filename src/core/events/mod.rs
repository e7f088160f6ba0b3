pub mod system;

pub use system::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named document-level notification. The payload is carried for hosts
/// that want it; listeners in this crate react to occurrence only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomEvent {
    pub name: String,
    pub data: HashMap<String, serde_json::Value>,
}

impl CustomEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}
