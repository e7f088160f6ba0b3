use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::trace;

use crate::core::dom::{Document, NodeId};

#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutMetrics {
    pub reflow_count: u64,
    pub last_reflow_nodes: usize,
    pub total_reflow_time_us: u64,
}

/// Block-flow layout. Every element is a block stacked below its previous
/// in-flow sibling, as wide as its parent and as tall as the larger of its
/// intrinsic height and its children's margin boxes.
#[derive(Debug)]
pub struct LayoutEngine {
    dirty: AtomicBool,
    metrics: RwLock<LayoutMetrics>,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self {
            dirty: AtomicBool::new(true),
            metrics: RwLock::new(LayoutMetrics::default()),
        }
    }

    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Reflows only when a mutation happened since the last reflow.
    pub fn ensure_layout(&self, document: &Document) {
        if self.dirty.swap(false, Ordering::AcqRel) {
            self.reflow(document);
        }
    }

    pub fn metrics(&self) -> LayoutMetrics {
        self.metrics.read().clone()
    }

    fn reflow(&self, document: &Document) {
        let start = Instant::now();
        let root = document.get_root_node();
        let mut order = vec![root];
        order.extend(document.descendants(root));

        let in_flow = |id: NodeId| {
            id == root
                || document
                    .with_node(id, |n| !n.is_out_of_flow())
                    .unwrap_or(false)
        };

        let mut heights: HashMap<NodeId, f64> = HashMap::with_capacity(order.len());
        for &id in order.iter().rev() {
            if !in_flow(id) {
                heights.insert(id, 0.0);
                continue;
            }
            let content: f64 = document
                .get_children(id)
                .into_iter()
                .filter(|&child| in_flow(child))
                .map(|child| {
                    let own = heights.get(&child).copied().unwrap_or(0.0);
                    own + document
                        .with_node(child, |n| n.layout.margin_top + n.layout.margin_bottom)
                        .unwrap_or(0.0)
                })
                .sum();
            let intrinsic = document
                .with_node(id, |n| n.layout.intrinsic_height)
                .flatten()
                .unwrap_or(0.0);
            heights.insert(id, content.max(intrinsic));
        }

        let width = document.viewport().width;
        if let Some(node) = document.get_node(root) {
            let mut guard = node.write();
            guard.layout.x = 0.0;
            guard.layout.y = 0.0;
            guard.layout.width = width;
            guard.layout.height = heights.get(&root).copied().unwrap_or(0.0);
        }

        for &id in &order {
            let Some((x, y, width)) = document.with_node(id, |n| (n.layout.x, n.layout.y, n.layout.width))
            else {
                continue;
            };
            let mut cursor = y;
            for child in document.get_children(id) {
                let Some(node) = document.get_node(child) else {
                    continue;
                };
                let flows = in_flow(child);
                let mut guard = node.write();
                guard.layout.x = x;
                guard.layout.width = width;
                if flows {
                    cursor += guard.layout.margin_top;
                    guard.layout.y = cursor;
                    guard.layout.height = heights.get(&child).copied().unwrap_or(0.0);
                    cursor += guard.layout.height + guard.layout.margin_bottom;
                } else {
                    guard.layout.y = cursor;
                    guard.layout.height = 0.0;
                }
            }
        }

        let mut metrics = self.metrics.write();
        metrics.reflow_count += 1;
        metrics.last_reflow_nodes = order.len();
        metrics.total_reflow_time_us += start.elapsed().as_micros() as u64;
        trace!(nodes = order.len(), reflow = metrics.reflow_count, "reflow complete");
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}
