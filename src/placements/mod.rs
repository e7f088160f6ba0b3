//! Placement routines: each one owns a set of spacefinder rules and a
//! writer that turns winners into ad slots.

pub mod article_inline;
pub mod carrot;
pub mod liveblog;

pub use article_inline::{init_article_inline, ARTICLE_BODY_SELECTOR};
pub use carrot::init_carrot;
pub use liveblog::{LiveblogAdverts, LiveblogPhase};

use std::sync::Arc;
use tracing::warn;

use crate::config::CommercialConfig;
use crate::core::dom::{self, Document, NodeId};
use crate::dfp::AdServer;
use crate::fastdom::LayoutProber;
use crate::features::FeatureFlags;
use crate::slots::{create_ad_slot, create_slot_container, CreateSlotOptions, SizeMapping, SlotKind};
use crate::spacefinder::SpaceFiller;

/// Collaborators shared by every placement routine on a page.
#[derive(Clone)]
pub struct PlacementContext {
    pub filler: Arc<SpaceFiller>,
    pub ad_server: Arc<dyn AdServer>,
    pub features: Arc<dyn FeatureFlags>,
    pub config: Arc<CommercialConfig>,
}

impl PlacementContext {
    pub fn document(&self) -> &Arc<Document> {
        self.filler.document()
    }

    pub fn prober(&self) -> &LayoutProber {
        self.filler.prober()
    }

    /// Hands `slot` to the ad server; failures are logged, never raised.
    pub async fn request_fill(&self, slot: NodeId, overrides: &SizeMapping) -> bool {
        match self.ad_server.request_fill(slot, overrides).await {
            Ok(()) => true,
            Err(err) => {
                warn!(slot = %slot, error = %err, "ad server did not accept slot");
                false
            }
        }
    }
}

impl std::fmt::Debug for PlacementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementContext")
            .field("filler", &self.filler)
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// How a slot is placed next to an anchor element.
#[derive(Debug, Clone)]
pub struct SlotInsertion {
    pub kind: SlotKind,
    pub options: CreateSlotOptions,
    /// Wrap the slot in a `div` with these classes; `None` inserts it bare.
    pub container_class: Option<String>,
    pub position: InsertPosition,
}

/// Builds the slot (and its container) and inserts it next to `anchor` in a
/// single scheduled write. Resolves to `None` when the anchor has left the
/// document in the meantime.
pub async fn insert_slot(
    document: &Arc<Document>,
    prober: &LayoutProber,
    anchor: NodeId,
    insertion: SlotInsertion,
) -> crate::Result<Option<NodeId>> {
    let document = Arc::clone(document);
    let inserted = prober
        .mutate(move || -> dom::Result<Option<NodeId>> {
            let Some(parent) = document.get_parent(anchor) else {
                return Ok(None);
            };
            let slot = create_ad_slot(&document, insertion.kind, &insertion.options)?;
            let node = match &insertion.container_class {
                Some(class_name) => create_slot_container(&document, class_name, slot)?,
                None => slot,
            };
            match insertion.position {
                InsertPosition::Before => document.insert_before(parent, node, Some(anchor))?,
                InsertPosition::After => document.insert_after(anchor, node)?,
            }
            Ok(Some(slot))
        })
        .await??;
    Ok(inserted)
}
