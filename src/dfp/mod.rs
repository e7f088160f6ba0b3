//! Ad-serving collaborator.
//!
//! Placements hand finished slot elements to an [`AdServer`]. The in-crate
//! [`AdvertQueue`] registers each slot once, with its size mapping resolved
//! from the slot's `data-{device}` attributes plus any overrides, and keeps
//! the resulting adverts in display order for whatever renders them.

pub mod static_slots;

pub use static_slots::{decide_additional_sizes, fill_static_advert_slots, AD_SLOT_SELECTOR};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::core::dom::{Document, NodeId};
use crate::slots::{parse_sizes, AdSizeParseError, Device, SizeMapping};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FillError {
    #[error("Slot {0} is already registered")]
    AlreadyRegistered(String),
    #[error("Slot {0} has no id")]
    MissingId(NodeId),
    #[error("Slot {0} is not attached to the document")]
    Detached(NodeId),
    #[error("Slot {slot} has invalid sizes: {source}")]
    InvalidSizes {
        slot: String,
        source: AdSizeParseError,
    },
    #[error("Ad server rejected slot {slot}: {reason}")]
    Rejected { slot: String, reason: String },
}

#[async_trait]
pub trait AdServer: Send + Sync {
    /// Asks for `slot` to be filled; `size_overrides` extend the slot's own sizes.
    async fn request_fill(
        &self,
        slot: NodeId,
        size_overrides: &SizeMapping,
    ) -> Result<(), FillError>;

    fn is_registered(&self, slot_id: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advert {
    pub id: String,
    pub name: String,
    pub node: NodeId,
    pub sizes: SizeMapping,
}

/// Registry of adverts awaiting display, in registration order.
pub struct AdvertQueue {
    document: Arc<Document>,
    adverts: RwLock<Vec<Advert>>,
    ids: DashMap<String, usize>,
}

impl AdvertQueue {
    pub fn new(document: Arc<Document>) -> Self {
        Self {
            document,
            adverts: RwLock::new(Vec::new()),
            ids: DashMap::new(),
        }
    }

    pub fn adverts(&self) -> Vec<Advert> {
        self.adverts.read().clone()
    }

    pub fn advert(&self, slot_id: &str) -> Option<Advert> {
        let index = *self.ids.get(slot_id)?;
        self.adverts.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.adverts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn create_advert(&self, slot: NodeId, overrides: &SizeMapping) -> Result<Advert, FillError> {
        if !self.document.is_connected(slot) {
            return Err(FillError::Detached(slot));
        }
        let id = self
            .document
            .get_attribute(slot, "id")
            .filter(|id| !id.is_empty())
            .ok_or(FillError::MissingId(slot))?;
        let name = self
            .document
            .get_attribute(slot, "data-name")
            .unwrap_or_else(|| id.clone());

        let mut sizes = SizeMapping::new();
        for device in Device::ALL {
            if let Some(value) = self.document.get_attribute(slot, &device.data_attribute()) {
                let parsed = parse_sizes(&value).map_err(|source| FillError::InvalidSizes {
                    slot: id.clone(),
                    source,
                })?;
                sizes.insert(device, parsed);
            }
        }
        for (device, extra) in overrides {
            sizes.entry(*device).or_default().extend(extra.iter().copied());
        }

        Ok(Advert {
            id,
            name,
            node: slot,
            sizes,
        })
    }
}

#[async_trait]
impl AdServer for AdvertQueue {
    async fn request_fill(
        &self,
        slot: NodeId,
        size_overrides: &SizeMapping,
    ) -> Result<(), FillError> {
        let advert = self.create_advert(slot, size_overrides)?;
        let mut adverts = self.adverts.write();
        match self.ids.entry(advert.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(FillError::AlreadyRegistered(advert.id))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(adverts.len());
                debug!(slot = %advert.id, name = %advert.name, "advert queued");
                adverts.push(advert);
                Ok(())
            }
        }
    }

    fn is_registered(&self, slot_id: &str) -> bool {
        self.ids.contains_key(slot_id)
    }
}

impl std::fmt::Debug for AdvertQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertQueue")
            .field("adverts", &self.len())
            .finish()
    }
}
