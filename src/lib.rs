//! Ad spacefinder
//!
//! Finds room for dynamically inserted ad slots in long-form content and
//! inserts them without thrashing layout:
//!  - `fastdom` batches geometry reads ahead of DOM writes, once per frame.
//!  - `spacefinder` measures candidates and obstacles in one snapshot and
//!    picks winners in a single linear scan.
//!  - `placements` turn winners into slots for articles, carrots and
//!    liveblogs; the liveblog controller keeps doing so as blocks arrive.
//!  - `core` is the host model those run against: an arena DOM with CSS
//!    selectors, block-flow layout and a document event bus.

use thiserror::Error;

pub mod bootstrap;
pub mod config;
pub mod core;
pub mod detect;
pub mod dfp;
pub mod fastdom;
pub mod features;
pub mod logging;
pub mod placements;
pub mod robust;
pub mod slots;
pub mod spacefinder;

pub use bootstrap::{BootstrapReport, CommercialBootstrap};
pub use config::{CommercialConfig, ConfigError, ContentType, LiveblogConfig, PageConfig};
pub use crate::core::dom::{DOMError, Document, NodeId, Viewport};
pub use crate::core::events::{CustomEvent, EventSystem};
pub use dfp::{AdServer, AdvertQueue, FillError};
pub use fastdom::{FrameSource, LayoutProber, ProberError};
pub use features::{CommercialFeatures, FeatureFlags};
pub use placements::{LiveblogAdverts, LiveblogPhase, PlacementContext};
pub use robust::{catch_errors_with_context, ErrorReporter};
pub use spacefinder::{
    find_space, SpaceFiller, SpacefinderError, SpacefinderItem, SpacefinderOptions,
    SpacefinderPass, SpacefinderReport, SpacefinderRules, SpacefinderWriter,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommercialError {
    #[error("DOM error: {0}")]
    Dom(#[from] DOMError),
    #[error("Spacefinder error: {0}")]
    Spacefinder(#[from] SpacefinderError),
    #[error("Layout prober error: {0}")]
    Prober(#[from] ProberError),
    #[error("Ad server error: {0}")]
    Fill(#[from] FillError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Slot creation failed: {0}")]
    SlotCreation(String),
    #[error("Panic caught: {0}")]
    Panic(String),
}

pub type Result<T> = std::result::Result<T, CommercialError>;
