//! Space finding for dynamically inserted ad slots.
//!
//! A pass measures every candidate and obstacle under a content body in a
//! single batched read, filters the candidates against the geometry rules in
//! one linear scan, and hands the winners to a writer.

pub mod collector;
pub mod engine;
pub mod rules;
pub mod space_filler;

pub use collector::{measure, Measurements, MeasuredObstacle};
pub use engine::{find_winners, order_candidates};
pub use rules::{CandidateFilter, ObstacleRule, SearchDirection, SpacefinderRules, SpacefinderRulesBuilder};
pub use space_filler::{SpaceFiller, SpacefinderWriter};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::core::css::SelectorError;
use crate::core::dom::{DOMError, DOMRect, Document, NodeId};
use crate::fastdom::{LayoutProber, ProberError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpacefinderError {
    #[error("Invalid spacefinder rules: {0}")]
    InvalidRules(String),
    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),
    #[error("DOM error: {0}")]
    Dom(#[from] DOMError),
    #[error("Layout prober error: {0}")]
    Prober(#[from] ProberError),
}

pub type Result<T> = std::result::Result<T, SpacefinderError>;

/// A measured element in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacefinderItem {
    pub element: NodeId,
    pub top: f64,
    pub bottom: f64,
    pub height: f64,
}

impl SpacefinderItem {
    pub fn from_rect(element: NodeId, rect: &DOMRect) -> Self {
        Self {
            element,
            top: rect.top,
            bottom: rect.bottom,
            height: rect.height,
        }
    }
}

/// Label identifying a pass in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpacefinderPass {
    Inline1,
    Inline2,
    SubsequentInlines,
    MobileInlines,
    Carrot,
}

impl fmt::Display for SpacefinderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpacefinderPass::Inline1 => "inline1",
            SpacefinderPass::Inline2 => "inline2",
            SpacefinderPass::SubsequentInlines => "subsequent-inlines",
            SpacefinderPass::MobileInlines => "mobile-inlines",
            SpacefinderPass::Carrot => "carrot",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacefinderOptions {
    pub pass: SpacefinderPass,
}

impl SpacefinderOptions {
    pub fn new(pass: SpacefinderPass) -> Self {
        Self { pass }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    AboveRegion,
    BelowRegion,
    AbsoluteMinAbove,
    WinnerSpacing,
    Obstacle(String),
    CustomFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub candidate: SpacefinderItem,
    pub reason: ExclusionReason,
}

/// Outcome of one search over one measurement snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacefinderReport {
    pub pass: SpacefinderPass,
    pub container_found: bool,
    pub candidates: usize,
    pub winners: Vec<SpacefinderItem>,
    pub exclusions: Vec<Exclusion>,
}

impl SpacefinderReport {
    pub fn winner_elements(&self) -> Vec<NodeId> {
        self.winners.iter().map(|w| w.element).collect()
    }
}

/// Measures and filters in one go; nothing is written.
pub async fn find_space(
    document: Arc<Document>,
    prober: &LayoutProber,
    rules: &SpacefinderRules,
    options: SpacefinderOptions,
) -> Result<SpacefinderReport> {
    let measurements = measure(document, prober, rules).await?;
    let report = find_winners(&measurements, rules, options.pass);
    debug!(
        pass = %report.pass,
        container = report.container_found,
        candidates = report.candidates,
        winners = report.winners.len(),
        excluded = report.exclusions.len(),
        "spacefinder pass complete"
    );
    for exclusion in &report.exclusions {
        debug!(
            pass = %report.pass,
            element = %exclusion.candidate.element,
            top = exclusion.candidate.top,
            reason = ?exclusion.reason,
            "candidate excluded"
        );
    }
    Ok(report)
}
