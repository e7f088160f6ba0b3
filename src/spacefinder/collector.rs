use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::engine::order_candidates;
use super::rules::{ObstacleRule, SpacefinderRules};
use super::{Result, SpacefinderItem};
use crate::core::dom::{Document, NodeId};
use crate::fastdom::LayoutProber;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredObstacle {
    pub selector: String,
    pub rule: ObstacleRule,
    pub items: Vec<SpacefinderItem>,
}

/// One consistent geometry snapshot for a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    /// `None` when the content body is not on the page.
    pub body: Option<SpacefinderItem>,
    /// Candidates in search order, already bounded by `start_at`/`stop_at`.
    pub candidates: Vec<SpacefinderItem>,
    pub obstacles: Vec<MeasuredObstacle>,
}

/// Measures the body, its candidates and its obstacles in a single read batch.
pub async fn measure(
    document: Arc<Document>,
    prober: &LayoutProber,
    rules: &SpacefinderRules,
) -> Result<Measurements> {
    let rules = rules.clone();
    prober
        .measure(move || measure_now(&document, &rules))
        .await?
}

fn measure_now(document: &Document, rules: &SpacefinderRules) -> Result<Measurements> {
    let Some(body) = document.query_selector(&rules.body_selector)? else {
        return Ok(Measurements::default());
    };

    let item = |id: NodeId| SpacefinderItem::from_rect(id, &document.bounding_rect(id));
    let within_body = |id: &NodeId| *id != body && document.contains(body, *id);

    let candidates: Vec<SpacefinderItem> = document
        .query_selector_all(&rules.candidate_query())?
        .into_iter()
        .filter(within_body)
        .map(item)
        .collect();
    let candidates = bound(
        order_candidates(candidates, rules.direction),
        rules.start_at,
        rules.stop_at,
    );

    let obstacles = rules
        .obstacles
        .iter()
        .map(|(selector, rule)| -> Result<MeasuredObstacle> {
            let items = document
                .query_selector_all(&rules.obstacle_query(selector))?
                .into_iter()
                .filter(within_body)
                .map(item)
                .collect();
            Ok(MeasuredObstacle {
                selector: selector.clone(),
                rule: *rule,
                items,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Measurements {
        body: Some(item(body)),
        candidates,
        obstacles,
    })
}

/// Keeps the run from `start` to `stop`, both inclusive, in search order.
/// A bound that is not among the candidates leaves nothing on that side.
fn bound(
    candidates: Vec<SpacefinderItem>,
    start: Option<NodeId>,
    stop: Option<NodeId>,
) -> Vec<SpacefinderItem> {
    let mut started = start.is_none();
    let mut result = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !started && Some(candidate.element) == start {
            started = true;
        }
        if !started {
            continue;
        }
        result.push(candidate);
        if Some(candidate.element) == stop {
            break;
        }
    }
    result
}
