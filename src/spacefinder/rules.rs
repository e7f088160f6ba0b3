use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::{Result, SpacefinderError, SpacefinderItem};
use crate::core::css::Selector;
use crate::core::dom::NodeId;

/// Clearance an obstacle demands around any candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleRule {
    pub min_above: f64,
    pub min_below: f64,
}

impl ObstacleRule {
    pub fn new(min_above: f64, min_below: f64) -> Self {
        Self {
            min_above,
            min_below,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchDirection {
    #[default]
    Forward,
    Reverse,
}

/// `(candidate, previous winner) -> keep?`
pub type CandidateFilter =
    Arc<dyn Fn(&SpacefinderItem, Option<&SpacefinderItem>) -> bool + Send + Sync>;

/// Validated search configuration. Construct through [`SpacefinderRules::builder`].
#[derive(Clone)]
pub struct SpacefinderRules {
    pub body_selector: String,
    pub candidate_selector: String,
    pub min_above: f64,
    pub min_below: f64,
    pub absolute_min_from_start: f64,
    /// Obstacle selectors are appended to the body selector, like candidates.
    pub obstacles: Vec<(String, ObstacleRule)>,
    pub direction: SearchDirection,
    pub start_at: Option<NodeId>,
    pub stop_at: Option<NodeId>,
    pub filter: Option<CandidateFilter>,
}

impl SpacefinderRules {
    pub fn builder(
        body_selector: impl Into<String>,
        candidate_selector: impl Into<String>,
    ) -> SpacefinderRulesBuilder {
        SpacefinderRulesBuilder {
            rules: SpacefinderRules {
                body_selector: body_selector.into(),
                candidate_selector: candidate_selector.into(),
                min_above: 0.0,
                min_below: 0.0,
                absolute_min_from_start: 0.0,
                obstacles: Vec::new(),
                direction: SearchDirection::Forward,
                start_at: None,
                stop_at: None,
                filter: None,
            },
        }
    }

    pub fn candidate_query(&self) -> String {
        format!("{}{}", self.body_selector, self.candidate_selector)
    }

    pub fn obstacle_query(&self, selector: &str) -> String {
        format!("{}{}", self.body_selector, selector)
    }

    /// Copy of these rules with a different obstacle set; other fields kept.
    pub fn with_obstacles(&self, obstacles: Vec<(String, ObstacleRule)>) -> Result<Self> {
        let mut builder = SpacefinderRulesBuilder {
            rules: Self {
                obstacles: Vec::new(),
                ..self.clone()
            },
        };
        for (selector, rule) in obstacles {
            builder = builder.obstacle(selector, rule.min_above, rule.min_below);
        }
        builder.build()
    }
}

impl fmt::Debug for SpacefinderRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpacefinderRules")
            .field("body_selector", &self.body_selector)
            .field("candidate_selector", &self.candidate_selector)
            .field("min_above", &self.min_above)
            .field("min_below", &self.min_below)
            .field("absolute_min_from_start", &self.absolute_min_from_start)
            .field("obstacles", &self.obstacles)
            .field("direction", &self.direction)
            .field("start_at", &self.start_at)
            .field("stop_at", &self.stop_at)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[must_use]
pub struct SpacefinderRulesBuilder {
    rules: SpacefinderRules,
}

impl SpacefinderRulesBuilder {
    pub fn min_above(mut self, px: f64) -> Self {
        self.rules.min_above = px;
        self
    }

    pub fn min_below(mut self, px: f64) -> Self {
        self.rules.min_below = px;
        self
    }

    pub fn absolute_min_from_start(mut self, px: f64) -> Self {
        self.rules.absolute_min_from_start = px;
        self
    }

    /// Adds or replaces the rule for `selector`.
    pub fn obstacle(mut self, selector: impl Into<String>, min_above: f64, min_below: f64) -> Self {
        let selector = selector.into();
        let rule = ObstacleRule::new(min_above, min_below);
        match self.rules.obstacles.iter_mut().find(|(s, _)| *s == selector) {
            Some(existing) => existing.1 = rule,
            None => self.rules.obstacles.push((selector, rule)),
        }
        self
    }

    pub fn direction(mut self, direction: SearchDirection) -> Self {
        self.rules.direction = direction;
        self
    }

    pub fn from_bottom(self) -> Self {
        self.direction(SearchDirection::Reverse)
    }

    pub fn start_at(mut self, node: NodeId) -> Self {
        self.rules.start_at = Some(node);
        self
    }

    pub fn stop_at(mut self, node: NodeId) -> Self {
        self.rules.stop_at = Some(node);
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&SpacefinderItem, Option<&SpacefinderItem>) -> bool + Send + Sync + 'static,
    {
        self.rules.filter = Some(Arc::new(filter));
        self
    }

    pub fn build(self) -> Result<SpacefinderRules> {
        let rules = self.rules;

        if rules.body_selector.trim().is_empty() {
            return Err(SpacefinderError::InvalidRules(
                "body selector is empty".to_string(),
            ));
        }
        if rules.candidate_selector.trim().is_empty() {
            return Err(SpacefinderError::InvalidRules(
                "candidate selector is empty".to_string(),
            ));
        }

        let clearances = [
            ("minAbove", rules.min_above),
            ("minBelow", rules.min_below),
            ("absoluteMinFromStart", rules.absolute_min_from_start),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .chain(rules.obstacles.iter().flat_map(|(selector, rule)| {
            [
                (format!("{selector} minAbove"), rule.min_above),
                (format!("{selector} minBelow"), rule.min_below),
            ]
        }));
        for (name, value) in clearances {
            if !value.is_finite() || value < 0.0 {
                return Err(SpacefinderError::InvalidRules(format!(
                    "{name} must be a finite, non-negative number of pixels (got {value})"
                )));
            }
        }

        Selector::parse(&rules.body_selector)?;
        Selector::parse(&rules.candidate_query())?;
        for (selector, _) in &rules.obstacles {
            Selector::parse(&rules.obstacle_query(selector))?;
        }

        Ok(rules)
    }
}
