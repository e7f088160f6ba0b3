//! Page-level configuration, deserialised from JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::css::Selector;
use crate::fastdom::FrameSource;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    Article,
    LiveBlog,
    Gallery,
    Interactive,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageConfig {
    pub content_type: ContentType,
    pub dotcom_rendering: bool,
    pub has_show_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveblogConfig {
    pub max_ads: usize,
    /// Multiple of the viewport height required between kept blocks.
    pub gap_multiplier: f64,
    pub body_selector: String,
    pub block_selector: String,
    pub update_event: String,
    /// Upper bound on sibling steps when recovering the boundary block.
    pub boundary_walk_limit: usize,
}

impl Default for LiveblogConfig {
    fn default() -> Self {
        Self {
            max_ads: 8,
            gap_multiplier: 1.5,
            body_selector: ".js-liveblog-body".to_string(),
            block_selector: " > .block".to_string(),
            update_event: "liveblog:blocks-updated".to_string(),
            boundary_walk_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameSourceKind {
    #[default]
    Microtask,
    Interval,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProberConfig {
    pub frame_source: FrameSourceKind,
    pub interval_ms: u64,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            frame_source: FrameSourceKind::Microtask,
            interval_ms: 16,
        }
    }
}

impl ProberConfig {
    pub fn frame_source(&self) -> FrameSource {
        match self.frame_source {
            FrameSourceKind::Microtask => FrameSource::Microtask,
            FrameSourceKind::Interval => FrameSource::Interval(Duration::from_millis(self.interval_ms)),
            FrameSourceKind::Manual => FrameSource::Manual,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommercialConfig {
    pub page: PageConfig,
    pub liveblog: LiveblogConfig,
    pub prober: ProberConfig,
}

impl CommercialConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let liveblog = &self.liveblog;
        if liveblog.max_ads == 0 {
            return Err(ConfigError::Invalid {
                field: "liveblog.maxAds",
                message: "must be at least 1".to_string(),
            });
        }
        if !liveblog.gap_multiplier.is_finite() || liveblog.gap_multiplier < 0.0 {
            return Err(ConfigError::Invalid {
                field: "liveblog.gapMultiplier",
                message: format!("must be a finite, non-negative number (got {})", liveblog.gap_multiplier),
            });
        }
        for (field, value) in [
            ("liveblog.bodySelector", &liveblog.body_selector),
            ("liveblog.blockSelector", &liveblog.block_selector),
            ("liveblog.updateEvent", &liveblog.update_event),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    message: "must not be empty".to_string(),
                });
            }
        }
        for (field, selector) in [
            ("liveblog.bodySelector", liveblog.body_selector.clone()),
            (
                "liveblog.blockSelector",
                format!("{}{}", liveblog.body_selector, liveblog.block_selector),
            ),
        ] {
            Selector::parse(&selector).map_err(|err| ConfigError::Invalid {
                field,
                message: err.to_string(),
            })?;
        }
        if liveblog.boundary_walk_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "liveblog.boundaryWalkLimit",
                message: "must be at least 1".to_string(),
            });
        }
        if self.prober.frame_source == FrameSourceKind::Interval && self.prober.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "prober.intervalMs",
                message: "must be at least 1 for the interval frame source".to_string(),
            });
        }
        Ok(())
    }
}
