//! Feature-flag collaborator.

use serde::{Deserialize, Serialize};

/// Synchronous feature lookup by camelCase name, e.g. `liveblogAdverts`.
pub trait FeatureFlags: Send + Sync {
    fn is_enabled(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommercialFeatures {
    pub ad_free: bool,
    pub article_body_adverts: bool,
    pub carrot_traffic_driver: bool,
    pub liveblog_adverts: bool,
    pub should_load_googletag: bool,
}

impl Default for CommercialFeatures {
    fn default() -> Self {
        Self {
            ad_free: false,
            article_body_adverts: true,
            carrot_traffic_driver: true,
            liveblog_adverts: true,
            should_load_googletag: true,
        }
    }
}

impl CommercialFeatures {
    pub fn ad_free() -> Self {
        Self {
            ad_free: true,
            article_body_adverts: false,
            carrot_traffic_driver: false,
            liveblog_adverts: false,
            should_load_googletag: false,
        }
    }
}

impl FeatureFlags for CommercialFeatures {
    fn is_enabled(&self, name: &str) -> bool {
        match name {
            "adFree" => self.ad_free,
            "articleBodyAdverts" => self.article_body_adverts,
            "carrotTrafficDriver" => self.carrot_traffic_driver,
            "liveblogAdverts" => self.liveblog_adverts,
            "shouldLoadGoogletag" => self.should_load_googletag,
            _ => false,
        }
    }
}
