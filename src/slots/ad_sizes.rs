use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid ad size: {0:?}")]
pub struct AdSizeParseError(pub String);

/// Creative dimensions. `0x0` is the fluid size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdSize {
    pub width: u32,
    pub height: u32,
}

impl AdSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_fluid(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

impl fmt::Display for AdSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fluid() {
            f.write_str("fluid")
        } else {
            write!(f, "{},{}", self.width, self.height)
        }
    }
}

impl FromStr for AdSize {
    type Err = AdSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "fluid" {
            return Ok(ad_sizes::FLUID);
        }
        let err = || AdSizeParseError(s.to_string());
        let (w, h) = s.split_once(',').ok_or_else(err)?;
        Ok(AdSize::new(
            w.trim().parse().map_err(|_| err())?,
            h.trim().parse().map_err(|_| err())?,
        ))
    }
}

/// Named sizes from the ad-serving catalogue.
pub mod ad_sizes {
    use super::AdSize;

    pub const OUT_OF_PAGE: AdSize = AdSize::new(1, 1);
    pub const EMPTY: AdSize = AdSize::new(2, 2);
    pub const FLUID: AdSize = AdSize::new(0, 0);
    pub const MPU: AdSize = AdSize::new(300, 250);
    pub const GOOGLE_CARD: AdSize = AdSize::new(300, 274);
    pub const OUTSTREAM_MOBILE: AdSize = AdSize::new(300, 197);
    pub const OUTSTREAM_DESKTOP: AdSize = AdSize::new(620, 350);
    pub const OUTSTREAM_GOOGLE_DESKTOP: AdSize = AdSize::new(550, 310);
    pub const INLINE_MERCHANDISING: AdSize = AdSize::new(88, 85);
    pub const FABRIC: AdSize = AdSize::new(88, 71);
    pub const MERCHANDISING_HIGH: AdSize = AdSize::new(88, 87);
    pub const MERCHANDISING_HIGH_AD_FEATURE: AdSize = AdSize::new(88, 89);
    pub const MOBILE_STICKY: AdSize = AdSize::new(320, 50);
    pub const HALF_PAGE: AdSize = AdSize::new(300, 600);
    pub const BILLBOARD: AdSize = AdSize::new(970, 250);
    pub const LEADERBOARD: AdSize = AdSize::new(728, 90);
}

/// Size-mapping breakpoints, in attribute order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Mobile,
    Phablet,
    Tablet,
    Desktop,
}

impl Device {
    pub const ALL: [Device; 4] = [Device::Mobile, Device::Phablet, Device::Tablet, Device::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Mobile => "mobile",
            Device::Phablet => "phablet",
            Device::Tablet => "tablet",
            Device::Desktop => "desktop",
        }
    }

    pub fn data_attribute(&self) -> String {
        format!("data-{}", self.as_str())
    }
}

pub type SizeMapping = BTreeMap<Device, Vec<AdSize>>;

pub fn format_sizes(sizes: &[AdSize]) -> String {
    sizes
        .iter()
        .map(AdSize::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

pub fn parse_sizes(value: &str) -> Result<Vec<AdSize>, AdSizeParseError> {
    value
        .split('|')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Appends `extra` sizes to every device that already has a mapping.
pub fn concat_size_mappings(defaults: &SizeMapping, extra: &SizeMapping) -> SizeMapping {
    let mut merged = defaults.clone();
    for (device, sizes) in extra {
        if let Some(existing) = merged.get_mut(device) {
            existing.extend(sizes.iter().copied());
        }
    }
    merged
}
