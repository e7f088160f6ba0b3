//! Viewport breakpoints.

use serde::{Deserialize, Serialize};

use crate::core::dom::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Breakpoint {
    Mobile,
    Tablet,
    Desktop,
}

impl Breakpoint {
    pub fn from_width(width: f64) -> Self {
        if width >= 980.0 {
            Breakpoint::Desktop
        } else if width >= 740.0 {
            Breakpoint::Tablet
        } else {
            Breakpoint::Mobile
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Breakpoint::Mobile => "mobile",
            Breakpoint::Tablet => "tablet",
            Breakpoint::Desktop => "desktop",
        }
    }
}

/// Finer-grained layout steps; each variant is the minimum width it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tweakpoint {
    Mobile,
    MobileMedium,
    MobileLandscape,
    Phablet,
    Tablet,
    Desktop,
    LeftCol,
    Wide,
}

impl Tweakpoint {
    const STEPS: [(f64, Tweakpoint); 7] = [
        (1300.0, Tweakpoint::Wide),
        (1140.0, Tweakpoint::LeftCol),
        (980.0, Tweakpoint::Desktop),
        (740.0, Tweakpoint::Tablet),
        (660.0, Tweakpoint::Phablet),
        (480.0, Tweakpoint::MobileLandscape),
        (375.0, Tweakpoint::MobileMedium),
    ];

    pub fn from_width(width: f64) -> Self {
        Self::STEPS
            .iter()
            .find(|(min, _)| width >= *min)
            .map_or(Tweakpoint::Mobile, |(_, tweakpoint)| *tweakpoint)
    }
}

pub fn current_breakpoint(document: &Document) -> Breakpoint {
    Breakpoint::from_width(document.viewport().width)
}

pub fn current_tweakpoint(document: &Document) -> Tweakpoint {
    Tweakpoint::from_width(document.viewport().width)
}
