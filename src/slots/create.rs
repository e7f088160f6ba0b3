use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ad_sizes::{ad_sizes, concat_size_mappings, format_sizes, Device, SizeMapping};
use crate::core::dom::{self, Document, NodeId};

pub const AD_SLOT_ID_PREFIX: &str = "dfp-ad--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotKind {
    Im,
    HighMerch,
    HighMerchLucky,
    HighMerchPaid,
    Inline,
    Mostpop,
    Comments,
    TopAboveNav,
    Carrot,
    Epic,
    MobileSticky,
}

#[derive(Debug, Clone)]
struct SlotConfig {
    size_mappings: SizeMapping,
    label: Option<bool>,
    refresh: Option<bool>,
    name: Option<&'static str>,
}

impl SlotConfig {
    fn sizes(size_mappings: SizeMapping) -> Self {
        Self {
            size_mappings,
            label: None,
            refresh: None,
            name: None,
        }
    }

    fn unlabelled(name: Option<&'static str>, mobile: Vec<super::AdSize>) -> Self {
        Self {
            size_mappings: SizeMapping::from([(Device::Mobile, mobile)]),
            label: Some(false),
            refresh: Some(false),
            name,
        }
    }
}

fn common_size_mappings() -> SizeMapping {
    use ad_sizes::*;
    SizeMapping::from([
        (
            Device::Mobile,
            vec![OUT_OF_PAGE, EMPTY, OUTSTREAM_MOBILE, MPU, GOOGLE_CARD, FLUID],
        ),
        (
            Device::Phablet,
            vec![OUT_OF_PAGE, EMPTY, OUTSTREAM_MOBILE, MPU, GOOGLE_CARD, FLUID],
        ),
        (Device::Desktop, vec![OUT_OF_PAGE, EMPTY, MPU, GOOGLE_CARD, FLUID]),
    ])
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Im => "im",
            SlotKind::HighMerch => "high-merch",
            SlotKind::HighMerchLucky => "high-merch-lucky",
            SlotKind::HighMerchPaid => "high-merch-paid",
            SlotKind::Inline => "inline",
            SlotKind::Mostpop => "mostpop",
            SlotKind::Comments => "comments",
            SlotKind::TopAboveNav => "top-above-nav",
            SlotKind::Carrot => "carrot",
            SlotKind::Epic => "epic",
            SlotKind::MobileSticky => "mobile-sticky",
        }
    }

    fn config(&self) -> SlotConfig {
        use ad_sizes::*;
        match self {
            SlotKind::Im => {
                SlotConfig::unlabelled(None, vec![OUT_OF_PAGE, EMPTY, INLINE_MERCHANDISING, FLUID])
            }
            SlotKind::HighMerch => SlotConfig::unlabelled(
                Some("merchandising-high"),
                vec![OUT_OF_PAGE, EMPTY, MERCHANDISING_HIGH, FLUID],
            ),
            SlotKind::HighMerchLucky => SlotConfig::unlabelled(
                Some("merchandising-high-lucky"),
                vec![OUT_OF_PAGE, EMPTY, FLUID],
            ),
            SlotKind::HighMerchPaid => SlotConfig::unlabelled(
                Some("merchandising-high"),
                vec![OUT_OF_PAGE, EMPTY, MERCHANDISING_HIGH_AD_FEATURE, FLUID],
            ),
            SlotKind::Inline | SlotKind::Mostpop | SlotKind::Comments => {
                SlotConfig::sizes(common_size_mappings())
            }
            SlotKind::TopAboveNav => SlotConfig::sizes(SizeMapping::from([(
                Device::Mobile,
                vec![OUT_OF_PAGE, EMPTY, FABRIC, OUTSTREAM_MOBILE, MPU, FLUID],
            )])),
            SlotKind::Carrot => SlotConfig::unlabelled(Some("carrot"), vec![FLUID]),
            SlotKind::Epic => SlotConfig::unlabelled(Some("epic"), vec![FLUID]),
            SlotKind::MobileSticky => SlotConfig {
                size_mappings: SizeMapping::from([(Device::Mobile, vec![MOBILE_STICKY])]),
                label: Some(true),
                refresh: Some(true),
                name: Some("mobile-sticky"),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateSlotOptions {
    pub name: Option<String>,
    /// Space separated; each becomes an `ad-slot--{class}` class.
    pub classes: Option<String>,
    pub sizes: Option<SizeMapping>,
    /// Dotcom-rendered pages may already carry a server-rendered
    /// `top-above-nav` slot, which is replaced.
    pub dotcom_rendering: bool,
}

impl CreateSlotOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_classes(mut self, classes: impl Into<String>) -> Self {
        self.classes = Some(classes.into());
        self
    }

    pub fn with_sizes(mut self, sizes: SizeMapping) -> Self {
        self.sizes = Some(sizes);
        self
    }
}

/// Builds a detached ad slot element for `kind`.
pub fn create_ad_slot(
    document: &Document,
    kind: SlotKind,
    options: &CreateSlotOptions,
) -> dom::Result<NodeId> {
    let config = kind.config();
    let name = options
        .name
        .clone()
        .or_else(|| config.name.map(str::to_string))
        .unwrap_or_else(|| kind.as_str().to_string());
    let id = format!("{AD_SLOT_ID_PREFIX}{name}");

    if options.dotcom_rendering && name == SlotKind::TopAboveNav.as_str() {
        if let Some(existing) = document.get_element_by_id(&id) {
            if let Some(parent) = document.get_parent(existing) {
                warn!(slot = %id, "removing existing slot before recreating it");
                document.remove_child(parent, existing)?;
            }
        }
    }

    let size_mappings = match &options.sizes {
        Some(extra) => concat_size_mappings(&config.size_mappings, extra),
        None => config.size_mappings,
    };

    let classes: Vec<String> = options
        .classes
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .chain(std::iter::once(name.as_str()))
        .map(|c| format!("ad-slot--{c}"))
        .collect();

    let slot = document.create_element("div");
    document.set_attribute(slot, "id", &id)?;
    document.set_attribute(slot, "class", &format!("js-ad-slot ad-slot {}", classes.join(" ")))?;
    document.set_attribute(slot, "data-link-name", &format!("ad slot {name}"))?;
    document.set_attribute(slot, "data-name", &name)?;
    document.set_attribute(slot, "aria-hidden", "true")?;
    for (device, sizes) in &size_mappings {
        document.set_attribute(slot, &device.data_attribute(), &format_sizes(sizes))?;
    }
    if config.label == Some(false) {
        document.set_attribute(slot, "data-label", "false")?;
    }
    if config.refresh == Some(false) {
        document.set_attribute(slot, "data-refresh", "false")?;
    }

    Ok(slot)
}
