use tracing::{debug, info, warn};

use super::AdServer;
use crate::config::{ContentType, PageConfig};
use crate::core::dom::{Document, NodeId};
use crate::detect::{current_breakpoint, Breakpoint};
use crate::features::FeatureFlags;
use crate::slots::ad_sizes::ad_sizes;
use crate::slots::{Device, SizeMapping, AD_SLOT_ID_PREFIX};

pub const AD_SLOT_SELECTOR: &str = ".js-ad-slot";

/// Extra sizes for server-rendered inline slots on galleries and liveblogs.
pub fn decide_additional_sizes(content_type: ContentType, slot_name: &str) -> SizeMapping {
    if !slot_name.starts_with("inline") {
        return SizeMapping::new();
    }
    match content_type {
        ContentType::Gallery => SizeMapping::from([(
            Device::Desktop,
            vec![ad_sizes::BILLBOARD, crate::slots::AdSize::new(900, 250)],
        )]),
        ContentType::LiveBlog => {
            let outstream = vec![ad_sizes::OUTSTREAM_DESKTOP, ad_sizes::OUTSTREAM_GOOGLE_DESKTOP];
            SizeMapping::from([
                (Device::Phablet, outstream.clone()),
                (Device::Desktop, outstream),
            ])
        }
        _ => SizeMapping::new(),
    }
}

/// Registers the ad slots already present in the page markup. Returns how
/// many were handed to the ad server.
pub async fn fill_static_advert_slots(
    document: &Document,
    server: &dyn AdServer,
    page: &PageConfig,
    features: &dyn FeatureFlags,
) -> crate::Result<usize> {
    if features.is_enabled("adFree") {
        debug!("ad-free page, static slots left empty");
        return Ok(0);
    }

    let skip_top_above_nav =
        page.dotcom_rendering && current_breakpoint(document) == Breakpoint::Mobile;
    let top_above_nav = format!("{AD_SLOT_ID_PREFIX}top-above-nav");

    let slots: Vec<(NodeId, String)> = document
        .query_selector_all(AD_SLOT_SELECTOR)?
        .into_iter()
        .filter_map(|slot| document.get_attribute(slot, "id").map(|id| (slot, id)))
        .filter(|(_, id)| !server.is_registered(id))
        .filter(|(_, id)| !(skip_top_above_nav && *id == top_above_nav))
        .filter(|(slot, _)| document.get_attribute(*slot, "data-dynamic-slot").as_deref() != Some("true"))
        .collect();

    let mut filled = 0;
    for (slot, id) in slots {
        let name = document
            .get_attribute(slot, "data-name")
            .unwrap_or_else(|| id.trim_start_matches(AD_SLOT_ID_PREFIX).to_string());
        let extra = decide_additional_sizes(page.content_type, &name);
        match server.request_fill(slot, &extra).await {
            Ok(()) => filled += 1,
            Err(err) => warn!(slot = %id, error = %err, "could not register static slot"),
        }
    }

    info!(count = filled, "static advert slots registered");
    Ok(filled)
}
