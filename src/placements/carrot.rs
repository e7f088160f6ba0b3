use async_trait::async_trait;
use tracing::{debug, info};

use super::{insert_slot, InsertPosition, PlacementContext, SlotInsertion};
use super::article_inline::ARTICLE_BODY_SELECTOR;
use crate::detect::{current_tweakpoint, Tweakpoint};
use crate::slots::{CreateSlotOptions, SizeMapping, SlotKind};
use crate::spacefinder::{
    self, ObstacleRule, SpacefinderItem, SpacefinderOptions, SpacefinderPass, SpacefinderRules, SpacefinderWriter,
};

/// Rules for left-col and wide layouts, where the right column is free.
pub fn wide_rules() -> spacefinder::Result<SpacefinderRules> {
    SpacefinderRules::builder(ARTICLE_BODY_SELECTOR, " > p")
        .min_above(500.0)
        .min_below(400.0)
        .obstacle(" .element-rich-link", 100.0, 400.0)
        .obstacle(" .element-image", 440.0, 440.0)
        .obstacle(" .player", 50.0, 50.0)
        .obstacle(" > h1", 50.0, 50.0)
        .obstacle(" > h2", 50.0, 50.0)
        .obstacle(" > *:not(p):not(h2):not(blockquote):not(#sign-in-gate)", 50.0, 50.0)
        .obstacle(" .ad-slot", 100.0, 100.0)
        .obstacle(" .element-pullquote", 400.0, 400.0)
        // newsletter sign-ups
        .obstacle(" > figure[data-spacefinder-role=\"inline\"]", 400.0, 400.0)
        .from_bottom()
        .build()
}

/// Anything narrower than left-col shares its column with inline adverts.
pub fn desktop_rules() -> spacefinder::Result<SpacefinderRules> {
    let wide = wide_rules()?;
    let obstacles = wide
        .obstacles
        .iter()
        .cloned()
        .chain(
            [" .element-rich-link", " .ad-slot", " .ad-slot--im"]
                .into_iter()
                .map(|selector| (selector.to_string(), ObstacleRule::new(400.0, 400.0))),
        )
        .collect();
    wide.with_obstacles(obstacles)
}

pub fn rules_for(tweakpoint: Tweakpoint) -> spacefinder::Result<SpacefinderRules> {
    match tweakpoint {
        Tweakpoint::LeftCol | Tweakpoint::Wide => wide_rules(),
        _ => desktop_rules(),
    }
}

struct CarrotWriter<'a> {
    ctx: &'a PlacementContext,
}

#[async_trait]
impl<'a> SpacefinderWriter for CarrotWriter<'a> {
    /// The carrot goes above the second paragraph found from the bottom.
    async fn write(&self, winners: Vec<SpacefinderItem>) -> crate::Result<()> {
        let Some(anchor) = winners.get(1) else {
            debug!(winners = winners.len(), "not enough space for a carrot");
            return Ok(());
        };
        let inserted = insert_slot(
            self.ctx.document(),
            self.ctx.prober(),
            anchor.element,
            SlotInsertion {
                kind: SlotKind::Carrot,
                options: CreateSlotOptions::default(),
                container_class: None,
                position: InsertPosition::Before,
            },
        )
        .await?;
        if let Some(slot) = inserted {
            info!(anchor = %anchor.element, "carrot slot inserted");
            self.ctx.request_fill(slot, &SizeMapping::new()).await;
        }
        Ok(())
    }
}

/// Places a single traffic-driver slot towards the end of an article.
pub async fn init_carrot(ctx: &PlacementContext) -> crate::Result<bool> {
    if !ctx.features.is_enabled("carrotTrafficDriver") {
        debug!("carrot traffic driver disabled");
        return Ok(false);
    }
    let rules = rules_for(current_tweakpoint(ctx.document()))?;
    ctx.filler
        .fill_space(
            &rules,
            &CarrotWriter { ctx },
            SpacefinderOptions::new(SpacefinderPass::Carrot),
        )
        .await
}
