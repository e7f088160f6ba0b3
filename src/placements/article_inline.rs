use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use super::{insert_slot, InsertPosition, PlacementContext, SlotInsertion};
use crate::detect::{current_breakpoint, Breakpoint};
use crate::slots::ad_sizes::ad_sizes;
use crate::slots::{CreateSlotOptions, SizeMapping, SlotKind};
use crate::spacefinder::{
    self, SpacefinderItem, SpacefinderOptions, SpacefinderPass, SpacefinderRules, SpacefinderWriter,
};

pub const ARTICLE_BODY_SELECTOR: &str = ".article-body-commercial-selector";

const AD_SLOT_CLEARANCE: f64 = 500.0;
const OFFSET_RIGHT_CLASSES: &str = "offset-right ad-slot--offset-right ad-slot-container--offset-right";

/// Keeps a candidate only when, after room for the tallest ad, it is still
/// far enough below the previous winner.
fn filter_nearby_candidates(
    maximum_ad_height: f64,
) -> impl Fn(&SpacefinderItem, Option<&SpacefinderItem>) -> bool + Send + Sync + 'static {
    move |candidate: &SpacefinderItem, last_winner: Option<&SpacefinderItem>| match last_winner {
        None => true,
        Some(winner) => (candidate.top - winner.top).abs() - maximum_ad_height >= AD_SLOT_CLEARANCE,
    }
}

pub fn mobile_rules() -> spacefinder::Result<SpacefinderRules> {
    SpacefinderRules::builder(ARTICLE_BODY_SELECTOR, " > p")
        .min_above(200.0)
        .min_below(200.0)
        .obstacle(" > h2", 100.0, 250.0)
        .obstacle(" .ad-slot", AD_SLOT_CLEARANCE, AD_SLOT_CLEARANCE)
        .obstacle(" > :not(p):not(h2):not(.ad-slot):not(#sign-in-gate)", 35.0, 200.0)
        .filter(filter_nearby_candidates(f64::from(ad_sizes::MPU.height)))
        .build()
}

pub fn desktop_rules() -> spacefinder::Result<SpacefinderRules> {
    SpacefinderRules::builder(ARTICLE_BODY_SELECTOR, " > p")
        .min_above(1000.0)
        .min_below(300.0)
        .obstacle(" .ad-slot", AD_SLOT_CLEARANCE, AD_SLOT_CLEARANCE)
        .obstacle(" [data-spacefinder-role=\"immersive\"]", 0.0, 600.0)
        .filter(filter_nearby_candidates(f64::from(ad_sizes::HALF_PAGE.height)))
        .build()
}

struct InlineWriter<'a> {
    ctx: &'a PlacementContext,
    desktop: bool,
}

#[async_trait]
impl<'a> SpacefinderWriter for InlineWriter<'a> {
    async fn write(&self, winners: Vec<SpacefinderItem>) -> crate::Result<()> {
        let insertions = winners.iter().enumerate().map(|(i, para)| {
            let mut container_class = "ad-slot-container".to_string();
            if self.desktop && i > 0 {
                container_class.push(' ');
                container_class.push_str(OFFSET_RIGHT_CLASSES);
            }
            insert_slot(
                self.ctx.document(),
                self.ctx.prober(),
                para.element,
                SlotInsertion {
                    kind: SlotKind::Inline,
                    options: CreateSlotOptions::named(format!("inline{}", i + 1)).with_classes("inline"),
                    container_class: Some(container_class),
                    position: InsertPosition::Before,
                },
            )
        });

        let mut slots = Vec::with_capacity(winners.len());
        for inserted in join_all(insertions).await {
            if let Some(slot) = inserted? {
                slots.push(slot);
            }
        }

        info!(count = slots.len(), desktop = self.desktop, "article inline slots inserted");
        for slot in slots {
            self.ctx.request_fill(slot, &SizeMapping::new()).await;
        }
        Ok(())
    }
}

/// Inserts inline slots between the paragraphs of an article body.
pub async fn init_article_inline(ctx: &PlacementContext) -> crate::Result<bool> {
    if !ctx.features.is_enabled("articleBodyAdverts") {
        debug!("article body adverts disabled");
        return Ok(false);
    }

    let desktop = current_breakpoint(ctx.document()) != Breakpoint::Mobile;
    let (rules, pass) = if desktop {
        (desktop_rules()?, SpacefinderPass::Inline1)
    } else {
        (mobile_rules()?, SpacefinderPass::MobileInlines)
    };
    let writer = InlineWriter { ctx, desktop };
    ctx.filler
        .fill_space(&rules, &writer, SpacefinderOptions::new(pass))
        .await
}
