//! Page-load entry point for commercial placements.

use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::config::{CommercialConfig, ContentType};
use crate::core::dom::Document;
use crate::core::events::EventSystem;
use crate::dfp::{fill_static_advert_slots, AdServer};
use crate::fastdom::LayoutProber;
use crate::features::FeatureFlags;
use crate::placements::{init_article_inline, init_carrot, LiveblogAdverts, PlacementContext};
use crate::robust::{catch_errors_with_context, run_safe, ErrorReporter, ModuleFuture, ModuleOutcome, TracingReporter};
use crate::spacefinder::SpaceFiller;

#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub static_slots: usize,
    pub outcomes: Vec<ModuleOutcome>,
    /// Kept alive so the controller keeps listening for block updates.
    pub liveblog: Option<LiveblogAdverts>,
}

impl BootstrapReport {
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| o.name.as_str())
            .collect()
    }
}

pub struct CommercialBootstrap {
    ctx: PlacementContext,
    events: Arc<EventSystem>,
    reporter: Arc<dyn ErrorReporter>,
}

impl CommercialBootstrap {
    pub fn new(
        document: Arc<Document>,
        config: CommercialConfig,
        features: Arc<dyn FeatureFlags>,
        ad_server: Arc<dyn AdServer>,
        events: Arc<EventSystem>,
    ) -> Self {
        let prober = LayoutProber::new(config.prober.frame_source());
        Self {
            ctx: PlacementContext {
                filler: Arc::new(SpaceFiller::new(document, prober)),
                ad_server,
                features,
                config: Arc::new(config),
            },
            events,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn context(&self) -> &PlacementContext {
        &self.ctx
    }

    /// Fills server-rendered slots, then runs the placement modules that
    /// apply to this page concurrently. Module failures are reported and
    /// recorded, never returned.
    pub async fn init(&self) -> BootstrapReport {
        let ctx = &self.ctx;
        if ctx.features.is_enabled("adFree") {
            info!("ad-free page, commercial modules skipped");
            return BootstrapReport::default();
        }

        let static_slots = run_safe(
            "cm-fillStaticAdvertSlots",
            fill_static_advert_slots(ctx.document(), ctx.ad_server.as_ref(), &ctx.config.page, ctx.features.as_ref()),
            self.reporter.as_ref(),
        )
        .await
        .unwrap_or_default();

        let liveblog: Mutex<Option<LiveblogAdverts>> = Mutex::new(None);
        let mut modules: Vec<(String, ModuleFuture<'_>)> = Vec::new();
        match ctx.config.page.content_type {
            ContentType::Article => {
                modules.push((
                    "cm-articleBodyAdverts".to_string(),
                    async move { init_article_inline(ctx).await.map(|_| ()) }.boxed(),
                ));
                modules.push((
                    "cm-carrot".to_string(),
                    async move { init_carrot(ctx).await.map(|_| ()) }.boxed(),
                ));
            }
            ContentType::LiveBlog => {
                let events = Arc::clone(&self.events);
                let liveblog = &liveblog;
                modules.push((
                    "cm-liveblogAdverts".to_string(),
                    async move {
                        let controller = LiveblogAdverts::init(ctx.clone(), events).await?;
                        *liveblog.lock() = controller;
                        Ok(())
                    }
                    .boxed(),
                ));
            }
            _ => {}
        }

        let outcomes = catch_errors_with_context(modules, self.reporter.as_ref()).await;
        info!(
            static_slots,
            modules = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_ok()).count(),
            "commercial bootstrap complete"
        );
        BootstrapReport {
            static_slots,
            outcomes,
            liveblog: liveblog.into_inner(),
        }
    }
}

impl std::fmt::Debug for CommercialBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommercialBootstrap")
            .field("ctx", &self.ctx)
            .finish()
    }
}
