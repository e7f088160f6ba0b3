use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::rules::SpacefinderRules;
use super::{find_space, SpacefinderItem, SpacefinderOptions, SpacefinderReport};
use crate::core::dom::Document;
use crate::fastdom::LayoutProber;

/// Receives the winners of a pass and turns them into slots.
#[async_trait]
pub trait SpacefinderWriter: Send + Sync {
    async fn write(&self, winners: Vec<SpacefinderItem>) -> crate::Result<()>;
}

/// Runs search-and-write passes one at a time, in request order, so one
/// pass never measures a page another pass is still writing to.
pub struct SpaceFiller {
    document: Arc<Document>,
    prober: LayoutProber,
    queue: Mutex<Option<SpacefinderReport>>,
}

impl SpaceFiller {
    pub fn new(document: Arc<Document>, prober: LayoutProber) -> Self {
        Self {
            document,
            prober,
            queue: Mutex::new(None),
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn prober(&self) -> &LayoutProber {
        &self.prober
    }

    /// Returns `Ok(false)` when no space was found (no body, or no winners)
    /// and `Ok(true)` once the writer has run. Writer failures propagate.
    pub async fn fill_space(
        &self,
        rules: &SpacefinderRules,
        writer: &dyn SpacefinderWriter,
        options: SpacefinderOptions,
    ) -> crate::Result<bool> {
        let mut last_report = self.queue.lock().await;

        let report = find_space(Arc::clone(&self.document), &self.prober, rules, options).await?;
        let winners = report.winners.clone();
        *last_report = Some(report);

        if winners.is_empty() {
            debug!(pass = %options.pass, "no space found");
            return Ok(false);
        }

        info!(pass = %options.pass, winners = winners.len(), "writing into found space");
        writer.write(winners).await?;
        Ok(true)
    }

    /// Report of the most recently completed search.
    pub async fn last_report(&self) -> Option<SpacefinderReport> {
        self.queue.lock().await.clone()
    }
}

impl std::fmt::Debug for SpaceFiller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceFiller")
            .field("prober", &self.prober)
            .finish()
    }
}
