//! Incremental inline adverts for liveblogs.
//!
//! New blocks arrive over time. Each pass searches upwards from the block
//! directly above the top-most advert already placed, inserting adverts
//! after blocks that are far enough apart, until the page holds the maximum
//! number of adverts. Passes never overlap: the update listener is removed
//! when a pass starts and restored when it ends, unless the cap was reached.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{insert_slot, InsertPosition, PlacementContext, SlotInsertion};
use crate::config::LiveblogConfig;
use crate::core::dom::{self, Document, NodeId};
use crate::core::events::{EventSystem, ListenerId};
use crate::detect::{current_breakpoint, Breakpoint};
use crate::slots::ad_sizes::ad_sizes;
use crate::slots::{CreateSlotOptions, Device, SizeMapping, SlotKind};
use crate::spacefinder::{
    self, SpacefinderItem, SpacefinderOptions, SpacefinderPass, SpacefinderRules, SpacefinderWriter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiveblogPhase {
    /// Listening for block updates.
    Idle,
    Searching,
    /// The cap was reached; no listener remains.
    Exhausted,
}

/// Slot name for the `counter`-th advert (zero based).
pub fn slot_name(is_mobile: bool, counter: usize) -> String {
    match (is_mobile, counter) {
        (true, 0) => "top-above-nav".to_string(),
        (true, n) => format!("inline{n}"),
        (false, n) => format!("inline{}", n + 1),
    }
}

fn device_class(is_mobile: bool) -> &'static str {
    if is_mobile {
        "mobile"
    } else {
        "desktop"
    }
}

fn container_selector(is_mobile: bool) -> String {
    format!(".ad-slot-container.ad-slot-{}", device_class(is_mobile))
}

fn outstream_overrides() -> SizeMapping {
    let outstream = vec![ad_sizes::OUTSTREAM_DESKTOP, ad_sizes::OUTSTREAM_GOOGLE_DESKTOP];
    SizeMapping::from([(Device::Phablet, outstream.clone()), (Device::Desktop, outstream)])
}

#[derive(Debug, Default)]
struct ControllerState {
    ad_counter: usize,
    boundary: Option<NodeId>,
    subscription: Option<ListenerId>,
    passes: u64,
}

/// Everything a pass needs to know about the page, read in one batch.
#[derive(Debug, Clone, Copy)]
struct PageSnapshot {
    is_mobile: bool,
    existing: usize,
    boundary: Option<NodeId>,
    boundary_bottom: f64,
    viewport_height: f64,
}

struct Inner {
    ctx: PlacementContext,
    events: Arc<EventSystem>,
    settings: LiveblogConfig,
    state: Mutex<ControllerState>,
    phase: watch::Sender<LiveblogPhase>,
}

/// Handle to the liveblog advert controller for one page load.
#[derive(Clone)]
pub struct LiveblogAdverts {
    inner: Arc<Inner>,
}

impl LiveblogAdverts {
    pub fn new(ctx: PlacementContext, events: Arc<EventSystem>) -> Self {
        let settings = ctx.config.liveblog.clone();
        let (phase, _) = watch::channel(LiveblogPhase::Idle);
        Self {
            inner: Arc::new(Inner {
                ctx,
                events,
                settings,
                state: Mutex::new(ControllerState::default()),
                phase,
            }),
        }
    }

    /// Runs the first pass and starts listening for block updates. Returns
    /// `None` when liveblog adverts are switched off.
    pub async fn init(
        ctx: PlacementContext,
        events: Arc<EventSystem>,
    ) -> crate::Result<Option<Self>> {
        if !ctx.features.is_enabled("liveblogAdverts") {
            debug!("liveblog adverts disabled");
            return Ok(None);
        }
        let controller = Self::new(ctx, events);
        controller.inner.phase.send_replace(LiveblogPhase::Searching);
        if let Err(err) = Inner::run_pass(&controller.inner).await {
            controller.inner.unsubscribe().await;
            return Err(err);
        }
        Ok(Some(controller))
    }

    pub fn phase(&self) -> LiveblogPhase {
        *self.inner.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<LiveblogPhase> {
        self.inner.phase.subscribe()
    }

    /// Resolves once no pass is running.
    pub async fn settled(&self) -> LiveblogPhase {
        let mut phase = self.watch_phase();
        let settled = match phase.wait_for(|p| *p != LiveblogPhase::Searching).await {
            Ok(settled) => *settled,
            Err(_) => self.phase(),
        };
        settled
    }

    pub fn ad_counter(&self) -> usize {
        self.inner.state.lock().ad_counter
    }

    pub fn boundary(&self) -> Option<NodeId> {
        self.inner.state.lock().boundary
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.state.lock().subscription.is_some()
    }

    pub fn passes(&self) -> u64 {
        self.inner.state.lock().passes
    }

    /// Inserts an advert after each of `winners`, in order, until the cap.
    /// Returns how many were inserted.
    pub async fn insert_ads(&self, winners: Vec<SpacefinderItem>) -> crate::Result<usize> {
        let is_mobile = current_breakpoint(self.inner.ctx.document()) == Breakpoint::Mobile;
        self.inner.insert_ads(winners, is_mobile).await
    }
}

impl std::fmt::Debug for LiveblogAdverts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveblogAdverts")
            .field("phase", &self.phase())
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

impl Inner {
    /// One complete pass. The listener is gone for the duration and is put
    /// back afterwards unless the cap has been reached.
    async fn run_pass(self: &Arc<Self>) -> crate::Result<usize> {
        self.unsubscribe().await;

        let result = self.search_and_insert().await;

        let exhausted = {
            let mut state = self.state.lock();
            state.passes += 1;
            state.ad_counter >= self.settings.max_ads
        };
        if exhausted {
            info!(ads = self.settings.max_ads, "liveblog advert limit reached, no longer listening");
            self.phase.send_replace(LiveblogPhase::Exhausted);
        } else {
            self.subscribe().await;
            self.phase.send_replace(LiveblogPhase::Idle);
        }
        result
    }

    async fn unsubscribe(&self) {
        let subscription = self.state.lock().subscription.take();
        if let Some(id) = subscription {
            self.events.remove_listener(id).await;
        }
    }

    async fn subscribe(self: &Arc<Self>) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let id = self
            .events
            .add_listener(&self.settings.update_event, move |_event| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_update();
                }
            })
            .await;
        self.state.lock().subscription = Some(id);
    }

    /// Listener body. Updates that arrive while a pass runs are dropped.
    fn on_update(self: Arc<Self>) {
        let started = self.phase.send_if_modified(|phase| {
            if *phase == LiveblogPhase::Idle {
                *phase = LiveblogPhase::Searching;
                true
            } else {
                false
            }
        });
        if !started {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = self.run_pass().await {
                        warn!(error = %err, "liveblog advert pass failed");
                    }
                });
            }
            Err(_) => {
                warn!("no runtime to run a liveblog advert pass");
                self.phase.send_replace(LiveblogPhase::Idle);
            }
        }
    }

    async fn search_and_insert(&self) -> crate::Result<usize> {
        let snapshot = self.snapshot().await?;

        let counter = {
            let mut state = self.state.lock();
            state.ad_counter = state.ad_counter.max(snapshot.existing);
            state.ad_counter
        };
        if counter >= self.settings.max_ads {
            debug!(counter, "at liveblog advert limit");
            return Ok(0);
        }
        let Some(boundary) = snapshot.boundary else {
            debug!("no content block to start inserting adverts from");
            return Ok(0);
        };

        let rules = gap_rules(&self.settings, boundary, snapshot.boundary_bottom, snapshot.viewport_height)?;
        let writer = LiveblogWriter {
            inner: self,
            is_mobile: snapshot.is_mobile,
        };
        self.ctx
            .filler
            .fill_space(&rules, &writer, SpacefinderOptions::new(SpacefinderPass::Inline1))
            .await?;

        Ok(self.state.lock().ad_counter - counter)
    }

    async fn snapshot(&self) -> crate::Result<PageSnapshot> {
        let document = Arc::clone(self.ctx.document());
        let settings = self.settings.clone();
        let stored = self.state.lock().boundary;
        let snapshot = self
            .ctx
            .prober()
            .measure(move || -> dom::Result<PageSnapshot> {
                let is_mobile = current_breakpoint(&document) == Breakpoint::Mobile;
                let slots = container_selector(is_mobile);
                let boundary = find_boundary(&document, &settings, &slots, stored)?;
                Ok(PageSnapshot {
                    is_mobile,
                    existing: document.query_selector_all(&slots)?.len(),
                    boundary,
                    boundary_bottom: boundary.map_or(0.0, |b| document.bounding_rect(b).bottom),
                    viewport_height: document.client_height(),
                })
            })
            .await??;
        Ok(snapshot)
    }

    async fn insert_ads(&self, winners: Vec<SpacefinderItem>, is_mobile: bool) -> crate::Result<usize> {
        let start = self.state.lock().ad_counter;
        let room = self.settings.max_ads.saturating_sub(start);
        let document = self.ctx.document();

        let insertions = winners
            .iter()
            .filter(|block| document.get_parent(block.element).is_some())
            .take(room)
            .enumerate()
            .map(|(i, block)| {
                let name = slot_name(is_mobile, start + i);
                let classes = if is_mobile {
                    "liveblog-inline--mobile"
                } else {
                    "liveblog-inline"
                };
                let insertion = SlotInsertion {
                    kind: SlotKind::Inline,
                    options: CreateSlotOptions::named(name).with_classes(classes),
                    container_class: Some(format!("ad-slot-container ad-slot-{}", device_class(is_mobile))),
                    position: InsertPosition::After,
                };
                let element = block.element;
                async move {
                    insert_slot(document, self.ctx.prober(), element, insertion)
                        .await
                        .map(|slot| slot.map(|slot| (element, slot)))
                }
            });

        let mut inserted = Vec::new();
        let mut first_error = None;
        for result in join_all(insertions).await {
            match result {
                Ok(Some(pair)) => inserted.push(pair),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "failed to insert liveblog advert");
                    first_error.get_or_insert(err);
                }
            }
        }

        {
            let mut state = self.state.lock();
            state.ad_counter += inserted.len();
            if let Some((block, _)) = inserted.last() {
                state.boundary = Some(*block);
            }
        }
        info!(count = inserted.len(), mobile = is_mobile, "liveblog adverts inserted");

        let overrides = outstream_overrides();
        for (_, slot) in &inserted {
            self.ctx.request_fill(*slot, &overrides).await;
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(inserted.len()),
        }
    }
}

struct LiveblogWriter<'a> {
    inner: &'a Inner,
    is_mobile: bool,
}

#[async_trait]
impl<'a> SpacefinderWriter for LiveblogWriter<'a> {
    async fn write(&self, winners: Vec<SpacefinderItem>) -> crate::Result<()> {
        self.inner.insert_ads(winners, self.is_mobile).await?;
        Ok(())
    }
}

/// Reverse search from `boundary`. A block is kept when its bottom is more
/// than `viewport_height * gap_multiplier` away from the bottom of the
/// previously kept block, or of the boundary block itself for the first one.
fn gap_rules(
    settings: &LiveblogConfig,
    boundary: NodeId,
    boundary_bottom: f64,
    viewport_height: f64,
) -> spacefinder::Result<SpacefinderRules> {
    let min_gap = viewport_height * settings.gap_multiplier;
    SpacefinderRules::builder(&settings.body_selector, &settings.block_selector)
        .from_bottom()
        .start_at(boundary)
        .filter(move |block, previous| {
            let anchor = previous.map_or(boundary_bottom, |kept| kept.bottom);
            (anchor - block.bottom).abs() > min_gap
        })
        .build()
}

/// The block to start the next search from: the remembered boundary while
/// it is still on the page, else the block directly above the top-most
/// advert, else the last block.
fn find_boundary(
    document: &Document,
    settings: &LiveblogConfig,
    slot_selector: &str,
    stored: Option<NodeId>,
) -> dom::Result<Option<NodeId>> {
    if let Some(node) = stored.filter(|node| document.is_connected(*node)) {
        return Ok(Some(node));
    }

    let block_query = format!("{}{}", settings.body_selector, settings.block_selector);
    let top_advert = document.query_selector(&format!("{} > {}", settings.body_selector, slot_selector))?;
    let Some(top_advert) = top_advert else {
        return Ok(document.query_selector_all(&block_query)?.last().copied());
    };

    let mut current = top_advert;
    for _ in 0..settings.boundary_walk_limit {
        let Some(previous) = document.previous_sibling(current) else {
            return Ok(None);
        };
        if document.matches(previous, &block_query)? {
            return Ok(Some(previous));
        }
        current = previous;
    }
    warn!(limit = settings.boundary_walk_limit, "gave up looking for a block above the top advert");
    Ok(None)
}
