use ad_spacefinder::dfp::{AdServer, AdvertQueue, FillError};
use ad_spacefinder::placements::PlacementContext;
use ad_spacefinder::slots::SizeMapping;
use ad_spacefinder::{
    CommercialConfig, CommercialFeatures, CustomEvent, Document, EventSystem, FrameSource,
    LayoutProber, LiveblogAdverts, LiveblogPhase, NodeId, SpaceFiller, SpacefinderItem, Viewport,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const UPDATE: &str = "liveblog:blocks-updated";

struct Page {
    doc: Arc<Document>,
    body: NodeId,
    blocks: Vec<NodeId>,
}

fn liveblog_page(width: f64, blocks: usize, block_height: f64) -> Page {
    let doc = Arc::new(Document::with_viewport(Viewport::new(width, 900.0)));
    let body = doc.create_element("div");
    doc.set_attribute(body, "class", "js-liveblog-body").unwrap();
    doc.append_child(doc.body(), body).unwrap();
    let blocks = (0..blocks)
        .map(|_| {
            let block = doc.create_element("article");
            doc.set_attribute(block, "class", "block").unwrap();
            doc.set_intrinsic_height(block, block_height).unwrap();
            doc.append_child(body, block).unwrap();
            block
        })
        .collect();
    Page { doc, body, blocks }
}

fn prepend_blocks(page: &Page, count: usize, height: f64) -> Vec<NodeId> {
    let mut added = Vec::new();
    for _ in 0..count {
        let block = page.doc.create_element("article");
        page.doc.set_attribute(block, "class", "block").unwrap();
        page.doc.set_intrinsic_height(block, height).unwrap();
        let first = page.doc.get_children(page.body).first().copied();
        page.doc.insert_before(page.body, block, first).unwrap();
        added.push(block);
    }
    added.reverse();
    added
}

fn context(doc: &Arc<Document>, server: Arc<dyn AdServer>, config: CommercialConfig) -> PlacementContext {
    PlacementContext {
        filler: Arc::new(SpaceFiller::new(
            Arc::clone(doc),
            LayoutProber::new(FrameSource::Microtask),
        )),
        ad_server: server,
        features: Arc::new(CommercialFeatures::default()),
        config: Arc::new(config),
    }
}

fn item(doc: &Document, element: NodeId) -> SpacefinderItem {
    SpacefinderItem::from_rect(element, &doc.bounding_rect(element))
}

fn ad_names(doc: &Document, body: NodeId) -> Vec<String> {
    doc.get_children(body)
        .into_iter()
        .filter(|child| doc.has_class(*child, "ad-slot-container"))
        .filter_map(|container| doc.first_element_child(container))
        .filter_map(|slot| doc.get_attribute(slot, "data-name"))
        .collect()
}

struct RejectingServer;

#[async_trait]
impl AdServer for RejectingServer {
    async fn request_fill(&self, _slot: NodeId, _overrides: &SizeMapping) -> Result<(), FillError> {
        Err(FillError::Rejected {
            slot: "any".to_string(),
            reason: "no demand".to_string(),
        })
    }

    fn is_registered(&self, _slot_id: &str) -> bool {
        false
    }
}

#[tokio::test]
async fn test_writer_inserts_after_each_supplied_block() {
    let page = liveblog_page(1300.0, 12, 200.0);
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let controller = LiveblogAdverts::new(
        context(&page.doc, queue.clone(), CommercialConfig::default()),
        Arc::new(EventSystem::new()),
    );

    let winners = vec![item(&page.doc, page.blocks[0]), item(&page.doc, page.blocks[11])];
    let inserted = controller.insert_ads(winners).await.unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(page.doc.get_children(page.body).len(), 14);
    assert_eq!(ad_names(&page.doc, page.body), vec!["inline1", "inline2"]);

    let first = page.doc.next_sibling(page.blocks[0]).unwrap();
    let second = page.doc.next_sibling(page.blocks[11]).unwrap();
    assert_eq!(
        page.doc.get_attribute(first, "class").as_deref(),
        Some("ad-slot-container ad-slot-desktop")
    );
    assert!(page.doc.has_class(second, "ad-slot-desktop"));
    assert_eq!(controller.ad_counter(), 2);
    assert_eq!(controller.boundary(), Some(page.blocks[11]));

    let inline1 = queue.advert("dfp-ad--inline1").unwrap();
    assert!(inline1.sizes[&ad_spacefinder::slots::Device::Desktop]
        .contains(&ad_spacefinder::slots::ad_sizes::ad_sizes::OUTSTREAM_DESKTOP));
    assert_eq!(queue.len(), 2);
}

#[tokio::test]
async fn test_mobile_slots_start_with_top_above_nav() {
    let page = liveblog_page(375.0, 4, 200.0);
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let controller = LiveblogAdverts::new(
        context(&page.doc, queue, CommercialConfig::default()),
        Arc::new(EventSystem::new()),
    );

    let winners = page.blocks.iter().take(2).map(|b| item(&page.doc, *b)).collect();
    controller.insert_ads(winners).await.unwrap();

    assert_eq!(ad_names(&page.doc, page.body), vec!["top-above-nav", "inline1"]);
    let slot = page.doc.get_element_by_id("dfp-ad--top-above-nav").unwrap();
    assert!(page.doc.has_class(slot, "ad-slot--liveblog-inline--mobile"));
    let container = page.doc.get_parent(slot).unwrap();
    assert!(page.doc.has_class(container, "ad-slot-mobile"));
}

#[tokio::test]
async fn test_fill_failures_still_count_inserted_slots() {
    let page = liveblog_page(1300.0, 3, 200.0);
    let controller = LiveblogAdverts::new(
        context(&page.doc, Arc::new(RejectingServer), CommercialConfig::default()),
        Arc::new(EventSystem::new()),
    );
    let inserted = controller
        .insert_ads(vec![item(&page.doc, page.blocks[1])])
        .await
        .unwrap();
    assert_eq!(inserted, 1);
    assert_eq!(controller.ad_counter(), 1);
}

#[tokio::test]
async fn test_initial_pass_then_incremental_pass() {
    let page = liveblog_page(1300.0, 12, 500.0);
    let events = Arc::new(EventSystem::new());
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let controller = LiveblogAdverts::init(
        context(&page.doc, queue.clone(), CommercialConfig::default()),
        Arc::clone(&events),
    )
    .await
    .unwrap()
    .unwrap();

    // 900px viewport: kept blocks must be more than 1350px apart, bottom to bottom.
    assert_eq!(controller.ad_counter(), 3);
    assert_eq!(ad_names(&page.doc, page.body), vec!["inline3", "inline2", "inline1"]);
    assert_eq!(page.doc.next_sibling(page.blocks[8]).map(|n| page.doc.has_class(n, "ad-slot-container")), Some(true));
    assert_eq!(controller.boundary(), Some(page.blocks[2]));
    assert_eq!(controller.phase(), LiveblogPhase::Idle);
    assert!(controller.is_subscribed());
    assert_eq!(events.listener_count(UPDATE).await, 1);

    let fresh = prepend_blocks(&page, 6, 500.0);
    assert_eq!(events.dispatch(CustomEvent::new(UPDATE)).await, 1);
    assert_eq!(controller.settled().await, LiveblogPhase::Idle);

    assert_eq!(controller.ad_counter(), 5);
    assert_eq!(controller.boundary(), Some(fresh[2]));
    assert_eq!(
        ad_names(&page.doc, page.body),
        vec!["inline5", "inline4", "inline3", "inline2", "inline1"]
    );
    assert_eq!(queue.len(), 5);
    assert_eq!(controller.passes(), 2);
}

#[tokio::test]
async fn test_updates_during_a_pass_are_dropped() {
    let page = liveblog_page(1300.0, 12, 500.0);
    let events = Arc::new(EventSystem::new());
    let controller = LiveblogAdverts::init(
        context(
            &page.doc,
            Arc::new(AdvertQueue::new(Arc::clone(&page.doc))),
            CommercialConfig::default(),
        ),
        Arc::clone(&events),
    )
    .await
    .unwrap()
    .unwrap();

    prepend_blocks(&page, 6, 500.0);
    events.dispatch(CustomEvent::new(UPDATE)).await;
    assert_eq!(controller.phase(), LiveblogPhase::Searching);
    events.dispatch(CustomEvent::new(UPDATE)).await;
    controller.settled().await;

    assert_eq!(controller.passes(), 2);
    assert_eq!(controller.ad_counter(), 5);
}

#[tokio::test]
async fn test_cap_is_never_exceeded_and_listener_stays_removed() {
    let page = liveblog_page(1300.0, 12, 500.0);
    let events = Arc::new(EventSystem::new());
    let mut config = CommercialConfig::default();
    config.liveblog.max_ads = 4;
    let controller = LiveblogAdverts::init(
        context(&page.doc, Arc::new(AdvertQueue::new(Arc::clone(&page.doc))), config),
        Arc::clone(&events),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(controller.ad_counter(), 3);

    prepend_blocks(&page, 6, 500.0);
    events.dispatch(CustomEvent::new(UPDATE)).await;
    assert_eq!(controller.settled().await, LiveblogPhase::Exhausted);
    assert_eq!(controller.ad_counter(), 4);
    assert!(!controller.is_subscribed());
    assert_eq!(events.listener_count(UPDATE).await, 0);

    prepend_blocks(&page, 6, 500.0);
    assert_eq!(events.dispatch(CustomEvent::new(UPDATE)).await, 0);
    assert_eq!(ad_names(&page.doc, page.body).len(), 4);
    assert_eq!(controller.phase(), LiveblogPhase::Exhausted);
}

#[tokio::test]
async fn test_existing_containers_count_towards_the_cap() {
    let page = liveblog_page(1300.0, 10, 500.0);
    for block in &page.blocks[..8] {
        let container = page.doc.create_element("div");
        page.doc
            .set_attribute(container, "class", "ad-slot-container ad-slot-desktop")
            .unwrap();
        page.doc.insert_after(*block, container).unwrap();
    }
    let events = Arc::new(EventSystem::new());
    let controller = LiveblogAdverts::init(
        context(&page.doc, Arc::new(AdvertQueue::new(Arc::clone(&page.doc))), CommercialConfig::default()),
        Arc::clone(&events),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(controller.ad_counter(), 8);
    assert_eq!(controller.phase(), LiveblogPhase::Exhausted);
    assert_eq!(page.doc.get_children(page.body).len(), 18);
    assert_eq!(events.listener_count(UPDATE).await, 0);
}

#[tokio::test]
async fn test_empty_liveblog_is_a_quiet_no_op() {
    let page = liveblog_page(1300.0, 0, 500.0);
    let events = Arc::new(EventSystem::new());
    let controller = LiveblogAdverts::init(
        context(&page.doc, Arc::new(AdvertQueue::new(Arc::clone(&page.doc))), CommercialConfig::default()),
        Arc::clone(&events),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(controller.ad_counter(), 0);
    assert_eq!(controller.phase(), LiveblogPhase::Idle);
    assert_eq!(events.listener_count(UPDATE).await, 1);
}

#[tokio::test]
async fn test_disabled_feature_skips_controller() {
    let page = liveblog_page(1300.0, 3, 500.0);
    let mut ctx = context(
        &page.doc,
        Arc::new(AdvertQueue::new(Arc::clone(&page.doc))),
        CommercialConfig::default(),
    );
    ctx.features = Arc::new(CommercialFeatures {
        liveblog_adverts: false,
        ..CommercialFeatures::default()
    });
    let controller = LiveblogAdverts::init(ctx, Arc::new(EventSystem::new()))
        .await
        .unwrap();
    assert!(controller.is_none());
}

#[tokio::test]
async fn test_failed_init_leaves_no_listener_behind() {
    let page = liveblog_page(1300.0, 6, 500.0);
    let events = Arc::new(EventSystem::new());
    let mut config = CommercialConfig::default();
    config.liveblog.block_selector = " > .block[".to_string();
    assert!(config.validate().is_err());

    let result = LiveblogAdverts::init(
        context(&page.doc, Arc::new(AdvertQueue::new(Arc::clone(&page.doc))), config),
        Arc::clone(&events),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(events.listener_count(UPDATE).await, 0);
    assert_eq!(events.dispatch(CustomEvent::new(UPDATE)).await, 0);
    assert_eq!(page.doc.get_children(page.body).len(), 6);
}
