use ad_spacefinder::config::ContentType;
use ad_spacefinder::placements::{init_article_inline, init_carrot, PlacementContext, ARTICLE_BODY_SELECTOR};
use ad_spacefinder::robust::ErrorTags;
use ad_spacefinder::slots::{create_ad_slot, CreateSlotOptions, SlotKind};
use ad_spacefinder::{
    AdServer, AdvertQueue, CommercialBootstrap, CommercialConfig, CommercialError, CommercialFeatures,
    CustomEvent, Document, ErrorReporter, EventSystem, FeatureFlags, FrameSource, LayoutProber,
    NodeId, SpaceFiller, Viewport,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_test::assert_ok;

struct Article {
    doc: Arc<Document>,
    body: NodeId,
    paragraphs: Vec<NodeId>,
}

/// Twenty 300px paragraphs: tops 0, 300, ... 5700.
fn article(width: f64) -> Article {
    let doc = Arc::new(Document::with_viewport(Viewport::new(width, 900.0)));
    let body = doc.create_element("div");
    doc.set_attribute(body, "class", &ARTICLE_BODY_SELECTOR[1..]).unwrap();
    doc.append_child(doc.body(), body).unwrap();
    let paragraphs = (0..20)
        .map(|_| {
            let p = doc.create_element("p");
            doc.set_intrinsic_height(p, 300.0).unwrap();
            doc.append_child(body, p).unwrap();
            p
        })
        .collect();
    Article { doc, body, paragraphs }
}

fn context(doc: &Arc<Document>, queue: Arc<AdvertQueue>) -> PlacementContext {
    PlacementContext {
        filler: Arc::new(SpaceFiller::new(
            Arc::clone(doc),
            LayoutProber::new(FrameSource::Microtask),
        )),
        ad_server: queue,
        features: Arc::new(CommercialFeatures::default()),
        config: Arc::new(CommercialConfig::default()),
    }
}

fn inline_anchor(page: &Article, name: &str) -> Option<NodeId> {
    let slot = page.doc.get_element_by_id(&format!("dfp-ad--{name}"))?;
    let container = page.doc.get_parent(slot)?;
    page.doc.next_sibling(container)
}

#[tokio::test]
async fn test_desktop_article_inlines() {
    let page = article(1300.0);
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let ctx = context(&page.doc, queue.clone());

    assert!(assert_ok!(init_article_inline(&ctx).await));

    let anchors: Vec<_> = (1..=4)
        .map(|i| inline_anchor(&page, &format!("inline{i}")))
        .collect();
    let expected: Vec<_> = [4, 8, 12, 16].iter().map(|i| Some(page.paragraphs[*i])).collect();
    assert_eq!(anchors, expected);
    assert_eq!(page.doc.get_element_by_id("dfp-ad--inline5"), None);

    let first = page.doc.get_parent(page.doc.get_element_by_id("dfp-ad--inline1").unwrap()).unwrap();
    let second = page.doc.get_parent(page.doc.get_element_by_id("dfp-ad--inline2").unwrap()).unwrap();
    assert!(!page.doc.has_class(first, "offset-right"));
    assert!(page.doc.has_class(second, "offset-right"));
    assert!(page.doc.has_class(second, "ad-slot-container--offset-right"));
    assert_eq!(queue.len(), 4);
    assert_eq!(page.doc.get_children(page.body).len(), 24);
}

#[tokio::test]
async fn test_mobile_article_inlines() {
    let page = article(375.0);
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let ctx = context(&page.doc, queue.clone());

    assert!(init_article_inline(&ctx).await.unwrap());

    let anchors: Vec<_> = (1..=7)
        .map(|i| inline_anchor(&page, &format!("inline{i}")))
        .collect();
    let expected: Vec<_> = [1, 4, 7, 10, 13, 16, 19]
        .iter()
        .map(|i| Some(page.paragraphs[*i]))
        .collect();
    assert_eq!(anchors, expected);
    assert_eq!(queue.len(), 7);
}

#[tokio::test]
async fn test_later_search_fills_gaps_between_existing_slots() {
    let page = article(1300.0);
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let ctx = context(&page.doc, queue.clone());
    init_article_inline(&ctx).await.unwrap();

    // Slots now sit at 1200, 2400, 3600 and 4800; paragraphs within 500px
    // of one are blocked, the ones midway between slots are not.
    let before = page.doc.get_children(page.body).len();
    let report = ad_spacefinder::find_space(
        Arc::clone(&page.doc),
        ctx.prober(),
        &ad_spacefinder::placements::article_inline::desktop_rules().unwrap(),
        ad_spacefinder::SpacefinderOptions::new(ad_spacefinder::SpacefinderPass::SubsequentInlines),
    )
    .await
    .unwrap();

    let expected: Vec<_> = [6, 10, 14, 18].iter().map(|i| page.paragraphs[*i]).collect();
    assert_eq!(report.winner_elements(), expected);
    assert!(report.exclusions.iter().any(|e| {
        e.candidate.element == page.paragraphs[5]
            && e.reason == ad_spacefinder::spacefinder::ExclusionReason::Obstacle(" .ad-slot".to_string())
    }));
    assert_eq!(page.doc.get_children(page.body).len(), before);
}

#[tokio::test]
async fn test_carrot_goes_above_second_winner() {
    let page = article(1300.0);
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let ctx = context(&page.doc, queue.clone());

    assert!(init_carrot(&ctx).await.unwrap());

    let carrot = page.doc.get_element_by_id("dfp-ad--carrot").unwrap();
    assert_eq!(page.doc.get_parent(carrot), Some(page.body));
    assert_eq!(page.doc.next_sibling(carrot), Some(page.paragraphs[16]));
    assert_eq!(
        page.doc.get_attribute(carrot, "data-mobile").as_deref(),
        Some("fluid")
    );
    assert!(queue.is_registered("dfp-ad--carrot"));
}

#[tokio::test]
async fn test_carrot_needs_two_winners() {
    let doc = Arc::new(Document::new());
    let body = doc.create_element("div");
    doc.set_attribute(body, "class", &ARTICLE_BODY_SELECTOR[1..]).unwrap();
    doc.append_child(doc.body(), body).unwrap();
    let p = doc.create_element("p");
    doc.set_intrinsic_height(p, 2000.0).unwrap();
    doc.append_child(body, p).unwrap();
    let tail = doc.create_element("p");
    doc.set_intrinsic_height(tail, 1000.0).unwrap();
    doc.append_child(body, tail).unwrap();

    let ctx = context(&doc, Arc::new(AdvertQueue::new(Arc::clone(&doc))));
    init_carrot(&ctx).await.unwrap();
    assert_eq!(doc.get_element_by_id("dfp-ad--carrot"), None);
}

#[derive(Default)]
struct Collecting(Mutex<Vec<String>>);

impl ErrorReporter for Collecting {
    fn report(&self, _error: &CommercialError, tags: &ErrorTags) {
        self.0.lock().push(tags.module.clone());
    }
}

struct CarrotExplodes;

impl FeatureFlags for CarrotExplodes {
    fn is_enabled(&self, name: &str) -> bool {
        match name {
            "carrotTrafficDriver" => panic!("feature store unavailable"),
            "adFree" => false,
            _ => true,
        }
    }
}

#[tokio::test]
async fn test_bootstrap_isolates_failing_modules() {
    let page = article(1300.0);
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&page.doc)));
    let reporter = Arc::new(Collecting::default());
    let bootstrap = CommercialBootstrap::new(
        Arc::clone(&page.doc),
        CommercialConfig::default(),
        Arc::new(CarrotExplodes),
        queue.clone(),
        Arc::new(EventSystem::new()),
    )
    .with_reporter(reporter.clone());

    let report = bootstrap.init().await;
    assert_eq!(report.failed(), vec!["cm-carrot"]);
    assert_eq!(*reporter.0.lock(), vec!["cm-carrot".to_string()]);
    assert!(queue.is_registered("dfp-ad--inline1"));
}

#[tokio::test]
async fn test_bootstrap_liveblog_keeps_listening() {
    let doc = Arc::new(Document::new());
    let header = create_ad_slot(&doc, SlotKind::TopAboveNav, &CreateSlotOptions::default()).unwrap();
    doc.append_child(doc.body(), header).unwrap();
    let body = doc.create_element("div");
    doc.set_attribute(body, "class", "js-liveblog-body").unwrap();
    doc.append_child(doc.body(), body).unwrap();
    for _ in 0..12 {
        let block = doc.create_element("article");
        doc.set_attribute(block, "class", "block").unwrap();
        doc.set_intrinsic_height(block, 500.0).unwrap();
        doc.append_child(body, block).unwrap();
    }

    let config = CommercialConfig::from_json(r#"{ "page": { "contentType": "LiveBlog" } }"#).unwrap();
    assert_eq!(config.page.content_type, ContentType::LiveBlog);
    let events = Arc::new(EventSystem::new());
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&doc)));
    let bootstrap = CommercialBootstrap::new(
        Arc::clone(&doc),
        config,
        Arc::new(CommercialFeatures::default()),
        queue.clone(),
        Arc::clone(&events),
    );

    let report = bootstrap.init().await;
    assert_eq!(report.static_slots, 1);
    assert!(report.failed().is_empty());
    let liveblog = report.liveblog.expect("liveblog controller");
    assert_eq!(liveblog.ad_counter(), 3);
    assert_eq!(queue.len(), 4);

    for _ in 0..6 {
        let block = doc.create_element("article");
        doc.set_attribute(block, "class", "block").unwrap();
        doc.set_intrinsic_height(block, 500.0).unwrap();
        let first = doc.get_children(body).first().copied();
        doc.insert_before(body, block, first).unwrap();
    }
    events.dispatch(CustomEvent::new("liveblog:blocks-updated")).await;
    liveblog.settled().await;
    assert_eq!(liveblog.ad_counter(), 5);
    assert_eq!(queue.len(), 6);
}
