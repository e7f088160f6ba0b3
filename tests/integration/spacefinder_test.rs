use ad_spacefinder::spacefinder::{ExclusionReason, SpacefinderWriter};
use ad_spacefinder::{
    find_space, Document, FrameSource, LayoutProber, NodeId, SpaceFiller, SpacefinderItem,
    SpacefinderOptions, SpacefinderPass, SpacefinderRules,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

struct Article {
    doc: Arc<Document>,
    paragraphs: Vec<NodeId>,
}

/// Paragraphs at tops 0, 100, 5000 and 5100 in a body 8200px tall.
fn article() -> Article {
    let doc = Arc::new(Document::new());
    let body = doc.create_element("div");
    doc.set_attribute(body, "class", "article-body").unwrap();
    doc.append_child(doc.body(), body).unwrap();

    let paragraphs = [100.0, 4900.0, 100.0, 100.0]
        .into_iter()
        .map(|height| {
            let p = doc.create_element("p");
            doc.set_intrinsic_height(p, height).unwrap();
            doc.append_child(body, p).unwrap();
            p
        })
        .collect();
    let filler = doc.create_element("div");
    doc.set_intrinsic_height(filler, 3000.0).unwrap();
    doc.append_child(body, filler).unwrap();

    Article { doc, paragraphs }
}

fn region_rules() -> SpacefinderRules {
    SpacefinderRules::builder(".article-body", " > p")
        .min_above(2000.0)
        .min_below(2000.0)
        .absolute_min_from_start(1500.0)
        .build()
        .unwrap()
}

fn tops(items: &[SpacefinderItem]) -> Vec<f64> {
    items.iter().map(|i| i.top).collect()
}

#[tokio::test]
async fn test_region_scenario_picks_single_winner() {
    let page = article();
    let prober = LayoutProber::new(FrameSource::Microtask);
    let report = find_space(
        Arc::clone(&page.doc),
        &prober,
        &region_rules(),
        SpacefinderOptions::new(SpacefinderPass::Inline1),
    )
    .await
    .unwrap();

    assert!(report.container_found);
    assert_eq!(report.candidates, 4);
    assert_eq!(tops(&report.winners), vec![5000.0]);
    assert_eq!(report.winner_elements(), vec![page.paragraphs[2]]);
    let reasons: Vec<_> = report.exclusions.iter().map(|e| e.reason.clone()).collect();
    assert_eq!(
        reasons,
        vec![
            ExclusionReason::AboveRegion,
            ExclusionReason::AboveRegion,
            ExclusionReason::WinnerSpacing,
        ]
    );
}

#[tokio::test]
async fn test_search_is_idempotent_and_batched() {
    let page = article();
    let prober = LayoutProber::new(FrameSource::Microtask);
    let options = SpacefinderOptions::new(SpacefinderPass::Inline1);

    let first = find_space(Arc::clone(&page.doc), &prober, &region_rules(), options)
        .await
        .unwrap();
    let reflows = page.doc.layout_metrics().reflow_count;
    let second = find_space(Arc::clone(&page.doc), &prober, &region_rules(), options)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(page.doc.layout_metrics().reflow_count, reflows);
    assert_eq!(prober.stats().reads, 2);
    assert_eq!(prober.stats().frames, 2);
}

#[tokio::test]
async fn test_missing_container_and_no_candidates_are_empty() {
    let page = article();
    let prober = LayoutProber::new(FrameSource::Microtask);
    let options = SpacefinderOptions::new(SpacefinderPass::Inline2);

    let absent = SpacefinderRules::builder(".liveblog", " > p").build().unwrap();
    let report = find_space(Arc::clone(&page.doc), &prober, &absent, options)
        .await
        .unwrap();
    assert!(!report.container_found);
    assert!(report.winners.is_empty());

    let nothing = SpacefinderRules::builder(".article-body", " > h2").build().unwrap();
    let report = find_space(Arc::clone(&page.doc), &prober, &nothing, options)
        .await
        .unwrap();
    assert!(report.container_found);
    assert_eq!(report.candidates, 0);
    assert!(report.winners.is_empty());
}

#[tokio::test]
async fn test_start_and_stop_bound_the_reverse_search() {
    let page = article();
    let prober = LayoutProber::new(FrameSource::Microtask);
    let rules = SpacefinderRules::builder(".article-body", " > p")
        .from_bottom()
        .start_at(page.paragraphs[2])
        .stop_at(page.paragraphs[1])
        .build()
        .unwrap();
    let report = find_space(
        Arc::clone(&page.doc),
        &prober,
        &rules,
        SpacefinderOptions::new(SpacefinderPass::Carrot),
    )
    .await
    .unwrap();
    assert_eq!(
        report.winner_elements(),
        vec![page.paragraphs[2], page.paragraphs[1]]
    );
}

#[tokio::test]
async fn test_obstacles_are_scoped_to_the_body() {
    let page = article();
    let outside = page.doc.create_element("div");
    page.doc.set_attribute(outside, "class", "ad-slot").unwrap();
    page.doc.set_intrinsic_height(outside, 250.0).unwrap();
    page.doc.append_child(page.doc.body(), outside).unwrap();

    let inside = page.doc.create_element("div");
    page.doc.set_attribute(inside, "class", "ad-slot").unwrap();
    page.doc.set_intrinsic_height(inside, 250.0).unwrap();
    let body = page.doc.get_parent(page.paragraphs[0]).unwrap();
    page.doc.insert_before(body, inside, Some(page.paragraphs[3])).unwrap();

    let rules = SpacefinderRules::builder(".article-body", " > p")
        .obstacle(" .ad-slot", 300.0, 300.0)
        .build()
        .unwrap();
    let prober = LayoutProber::new(FrameSource::Microtask);
    let report = find_space(
        Arc::clone(&page.doc),
        &prober,
        &rules,
        SpacefinderOptions::new(SpacefinderPass::Inline1),
    )
    .await
    .unwrap();

    // The in-body slot sits at 5100..5350 and pushes the last paragraph to 5350.
    assert_eq!(tops(&report.winners), vec![0.0, 100.0]);
    assert_eq!(report.exclusions.len(), 2);
}

struct Recording(Mutex<Vec<Vec<NodeId>>>);

#[async_trait]
impl SpacefinderWriter for Recording {
    async fn write(&self, winners: Vec<SpacefinderItem>) -> ad_spacefinder::Result<()> {
        self.0.lock().push(winners.iter().map(|w| w.element).collect());
        Ok(())
    }
}

#[tokio::test]
async fn test_space_filler_runs_passes_in_order() {
    let page = article();
    let filler = Arc::new(SpaceFiller::new(
        Arc::clone(&page.doc),
        LayoutProber::new(FrameSource::Microtask),
    ));
    let writer = Recording(Mutex::new(Vec::new()));
    let forward = SpacefinderRules::builder(".article-body", " > p").build().unwrap();
    let reverse = SpacefinderRules::builder(".article-body", " > p")
        .from_bottom()
        .build()
        .unwrap();

    let (a, b) = tokio::join!(
        filler.fill_space(&forward, &writer, SpacefinderOptions::new(SpacefinderPass::Inline1)),
        filler.fill_space(&reverse, &writer, SpacefinderOptions::new(SpacefinderPass::Inline2)),
    );
    assert!(a.unwrap());
    assert!(b.unwrap());

    let mut expected: Vec<NodeId> = page.paragraphs.clone();
    let passes = writer.0.lock().clone();
    assert_eq!(passes[0], expected);
    expected.reverse();
    assert_eq!(passes[1], expected);
    assert_eq!(
        filler.last_report().await.map(|r| r.pass),
        Some(SpacefinderPass::Inline2)
    );
}
