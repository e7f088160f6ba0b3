use ad_spacefinder::spacefinder::{
    find_winners, order_candidates, MeasuredObstacle, Measurements, ObstacleRule, SearchDirection,
};
use ad_spacefinder::{NodeId, SpacefinderItem, SpacefinderPass, SpacefinderRules};
use proptest::prelude::*;

fn item(id: u64, top: f64, height: f64) -> SpacefinderItem {
    SpacefinderItem {
        element: NodeId(id),
        top,
        bottom: top + height,
        height,
    }
}

fn items(base_id: u64, boxes: Vec<(u32, u32)>) -> Vec<SpacefinderItem> {
    boxes
        .into_iter()
        .enumerate()
        .map(|(i, (top, height))| item(base_id + i as u64, top as f64, height as f64))
        .collect()
}

fn boxes(max: usize) -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0u32..10_000, 0u32..600), 0..max)
}

fn direction() -> impl Strategy<Value = SearchDirection> {
    prop_oneof![Just(SearchDirection::Forward), Just(SearchDirection::Reverse)]
}

proptest! {
    #[test]
    fn winners_honour_every_rule(
        candidates in boxes(40),
        obstacles in boxes(6),
        min_above in 0u32..3000,
        min_below in 0u32..3000,
        absolute in 0u32..3000,
        obstacle_above in 0u32..800,
        obstacle_below in 0u32..800,
        direction in direction(),
    ) {
        let rules = SpacefinderRules::builder(".body", " > p")
            .min_above(min_above as f64)
            .min_below(min_below as f64)
            .absolute_min_from_start(absolute as f64)
            .obstacle(" .ad-slot", obstacle_above as f64, obstacle_below as f64)
            .direction(direction)
            .build()
            .unwrap();
        let rule = ObstacleRule::new(obstacle_above as f64, obstacle_below as f64);
        let measured = Measurements {
            body: Some(item(1, 0.0, 12_000.0)),
            candidates: order_candidates(items(100, candidates), direction),
            obstacles: vec![MeasuredObstacle {
                selector: " .ad-slot".to_string(),
                rule,
                items: items(10_000, obstacles),
            }],
        };

        let report = find_winners(&measured, &rules, SpacefinderPass::Inline1);
        prop_assert_eq!(report.winners.len() + report.exclusions.len(), measured.candidates.len());

        let gap = match direction {
            SearchDirection::Forward => rules.min_above,
            SearchDirection::Reverse => rules.min_below,
        };
        for winner in &report.winners {
            prop_assert!(winner.top >= rules.min_above);
            prop_assert!(12_000.0 - winner.top >= rules.min_below);
            prop_assert!(winner.top >= rules.absolute_min_from_start);
            for obstacle in &measured.obstacles[0].items {
                prop_assert!(
                    winner.top - obstacle.bottom >= rule.min_above
                        || obstacle.top - winner.top >= rule.min_below
                );
            }
        }
        for pair in report.winners.windows(2) {
            prop_assert!((pair[1].top - pair[0].top).abs() >= gap);
        }
    }

    #[test]
    fn search_is_deterministic_and_keeps_order(
        candidates in boxes(40),
        min_above in 0u32..2000,
        direction in direction(),
    ) {
        let rules = SpacefinderRules::builder(".body", " > p")
            .min_above(min_above as f64)
            .direction(direction)
            .build()
            .unwrap();
        let measured = Measurements {
            body: Some(item(1, 0.0, 12_000.0)),
            candidates: order_candidates(items(100, candidates), direction),
            obstacles: Vec::new(),
        };

        let first = find_winners(&measured, &rules, SpacefinderPass::Inline2);
        let second = find_winners(&measured, &rules, SpacefinderPass::Inline2);
        prop_assert_eq!(&first, &second);

        // Winners are a subsequence of the ordered candidates.
        let mut remaining = measured.candidates.iter();
        for winner in &first.winners {
            prop_assert!(remaining.any(|c| c == winner));
        }
    }

    #[test]
    fn ordering_is_stable_for_equal_tops(tops in prop::collection::vec(0u32..5, 0..30)) {
        let candidates: Vec<_> = tops
            .iter()
            .enumerate()
            .map(|(i, top)| item(i as u64, *top as f64, 10.0))
            .collect();
        for direction in [SearchDirection::Forward, SearchDirection::Reverse] {
            let ordered = order_candidates(candidates.clone(), direction);
            for pair in ordered.windows(2) {
                if pair[0].top == pair[1].top {
                    prop_assert!(pair[0].element.0 < pair[1].element.0);
                }
            }
        }
    }
}

#[test]
fn no_candidates_means_no_winners() {
    let rules = SpacefinderRules::builder(".body", " > p").build().unwrap();
    let measured = Measurements {
        body: Some(item(1, 0.0, 1000.0)),
        candidates: Vec::new(),
        obstacles: Vec::new(),
    };
    let report = find_winners(&measured, &rules, SpacefinderPass::Inline1);
    assert!(report.container_found);
    assert!(report.winners.is_empty());
    assert!(report.exclusions.is_empty());
}
