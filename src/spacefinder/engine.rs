use super::collector::Measurements;
use super::rules::{SearchDirection, SpacefinderRules};
use super::{Exclusion, ExclusionReason, SpacefinderItem, SpacefinderPass, SpacefinderReport};

/// Stable sort by top edge in search order; equal tops keep document order.
pub fn order_candidates(
    mut candidates: Vec<SpacefinderItem>,
    direction: SearchDirection,
) -> Vec<SpacefinderItem> {
    match direction {
        SearchDirection::Forward => candidates.sort_by(|a, b| a.top.total_cmp(&b.top)),
        SearchDirection::Reverse => candidates.sort_by(|a, b| b.top.total_cmp(&a.top)),
    }
    candidates
}

/// `required > actual` is the only failing case; exact clearance passes.
fn too_close(required: f64, actual: f64) -> bool {
    required > actual
}

fn obstacle_clear(candidate: &SpacefinderItem, obstacle: &SpacefinderItem, min_above: f64, min_below: f64) -> bool {
    !too_close(min_above, candidate.top - obstacle.bottom)
        || !too_close(min_below, obstacle.top - candidate.top)
}

/// Scans candidates once in search order and keeps those that satisfy the
/// region, obstacle, spacing and custom rules. Each candidate is compared
/// with the most recent winner only.
pub fn find_winners(
    measurements: &Measurements,
    rules: &SpacefinderRules,
    pass: SpacefinderPass,
) -> SpacefinderReport {
    let mut report = SpacefinderReport {
        pass,
        container_found: measurements.body.is_some(),
        candidates: measurements.candidates.len(),
        winners: Vec::new(),
        exclusions: Vec::new(),
    };
    let Some(body) = measurements.body else {
        return report;
    };

    let winner_gap = match rules.direction {
        SearchDirection::Forward => rules.min_above,
        SearchDirection::Reverse => rules.min_below,
    };

    for candidate in &measurements.candidates {
        let from_start = candidate.top - body.top;
        let to_end = body.bottom - candidate.top;
        let previous = report.winners.last();

        let reason = if too_close(rules.min_above, from_start) {
            Some(ExclusionReason::AboveRegion)
        } else if too_close(rules.min_below, to_end) {
            Some(ExclusionReason::BelowRegion)
        } else if too_close(rules.absolute_min_from_start, from_start) {
            Some(ExclusionReason::AbsoluteMinAbove)
        } else if let Some(blocking) = measurements.obstacles.iter().find(|group| {
            group.items.iter().any(|obstacle| {
                obstacle.element != candidate.element
                    && !obstacle_clear(candidate, obstacle, group.rule.min_above, group.rule.min_below)
            })
        }) {
            Some(ExclusionReason::Obstacle(blocking.selector.clone()))
        } else if previous.is_some_and(|prev| too_close(winner_gap, (candidate.top - prev.top).abs())) {
            Some(ExclusionReason::WinnerSpacing)
        } else if rules.filter.as_ref().is_some_and(|keep| !keep(candidate, previous)) {
            Some(ExclusionReason::CustomFilter)
        } else {
            None
        };

        match reason {
            Some(reason) => report.exclusions.push(Exclusion {
                candidate: *candidate,
                reason,
            }),
            None => report.winners.push(*candidate),
        }
    }

    report
}
