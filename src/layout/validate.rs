use log::debug;
use serde::Serialize;

use crate::config::LayoutConfig;

use super::generation::{union_label, validate_generations};
use super::solver::{SPACING_EPSILON, band_overlaps, children_span_center, constrained_unions};
use super::{RoutedModel, StaircaseKind};

/// Counted invariant violations of a finished layout, with one message each.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub generation_violations: usize,
    pub overlap_count: usize,
    pub centering_violations: usize,
    pub edge_crossings: usize,
    pub staircase_violations: usize,
    pub measurement_errors: usize,
    pub errors: Vec<String>,
    pub passed: bool,
}

/// Re-checks generation, spacing, centering and routing invariants.
///
/// Nothing is corrected here; a failing report still comes with a usable
/// layout.
pub fn validate_layout(
    routed: &RoutedModel,
    config: &LayoutConfig,
    tolerance: f32,
) -> ValidationReport {
    let constrained = &routed.constrained;
    let measured = &constrained.measured;
    let model = constrained.model();
    let mut report = ValidationReport::default();

    let generation_errors = validate_generations(constrained.generations());
    report.generation_violations = generation_errors.len();
    report.errors.extend(generation_errors);

    for overlap in band_overlaps(measured, &constrained.person_x, config) {
        report.overlap_count += 1;
        report.errors.push(format!(
            "overlap: {} and {} in generation {} are {:.1} too close",
            model.key(overlap.left),
            model.key(overlap.right),
            overlap.generation,
            overlap.deficit
        ));
    }

    for union in constrained_unions(measured) {
        let Some(target) =
            children_span_center(measured, &constrained.person_x, union, config.card_width)
        else {
            continue;
        };
        let error = constrained.union_x[union.index()] - target;
        if error.abs() > tolerance {
            report.centering_violations += 1;
            report.errors.push(format!(
                "centering: union {} is {:.1} off its children",
                union_label(model, union),
                error
            ));
        }
    }

    let connections = &routed.connections;
    for (idx, first) in connections.iter().enumerate() {
        for second in &connections[idx + 1..] {
            if (first.bus.y1 - second.bus.y1).abs() > SPACING_EPSILON {
                continue;
            }
            let shared = first.bus.max_x().min(second.bus.max_x())
                - first.bus.min_x().max(second.bus.min_x());
            if shared > SPACING_EPSILON {
                report.edge_crossings += 1;
                report.errors.push(format!(
                    "crossing: buses of unions {} and {} share {:.1}",
                    union_label(model, first.union),
                    union_label(model, second.union),
                    shared
                ));
            }
        }
    }

    for staircase in &routed.staircases {
        report.staircase_violations += 1;
        let what = match staircase.kind {
            StaircaseKind::OffsetSingleChild => "single child offset",
            StaircaseKind::StemOutsideSpan => "stem outside children",
        };
        report.errors.push(format!(
            "staircase: {} at union {} by {:.1}",
            what,
            union_label(model, staircase.union),
            staircase.offset
        ));
    }

    report.measurement_errors = measured.errors.len();
    report.errors.extend(measured.errors.iter().cloned());

    report.passed = report.errors.is_empty();
    debug!(
        passed = report.passed,
        errors = report.errors.len();
        "Layout validated"
    );
    report
}
