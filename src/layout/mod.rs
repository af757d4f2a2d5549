//! Family-tree layout: eight stages from a focus person to drawable geometry.
//!
//! Each stage is a plain function from the previous stage's model to the next,
//! so the debug snapshot can record any prefix of the pipeline.

mod emit;
mod generation;
mod measure;
mod model;
mod placement;
mod routing;
mod select;
mod solver;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod types;
mod validate;

pub use emit::emit_result;
pub use generation::{assign_generations, validate_generations};
pub use measure::measure_subtrees;
pub use model::build_model;
pub use placement::place_blocks;
pub use routing::route_edges;
pub use select::select_subgraph;
pub use solver::solve_constraints;
pub use types::*;
pub use validate::{ValidationReport, validate_layout};

pub(crate) use emit::row_y;
pub(crate) use solver::{children_span_center, constrained_unions};

use log::info;

use crate::config::{LayoutConfig, LayoutRequest};
use crate::ir::StromData;

/// Runs the full pipeline and folds the validation report into diagnostics.
///
/// An unknown focus or an empty dataset yields [`LayoutResult::empty`].
pub fn compute_layout(
    data: &StromData,
    request: &LayoutRequest,
    config: &LayoutConfig,
) -> LayoutResult {
    let config = config.sanitized();
    let selection = select_subgraph(data, &request.focus, &request.selection);
    if selection.is_empty() {
        info!(focus = request.focus.as_str(); "Nothing to lay out");
        return LayoutResult::empty();
    }
    let model = build_model(data, &selection);
    let generational = assign_generations(&model);
    let measured = measure_subtrees(&generational, &config);
    let placed = place_blocks(&measured, &config);
    let constrained = solve_constraints(&placed, &config, &request.solver);
    let routed = route_edges(&constrained, &config);
    let mut result = emit_result(&routed, &config).result;
    let report = validate_layout(&routed, &config, request.solver.tolerance);
    apply_validation(&mut result.diagnostics, &report);

    info!(
        focus = request.focus.as_str(),
        persons = result.diagnostics.total_persons,
        iterations = result.diagnostics.iterations,
        converged = result.diagnostics.converged,
        valid = result.diagnostics.validation_passed;
        "Layout computed"
    );
    result
}

pub(crate) fn apply_validation(diagnostics: &mut Diagnostics, report: &ValidationReport) {
    diagnostics.validation_passed = report.passed;
    diagnostics.errors = report.errors.clone();
}
