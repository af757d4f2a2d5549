use std::collections::BTreeMap;

use log::debug;

use crate::config::LayoutConfig;

use super::{Diagnostics, EmittedLayout, LayoutResult, Position, RoutedModel};

/// Top edge of a generation row.
pub(crate) fn row_y(generation: i32, min_gen: i32, config: &LayoutConfig) -> f32 {
    config.padding + (generation - min_gen) as f32 * config.row_pitch()
}

/// Produces the final positions and connectors, shifted so the leftmost card
/// sits exactly at `padding`.
pub fn emit_result(routed: &RoutedModel, config: &LayoutConfig) -> EmittedLayout {
    let constrained = &routed.constrained;
    let generations = constrained.generations();
    let model = &generations.model;
    if model.is_empty() {
        return EmittedLayout {
            result: LayoutResult::empty(),
            ..EmittedLayout::default()
        };
    }

    let min_x = constrained
        .person_x
        .iter()
        .copied()
        .fold(f32::INFINITY, f32::min);
    let dx = config.padding - min_x;

    let mut positions = BTreeMap::new();
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for person in model.person_ids() {
        let x = constrained.person_x[person.index()] + dx;
        let y = row_y(generations.person_generation(person), generations.min_gen, config);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
        positions.insert(model.key(person).to_string(), Position { x, y });
    }

    let mut connections = routed.connections.clone();
    for connection in &mut connections {
        connection.translate_x(dx);
    }
    let mut spouse_lines = routed.spouse_lines.clone();
    for line in &mut spouse_lines {
        line.x1 += dx;
        line.x2 += dx;
    }
    let mut blocks = constrained.measured.blocks.clone();
    for block in &mut blocks.blocks {
        block.translate(dx);
    }
    let row_y_map: BTreeMap<i32, f32> = generations
        .bands
        .keys()
        .map(|g| (*g, row_y(*g, generations.min_gen, config)))
        .collect();

    let diagnostics = Diagnostics {
        total_persons: model.persons.len(),
        total_unions: model.unions.len(),
        generation_range: [generations.min_gen, generations.max_gen],
        iterations: constrained.iterations,
        branch_count: blocks.roots.len(),
        final_max_violation: constrained.final_max_violation,
        converged: constrained.converged,
        validation_passed: true,
        errors: Vec::new(),
    };
    debug!(
        persons = diagnostics.total_persons,
        shift = dx;
        "Result emitted"
    );

    EmittedLayout {
        result: LayoutResult {
            positions,
            connections,
            spouse_lines,
            width: max_x + config.card_width + config.padding,
            height: max_y + config.card_height + config.padding,
            diagnostics,
        },
        blocks,
        row_y: row_y_map,
    }
}
