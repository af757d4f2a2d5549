use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::config::{LayoutConfig, LayoutRequest};
use crate::ir::StromData;
use crate::layout::{
    BlockSide, ConstrainedModel, FamilyBlockModel, GenerationalModel, GraphSelection,
    LayoutModel, LayoutResult, MeasuredModel, PlacedModel, RoutedModel, ValidationReport,
    apply_validation, assign_generations, build_model, children_span_center, constrained_unions,
    emit_result, measure_subtrees, place_blocks, route_edges, row_y, select_subgraph,
    solve_constraints, validate_layout,
};

/// Number of pipeline stages a snapshot can stop after.
pub const PIPELINE_STEPS: u8 = 8;

/// Every stage output up to `step`, for inspecting a layout as it forms.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub step: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<GraphSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<LayoutModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generations: Option<GenerationalModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured: Option<MeasuredModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placed: Option<PlacedModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constrained: Option<ConstrainedModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed: Option<RoutedModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<LayoutResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<DebugGeometry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugGeometry {
    pub rows: Vec<RowDump>,
    pub cards: Vec<CardDump>,
    pub blocks: Vec<BlockDump>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDump {
    pub generation: i32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDump {
    pub id: String,
    pub name: String,
    pub generation: i32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDump {
    pub index: usize,
    pub partnership: String,
    pub generation: i32,
    pub side: BlockSide,
    pub sibling_index: usize,
    pub satellite: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Signed distance of the union from its children's centre, when constrained.
    pub centering_error: Option<f32>,
}

struct GeometryInput<'a> {
    measured: &'a MeasuredModel,
    blocks: &'a FamilyBlockModel,
    person_x: &'a [f32],
    union_x: &'a [f32],
    shift: f32,
}

impl DebugGeometry {
    fn build(input: GeometryInput<'_>, config: &LayoutConfig) -> Self {
        let generations = &input.measured.generational;
        let model = &generations.model;
        let min_gen = generations.min_gen;

        let rows = generations
            .bands
            .keys()
            .map(|g| RowDump {
                generation: *g,
                y: row_y(*g, min_gen, config),
            })
            .collect();

        let cards = model
            .person_ids()
            .map(|p| {
                let generation = generations.person_generation(p);
                CardDump {
                    id: model.key(p).to_string(),
                    name: model.person(p).name.clone(),
                    generation,
                    x: input.person_x[p.index()] + input.shift,
                    y: row_y(generation, min_gen, config),
                    width: config.card_width,
                    height: config.card_height,
                }
            })
            .collect();

        let constrained = constrained_unions(input.measured);
        let blocks = input
            .blocks
            .blocks
            .iter()
            .map(|block| {
                let centering_error = constrained
                    .contains(&block.union)
                    .then(|| {
                        let card = config.card_width;
                        children_span_center(input.measured, input.person_x, block.union, card)
                            .map(|target| input.union_x[block.union.index()] - target)
                    })
                    .flatten();
                BlockDump {
                    index: block.id.index(),
                    partnership: model.union(block.union).source.clone(),
                    generation: block.generation,
                    side: block.side,
                    sibling_index: block.sibling_index,
                    satellite: block.is_satellite(),
                    x: block.x_left,
                    y: row_y(block.generation, min_gen, config),
                    width: block.x_right - block.x_left,
                    height: config.card_height,
                    centering_error,
                }
            })
            .collect();

        Self { rows, cards, blocks }
    }
}

/// Runs the pipeline up to `step` (1 = selection, 8 = emitted result) and
/// keeps each intermediate model. Steps outside 1..=8 are clamped.
pub fn debug_layout(
    data: &StromData,
    request: &LayoutRequest,
    config: &LayoutConfig,
    step: u8,
) -> PipelineSnapshot {
    let step = step.clamp(1, PIPELINE_STEPS);
    let config = config.sanitized();
    let mut snapshot = PipelineSnapshot {
        step,
        ..PipelineSnapshot::default()
    };

    let selection = select_subgraph(data, &request.focus, &request.selection);
    let empty = selection.is_empty();
    snapshot.selection = Some(selection);
    if empty {
        if step == PIPELINE_STEPS {
            snapshot.result = Some(LayoutResult::empty());
        }
        return snapshot;
    }
    if step < 2 {
        return snapshot;
    }
    let Some(selection) = snapshot.selection.as_ref() else {
        return snapshot;
    };
    let model = build_model(data, selection);
    if step < 3 {
        snapshot.model = Some(model);
        return snapshot;
    }
    let generational = assign_generations(&model);
    snapshot.model = Some(model);
    if step < 4 {
        snapshot.generations = Some(generational);
        return snapshot;
    }
    let measured = measure_subtrees(&generational, &config);
    snapshot.generations = Some(generational);
    if step < 5 {
        snapshot.measured = Some(measured);
        return snapshot;
    }
    let placed = place_blocks(&measured, &config);
    snapshot.measured = Some(measured);
    if step < 6 {
        snapshot.geometry = Some(DebugGeometry::build(
            GeometryInput {
                measured: &placed.measured,
                blocks: &placed.measured.blocks,
                person_x: &placed.person_x,
                union_x: &placed.union_x,
                shift: 0.0,
            },
            &config,
        ));
        snapshot.placed = Some(placed);
        return snapshot;
    }
    let constrained = solve_constraints(&placed, &config, &request.solver);
    snapshot.placed = Some(placed);
    if step < 7 {
        snapshot.geometry = Some(constrained_geometry(&constrained, None, &config));
        snapshot.constrained = Some(constrained);
        return snapshot;
    }
    let routed = route_edges(&constrained, &config);
    snapshot.constrained = Some(constrained);
    let validation = validate_layout(&routed, &config, request.solver.tolerance);
    if step < 8 {
        snapshot.geometry = Some(constrained_geometry(&routed.constrained, None, &config));
        snapshot.routed = Some(routed);
        snapshot.validation = Some(validation);
        return snapshot;
    }
    let emitted = emit_result(&routed, &config);
    let mut result = emitted.result;
    apply_validation(&mut result.diagnostics, &validation);
    snapshot.geometry = Some(constrained_geometry(
        &routed.constrained,
        Some(&emitted.blocks),
        &config,
    ));
    snapshot.routed = Some(routed);
    snapshot.result = Some(result);
    snapshot.validation = Some(validation);
    debug!(step = step; "Pipeline snapshot taken");
    snapshot
}

/// Geometry after relaxation; `emitted` blocks carry normalized bounds.
fn constrained_geometry(
    constrained: &ConstrainedModel,
    emitted: Option<&FamilyBlockModel>,
    config: &LayoutConfig,
) -> DebugGeometry {
    let shift = match emitted {
        Some(_) => {
            let min_x = constrained
                .person_x
                .iter()
                .copied()
                .fold(f32::INFINITY, f32::min);
            config.padding - min_x
        }
        None => 0.0,
    };
    DebugGeometry::build(
        GeometryInput {
            measured: &constrained.measured,
            blocks: emitted.unwrap_or(&constrained.measured.blocks),
            person_x: &constrained.person_x,
            union_x: &constrained.union_x,
            shift,
        },
        config,
    )
}

pub fn write_debug_dump(path: &Path, snapshot: &PipelineSnapshot) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot)?;
    Ok(())
}
