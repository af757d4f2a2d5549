use std::collections::BTreeSet;

use log::{debug, warn};

use crate::config::{LayoutConfig, SolverConfig, SolverPhase};

use super::placement::{PositionArena, foreign_children, refresh_bounds};
use super::{BlockId, ConstrainedModel, MeasuredModel, PersonId, PlacedModel, UnionId};

/// Spacing deficits at or below this are treated as touching, not overlapping.
pub(crate) const SPACING_EPSILON: f32 = 0.01;

/// Unions that must sit over their children: every non-satellite union with
/// at least one child, wherever that child's row is laid out. Deepest
/// generation first, then by id.
pub(crate) fn constrained_unions(measured: &MeasuredModel) -> Vec<UnionId> {
    let model = measured.model();
    let mut unions: Vec<(i32, UnionId)> = measured
        .blocks
        .blocks
        .iter()
        .filter(|b| !b.is_satellite() && !model.union(b.union).children.is_empty())
        .map(|b| (b.generation, b.union))
        .collect();
    unions.sort_by_key(|(generation, union)| (std::cmp::Reverse(*generation), *union));
    unions.into_iter().map(|(_, union)| union).collect()
}

/// Midpoint between the leftmost and rightmost child card centres.
pub(crate) fn children_span_center(
    measured: &MeasuredModel,
    person_x: &[f32],
    union: UnionId,
    card_width: f32,
) -> Option<f32> {
    let children = &measured.model().union(union).children;
    if children.is_empty() {
        return None;
    }
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for child in children {
        let center = person_x[child.index()] + card_width / 2.0;
        lo = lo.min(center);
        hi = hi.max(center);
    }
    Some((lo + hi) / 2.0)
}

/// A row starting closer than the minimum gap to the rows left of it.
///
/// `left` is the rightmost card reached so far in the band, `right` the
/// first card of the offending row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Overlap {
    pub(crate) generation: i32,
    pub(crate) left: PersonId,
    pub(crate) right: PersonId,
    pub(crate) deficit: f32,
}

fn row_of(measured: &MeasuredModel, person: PersonId) -> BlockId {
    measured.blocks.movable_block(measured.model().union_of(person))
}

fn sorted_band(measured: &MeasuredModel, person_x: &[f32], generation: i32) -> Vec<PersonId> {
    let mut cards = measured
        .generational
        .bands
        .get(&generation)
        .map(|band| band.persons.clone())
        .unwrap_or_default();
    cards.sort_by(|a, b| {
        person_x[a.index()]
            .total_cmp(&person_x[b.index()])
            .then(a.cmp(b))
    });
    cards
}

/// Rows are rigid intervals from their first to their last card, so a card
/// inside a widened couple's gap counts as an overlap.
fn band_overlaps_at(
    measured: &MeasuredModel,
    person_x: &[f32],
    generation: i32,
    min_distance: f32,
) -> Vec<Overlap> {
    // (row, leftmost card, rightmost card), ordered by leftmost card
    let mut rows: Vec<(BlockId, PersonId, PersonId)> = Vec::new();
    for card in sorted_band(measured, person_x, generation) {
        let row = row_of(measured, card);
        match rows.iter_mut().find(|(r, _, _)| *r == row) {
            Some(entry) => entry.2 = card,
            None => rows.push((row, card, card)),
        }
    }

    let mut overlaps = Vec::new();
    let mut reach: Option<PersonId> = None;
    for (_, first, last) in rows {
        let Some(prev) = reach else {
            reach = Some(last);
            continue;
        };
        let deficit = person_x[prev.index()] + min_distance - person_x[first.index()];
        if deficit > SPACING_EPSILON {
            overlaps.push(Overlap {
                generation,
                left: prev,
                right: first,
                deficit,
            });
        }
        if person_x[last.index()] > person_x[prev.index()] {
            reach = Some(last);
        }
    }
    overlaps
}

/// Every spacing violation across all generation bands, top row first.
pub(crate) fn band_overlaps(
    measured: &MeasuredModel,
    person_x: &[f32],
    config: &LayoutConfig,
) -> Vec<Overlap> {
    let min_distance = config.card_width + config.horizontal_gap;
    measured
        .generational
        .bands
        .keys()
        .flat_map(|generation| band_overlaps_at(measured, person_x, *generation, min_distance))
        .collect()
}

struct Relaxer<'a> {
    measured: &'a MeasuredModel,
    config: &'a LayoutConfig,
    arena: PositionArena,
    constrained: Vec<UnionId>,
}

impl Relaxer<'_> {
    fn centering_violation(&self) -> f32 {
        let card = self.config.card_width;
        self.constrained
            .iter()
            .filter_map(|u| {
                children_span_center(self.measured, &self.arena.person_x, *u, card)
                    .map(|target| (self.arena.union_x[u.index()] - target).abs())
            })
            .fold(0.0, f32::max)
    }

    fn spacing_deficit(&self) -> f32 {
        band_overlaps(self.measured, &self.arena.person_x, self.config)
            .iter()
            .map(|o| o.deficit)
            .fold(0.0, f32::max)
    }

    /// Moves each constrained union's row over its children, deepest first.
    fn centering_pass(&mut self) {
        let card = self.config.card_width;
        for idx in 0..self.constrained.len() {
            let union = self.constrained[idx];
            let Some(target) =
                children_span_center(self.measured, &self.arena.person_x, union, card)
            else {
                continue;
            };
            let delta = target - self.arena.union_x[union.index()];
            if delta != 0.0 {
                let row = self.measured.blocks.movable_block(union);
                self.arena.shift_row(self.measured, row, delta);
            }
        }
    }

    /// Moves a block subtree right by `dx`. Children of its unions that are
    /// laid out by other trees follow: an in-law partner moves out within
    /// their couple, any other child drags its own subtree along.
    fn push(&mut self, root: BlockId, dx: f32) {
        let measured = self.measured;
        let model = measured.model();
        let blocks = &measured.blocks;
        let card = self.config.card_width;
        let mut moved: BTreeSet<BlockId> = BTreeSet::new();
        let mut pending = vec![root];
        while let Some(next) = pending.pop() {
            let tree: Vec<BlockId> = blocks
                .subtree(next)
                .into_iter()
                .filter(|id| moved.insert(*id))
                .collect();
            for id in &tree {
                if !blocks.block(*id).is_satellite() {
                    self.arena.shift_row(measured, *id, dx);
                }
            }
            for id in tree {
                for child in foreign_children(measured, blocks.block(id).union) {
                    let row = blocks.movable_block(model.union_of(child));
                    if moved.contains(&row) {
                        continue;
                    }
                    if model.union(blocks.block(row).union).partner_b == Some(child) {
                        moved.insert(row);
                        self.arena.spread_row(measured, row, child, dx, card);
                    } else {
                        pending.push(row);
                    }
                }
            }
        }
    }

    /// Pushes overlapping subtrees right, one band at a time from the top.
    fn spacing_pass(&mut self) {
        let measured = self.measured;
        let min_distance = self.config.card_width + self.config.horizontal_gap;
        for (generation, band) in &measured.generational.bands {
            let mut budget = band.persons.len() * band.persons.len() + 1;
            while budget > 0 {
                budget -= 1;
                let overlaps =
                    band_overlaps_at(measured, &self.arena.person_x, *generation, min_distance);
                let Some(first) = overlaps.first() else {
                    break;
                };
                let row = row_of(measured, first.right);
                self.push(row, first.deficit);
            }
        }
    }
}

/// Relaxes the initial placement: phase A centres parents over children,
/// phase B separates overlapping branches and re-centres.
pub fn solve_constraints(
    placed: &PlacedModel,
    config: &LayoutConfig,
    solver: &SolverConfig,
) -> ConstrainedModel {
    let measured = &placed.measured;
    let mut relaxer = Relaxer {
        measured,
        config,
        arena: PositionArena {
            person_x: placed.person_x.clone(),
            union_x: placed.union_x.clone(),
        },
        constrained: constrained_unions(measured),
    };
    let tolerance = solver.tolerance;
    let mut iterations = 0usize;

    let mut centering = relaxer.centering_violation();
    while centering >= tolerance && iterations < solver.max_iterations {
        relaxer.centering_pass();
        iterations += 1;
        centering = relaxer.centering_violation();
    }
    let mut last_phase = SolverPhase::A;
    let mut deficit = relaxer.spacing_deficit();
    let converged = if solver.stop_after == Some(SolverPhase::A) {
        centering < tolerance
    } else {
        last_phase = SolverPhase::B;
        loop {
            if centering < tolerance && deficit <= SPACING_EPSILON {
                break true;
            }
            if iterations >= solver.max_iterations {
                break false;
            }
            relaxer.spacing_pass();
            relaxer.centering_pass();
            iterations += 1;
            centering = relaxer.centering_violation();
            deficit = relaxer.spacing_deficit();
        }
    };

    let overlap_count = band_overlaps(measured, &relaxer.arena.person_x, config).len();
    let final_max_violation = centering.max(deficit);
    if converged {
        debug!(
            iterations = iterations,
            phase:? = last_phase;
            "Constraints solved"
        );
    } else {
        warn!(
            iterations = iterations,
            violation = final_max_violation,
            overlaps = overlap_count;
            "Constraint solver stopped before reaching tolerance"
        );
    }

    let mut constrained_measured = measured.clone();
    refresh_bounds(
        measured.model(),
        &mut constrained_measured.blocks,
        &relaxer.arena,
        config.card_width,
    );
    ConstrainedModel {
        measured: constrained_measured,
        person_x: relaxer.arena.person_x,
        union_x: relaxer.arena.union_x,
        iterations,
        final_max_violation,
        converged,
        last_phase: Some(last_phase),
        overlap_count,
    }
}
