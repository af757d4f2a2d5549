use std::collections::BTreeSet;

use log::debug;

use crate::config::LayoutConfig;

use super::measure::span;
use super::{BlockId, FamilyBlockModel, LayoutModel, MeasuredModel, PersonId, PlacedModel, UnionId};

/// Mutable x coordinates shared by placement and the constraint solver.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PositionArena {
    pub(crate) person_x: Vec<f32>,
    pub(crate) union_x: Vec<f32>,
}

impl PositionArena {
    pub(crate) fn new(model: &LayoutModel) -> Self {
        Self {
            person_x: vec![0.0; model.persons.len()],
            union_x: vec![0.0; model.unions.len()],
        }
    }

    pub(crate) fn card_center(&self, person: PersonId, card_width: f32) -> f32 {
        self.person_x[person.index()] + card_width / 2.0
    }

    /// Moves one row rigidly: its cards, its union and any satellite unions.
    pub(crate) fn shift_row(&mut self, measured: &MeasuredModel, block: BlockId, dx: f32) {
        let blocks = &measured.blocks;
        for person in blocks.row_members(measured.model(), block) {
            self.person_x[person.index()] += dx;
        }
        let block = blocks.block(block);
        self.union_x[block.union.index()] += dx;
        for satellite in &block.satellites {
            self.union_x[blocks.block(*satellite).union.index()] += dx;
        }
    }

    /// Moves `from` and every row member right of it, widening the gap
    /// between the partners. Union points are recomputed from the cards.
    pub(crate) fn spread_row(
        &mut self,
        measured: &MeasuredModel,
        block: BlockId,
        from: PersonId,
        dx: f32,
        card_width: f32,
    ) {
        let model = measured.model();
        let blocks = &measured.blocks;
        let members = blocks.row_members(model, block);
        let Some(start) = members.iter().position(|p| *p == from) else {
            return;
        };
        for person in &members[start..] {
            self.person_x[person.index()] += dx;
        }
        let block = blocks.block(block);
        for union in std::iter::once(block.union)
            .chain(block.satellites.iter().map(|s| blocks.block(*s).union))
        {
            let anchor = union_anchor(model, blocks, self, union, card_width);
            self.union_x[union.index()] = anchor;
        }
    }

    /// Moves a block and everything hanging below it.
    pub(crate) fn shift_subtree(&mut self, measured: &MeasuredModel, root: BlockId, dx: f32) {
        for id in measured.blocks.subtree(root) {
            if !measured.blocks.block(id).is_satellite() {
                self.shift_row(measured, id, dx);
            }
        }
    }
}

/// Connector anchor of a union for the current card positions.
pub(crate) fn union_anchor(
    model: &LayoutModel,
    blocks: &FamilyBlockModel,
    arena: &PositionArena,
    union: UnionId,
    card_width: f32,
) -> f32 {
    let union = model.union(union);
    let first = arena.card_center(union.partner_a, card_width);
    let hosted = blocks.block_of(union.id).is_satellite();
    match (union.partner_b, union.co_parent) {
        (Some(b), _) => (first + arena.card_center(b, card_width)) / 2.0,
        (None, Some(x)) if hosted => (first + arena.card_center(x, card_width)) / 2.0,
        _ => first,
    }
}

/// Recomputes every block's bounds from the actual card positions below it.
pub(crate) fn refresh_bounds(
    model: &LayoutModel,
    blocks: &mut FamilyBlockModel,
    arena: &PositionArena,
    card_width: f32,
) {
    let roots = blocks.roots.clone();
    for root in roots {
        block_extent(model, blocks, arena, card_width, root);
    }
}

fn block_extent(
    model: &LayoutModel,
    blocks: &mut FamilyBlockModel,
    arena: &PositionArena,
    card_width: f32,
    id: BlockId,
) -> (f32, f32) {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for person in blocks.row_members(model, id) {
        lo = lo.min(arena.person_x[person.index()]);
        hi = hi.max(arena.person_x[person.index()] + card_width);
    }
    let block = blocks.block(id);
    let below: Vec<BlockId> = block
        .satellites
        .iter()
        .chain(block.children.iter())
        .copied()
        .collect();
    for next in below {
        let (l, r) = block_extent(model, blocks, arena, card_width, next);
        lo = lo.min(l);
        hi = hi.max(r);
    }
    let block = &mut blocks.blocks[id.index()];
    block.x_left = lo;
    block.x_right = hi;
    block.x_center = arena.union_x[block.union.index()];
    (lo, hi)
}

/// Children of `union` whose rows are laid out by some other block.
pub(crate) fn foreign_children(measured: &MeasuredModel, union: UnionId) -> Vec<PersonId> {
    let model = measured.model();
    let blocks = &measured.blocks;
    let owned = &blocks.block_of(union).children;
    model
        .union(union)
        .children
        .iter()
        .copied()
        .filter(|c| !owned.contains(&blocks.block_of(model.union_of(*c)).id))
        .collect()
}

struct Placer<'a> {
    measured: &'a MeasuredModel,
    config: &'a LayoutConfig,
    arena: PositionArena,
    blocks: FamilyBlockModel,
    placed: Vec<bool>,
}

impl Placer<'_> {
    /// Lays out one block in the slot starting at `left`, then its children row.
    fn place(&mut self, id: BlockId, left: f32) {
        let measured = self.measured;
        let model = measured.model();
        let blocks = &measured.blocks;
        let block = blocks.block(id);
        let card = self.config.card_width;
        let pitch = card + self.config.partner_gap;
        let gap = self.config.horizontal_gap;

        let center = left + block.envelope_width / 2.0;
        let row_left = center - block.width / 2.0;
        for (idx, person) in blocks.row_members(model, id).into_iter().enumerate() {
            self.arena.person_x[person.index()] = row_left + idx as f32 * pitch;
        }
        for union in std::iter::once(block.union)
            .chain(block.satellites.iter().map(|s| blocks.block(*s).union))
        {
            let anchor = union_anchor(model, blocks, &self.arena, union, card);
            self.arena.union_x[union.index()] = anchor;
        }
        self.placed[id.index()] = true;
        for satellite in &block.satellites {
            self.placed[satellite.index()] = true;
        }

        let row = blocks.row_children(id);
        let widths: Vec<f32> = row.iter().map(|c| blocks.block(*c).envelope_width).collect();
        let mut cursor = center - span(&widths, gap) / 2.0;
        for (child, width) in row.iter().zip(widths) {
            self.place(*child, cursor);
            cursor += width + gap;
        }

        let slot = &mut self.blocks.blocks[id.index()];
        slot.x_left = left;
        slot.x_right = left + block.envelope_width;
        slot.x_center = self.arena.union_x[block.union.index()];
        for satellite in &block.satellites {
            block_extent(model, &mut self.blocks, &self.arena, card, *satellite);
        }
    }

    fn shift_tree(&mut self, root: BlockId, dx: f32) {
        self.arena.shift_subtree(self.measured, root, dx);
        for id in self.measured.blocks.subtree(root) {
            self.blocks.blocks[id.index()].translate(dx);
        }
    }

    /// The union with foreign children placed by other trees, deepest first.
    fn anchor_of(&self, root: BlockId) -> Option<(UnionId, Vec<PersonId>)> {
        let measured = self.measured;
        let blocks = &measured.blocks;
        let tree: BTreeSet<BlockId> = blocks.subtree(root).into_iter().collect();
        let mut best: Option<(i32, UnionId, Vec<PersonId>)> = None;
        for id in &tree {
            let union = blocks.block(*id).union;
            let outside: Vec<PersonId> = foreign_children(measured, union)
                .into_iter()
                .filter(|c| !tree.contains(&blocks.movable_block(measured.model().union_of(*c))))
                .collect();
            if outside.is_empty() {
                continue;
            }
            let generation = blocks.block(*id).generation;
            let better = match &best {
                None => true,
                Some((g, u, _)) => generation > *g || (generation == *g && union < *u),
            };
            if better {
                best = Some((generation, union, outside));
            }
        }
        best.map(|(_, union, children)| (union, children))
    }
}

/// Assigns initial x coordinates: trees left to right, anchored trees over
/// the children they share with trees already placed.
pub fn place_blocks(measured: &MeasuredModel, config: &LayoutConfig) -> PlacedModel {
    let model = measured.model();
    let mut placer = Placer {
        measured,
        config,
        arena: PositionArena::new(model),
        blocks: measured.blocks.clone(),
        placed: vec![false; measured.blocks.blocks.len()],
    };
    let gap = config.horizontal_gap;
    let card = config.card_width;

    let mut anchored: Vec<(BlockId, UnionId, Vec<PersonId>)> = Vec::new();
    let mut cursor = 0.0f32;
    for root in &measured.blocks.roots {
        match placer.anchor_of(*root) {
            Some((union, children)) => anchored.push((*root, union, children)),
            None => {
                placer.place(*root, cursor);
                cursor += measured.blocks.block(*root).envelope_width + gap;
            }
        }
    }

    let primary = measured.blocks.roots.len() - anchored.len();
    loop {
        let mut progress = false;
        let mut waiting = Vec::new();
        for (root, union, children) in anchored {
            let ready = children.iter().all(|c| {
                let block = measured.blocks.movable_block(model.union_of(*c));
                placer.placed[block.index()]
            });
            if !ready {
                waiting.push((root, union, children));
                continue;
            }
            placer.place(root, 0.0);
            let centers: Vec<f32> = children
                .iter()
                .map(|c| placer.arena.card_center(*c, card))
                .collect();
            let lo = centers.iter().copied().fold(f32::INFINITY, f32::min);
            let hi = centers.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let dx = (lo + hi) / 2.0 - placer.arena.union_x[union.index()];
            placer.shift_tree(root, dx);
            progress = true;
        }
        anchored = waiting;
        if !progress || anchored.is_empty() {
            break;
        }
    }
    for (root, _, _) in &anchored {
        placer.place(*root, cursor);
        cursor += measured.blocks.block(*root).envelope_width + gap;
    }

    debug!(
        primary = primary,
        unresolved = anchored.len();
        "Blocks placed"
    );

    let mut placed_measured = measured.clone();
    placed_measured.blocks = placer.blocks;
    PlacedModel {
        measured: placed_measured,
        person_x: placer.arena.person_x,
        union_x: placer.arena.union_x,
    }
}
