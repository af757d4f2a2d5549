use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::SolverPhase;
use crate::ir::{Gender, PartnershipStatus};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

handle!(
    /// Arena handle of a person inside one [`LayoutModel`].
    PersonId
);
handle!(
    /// Arena handle of a union inside one [`LayoutModel`].
    UnionId
);
handle!(
    /// Arena handle of a block inside one [`FamilyBlockModel`].
    BlockId
);

// ── Stage 1 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEdge {
    pub partnership: String,
    pub child: String,
}

/// Bounded vertex/edge set around the focus person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSelection {
    pub focus: Option<String>,
    /// Person ids in discovery order; the focus comes first.
    pub persons: Vec<String>,
    pub partnerships: Vec<String>,
    pub edges: Vec<SelectionEdge>,
    /// Generation at which the selector reached each person.
    pub reach: BTreeMap<String, i32>,
    pub min_generation: i32,
    pub max_generation: i32,
}

impl GraphSelection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn contains(&self, person_id: &str) -> bool {
        self.reach.contains_key(person_id)
    }

    pub fn partnership_set(&self) -> BTreeSet<&str> {
        self.partnerships.iter().map(String::as_str).collect()
    }
}

// ── Stage 2 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPerson {
    pub id: PersonId,
    pub key: String,
    pub name: String,
    pub gender: Gender,
}

/// A partnership instance in the working graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Union {
    pub id: UnionId,
    pub partner_a: PersonId,
    pub partner_b: Option<PersonId>,
    /// Already-partnered person this union hangs off (re-marriage satellite).
    pub co_parent: Option<PersonId>,
    pub children: Vec<PersonId>,
    /// Source partnership id; empty for synthesized single unions.
    pub source: String,
    pub status: PartnershipStatus,
}

impl Union {
    pub fn is_couple(&self) -> bool {
        self.partner_b.is_some()
    }

    pub fn is_satellite(&self) -> bool {
        self.co_parent.is_some()
    }

    pub fn partners(&self) -> impl Iterator<Item = PersonId> + '_ {
        std::iter::once(self.partner_a).chain(self.partner_b)
    }

    /// Partners plus the co-parent of a satellite union.
    pub fn members(&self) -> impl Iterator<Item = PersonId> + '_ {
        self.partners().chain(self.co_parent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub parent: UnionId,
    pub child: PersonId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutModel {
    pub focus: Option<PersonId>,
    pub persons: Vec<ModelPerson>,
    pub unions: Vec<Union>,
    pub edges: Vec<Edge>,
    pub person_index: BTreeMap<String, PersonId>,
    /// The union each person is a partner of.
    pub person_union: Vec<UnionId>,
    /// The union each person is a child of.
    pub parent_union: Vec<Option<UnionId>>,
    /// Satellite unions each person is co-parent of.
    pub co_parent_unions: Vec<Vec<UnionId>>,
}

impl LayoutModel {
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn person(&self, id: PersonId) -> &ModelPerson {
        &self.persons[id.index()]
    }

    pub fn union(&self, id: UnionId) -> &Union {
        &self.unions[id.index()]
    }

    pub fn key(&self, id: PersonId) -> &str {
        &self.persons[id.index()].key
    }

    pub fn lookup(&self, key: &str) -> Option<PersonId> {
        self.person_index.get(key).copied()
    }

    pub fn union_of(&self, person: PersonId) -> UnionId {
        self.person_union[person.index()]
    }

    /// The partner union first, then satellites in creation order.
    pub fn member_unions(&self, person: PersonId) -> Vec<UnionId> {
        let mut out = vec![self.person_union[person.index()]];
        out.extend(self.co_parent_unions[person.index()].iter().copied());
        out
    }

    pub fn person_ids(&self) -> impl Iterator<Item = PersonId> + '_ {
        (0..self.persons.len()).map(PersonId::from_index)
    }

    pub fn union_ids(&self) -> impl Iterator<Item = UnionId> + '_ {
        (0..self.unions.len()).map(UnionId::from_index)
    }
}

// ── Stage 3 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationBand {
    pub generation: i32,
    pub persons: Vec<PersonId>,
    pub unions: Vec<UnionId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationalModel {
    pub model: LayoutModel,
    pub person_gen: Vec<i32>,
    pub union_gen: Vec<i32>,
    pub bands: BTreeMap<i32, GenerationBand>,
    pub min_gen: i32,
    pub max_gen: i32,
    pub reached_by_traversal: usize,
    pub reached_by_fixpoint: usize,
    /// Persons and unions that fell back to generation 0.
    pub defaulted: usize,
}

impl GenerationalModel {
    pub fn person_generation(&self, id: PersonId) -> i32 {
        self.person_gen[id.index()]
    }

    pub fn union_generation(&self, id: UnionId) -> i32 {
        self.union_gen[id.index()]
    }
}

// ── Stage 4 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSide {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyBlock {
    pub id: BlockId,
    pub union: UnionId,
    pub generation: i32,
    pub parent: Option<BlockId>,
    /// Owned child blocks, left to right.
    pub children: Vec<BlockId>,
    /// Block this satellite is attached to.
    pub host: Option<BlockId>,
    pub satellites: Vec<BlockId>,
    pub side: BlockSide,
    pub sibling_index: usize,
    /// Row width: the union plus any satellites.
    pub width: f32,
    pub couple_width: f32,
    pub envelope_width: f32,
    pub x_left: f32,
    pub x_right: f32,
    pub x_center: f32,
}

impl FamilyBlock {
    pub fn is_satellite(&self) -> bool {
        self.host.is_some()
    }

    pub(crate) fn translate(&mut self, dx: f32) {
        self.x_left += dx;
        self.x_right += dx;
        self.x_center += dx;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyBlockModel {
    pub blocks: Vec<FamilyBlock>,
    pub union_to_block: Vec<BlockId>,
    /// Top-level blocks in placement order.
    pub roots: Vec<BlockId>,
}

impl FamilyBlockModel {
    pub fn block(&self, id: BlockId) -> &FamilyBlock {
        &self.blocks[id.index()]
    }

    pub fn block_of(&self, union: UnionId) -> &FamilyBlock {
        &self.blocks[self.union_to_block[union.index()].index()]
    }

    /// The block that moves a union: satellites resolve to their host.
    pub fn movable_block(&self, union: UnionId) -> BlockId {
        let block = self.block_of(union);
        block.host.unwrap_or(block.id)
    }

    /// Satellites on one side, ordered from the outside in.
    fn satellites_outside_in(&self, id: BlockId, side: BlockSide) -> Vec<BlockId> {
        let mut out: Vec<BlockId> = self
            .block(id)
            .satellites
            .iter()
            .copied()
            .filter(|s| self.block(*s).side == side)
            .collect();
        out.sort_by_key(|s| std::cmp::Reverse(self.block(*s).sibling_index));
        out
    }

    /// Cards of a host block's row, left to right: outer satellite partners,
    /// the couple, then the satellite partners on the other side.
    pub fn row_members(&self, model: &LayoutModel, id: BlockId) -> Vec<PersonId> {
        let block = self.block(id);
        let union = model.union(block.union);
        if block.is_satellite() {
            return vec![union.partner_a];
        }
        let left = self.satellites_outside_in(id, BlockSide::Left);
        let mut right = self.satellites_outside_in(id, BlockSide::Right);
        right.reverse();
        let mut out: Vec<PersonId> = left
            .iter()
            .map(|s| model.union(self.block(*s).union).partner_a)
            .collect();
        out.extend(union.partners());
        out.extend(right.iter().map(|s| model.union(self.block(*s).union).partner_a));
        out
    }

    /// Child blocks sharing a host's children row, left to right.
    pub fn row_children(&self, id: BlockId) -> Vec<BlockId> {
        let block = self.block(id);
        if block.is_satellite() {
            return block.children.clone();
        }
        let left = self.satellites_outside_in(id, BlockSide::Left);
        let mut right = self.satellites_outside_in(id, BlockSide::Right);
        right.reverse();
        let mut out = Vec::new();
        for satellite in &left {
            out.extend(self.block(*satellite).children.iter().copied());
        }
        out.extend(block.children.iter().copied());
        for satellite in &right {
            out.extend(self.block(*satellite).children.iter().copied());
        }
        out
    }

    /// A block, its satellites and every block below them, in pre-order.
    pub fn subtree(&self, root: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.blocks.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            out.push(id);
            let block = self.block(id);
            for child in block.children.iter().rev() {
                stack.push(*child);
            }
            for satellite in block.satellites.iter().rev() {
                stack.push(*satellite);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasuredModel {
    pub generational: GenerationalModel,
    pub person_width: Vec<f32>,
    pub union_width: Vec<f32>,
    pub subtree_width: Vec<f32>,
    pub blocks: FamilyBlockModel,
    pub errors: Vec<String>,
}

impl MeasuredModel {
    pub fn model(&self) -> &LayoutModel {
        &self.generational.model
    }
}

// ── Stages 5 and 6 ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedModel {
    pub measured: MeasuredModel,
    /// Left edge of each person card.
    pub person_x: Vec<f32>,
    /// Connector anchor of each union.
    pub union_x: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstrainedModel {
    pub measured: MeasuredModel,
    pub person_x: Vec<f32>,
    pub union_x: Vec<f32>,
    pub iterations: usize,
    pub final_max_violation: f32,
    pub converged: bool,
    pub last_phase: Option<SolverPhase>,
    pub overlap_count: usize,
}

impl ConstrainedModel {
    pub fn model(&self) -> &LayoutModel {
        &self.measured.generational.model
    }

    pub fn generations(&self) -> &GenerationalModel {
        &self.measured.generational
    }
}

// ── Stage 7 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Segment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Segment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn min_x(&self) -> f32 {
        self.x1.min(self.x2)
    }

    pub fn max_x(&self) -> f32 {
        self.x1.max(self.x2)
    }

    pub(crate) fn translate_x(&mut self, dx: f32) {
        self.x1 += dx;
        self.x2 += dx;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDrop {
    pub child: String,
    pub segment: Segment,
}

/// Parent-to-children connector of one union.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub union: UnionId,
    pub partnership: String,
    pub parents: Vec<String>,
    pub stem: Segment,
    pub bus: Segment,
    pub drops: Vec<ChildDrop>,
}

impl Connection {
    pub(crate) fn translate_x(&mut self, dx: f32) {
        self.stem.translate_x(dx);
        self.bus.translate_x(dx);
        for drop in &mut self.drops {
            drop.segment.translate_x(dx);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseLine {
    pub union: UnionId,
    pub partnership: String,
    pub from: String,
    pub to: String,
    pub status: PartnershipStatus,
    pub x1: f32,
    pub x2: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StaircaseKind {
    /// A lone child whose drop does not continue the stem.
    OffsetSingleChild,
    /// The stem meets the bus outside the span of the children.
    StemOutsideSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaircaseViolation {
    pub union: UnionId,
    pub partnership: String,
    pub kind: StaircaseKind,
    pub offset: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedModel {
    pub constrained: ConstrainedModel,
    pub connections: Vec<Connection>,
    pub spouse_lines: Vec<SpouseLine>,
    pub staircases: Vec<StaircaseViolation>,
}

// ── Stage 8 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub total_persons: usize,
    pub total_unions: usize,
    pub generation_range: [i32; 2],
    pub iterations: usize,
    pub branch_count: usize,
    pub final_max_violation: f32,
    pub converged: bool,
    pub validation_passed: bool,
    pub errors: Vec<String>,
}

/// Final artifact handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub positions: BTreeMap<String, Position>,
    pub connections: Vec<Connection>,
    pub spouse_lines: Vec<SpouseLine>,
    pub width: f32,
    pub height: f32,
    pub diagnostics: Diagnostics,
}

impl LayoutResult {
    /// Result for a selection without persons.
    pub fn empty() -> Self {
        Self {
            diagnostics: Diagnostics {
                converged: true,
                validation_passed: true,
                ..Diagnostics::default()
            },
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedLayout {
    pub result: LayoutResult,
    /// Block bounds after normalization.
    pub blocks: FamilyBlockModel,
    pub row_y: BTreeMap<i32, f32>,
}
