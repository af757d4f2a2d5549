use log::{debug, warn};

use crate::config::LayoutConfig;

use super::generation::union_label;
use super::{
    BlockId, BlockSide, FamilyBlock, FamilyBlockModel, GenerationalModel, LayoutModel,
    MeasuredModel, UnionId,
};

/// Total width of boxes laid side by side with `gap` between neighbours.
pub(crate) fn span(widths: &[f32], gap: f32) -> f32 {
    if widths.is_empty() {
        return 0.0;
    }
    widths.iter().sum::<f32>() + gap * (widths.len() - 1) as f32
}

/// Builds the block tree and computes bottom-up widths.
///
/// Every union gets one block. A block hangs under the block of the union its
/// first partner (or, failing that, its second partner) was born into.
/// Re-marriage unions become satellites of the block holding their co-parent.
pub fn measure_subtrees(generational: &GenerationalModel, config: &LayoutConfig) -> MeasuredModel {
    let model = &generational.model;
    let card = config.card_width;
    let person_width = vec![card; model.persons.len()];
    let union_width: Vec<f32> = model
        .unions
        .iter()
        .map(|u| if u.is_couple() { config.couple_width() } else { card })
        .collect();

    let mut blocks: Vec<FamilyBlock> = model
        .unions
        .iter()
        .map(|u| FamilyBlock {
            id: BlockId::from_index(u.id.index()),
            union: u.id,
            generation: generational.union_generation(u.id),
            parent: None,
            children: Vec::new(),
            host: None,
            satellites: Vec::new(),
            side: BlockSide::Center,
            sibling_index: 0,
            width: union_width[u.id.index()],
            couple_width: union_width[u.id.index()],
            envelope_width: union_width[u.id.index()],
            x_left: 0.0,
            x_right: 0.0,
            x_center: 0.0,
        })
        .collect();

    for union in &model.unions {
        let block = &mut blocks[union.id.index()];
        if let Some(co_parent) = union.co_parent {
            block.host = host_block(model, model.union_of(co_parent), union.id);
        } else {
            block.parent = owner_block(model, union.id);
        }
    }

    let mut errors = cut_cycles(model, &mut blocks);
    link_children(model, &mut blocks);
    link_satellites(model, &mut blocks);

    let mut measurer = Measurer {
        config,
        union_width: &union_width,
        subtree_width: union_width.clone(),
        blocks,
        done: vec![false; model.unions.len()],
        on_stack: vec![false; model.unions.len()],
        errors: Vec::new(),
    };
    let mut order: Vec<BlockId> = measurer.blocks.iter().map(|b| b.id).collect();
    order.sort_by_key(|b| (std::cmp::Reverse(measurer.blocks[b.index()].generation), *b));
    for id in order {
        measurer.measure(model, id);
    }
    errors.append(&mut measurer.errors);

    let Measurer {
        blocks,
        subtree_width,
        ..
    } = measurer;
    let mut roots: Vec<BlockId> = blocks
        .iter()
        .filter(|b| b.parent.is_none() && b.host.is_none())
        .map(|b| b.id)
        .collect();
    roots.sort_by_key(|b| (blocks[b.index()].generation, *b));

    debug!(
        blocks = blocks.len(),
        roots = roots.len(),
        errors = errors.len();
        "Subtrees measured"
    );

    let union_to_block = model
        .union_ids()
        .map(|u| BlockId::from_index(u.index()))
        .collect();
    MeasuredModel {
        generational: generational.clone(),
        person_width,
        union_width,
        subtree_width,
        blocks: FamilyBlockModel {
            blocks,
            union_to_block,
            roots,
        },
        errors,
    }
}

/// Follows satellite-of-satellite links to the block that owns the row.
fn host_block(model: &LayoutModel, start: UnionId, satellite: UnionId) -> Option<BlockId> {
    let mut current = start;
    for _ in 0..model.unions.len() {
        if current == satellite {
            return None;
        }
        match model.union(current).co_parent {
            Some(co_parent) => current = model.union_of(co_parent),
            None => return Some(BlockId::from_index(current.index())),
        }
    }
    None
}

fn owner_block(model: &LayoutModel, union: UnionId) -> Option<BlockId> {
    let union = model.union(union);
    let parent = model.parent_union[union.partner_a.index()]
        .or_else(|| union.partner_b.and_then(|b| model.parent_union[b.index()]))?;
    (parent != union.id).then(|| BlockId::from_index(parent.index()))
}

fn up_link(block: &FamilyBlock) -> Option<BlockId> {
    block.host.or(block.parent)
}

/// Breaks loops in the parent/host chain by dropping the closing link.
fn cut_cycles(model: &LayoutModel, blocks: &mut [FamilyBlock]) -> Vec<String> {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut errors = Vec::new();
    let mut state = vec![UNSEEN; blocks.len()];
    for start in 0..blocks.len() {
        let mut path: Vec<usize> = Vec::new();
        let mut current = Some(start);
        while let Some(idx) = current {
            match state[idx] {
                DONE => break,
                ON_PATH => {
                    if let Some(&last) = path.last() {
                        let label = union_label(model, blocks[last].union);
                        warn!(
                            union = label.as_str();
                            "Block ancestry loops back on itself, link cut"
                        );
                        errors.push(format!("cycle in block tree at union {label}"));
                        blocks[last].parent = None;
                        blocks[last].host = None;
                    }
                    break;
                }
                _ => {
                    state[idx] = ON_PATH;
                    path.push(idx);
                    current = up_link(&blocks[idx]).map(BlockId::index);
                }
            }
        }
        for idx in path {
            state[idx] = DONE;
        }
    }
    errors
}

/// Fills owned children in child order and assigns left/center/right sides.
/// Children married into another selected family move to the right end.
fn link_children(model: &LayoutModel, blocks: &mut [FamilyBlock]) {
    for union in &model.unions {
        let owner = BlockId::from_index(union.id.index());
        let mut children: Vec<BlockId> = Vec::new();
        for child in &union.children {
            let candidate = BlockId::from_index(model.union_of(*child).index());
            let block = &blocks[candidate.index()];
            let owned = block.host.is_none() && block.parent == Some(owner);
            if owned && !children.contains(&candidate) {
                children.push(candidate);
            }
        }
        // In-law families hang off the right partner, so those couples go last.
        children.sort_by_key(|c| {
            let union = model.union(blocks[c.index()].union);
            union
                .partner_b
                .is_some_and(|b| model.parent_union[b.index()].is_some())
        });
        let count = children.len();
        for (idx, child) in children.iter().enumerate() {
            let block = &mut blocks[child.index()];
            block.sibling_index = idx;
            block.side = sibling_side(idx, count);
        }
        blocks[owner.index()].children = children;
    }
}

fn sibling_side(idx: usize, count: usize) -> BlockSide {
    let doubled = 2 * idx + 1;
    if count <= 1 || doubled == count {
        BlockSide::Center
    } else if doubled < count {
        BlockSide::Left
    } else {
        BlockSide::Right
    }
}

/// Attaches satellites to hosts in union order. A satellite sits on the side
/// of its co-parent within the host couple.
fn link_satellites(model: &LayoutModel, blocks: &mut [FamilyBlock]) {
    for idx in 0..blocks.len() {
        let Some(host) = blocks[idx].host else {
            continue;
        };
        let union = model.union(blocks[idx].union);
        let host_union = model.union(blocks[host.index()].union);
        let side = if union.co_parent == Some(host_union.partner_a) {
            BlockSide::Left
        } else {
            BlockSide::Right
        };
        let sibling_index = blocks[host.index()]
            .satellites
            .iter()
            .filter(|s| blocks[s.index()].side == side)
            .count();
        blocks[idx].side = side;
        blocks[idx].sibling_index = sibling_index;
        blocks[host.index()].satellites.push(blocks[idx].id);
    }
}

struct Measurer<'a> {
    config: &'a LayoutConfig,
    union_width: &'a [f32],
    subtree_width: Vec<f32>,
    blocks: Vec<FamilyBlock>,
    done: Vec<bool>,
    on_stack: Vec<bool>,
    errors: Vec<String>,
}

impl Measurer<'_> {
    /// Returns the envelope width of `id`, measuring everything below first.
    fn measure(&mut self, model: &LayoutModel, id: BlockId) -> f32 {
        let idx = id.index();
        if self.done[idx] {
            return self.blocks[idx].envelope_width;
        }
        if self.on_stack[idx] {
            let label = union_label(model, self.blocks[idx].union);
            self.errors.push(format!("re-entrant measurement at union {label}"));
            return self.blocks[idx].width;
        }
        self.on_stack[idx] = true;

        let gap = self.config.horizontal_gap;
        let union = self.blocks[idx].union;
        let union_width = self.union_width[union.index()];

        let children = self.blocks[idx].children.clone();
        let owned: Vec<f32> = children.iter().map(|c| self.measure(model, *c)).collect();
        let subtree = union_width.max(span(&owned, gap));
        self.subtree_width[union.index()] = subtree;

        let (width, envelope) = if self.blocks[idx].is_satellite() {
            (union_width, subtree)
        } else {
            let satellites = self.blocks[idx].satellites.clone();
            let mut row = owned;
            let mut width = union_width;
            for satellite in satellites {
                self.measure(model, satellite);
                width += self.config.partner_gap + self.config.card_width;
                let grandchildren = self.blocks[satellite.index()].children.clone();
                for child in grandchildren {
                    row.push(self.measure(model, child));
                }
            }
            (width, width.max(span(&row, gap)))
        };

        let block = &mut self.blocks[idx];
        block.width = width;
        block.envelope_width = envelope;
        self.on_stack[idx] = false;
        self.done[idx] = true;
        envelope
    }
}
