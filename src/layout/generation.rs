use std::collections::{BTreeMap, VecDeque};

use log::{debug, warn};

use super::{GenerationBand, GenerationalModel, LayoutModel};

/// Assigns a signed generation to every person and union; the focus is 0.
///
/// A breadth-first walk from the focus covers everything connected through
/// partner and parent/child links. Whatever it misses is filled by a
/// fixpoint over all unions, and anything still unknown falls back to 0.
pub fn assign_generations(model: &LayoutModel) -> GenerationalModel {
    let person_count = model.persons.len();
    let union_count = model.unions.len();
    let mut person_gen: Vec<Option<i32>> = vec![None; person_count];
    let mut union_gen: Vec<Option<i32>> = vec![None; union_count];
    let mut visited = vec![false; person_count];
    let mut reached_by_traversal = 0usize;

    if let Some(focus) = model.focus {
        let mut queue = VecDeque::new();
        visited[focus.index()] = true;
        queue.push_back((focus, 0i32));
        while let Some((person, generation)) = queue.pop_front() {
            let generation = match person_gen[person.index()] {
                Some(existing) => existing,
                None => {
                    person_gen[person.index()] = Some(generation);
                    reached_by_traversal += 1;
                    generation
                }
            };

            for union_id in model.member_unions(person) {
                let union = model.union(union_id);
                if union_gen[union_id.index()].is_none() {
                    union_gen[union_id.index()] = Some(generation);
                }
                for member in union.members() {
                    if !visited[member.index()] {
                        visited[member.index()] = true;
                        person_gen[member.index()] = Some(generation);
                        reached_by_traversal += 1;
                        queue.push_back((member, generation));
                    }
                }
                for child in &union.children {
                    if !visited[child.index()] {
                        visited[child.index()] = true;
                        queue.push_back((*child, generation + 1));
                    }
                }
            }

            if let Some(parent_union) = model.parent_union[person.index()] {
                for member in model.union(parent_union).members() {
                    if !visited[member.index()] {
                        visited[member.index()] = true;
                        queue.push_back((member, generation - 1));
                    }
                }
            }
        }
    }

    let reached_by_fixpoint = propagate_fixpoint(model, &mut person_gen, &mut union_gen);

    let defaulted = person_gen.iter().filter(|g| g.is_none()).count()
        + union_gen.iter().filter(|g| g.is_none()).count();
    if defaulted > 0 {
        warn!(count = defaulted; "Unreachable generations defaulted to 0");
    }
    let person_gen: Vec<i32> = person_gen.into_iter().map(|g| g.unwrap_or(0)).collect();
    let union_gen: Vec<i32> = union_gen.into_iter().map(|g| g.unwrap_or(0)).collect();

    let mut bands: BTreeMap<i32, GenerationBand> = BTreeMap::new();
    for person in model.person_ids() {
        let generation = person_gen[person.index()];
        band_entry(&mut bands, generation).persons.push(person);
    }
    for union in model.union_ids() {
        let generation = union_gen[union.index()];
        band_entry(&mut bands, generation).unions.push(union);
    }
    let min_gen = bands.keys().next().copied().unwrap_or(0);
    let max_gen = bands.keys().next_back().copied().unwrap_or(0);

    debug!(
        min_gen = min_gen,
        max_gen = max_gen,
        traversal = reached_by_traversal,
        fixpoint = reached_by_fixpoint;
        "Generations assigned"
    );

    GenerationalModel {
        model: model.clone(),
        person_gen,
        union_gen,
        bands,
        min_gen,
        max_gen,
        reached_by_traversal,
        reached_by_fixpoint,
        defaulted,
    }
}

fn band_entry(bands: &mut BTreeMap<i32, GenerationBand>, generation: i32) -> &mut GenerationBand {
    bands.entry(generation).or_insert_with(|| GenerationBand {
        generation,
        ..GenerationBand::default()
    })
}

/// Repeats full passes over the unions until nothing new is inferred.
/// Returns the number of persons resolved this way.
fn propagate_fixpoint(
    model: &LayoutModel,
    person_gen: &mut [Option<i32>],
    union_gen: &mut [Option<i32>],
) -> usize {
    let mut resolved = 0usize;
    loop {
        let mut changed = false;
        for union in &model.unions {
            let slot = union.id.index();
            if union_gen[slot].is_none() {
                let from_member = union.members().find_map(|m| person_gen[m.index()]);
                let from_child = union
                    .children
                    .iter()
                    .find_map(|c| person_gen[c.index()].map(|g| g - 1));
                if let Some(generation) = from_member.or(from_child) {
                    union_gen[slot] = Some(generation);
                    changed = true;
                }
            }
            let Some(generation) = union_gen[slot] else {
                continue;
            };
            for member in union.members() {
                if person_gen[member.index()].is_none() {
                    person_gen[member.index()] = Some(generation);
                    resolved += 1;
                    changed = true;
                }
            }
            for child in &union.children {
                if person_gen[child.index()].is_none() {
                    person_gen[child.index()] = Some(generation + 1);
                    resolved += 1;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    resolved
}

/// Re-checks the generation invariants, one message per violation.
pub fn validate_generations(generational: &GenerationalModel) -> Vec<String> {
    let model = &generational.model;
    let mut errors = Vec::new();
    for edge in &model.edges {
        let parent_gen = generational.union_generation(edge.parent);
        let child_gen = generational.person_generation(edge.child);
        if child_gen != parent_gen + 1 {
            errors.push(format!(
                "generation mismatch: child {} at {} under union {} at {}",
                model.key(edge.child),
                child_gen,
                union_label(model, edge.parent),
                parent_gen
            ));
        }
    }
    for union in &model.unions {
        let union_gen = generational.union_generation(union.id);
        for member in union.members() {
            let member_gen = generational.person_generation(member);
            if member_gen != union_gen {
                errors.push(format!(
                    "partner generation mismatch: {} at {} in union {} at {}",
                    model.key(member),
                    member_gen,
                    union_label(model, union.id),
                    union_gen
                ));
            }
        }
    }
    errors
}

pub(crate) fn union_label(model: &LayoutModel, union: super::UnionId) -> String {
    let union = model.union(union);
    if union.source.is_empty() {
        format!("#{}", union.id.0)
    } else {
        union.source.clone()
    }
}
