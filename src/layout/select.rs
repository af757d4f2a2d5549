use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;

use crate::config::SelectionOptions;
use crate::ir::StromData;

use super::{GraphSelection, SelectionEdge};

struct Collector<'a> {
    data: &'a StromData,
    order: Vec<String>,
    reach: BTreeMap<String, i32>,
}

impl<'a> Collector<'a> {
    fn new(data: &'a StromData) -> Self {
        Self {
            data,
            order: Vec::new(),
            reach: BTreeMap::new(),
        }
    }

    /// Records a person at a generation; unknown ids and repeats are ignored.
    fn include(&mut self, id: &str, generation: i32) -> bool {
        if self.reach.contains_key(id) || self.data.person(id).is_none() {
            return false;
        }
        self.reach.insert(id.to_string(), generation);
        self.order.push(id.to_string());
        true
    }

    fn generation(&self, id: &str) -> Option<i32> {
        self.reach.get(id).copied()
    }

    fn contains(&self, id: &str) -> bool {
        self.reach.contains_key(id)
    }

    fn partners_of(&self, id: &str) -> Vec<String> {
        self.data
            .partnerships_of(id)
            .into_iter()
            .filter_map(|p| p.partner_of(id).map(str::to_string))
            .collect()
    }

    /// Parents, grandparents, ... of `start`, at most `depth` steps up.
    fn walk_ancestors(&mut self, start: &str, depth: u32) {
        let Some(start_gen) = self.generation(start) else {
            return;
        };
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<(String, i32, u32)> = VecDeque::new();
        queue.push_back((start.to_string(), start_gen, 0));
        seen.insert(start.to_string());
        while let Some((person, generation, steps)) = queue.pop_front() {
            if steps >= depth {
                continue;
            }
            let parent_ids: Vec<String> = self
                .data
                .parent_partnerships_of(&person)
                .into_iter()
                .flat_map(|p| p.partners().map(str::to_string).collect::<Vec<_>>())
                .collect();
            for parent in parent_ids {
                self.include(&parent, generation - 1);
                if self.contains(&parent) && seen.insert(parent.clone()) {
                    queue.push_back((parent, generation - 1, steps + 1));
                }
            }
        }
    }

    /// Partners and children of `start`, children only while `gen + 1 <= max_gen`.
    fn walk_descendants(&mut self, start: &str, max_gen: i32) {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(start.to_string());
        seen.insert(start.to_string());
        while let Some(person) = queue.pop_front() {
            let Some(generation) = self.generation(&person) else {
                continue;
            };
            for partnership in self.data.partnerships_of(&person) {
                if let Some(partner) = partnership.partner_of(&person) {
                    self.include(partner, generation);
                }
                if generation + 1 > max_gen {
                    continue;
                }
                for child in &partnership.child_ids {
                    self.include(child, generation + 1);
                    if self.contains(child) && seen.insert(child.clone()) {
                        queue.push_back(child.clone());
                    }
                }
            }
        }
    }
}

/// Walks outward from `focus` within the configured depth bounds.
///
/// An unknown focus yields an empty selection, which callers treat as the
/// terminal "no layout" case.
pub fn select_subgraph(
    data: &StromData,
    focus: &str,
    options: &SelectionOptions,
) -> GraphSelection {
    if data.person(focus).is_none() {
        debug!(focus = focus; "Focus person not found, selection is empty");
        return GraphSelection::empty();
    }

    let mut collector = Collector::new(data);
    collector.include(focus, 0);
    let spouses = collector.partners_of(focus);
    for spouse in &spouses {
        collector.include(spouse, 0);
    }

    collector.walk_ancestors(focus, options.ancestor_depth);

    // Siblings and half-siblings come in through every partnership of each parent.
    let parents: Vec<String> = data
        .parent_partnerships_of(focus)
        .into_iter()
        .flat_map(|p| p.partners().map(str::to_string).collect::<Vec<_>>())
        .filter(|id| collector.contains(id))
        .collect();
    for parent in &parents {
        for partnership in data.partnerships_of(parent) {
            for partner in partnership.partners() {
                collector.include(partner, -1);
            }
            for child in &partnership.child_ids {
                collector.include(child, 0);
            }
        }
    }

    if options.include_spouse_ancestors {
        for spouse in &spouses {
            collector.walk_ancestors(spouse, options.ancestor_depth);
        }
    }

    let max_gen = options.descendant_depth as i32;
    collector.walk_descendants(focus, max_gen);

    if options.include_parent_siblings && options.ancestor_depth >= 2 {
        let mut aunts_uncles: Vec<String> = Vec::new();
        for parent in &parents {
            for grandparents in data.parent_partnerships_of(parent) {
                if !grandparents.partners().all(|id| collector.contains(id)) {
                    continue;
                }
                for child in &grandparents.child_ids {
                    if child == parent || aunts_uncles.contains(child) {
                        continue;
                    }
                    collector.include(child, -1);
                    if collector.contains(child) {
                        aunts_uncles.push(child.clone());
                    }
                }
            }
        }
        for relative in &aunts_uncles {
            for partner in collector.partners_of(relative) {
                collector.include(&partner, -1);
            }
        }
        if options.include_parent_sibling_descendants {
            for relative in &aunts_uncles {
                collector.walk_descendants(relative, max_gen);
            }
        }
    }

    let selection = finish(data, focus, collector);
    debug!(
        persons = selection.persons.len(),
        partnerships = selection.partnerships.len(),
        min_generation = selection.min_generation,
        max_generation = selection.max_generation;
        "Subgraph selected"
    );
    selection
}

fn finish(data: &StromData, focus: &str, collector: Collector<'_>) -> GraphSelection {
    let Collector { order, reach, .. } = collector;

    let mut partnerships: Vec<String> = Vec::new();
    for person in &order {
        for partnership in data.partnerships_of(person) {
            if partnerships.contains(&partnership.id) {
                continue;
            }
            let mut partners = partnership.partners().peekable();
            if partners.peek().is_none() {
                continue;
            }
            if partners.all(|id| reach.contains_key(id)) {
                partnerships.push(partnership.id.clone());
            }
        }
    }

    let mut edges = Vec::new();
    for id in &partnerships {
        let Some(partnership) = data.partnerships.get(id) else {
            continue;
        };
        for child in &partnership.child_ids {
            if reach.contains_key(child) {
                edges.push(SelectionEdge {
                    partnership: id.clone(),
                    child: child.clone(),
                });
            }
        }
    }

    let min_generation = reach.values().copied().min().unwrap_or(0);
    let max_generation = reach.values().copied().max().unwrap_or(0);

    GraphSelection {
        focus: Some(focus.to_string()),
        persons: order,
        partnerships,
        edges,
        reach,
        min_generation,
        max_generation,
    }
}
