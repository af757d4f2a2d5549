use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::ir::{PartnershipStatus, StromData};

use super::{Edge, GraphSelection, LayoutModel, ModelPerson, PersonId, Union, UnionId};

struct ModelBuilder {
    persons: Vec<ModelPerson>,
    person_index: BTreeMap<String, PersonId>,
    unions: Vec<Union>,
    edges: Vec<Edge>,
    person_union: Vec<Option<UnionId>>,
    parent_union: Vec<Option<UnionId>>,
    co_parent_unions: Vec<Vec<UnionId>>,
}

impl ModelBuilder {
    fn push_union(
        &mut self,
        partner_a: PersonId,
        partner_b: Option<PersonId>,
        co_parent: Option<PersonId>,
        source: &str,
        status: PartnershipStatus,
    ) -> UnionId {
        let id = UnionId::from_index(self.unions.len());
        self.unions.push(Union {
            id,
            partner_a,
            partner_b,
            co_parent,
            children: Vec::new(),
            source: source.to_string(),
            status,
        });
        self.person_union[partner_a.index()] = Some(id);
        if let Some(b) = partner_b {
            self.person_union[b.index()] = Some(id);
        }
        if let Some(x) = co_parent {
            self.co_parent_unions[x.index()].push(id);
        }
        id
    }

    fn attach_child(&mut self, union: UnionId, child: PersonId) {
        let key = self.persons[child.index()].key.as_str();
        if self.unions[union.index()].members().any(|m| m == child) {
            warn!(child = key; "Person listed as own child, link dropped");
            return;
        }
        if self.parent_union[child.index()].is_some() {
            debug!(child = key; "Child already has a parent union, link dropped");
            return;
        }
        self.parent_union[child.index()] = Some(union);
        self.unions[union.index()].children.push(child);
        self.edges.push(Edge {
            parent: union,
            child,
        });
    }
}

/// Converts a selection into the arena-backed working graph.
///
/// Persons keep selection order, so the focus is always `PersonId(0)`.
/// References to persons outside the selection are skipped.
pub fn build_model(data: &StromData, selection: &GraphSelection) -> LayoutModel {
    if selection.is_empty() {
        return LayoutModel::default();
    }

    let mut persons = Vec::new();
    let mut person_index = BTreeMap::new();
    for key in &selection.persons {
        let Some(person) = data.person(key) else {
            continue;
        };
        if person_index.contains_key(key) {
            continue;
        }
        let id = PersonId::from_index(persons.len());
        person_index.insert(key.clone(), id);
        persons.push(ModelPerson {
            id,
            key: key.clone(),
            name: person.display_name(),
            gender: person.gender,
        });
    }

    let count = persons.len();
    let mut builder = ModelBuilder {
        persons,
        person_index,
        unions: Vec::new(),
        edges: Vec::new(),
        person_union: vec![None; count],
        parent_union: vec![None; count],
        co_parent_unions: vec![Vec::new(); count],
    };

    let mut children_of: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in &selection.edges {
        children_of
            .entry(edge.partnership.as_str())
            .or_default()
            .push(edge.child.as_str());
    }

    let selected = selection.partnership_set();
    let mut handled: BTreeSet<&str> = BTreeSet::new();
    for key in &selection.persons {
        if !builder.person_index.contains_key(key) {
            continue;
        }
        for partnership in data.partnerships_of(key) {
            let pid = partnership.id.as_str();
            if !selected.contains(pid) || !handled.insert(pid) {
                continue;
            }
            let mut partners: Vec<PersonId> = Vec::new();
            for id in partnership.partners() {
                if let Some(found) = builder.person_index.get(id).copied()
                    && !partners.contains(&found)
                {
                    partners.push(found);
                }
            }
            let free: Vec<PersonId> = partners
                .iter()
                .copied()
                .filter(|p| builder.person_union[p.index()].is_none())
                .collect();
            let claimed: Vec<PersonId> = partners
                .iter()
                .copied()
                .filter(|p| builder.person_union[p.index()].is_some())
                .collect();

            let target = match (free.as_slice(), claimed.as_slice()) {
                ([a, b], []) => {
                    builder.push_union(*a, Some(*b), None, pid, partnership.status)
                }
                ([a], []) => builder.push_union(*a, None, None, pid, partnership.status),
                ([s], [x]) => builder.push_union(*s, None, Some(*x), pid, partnership.status),
                ([], [first, ..]) => {
                    let Some(existing) = builder.person_union[first.index()] else {
                        continue;
                    };
                    warn!(
                        partnership = pid;
                        "Both partners already placed, children folded into an existing union"
                    );
                    existing
                }
                _ => continue,
            };

            let kids: Vec<PersonId> = children_of
                .get(pid)
                .map(|kids| {
                    kids.iter()
                        .filter_map(|k| builder.person_index.get(*k).copied())
                        .collect()
                })
                .unwrap_or_default();
            for child in kids {
                builder.attach_child(target, child);
            }
        }
    }

    for idx in 0..count {
        if builder.person_union[idx].is_none() {
            builder.push_union(
                PersonId::from_index(idx),
                None,
                None,
                "",
                PartnershipStatus::Unknown,
            );
        }
    }

    let focus = selection
        .focus
        .as_deref()
        .and_then(|key| builder.person_index.get(key).copied());
    let person_union: Vec<UnionId> = builder.person_union.into_iter().flatten().collect();

    let model = LayoutModel {
        focus,
        persons: builder.persons,
        unions: builder.unions,
        edges: builder.edges,
        person_index: builder.person_index,
        person_union,
        parent_union: builder.parent_union,
        co_parent_unions: builder.co_parent_unions,
    };
    debug!(
        persons = model.persons.len(),
        unions = model.unions.len(),
        edges = model.edges.len();
        "Model built"
    );
    model
}
