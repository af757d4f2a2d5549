use std::path::Path;

use float_cmp::approx_eq;
use proptest::prelude::*;
use strom_layout::layout::{
    assign_generations, build_model, measure_subtrees, select_subgraph, validate_generations,
};
use strom_layout::{
    LayoutConfig, LayoutRequest, LayoutResult, Partnership, Person, SelectionOptions, StromData,
    compute_layout, debug_layout,
};

fn load_fixture(name: &str) -> StromData {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    StromData::from_path(&path).expect("fixture load failed")
}

fn wide_options() -> SelectionOptions {
    SelectionOptions {
        include_spouse_ancestors: true,
        include_parent_siblings: true,
        include_parent_sibling_descendants: true,
        ..SelectionOptions::default()
    }
}

fn assert_well_formed(result: &LayoutResult, config: &LayoutConfig, fixture: &str) {
    assert!(!result.is_empty(), "{fixture}: empty layout");
    assert_eq!(result.diagnostics.total_persons, result.positions.len(), "{fixture}");
    for (id, position) in &result.positions {
        assert!(position.x.is_finite() && position.y.is_finite(), "{fixture}: {id}");
    }
    let min_x = result
        .positions
        .values()
        .map(|p| p.x)
        .fold(f32::INFINITY, f32::min);
    assert!(approx_eq!(f32, min_x, config.padding), "{fixture}: min x {min_x}");
    for connection in &result.connections {
        assert!(connection.bus.min_x() <= connection.stem.x1 + 1e-3, "{fixture}");
        assert!(connection.bus.max_x() >= connection.stem.x1 - 1e-3, "{fixture}");
    }
}

#[test]
fn layout_all_fixtures() {
    let config = LayoutConfig::default();
    // (fixture, focus, wide selection, expected to validate cleanly)
    let cases = [
        ("nuclear.json", "kid_b", false, true),
        ("three_generations.json", "me", true, true),
        ("three_generations.json", "me", false, true),
        ("three_generations.json", "child", false, true),
        ("remarriage.json", "x", false, true),
        ("both_sides.json", "focus", true, true),
        ("in_laws.json", "me", true, true),
        ("corrupt_cycle.json", "a", false, false),
    ];

    for (fixture, focus, wide, clean) in cases {
        let data = load_fixture(fixture);
        let request = LayoutRequest {
            selection: if wide { wide_options() } else { SelectionOptions::default() },
            ..LayoutRequest::new(focus)
        };
        let result = compute_layout(&data, &request, &config);
        assert_well_formed(&result, &config, fixture);
        if clean {
            assert!(result.diagnostics.converged, "{fixture}: not converged");
            assert!(
                result.diagnostics.validation_passed,
                "{fixture}: {:?}",
                result.diagnostics.errors
            );
        }
        let again = compute_layout(&data, &request, &config);
        assert_eq!(again, result, "{fixture}: not reproducible");
    }
}

#[test]
fn corrupt_ancestry_is_reported() {
    let data = load_fixture("corrupt_cycle.json");
    let result = compute_layout(&data, &LayoutRequest::new("a"), &LayoutConfig::default());
    assert!(!result.diagnostics.validation_passed);
    assert!(result.diagnostics.errors.iter().any(|e| e.contains("cycle")));
}

#[test]
fn remarriage_keeps_both_families_on_one_row() {
    let data = load_fixture("remarriage.json");
    let result = compute_layout(&data, &LayoutRequest::new("x"), &LayoutConfig::default());
    let y = result.positions["x"].y;
    for id in ["s1", "s2"] {
        assert!(approx_eq!(f32, result.positions[id].y, y));
    }
    assert!(result.positions["s2"].x < result.positions["x"].x);
    assert!(result.positions["x"].x < result.positions["s1"].x);
    let divorced = result
        .spouse_lines
        .iter()
        .find(|l| l.partnership == "u_first")
        .expect("spouse line for first marriage");
    assert!(divorced.status.is_ended());
}

#[test]
fn in_law_parents_sit_over_the_spouse() {
    let data = load_fixture("in_laws.json");
    let request = LayoutRequest {
        selection: wide_options(),
        ..LayoutRequest::new("me")
    };
    let config = LayoutConfig::default();
    let result = compute_layout(&data, &request, &config);
    assert!(result.diagnostics.validation_passed, "{:?}", result.diagnostics.errors);
    let x = |id: &str| result.positions[id].x;
    let parents_mid = (x("spf") + x("spm")) / 2.0;
    assert!(approx_eq!(f32, parents_mid, x("sp"), epsilon = 0.5));
    assert!(x("me") < x("sp"));
    assert!(!result.positions.contains_key("nephew"));
}

#[test]
fn unknown_focus_gives_empty_result() {
    let data = load_fixture("nuclear.json");
    let result = compute_layout(&data, &LayoutRequest::new("stranger"), &LayoutConfig::default());
    assert!(result.is_empty());
    assert_eq!(result.diagnostics.total_persons, 0);
    assert!(result.connections.is_empty());
}

#[test]
fn result_serializes_camel_case() {
    let data = load_fixture("nuclear.json");
    let result = compute_layout(&data, &LayoutRequest::new("kid_a"), &LayoutConfig::default());
    let value = serde_json::to_value(&result).expect("serialize");
    assert!(value["spouseLines"].is_array());
    assert!(value["diagnostics"]["generationRange"].is_array());
    assert!(value["diagnostics"]["validationPassed"].as_bool().unwrap());
}

#[test]
fn debug_snapshot_ends_in_the_same_result() {
    let data = load_fixture("three_generations.json");
    let request = LayoutRequest {
        selection: wide_options(),
        ..LayoutRequest::new("me")
    };
    let config = LayoutConfig::default();
    let snapshot = debug_layout(&data, &request, &config, 8);
    assert_eq!(snapshot.result, Some(compute_layout(&data, &request, &config)));
    let geometry = snapshot.geometry.expect("geometry");
    assert_eq!(geometry.cards.len(), 13);
    assert_eq!(geometry.rows.len(), 4);
}

// ── Generated families ──────────────────────────────────────────────

/// A rooted family where every new person is born into an existing couple
/// and may marry someone from outside.
fn build_family(choices: &[(u16, bool)]) -> StromData {
    let mut data = StromData::new();
    let mut partnerships: Vec<Partnership> = Vec::new();
    let add = |data: &mut StromData, id: &str| {
        data.insert_person(Person {
            id: id.to_string(),
            first_name: id.to_string(),
            ..Person::default()
        });
    };
    add(&mut data, "p0");
    add(&mut data, "s0");
    partnerships.push(Partnership {
        id: "u0".to_string(),
        person1_id: "p0".to_string(),
        person2_id: Some("s0".to_string()),
        ..Partnership::default()
    });
    for (idx, (choice, married)) in choices.iter().enumerate() {
        let id = format!("p{}", idx + 1);
        add(&mut data, &id);
        let parent = *choice as usize % partnerships.len();
        partnerships[parent].child_ids.push(id.clone());
        if *married {
            let spouse = format!("s{}", idx + 1);
            add(&mut data, &spouse);
            partnerships.push(Partnership {
                id: format!("u{}", idx + 1),
                person1_id: id,
                person2_id: Some(spouse),
                ..Partnership::default()
            });
        }
    }
    for partnership in partnerships {
        data.insert_partnership(partnership);
    }
    data
}

fn family_strategy() -> impl Strategy<Value = StromData> {
    prop::collection::vec((any::<u16>(), any::<bool>()), 0..24).prop_map(|c| build_family(&c))
}

fn deep_options() -> SelectionOptions {
    SelectionOptions {
        ancestor_depth: 2,
        descendant_depth: 32,
        ..SelectionOptions::default()
    }
}

/// Which relatives a pedigree around `me` has.
#[derive(Debug, Clone)]
struct Pedigree {
    paternal: bool,
    maternal: bool,
    siblings: usize,
    spouse: bool,
    spouse_parents: bool,
    children: usize,
}

fn add_couple(data: &mut StromData, id: &str, a: &str, b: &str, kids: Vec<String>) {
    for person in [a, b].into_iter().chain(kids.iter().map(String::as_str)) {
        if !data.persons.contains_key(person) {
            data.insert_person(Person {
                id: person.to_string(),
                first_name: person.to_string(),
                ..Person::default()
            });
        }
    }
    data.insert_partnership(Partnership {
        id: id.to_string(),
        person1_id: a.to_string(),
        person2_id: Some(b.to_string()),
        child_ids: kids,
        ..Partnership::default()
    });
}

fn build_pedigree(shape: &Pedigree) -> StromData {
    let mut data = StromData::new();
    let mut children: Vec<String> = (0..shape.siblings).map(|i| format!("sib{i}")).collect();
    children.push("me".to_string());
    add_couple(&mut data, "u_parents", "dad", "mom", children);
    if shape.paternal {
        add_couple(&mut data, "u_paternal", "dad_f", "dad_m", vec!["dad".to_string()]);
    }
    if shape.maternal {
        add_couple(&mut data, "u_maternal", "mom_f", "mom_m", vec!["mom".to_string()]);
    }
    if shape.spouse {
        let kids = (0..shape.children).map(|i| format!("kid{i}")).collect();
        add_couple(&mut data, "u_me", "me", "sp", kids);
        if shape.spouse_parents {
            add_couple(&mut data, "u_sp", "sp_f", "sp_m", vec!["sp".to_string()]);
        }
    }
    data
}

fn pedigree_strategy() -> impl Strategy<Value = StromData> {
    (any::<bool>(), any::<bool>(), 0..4usize, any::<bool>(), any::<bool>(), 0..4usize).prop_map(
        |(paternal, maternal, siblings, spouse, spouse_parents, children)| {
            build_pedigree(&Pedigree {
                paternal,
                maternal,
                siblings,
                spouse,
                spouse_parents,
                children,
            })
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn converged_pedigrees_validate(data in pedigree_strategy()) {
        let request = LayoutRequest {
            selection: SelectionOptions {
                include_spouse_ancestors: true,
                ..SelectionOptions::default()
            },
            ..LayoutRequest::new("me")
        };
        let result = compute_layout(&data, &request, &LayoutConfig::default());
        prop_assert!(result.diagnostics.converged);
        prop_assert!(
            result.diagnostics.validation_passed,
            "{:?}",
            result.diagnostics.errors
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_families_keep_generation_invariants(data in family_strategy()) {
        let selection = select_subgraph(&data, "p0", &deep_options());
        let generational = assign_generations(&build_model(&data, &selection));
        prop_assert!(validate_generations(&generational).is_empty());
        let focus = generational.model.focus.expect("focus present");
        prop_assert_eq!(generational.person_generation(focus), 0);
        prop_assert_eq!(generational.defaulted, 0);
    }

    #[test]
    fn generated_families_follow_width_formulas(data in family_strategy()) {
        let config = LayoutConfig::default();
        let selection = select_subgraph(&data, "p0", &deep_options());
        let generational = assign_generations(&build_model(&data, &selection));
        let measured = measure_subtrees(&generational, &config);
        for union in &measured.generational.model.unions {
            let width = measured.union_width[union.id.index()];
            let expected = if union.is_couple() { 272.0 } else { 130.0 };
            prop_assert!(approx_eq!(f32, width, expected));
            prop_assert!(measured.subtree_width[union.id.index()] >= width);
        }
    }

    #[test]
    fn generated_layouts_are_normalized_and_reproducible(data in family_strategy()) {
        let config = LayoutConfig::default();
        let request = LayoutRequest {
            selection: deep_options(),
            ..LayoutRequest::new("p0")
        };
        let result = compute_layout(&data, &request, &config);
        let min_x = result.positions.values().map(|p| p.x).fold(f32::INFINITY, f32::min);
        prop_assert!(approx_eq!(f32, min_x, config.padding));
        prop_assert!(result.positions.values().all(|p| p.x.is_finite()));
        prop_assert_eq!(result.diagnostics.generation_range[0], 0);
        prop_assert_eq!(compute_layout(&data, &request, &config), result);
    }
}
