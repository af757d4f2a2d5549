use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use strom_layout::layout::{
    assign_generations, build_model, measure_subtrees, place_blocks, route_edges,
    select_subgraph, solve_constraints,
};
use strom_layout::{
    LayoutConfig, LayoutRequest, Partnership, Person, SelectionOptions, SolverConfig, StromData,
    compute_layout,
};

/// Descendants of one couple, `width` children per couple, every child married.
fn generated_family(depth: usize, width: usize) -> StromData {
    let mut data = StromData::new();
    let mut frontier = vec!["root".to_string()];
    add_person(&mut data, "root");
    let mut next_id = 0usize;
    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in &frontier {
            let spouse = format!("{parent}_spouse");
            add_person(&mut data, &spouse);
            let mut children = Vec::new();
            for _ in 0..width {
                let child = format!("p{next_id}");
                next_id += 1;
                add_person(&mut data, &child);
                children.push(child);
            }
            data.insert_partnership(Partnership {
                id: format!("u_{parent}"),
                person1_id: parent.clone(),
                person2_id: Some(spouse),
                child_ids: children.clone(),
                ..Partnership::default()
            });
            next.extend(children);
        }
        frontier = next;
    }
    data
}

fn add_person(data: &mut StromData, id: &str) {
    data.insert_person(Person {
        id: id.to_string(),
        first_name: id.to_string(),
        ..Person::default()
    });
}

fn fixture(name: &str) -> &'static str {
    match name {
        "nuclear" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/nuclear.json"
        )),
        "three_generations" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/three_generations.json"
        )),
        "remarriage" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/remarriage.json"
        )),
        "both_sides" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/both_sides.json"
        )),
        "in_laws" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/in_laws.json"
        )),
        _ => panic!("unknown fixture"),
    }
}

fn wide_request(focus: &str) -> LayoutRequest {
    LayoutRequest {
        selection: SelectionOptions {
            ancestor_depth: 4,
            descendant_depth: 8,
            include_spouse_ancestors: true,
            include_parent_siblings: true,
            include_parent_sibling_descendants: true,
        },
        ..LayoutRequest::new(focus)
    }
}

fn bench_fixtures(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixtures");
    let config = LayoutConfig::default();
    for (name, focus) in [
        ("nuclear", "kid_b"),
        ("three_generations", "me"),
        ("remarriage", "x"),
        ("both_sides", "focus"),
        ("in_laws", "me"),
    ] {
        let data = StromData::from_json(fixture(name)).expect("fixture parse failed");
        let request = wide_request(focus);
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| {
                let result = compute_layout(black_box(data), &request, &config);
                black_box(result.positions.len());
            });
        });
    }
    group.finish();
}

fn bench_generated(c: &mut Criterion) {
    let mut group = c.benchmark_group("generated");
    let config = LayoutConfig::default();
    for (depth, width) in [(2, 3), (3, 3), (4, 3), (3, 5)] {
        let data = generated_family(depth, width);
        let request = LayoutRequest {
            selection: SelectionOptions {
                descendant_depth: depth as u32,
                ..SelectionOptions::default()
            },
            solver: SolverConfig::default(),
            ..LayoutRequest::new("root")
        };
        let label = format!("d{depth}_w{width}");
        group.bench_with_input(BenchmarkId::from_parameter(label), &data, |b, data| {
            b.iter(|| {
                let result = compute_layout(black_box(data), &request, &config);
                black_box(result.diagnostics.iterations);
            });
        });
    }
    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    let config = LayoutConfig::default();
    let solver = SolverConfig::default();
    let data = generated_family(4, 3);
    let options = SelectionOptions {
        descendant_depth: 4,
        ..SelectionOptions::default()
    };
    let selection = select_subgraph(&data, "root", &options);
    let generational = assign_generations(&build_model(&data, &selection));
    let measured = measure_subtrees(&generational, &config);
    let placed = place_blocks(&measured, &config);
    let constrained = solve_constraints(&placed, &config, &solver);

    group.bench_function("select", |b| {
        b.iter(|| black_box(select_subgraph(black_box(&data), "root", &options)))
    });
    group.bench_function("measure", |b| {
        b.iter(|| black_box(measure_subtrees(black_box(&generational), &config)))
    });
    group.bench_function("solve", |b| {
        b.iter(|| black_box(solve_constraints(black_box(&placed), &config, &solver)))
    });
    group.bench_function("route", |b| {
        b.iter(|| black_box(route_edges(black_box(&constrained), &config)))
    });
    group.finish();
}

criterion_group!(benches, bench_fixtures, bench_generated, bench_stages);
criterion_main!(benches);
