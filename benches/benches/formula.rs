// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kiln_formula::{Formula, MapScope, Value};

const FORMULAS: &[(&str, &str)] = &[
    ("arithmetic", "line_width * 100 / infill_density"),
    (
        "ternary",
        "0 if infill_density == 0 else line_width * 100 / infill_density * (2 if pattern == 'grid' else 1)",
    ),
    ("membership", "pattern not in ('lines', 'zigzag') and wall_count > 1"),
    ("library", "round(max(layer_height, min(0.3, math.sqrt(line_width))), 3)"),
    ("comprehension", "sum([w * 2 for w in widths if w > 0.3])"),
    ("map_lambda", "max(map(lambda w: w * layer_height, widths))"),
];

fn scope() -> MapScope {
    MapScope::new()
        .with("line_width", 0.4)
        .with("infill_density", 20)
        .with("layer_height", 0.2)
        .with("wall_count", 3)
        .with("pattern", "grid")
        .with(
            "widths",
            Value::from(vec![Value::Float(0.35), Value::Float(0.4), Value::Float(0.25)]),
        )
}

fn bench_formula(c: &mut Criterion) {
    let mut group = c.benchmark_group("kiln_formula");
    let scope = scope();

    for &(label, source) in FORMULAS {
        group.bench_function(format!("parse({label})"), |b| {
            b.iter(|| black_box(Formula::parse(black_box(source))));
        });

        let formula = Formula::parse(source);
        assert!(
            formula.evaluate(&scope).is_ok(),
            "benchmark formula {label} must evaluate"
        );
        group.bench_function(format!("evaluate({label})"), |b| {
            b.iter(|| black_box(formula.evaluate(&scope)));
        });

        group.bench_function(format!("references({label})"), |b| {
            b.iter(|| black_box(formula.references()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_formula);
criterion_main!(benches);
