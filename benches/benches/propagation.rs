// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use kiln_command::{CommandBuilder, WorkItem};
use kiln_definition::{DefinitionStore, SettingDefinition, SettingType};
use kiln_formula::Value;
use kiln_settings::{EngineConfig, SettingsEngine};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn gen_range_usize(&mut self, upper_exclusive: usize) -> usize {
        if upper_exclusive == 0 {
            return 0;
        }
        (self.next_u32() as usize) % upper_exclusive
    }
}

/// Settings `s0..sN` where each computed setting sums up to `refs_per_setting`
/// earlier ones, so the graph is a DAG rooted at `s0`. Every eighth setting
/// is settable per extruder and every fifth has an `enabled` formula.
fn build_definitions(n: usize, refs_per_setting: usize, seed: u64) -> DefinitionStore {
    let mut rng = Lcg::new(seed);
    let definitions = (0..n).map(|i| {
        let name = format!("s{i}");
        let mut builder = SettingDefinition::builder(&name, SettingType::Float).default_value(1.0);
        if i > 0 {
            let terms: Vec<_> = (0..refs_per_setting.min(i))
                .map(|_| format!("s{}", rng.gen_range_usize(i)))
                .collect();
            builder = builder.value(&format!("({}) / {}", terms.join(" + "), terms.len()));
        }
        if i % 5 == 4 {
            builder = builder.enabled(&format!("s{} > 0", rng.gen_range_usize(i)));
        }
        builder.per_extruder(i % 8 == 7).build()
    });
    DefinitionStore::from_definitions(definitions.collect::<Vec<_>>())
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("kiln_settings");
    group.sample_size(30);

    for &(n, refs) in &[(256_usize, 1_usize), (256, 3), (2_048, 1), (2_048, 3)] {
        group.bench_function(format!("engine_new(n={n},r={refs})"), |b| {
            b.iter_batched(
                || build_definitions(n, refs, 0x4B11_0000_0000_0001),
                |definitions| black_box(SettingsEngine::new(definitions, EngineConfig::default())),
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("set_root(n={n},r={refs})"), |b| {
            b.iter_batched(
                || {
                    let definitions = build_definitions(n, refs, 0x4B11_0000_0000_0002);
                    SettingsEngine::new(definitions, EngineConfig::default())
                },
                |mut engine| {
                    let notified = engine.set_multiple(0, [("s0", Value::Float(2.0))]);
                    black_box(notified);
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("set_leaf(n={n},r={refs})"), |b| {
            let leaf = format!("s{}", n - 1);
            b.iter_batched(
                || {
                    let definitions = build_definitions(n, refs, 0x4B11_0000_0000_0003);
                    SettingsEngine::new(definitions, EngineConfig::default())
                },
                |mut engine| {
                    let notified = engine.set_multiple(0, [(leaf.as_str(), Value::Float(2.0))]);
                    black_box(notified);
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("grow_to_four_channels(n={n},r={refs})"), |b| {
            b.iter_batched(
                || {
                    let definitions = build_definitions(n, refs, 0x4B11_0000_0000_0004);
                    SettingsEngine::new(definitions, EngineConfig::default())
                },
                |mut engine| {
                    let notified = engine.set_multiple(3, [("s7", Value::Float(3.0))]);
                    black_box(notified);
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("build_command(n={n},r={refs})"), |b| {
            let builder = CommandBuilder::default();
            let items = [WorkItem::new("a.stl", 0), WorkItem::new("b.stl", 1)];
            b.iter_batched(
                || {
                    let definitions = build_definitions(n, refs, 0x4B11_0000_0000_0005);
                    let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
                    engine.set_multiple(0, [("s0", Value::Float(2.0))]);
                    engine
                },
                |mut engine| black_box(builder.build(&mut engine, &items)),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_propagation);
criterion_main!(benches);
