//! Propagation benchmarks
//!
//! Measures the cost of tracking reads and fanning a single write out to
//! many subscribed effects.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use lattice_reactivity::{Effect, Runtime, Value};

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for subscribers in [1usize, 16, 256] {
        let rt = Runtime::new();
        let cell = rt.cell(0);
        let effects: Vec<Effect> = (0..subscribers)
            .map(|_| {
                let cell = cell.clone();
                rt.effect(move || {
                    black_box(cell.value());
                })
            })
            .collect();

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                let mut n = 0;
                b.iter(|| {
                    n += 1;
                    cell.set_value(n).unwrap();
                });
            },
        );
        drop(effects);
    }

    group.finish();
}

fn bench_object_reads(c: &mut Criterion) {
    let rt = Runtime::new();
    let fields: Vec<(String, Value)> = (0..64).map(|i| (format!("f{i}"), Value::from(i))).collect();
    let obj = rt.reactive(Value::object(fields));
    let obj = obj.as_reactive().cloned().unwrap();

    c.bench_function("tracked_reads_64_fields", |b| {
        b.iter(|| {
            let obj = obj.clone();
            let effect = rt.effect(move || {
                for key in obj.keys() {
                    black_box(obj.get(key));
                }
            });
            effect.stop();
        });
    });
}

fn bench_nested_wrap(c: &mut Criterion) {
    let rt = Runtime::new();
    let state = rt.reactive(json!({ "a": { "b": { "c": { "d": 1 } } } }));
    let state = state.as_reactive().cloned().unwrap();

    c.bench_function("nested_read_depth_4", |b| {
        b.iter(|| {
            let mut current = state.clone();
            for key in ["a", "b", "c"] {
                current = current.get(key).as_reactive().cloned().unwrap();
            }
            black_box(current.get("d"));
        });
    });
}

criterion_group!(benches, bench_fan_out, bench_object_reads, bench_nested_wrap);
criterion_main!(benches);
