//! Runtime benchmarks.
//!
//! - Signal emission across listener counts
//! - Object create/release through a class hierarchy
//! - Main loop ticking with many hookless sources

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sigrt::{ClassId, Runtime, TypeDescriptor};
use std::cell::Cell;
use std::rc::Rc;

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_emit");

    for listeners in [1usize, 8, 64] {
        let rt = Runtime::new();
        let class = rt
            .type_register(
                TypeDescriptor::new(0).with_class_init(|class| {
                    class.signal_new("tick", false).unwrap();
                }),
                ClassId::ROOT,
            )
            .unwrap();
        let obj = rt.object_new(class).unwrap();
        let hits = Rc::new(Cell::new(0u64));
        for _ in 0..listeners {
            let hits = Rc::clone(&hits);
            rt.signal_connect(obj, "tick", move |_, _| hits.set(hits.get() + 1))
                .unwrap();
        }
        let tick = rt.object_find_signal(obj, "tick").unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &tick, |b, &tick| {
            b.iter(|| rt.signal_emit(black_box(tick)));
        });
    }

    group.finish();
}

fn bench_object_churn(c: &mut Criterion) {
    let rt = Runtime::new();
    let base = rt
        .type_register(
            TypeDescriptor::new(32).with_class_init(|class| {
                class.set_dispose(|_, obj| {
                    black_box(obj);
                });
            }),
            ClassId::ROOT,
        )
        .unwrap();
    let leaf = rt.type_register(TypeDescriptor::new(64), base).unwrap();

    c.bench_function("object_new_unref", |b| {
        b.iter(|| {
            let obj = rt.object_new(black_box(leaf)).unwrap();
            rt.object_ref(obj);
            rt.object_unref(obj);
            rt.object_unref(obj);
        });
    });
}

fn bench_loop_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("loop_cycle");

    for sources in [1usize, 16, 256] {
        let rt = Runtime::new();
        let main_loop = rt.loop_new();
        for _ in 0..sources {
            let source = rt.source_new();
            rt.source_set_callback(source, |_, _| true);
            rt.source_attach(source, main_loop).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(sources), &main_loop, |b, &main_loop| {
            b.iter(|| {
                for _ in 0..4 {
                    black_box(rt.loop_tick(main_loop));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_emit, bench_object_churn, bench_loop_tick);
criterion_main!(benches);
