//! Benchmarks for spark-observable
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use spark_observable::render::{map_sequence, render, MemoryHost, Template};
use spark_observable::{batch, create_root, flush_now, read, watch, write, ReadingValue};
use std::rc::Rc;

// =============================================================================
// STORE BENCHMARKS
// =============================================================================

fn bench_child_lookup(c: &mut Criterion) {
    let state = create_root(json!({ "a": { "b": { "c": 1 } } }));
    c.bench_function("child_lookup_depth_3", |b| {
        b.iter(|| black_box(state.at(["a", "b", "c"])))
    });
}

fn bench_read(c: &mut Criterion) {
    let state = create_root(json!({ "a": { "b": { "c": 1 } } }));
    let leaf = state.at(["a", "b", "c"]);
    c.bench_function("read_leaf", |b| b.iter(|| black_box(read(&leaf))));
}

fn bench_write_unwatched(c: &mut Criterion) {
    let state = create_root(json!({ "n": 0 }));
    let n = state.child("n");
    let mut i = 0i64;
    c.bench_function("write_unwatched", |b| {
        b.iter(|| {
            i += 1;
            write(&n, black_box(i))
        })
    });
}

fn bench_write_same_value(c: &mut Criterion) {
    let state = create_root(json!({ "n": 42 }));
    let n = state.child("n");
    let _w = watch(&n, |_, _| {});
    c.bench_function("write_same_value", |b| b.iter(|| write(&n, black_box(42))));
}

// =============================================================================
// FLUSH BENCHMARKS
// =============================================================================

fn bench_flush_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush_fan_out");
    for watchers in [1usize, 10, 100] {
        let state = create_root(json!({ "n": 0 }));
        let n = state.child("n");
        let handles: Vec<_> = (0..watchers).map(|_| watch(&n, |v, _| drop(black_box(v)))).collect();
        let mut i = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(watchers), &watchers, |b, _| {
            b.iter(|| {
                i += 1;
                write(&n, i);
                flush_now()
            })
        });
        handles.iter().for_each(|w| w.clear());
    }
    group.finish();
}

fn bench_batched_writes(c: &mut Criterion) {
    let state = create_root(json!({ "a": 0, "b": 0, "c": 0 }));
    let nodes = [state.child("a"), state.child("b"), state.child("c")];
    let readers = nodes.clone();
    let _w = watch(
        ReadingValue::getter(move || readers.iter().map(read).collect::<Vec<_>>()),
        |v, _| drop(black_box(v)),
    );
    let mut i = 0i64;
    c.bench_function("batched_writes_one_run", |b| {
        b.iter(|| {
            i += 1;
            batch(|| nodes.iter().for_each(|node| drop(write(node, i))));
            flush_now()
        })
    });
}

// =============================================================================
// RENDER BENCHMARKS
// =============================================================================

fn bench_text_binding_update(c: &mut Criterion) {
    let host = Rc::new(MemoryHost::new());
    let body = host.container("body");
    let state = create_root(json!({ "label": 0 }));
    let label = state.child("label");
    let _mount = render(&host, &body, Template::Source(label.clone()));
    let mut i = 0i64;
    c.bench_function("text_binding_update", |b| {
        b.iter(|| {
            i += 1;
            write(&label, i);
            flush_now();
            host.take_log()
        })
    });
}

fn bench_list_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_rebuild");
    for len in [10usize, 100] {
        let host = Rc::new(MemoryHost::new());
        let body = host.container("body");
        let state = create_root(json!({ "items": Vec::<i64>::new() }));
        let items = state.child("items");
        let mount = render(&host, &body, map_sequence(&items, |item, _| Template::Source(item)));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                write(&items, json!((0..len).collect::<Vec<_>>()));
                flush_now();
                host.take_log()
            })
        });
        mount.unmount();
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_child_lookup,
    bench_read,
    bench_write_unwatched,
    bench_write_same_value,
    bench_flush_fan_out,
    bench_batched_writes,
    bench_text_binding_update,
    bench_list_rebuild,
);
criterion_main!(benches);
