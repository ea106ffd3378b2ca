//! Performance benchmarks for pagebridge.
//!
//! Run with: cargo bench
//!
//! Target performance:
//! - Route resolution over 500 routes: < 50us
//! - Notification fan-in and drain: < 1us per notification

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pagebridge::graph::{create_filter_view, Courier, NotifyKinds, PropGraph};
use pagebridge::routing::{PriorityHint, RouteTable};

/// Benchmark route resolution with literal and wildcard routes mixed.
fn bench_route_resolution(c: &mut Criterion) {
    let mut table = RouteTable::new(true);
    for i in 0..250 {
        let _ = table.add(&format!("^site{i}:browse/(.*)$"), PriorityHint::Derived, i, "bench");
        let _ = table.add(&format!("^site{i}:start$"), PriorityHint::Derived, i, "bench");
    }

    let urls = [
        ("exact_first", "site0:start"),
        ("exact_last", "site249:start"),
        ("wildcard", "site125:browse/movies/2024"),
        ("miss", "settings:general"),
    ];

    let mut group = c.benchmark_group("route_resolution");
    for (name, url) in urls {
        group.bench_with_input(BenchmarkId::from_parameter(name), &url, |b, url| {
            b.iter(|| black_box(table.resolve(black_box(url))))
        });
    }
    group.finish();
}

/// Benchmark value notifications posted to a courier and drained.
fn bench_courier_throughput(c: &mut Criterion) {
    let graph = PropGraph::new();
    let node = graph.root().create_path("page.model.entries");
    let courier = Courier::new();
    let _sub = node.subscribe(NotifyKinds::VALUE, &courier);
    courier.try_drain();

    let mut group = c.benchmark_group("courier");
    for batch in [1_i64, 64, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                for i in 0..batch {
                    node.set_int(i + 1);
                }
                node.set_void();
                black_box(courier.try_drain().len())
            })
        });
    }
    group.finish();
}

/// Benchmark fuzzy filtering of a 200 item collection.
fn bench_filter_view(c: &mut Criterion) {
    let graph = PropGraph::new();
    let model = graph.root().create_child("model");
    let items = model.create_child("items");
    for i in 0..200 {
        let item = items.add_child();
        item.create_path("metadata.title")
            .set_string(&format!("Episode {i} - Test Entry for Benchmarking"));
    }
    let filter = model.create_child("filter");
    let view = model.create_child("nodes");
    create_filter_view(&view, &items, &filter);

    let mut group = c.benchmark_group("filter_view");
    for query in ["", "episode", "episode 50", "bench"] {
        filter.set_string(query);
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, _| {
            b.iter(|| black_box(view.children().len()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_route_resolution,
    bench_courier_throughput,
    bench_filter_view,
);

criterion_main!(benches);
