//! Criterion benchmarks for the lesson step functions.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mlviz::dataset::gaussian_blobs;
use mlviz::lessons::label_propagation::KnnGraph;
use mlviz::lessons::{new_driver, LessonKind};
use mlviz::prelude::*;

/// One step of every lesson with default parameters.
fn bench_lesson_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("lesson_step");

    for kind in LessonKind::all() {
        group.bench_function(kind.label(), |b| {
            let mut driver = new_driver(*kind, Prng::new(42));
            b.iter(|| {
                if driver.phase() == DriverPhase::Converged {
                    driver.reset();
                }
                black_box(driver.step_once())
            });
        });
    }

    group.finish();
}

/// kNN graph construction at growing point counts.
fn bench_knn_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_graph");

    for per_class in [20usize, 50, 100].iter() {
        let mut rng = Prng::new(7);
        let points = gaussian_blobs(
            &mut rng,
            &[(-2.0, 0.0), (2.0, 0.0), (0.0, 3.0), (0.0, -3.0), (3.0, 3.0)],
            *per_class,
            0.9,
        );
        group.throughput(Throughput::Elements(points.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points.len()), &points, |b, pts| {
            b.iter(|| black_box(KnnGraph::build(pts, 6, 1.0).edge_count()));
        });
    }

    group.finish();
}

/// Full scene build plus SVG serialisation.
fn bench_render(c: &mut Criterion) {
    let mut driver = new_driver(LessonKind::LogisticRegression, Prng::new(3));
    for _ in 0..20 {
        driver.step_once();
    }
    c.bench_function("render_svg_logistic", |b| {
        b.iter(|| black_box(driver.scene(640.0, 480.0).to_svg().len()))
    });
}

criterion_group!(benches, bench_lesson_steps, bench_knn_graph, bench_render);
criterion_main!(benches);
