//! Benchmark for instance batching churn.
//!
//! TARGET: mutations stay O(1) regardless of population size
//!
//! Run with: cargo bench --package ember_rendering --bench instancing_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ember_rendering::{
    Aabb, ModelInstance, ModelInstanceGroup, RecordingQueue, RenderModel, ShaderStateId,
};
use glam::{Mat4, Vec3};

const POPULATION: usize = 10_000;

fn bench_model(lods: u32) -> RenderModel {
    let bounds = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
    RenderModel::new("bench", bounds, (0..lods).map(ShaderStateId).collect())
}

fn populated_group(lods: u32) -> (ModelInstanceGroup, Vec<ModelInstance>) {
    let group = ModelInstanceGroup::new(bench_model(lods));
    let handles = (0..POPULATION)
        .map(|i| {
            let instance = group.make_instance(0);
            instance.set_matrix(Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)));
            instance.set_visible(true);
            instance
        })
        .collect();
    (group, handles)
}

fn bench_visibility_toggle(c: &mut Criterion) {
    let (_group, handles) = populated_group(1);

    let mut group_bench = c.benchmark_group("visibility_toggle");
    group_bench.throughput(Throughput::Elements(2));
    group_bench.bench_function("hide_show_mid_population", |b| {
        let handle = &handles[POPULATION / 2];
        b.iter(|| {
            handle.set_visible(black_box(false));
            handle.set_visible(black_box(true));
        });
    });
    group_bench.finish();
}

fn bench_matrix_update(c: &mut Criterion) {
    let (_group, handles) = populated_group(1);
    let matrix = Mat4::from_translation(Vec3::splat(3.0));

    c.bench_function("matrix_update_visible", |b| {
        let handle = &handles[POPULATION / 3];
        b.iter(|| handle.set_matrix(black_box(matrix)));
    });
}

fn bench_create_destroy(c: &mut Criterion) {
    let (group, _handles) = populated_group(1);

    c.bench_function("create_destroy", |b| {
        b.iter(|| {
            let instance = group.make_instance(0);
            instance.set_visible(true);
            black_box(&instance);
        });
    });
}

fn bench_lod_migration(c: &mut Criterion) {
    let (_group, handles) = populated_group(2);

    c.bench_function("lod_migration_roundtrip", |b| {
        let handle = &handles[POPULATION / 4];
        b.iter(|| {
            handle.set_lod_level(black_box(1));
            handle.set_lod_level(black_box(0));
        });
    });
}

fn bench_draw(c: &mut Criterion) {
    let (group, handles) = populated_group(1);
    let mut queue = RecordingQueue::new();

    let mut group_bench = c.benchmark_group("draw");
    group_bench.throughput(Throughput::Elements(POPULATION as u64));
    group_bench.bench_function("clean", |b| {
        // First draw packs the staging; the measured draws reuse it.
        group.draw(&mut queue);
        b.iter(|| {
            queue.clear();
            black_box(group.draw(&mut queue));
        });
    });
    group_bench.bench_function("dirty", |b| {
        let handle = &handles[0];
        let matrix = Mat4::from_translation(Vec3::splat(1.0));
        b.iter(|| {
            handle.set_matrix(black_box(matrix));
            queue.clear();
            black_box(group.draw(&mut queue));
        });
    });
    group_bench.finish();
}

criterion_group!(
    benches,
    bench_visibility_toggle,
    bench_matrix_update,
    bench_create_destroy,
    bench_lod_migration,
    bench_draw
);
criterion_main!(benches);
