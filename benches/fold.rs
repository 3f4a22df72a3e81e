use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dod_ecs::entity::IdGenerator;
use dod_ecs::{fold_and_reorder, Bucket, EntityId};

fn build_input(per_bucket: usize) -> Vec<(u8, EntityId)> {
    let mut gen = IdGenerator::new();
    let mut input = Vec::with_capacity(per_bucket * 255);
    for key in (0u8..=254).rev() {
        for _ in 0..per_bucket {
            input.push((key, gen.acquire()));
        }
    }
    input
}

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("fold_and_reorder");
    for &per_bucket in &[4usize, 64, 512] {
        let input = build_input(per_bucket);
        group.bench_function(format!("per_bucket/{per_bucket}"), |b| {
            let mut out: Vec<EntityId> = Vec::new();
            let mut buckets: Vec<Bucket> = Vec::new();
            b.iter(|| {
                fold_and_reorder(black_box(&input), &mut out, &mut buckets);
                black_box(buckets.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fold);
criterion_main!(benches);
