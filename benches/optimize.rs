use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dod_ecs::{ComponentStorage, World, WorldConfig};

struct Dummy(i64, i64);

fn populate_reverse_order(n: u32) -> ComponentStorage<Dummy> {
    let mut world = World::new(WorldConfig::default());
    let ids: Vec<_> = (0..n).map(|_| world.create_entity()).collect();
    let mut storage = ComponentStorage::<Dummy>::new();
    for id in ids.iter().rev() {
        storage.push_back(*id, Dummy(id.index() as i64, -(id.index() as i64)));
    }
    storage
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    for &n in &[1_000u32, 10_000, 100_000] {
        group.bench_function(format!("optimize/{n}"), |b| {
            b.iter_batched(
                || populate_reverse_order(n),
                |mut storage| {
                    storage.optimize();
                    black_box(storage.size());
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
