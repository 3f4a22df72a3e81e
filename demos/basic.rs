//! Minimal end-to-end usage: build a few entities, attach components, read
//! and write them back out directly (no process registered).
//!
//! Run with `cargo run --example basic` once this file is wired into
//! `Cargo.toml` as an example target, or treat it as a reference for the
//! crate's entity/component API shape.

use dod_ecs::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Pos(f32);
#[derive(Debug, Clone, Copy)]
struct Vel(f32);

fn main() {
    env_logger::init();

    let mut world = World::new(WorldConfig::default());

    world.build_entity().with(Pos(0.0)).with(Vel(1.0)).build();
    let e = world.build_entity().with(Pos(10.0)).with(Vel(-1.0)).build();
    world.build_entity().with(Pos(5.0)).with(Vel(0.0)).build();

    // Apply one hand-rolled integration step directly, without a process:
    // walk the active list and update any entity carrying both components.
    let required = <(Write<Pos>, Read<Vel>) as Aspect>::required_mask(&world);
    let ids: Vec<EntityId> = world.get_active_list().to_vec();
    for id in ids {
        if !world.is_match_aspect(id, &required) {
            continue;
        }
        // SAFETY: one view per entity, no other live view of Pos/Vel this
        // pass.
        let (_, pos, vel) = unsafe { <(Write<Pos>, Read<Vel>) as Aspect>::view(&world, id) };
        pos.0 += vel.0;
    }

    world.destroy_entity(e);

    for &id in world.get_active_list() {
        let pos = world.get_component::<Pos>(id).unwrap();
        println!("{:?}: Pos({})", id, pos.0);
    }
}
