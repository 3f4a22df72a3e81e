//! Registers a process that integrates `Vel` into `Pos` every tick, and a
//! second process that uses `Commands` to spawn a replacement whenever an
//! entity's `Health` drops to zero — showing deferred mutation from inside
//! `Process::update`.
//!
//! Treat this as a reference for the `Process`/`Commands` API shape; see
//! `demos/basic.rs` for the simpler, process-free version of the same idea.

use std::sync::{Arc, Mutex};

use dod_ecs::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Pos(f32);
#[derive(Debug, Clone, Copy)]
struct Vel(f32);
#[derive(Debug, Clone, Copy)]
struct Health(i32);

struct Integrate;

impl Process for Integrate {
    fn remap(&mut self, _world: &World, _changed: &[EntityId], _max_index: u32) {}

    fn update(&mut self, world: &World, _commands: &Commands<'_>, dt: f32) {
        let required = <(Write<Pos>, Read<Vel>) as Aspect>::required_mask(world);
        for &id in world.get_active_list_const() {
            if !world.is_match_aspect(id, &required) {
                continue;
            }
            // SAFETY: one view per entity, no other live view of Pos/Vel
            // this pass.
            let (_, pos, vel) = unsafe { <(Write<Pos>, Read<Vel>) as Aspect>::view(world, id) };
            pos.0 += vel.0 * dt;
        }
    }
}

struct Respawn;

impl Process for Respawn {
    fn remap(&mut self, _world: &World, _changed: &[EntityId], _max_index: u32) {}

    fn update(&mut self, world: &World, commands: &Commands<'_>, _dt: f32) {
        let required = <(Read<Health>,) as Aspect>::required_mask(world);
        for &id in world.get_active_list_const() {
            if !world.is_match_aspect(id, &required) {
                continue;
            }
            let (_, health) = unsafe { <(Read<Health>,) as Aspect>::view(world, id) };
            if health.0 <= 0 {
                commands.destroy_entity(id);
                let replacement = commands.create_entity();
                commands.add_component(replacement, Pos(0.0));
                commands.add_component(replacement, Vel(1.0));
                commands.add_component(replacement, Health(100));
            }
        }
    }
}

fn main() {
    env_logger::init();

    let mut world = World::new(WorldConfig::default());
    world.build_entity().with(Pos(0.0)).with(Vel(1.0)).with(Health(0)).build();
    world.build_entity().with(Pos(20.0)).with(Vel(-2.0)).with(Health(50)).build();

    // `register_process` only keeps a `Weak` handle to each process; the
    // caller must hold its own strong `Arc` for as long as it should run.
    let integrate = Arc::new(Mutex::new(Integrate));
    let respawn = Arc::new(Mutex::new(Respawn));
    world.register_process(integrate.clone());
    world.register_process(respawn.clone());

    for tick in 0..3 {
        world.update(1.0 / 60.0);
        println!("-- tick {tick} --");
        for &id in world.get_active_list() {
            let pos = world.get_component::<Pos>(id).unwrap();
            println!("{:?}: Pos({})", id, pos.0);
        }
    }
}
