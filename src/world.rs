//! The `World`: owns every entity, component storage, and the dispatcher;
//! drives registered processes through MUTABLE → REMAP → UPDATE → MUTABLE.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::bitmask::{BitMask, MAX_COMPONENT_TYPES};
use crate::directory::EntityDirectory;
use crate::dispatcher::{Commands, Dispatcher};
use crate::entity::{EntityId, IdGenerator};
use crate::error::WorldError;
use crate::process::{Process, ProcessId, ProcessRegistry};
use crate::storage::{AnyStorage, ComponentStorage};

/// Default dispatcher arena size: 4 MiB, matching the teacher's default.
pub const DEFAULT_DISPATCHER_ARENA_BYTES: usize = 4 * 1024 * 1024;
/// Default initial entity reservation.
pub const DEFAULT_ENTITY_RESERVATION: usize = 1024;

/// Any plain value type the world can store a dense array of. No storage
/// strategy to choose from (unlike the teacher crate's per-type
/// `Storage`): every component lives in one `ComponentStorage<T>`.
pub trait Component: 'static + Send + Sync {}
impl<T: 'static + Send + Sync> Component for T {}

/// Construction-time configuration. `WorldConfig::default()` mirrors the
/// teacher's `World::new()` defaults; override fields for a larger
/// dispatcher arena or a bigger up-front entity reservation.
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
    /// Size in bytes of the deferred-command arena (see `Dispatcher`).
    pub dispatcher_arena_bytes: usize,
    /// Entities to reserve storage for up front.
    pub initial_entity_reservation: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            dispatcher_arena_bytes: DEFAULT_DISPATCHER_ARENA_BYTES,
            initial_entity_reservation: DEFAULT_ENTITY_RESERVATION,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Mutable,
    Remap,
    Update,
}

/// The ECS world: entity directory, per-type component storages, the
/// deferred dispatcher, and the process registry.
pub struct World {
    id_gen: IdGenerator,
    directory: EntityDirectory,
    changed: Vec<EntityId>,
    type_indices: HashMap<TypeId, u16>,
    storages: Vec<Option<Box<dyn AnyStorage>>>,
    next_type_index: u16,
    dispatcher: Dispatcher,
    processes: ProcessRegistry,
    phase: Phase,
    config: WorldConfig,
}

impl World {
    /// Creates a world with the given configuration.
    pub fn new(config: WorldConfig) -> Self {
        World::with_config(config)
    }

    /// Equivalent to [`World::new`]; named to match the common "sensible
    /// defaults, explicit override constructor" pair (`WorldConfig::default()`
    /// plus this one) the rest of the public API follows.
    pub fn with_config(config: WorldConfig) -> Self {
        World {
            id_gen: IdGenerator::new(),
            directory: EntityDirectory::new(),
            changed: Vec::with_capacity(config.initial_entity_reservation),
            type_indices: HashMap::new(),
            storages: Vec::new(),
            next_type_index: 0,
            dispatcher: Dispatcher::new(config.dispatcher_arena_bytes),
            processes: ProcessRegistry::new(),
            phase: Phase::Mutable,
            config,
        }
    }

    /// The configuration this world was constructed with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ---- component type registration -----------------------------------

    /// Explicitly reserves a component type index for `T`, if it doesn't
    /// already have one. Idempotent. Most callers never need this —
    /// `add_component` registers lazily — but it lets a caller front-load
    /// registration (and handle the type-space-exhaustion error) before
    /// any entities exist.
    pub fn register_component<T: Component>(&mut self) -> Result<(), WorldError> {
        if self.type_indices.contains_key(&TypeId::of::<T>()) {
            return Ok(());
        }
        if self.next_type_index as usize >= MAX_COMPONENT_TYPES {
            return Err(WorldError::TooManyComponentTypes);
        }
        self.ensure_type_index::<T>();
        Ok(())
    }

    fn ensure_type_index<T: Component>(&mut self) -> usize {
        if let Some(&idx) = self.type_indices.get(&TypeId::of::<T>()) {
            return idx as usize;
        }
        let idx = self.next_type_index;
        assert!(
            (idx as usize) < MAX_COMPONENT_TYPES,
            "fatal: exceeded {} distinct component types",
            MAX_COMPONENT_TYPES
        );
        self.type_indices.insert(TypeId::of::<T>(), idx);
        self.next_type_index += 1;
        if self.storages.len() <= idx as usize {
            self.storages.resize_with(idx as usize + 1, || None);
        }
        self.storages[idx as usize] = Some(Box::new(ComponentStorage::<T>::new()));
        idx as usize
    }

    /// The type index assigned to `T`.
    ///
    /// # Panics
    /// Panics if `T` has never been registered (via `register_component`
    /// or a prior `add_component`) — there is no storage to point an
    /// aspect at yet.
    pub fn type_index_of<T: Component>(&self) -> usize {
        *self
            .type_indices
            .get(&TypeId::of::<T>())
            .unwrap_or_else(|| {
                panic!(
                    "component type {} was never registered (add_component or register_component first)",
                    std::any::type_name::<T>()
                )
            }) as usize
    }

    fn storage_dyn(&self, idx: usize) -> Option<&dyn AnyStorage> {
        self.storages.get(idx).and_then(|s| s.as_deref())
    }

    fn storage_dyn_mut(&mut self, idx: usize) -> Option<&mut (dyn AnyStorage + 'static)> {
        self.storages.get_mut(idx).and_then(|s| s.as_deref_mut())
    }

    /// Read access to `T`'s dense storage, for queries and aspect views.
    ///
    /// # Panics
    /// Panics if `T` was never registered.
    pub fn get_component_storage<T: Component>(&self) -> &ComponentStorage<T> {
        let idx = self.type_index_of::<T>();
        self.storage_dyn(idx)
            .and_then(|s| (s.as_any()).downcast_ref())
            .expect("storage type mismatch")
    }

    /// Exclusive access to `T`'s dense storage — introspection for tests and
    /// callers that want to force a cache-compacting pass directly, e.g.
    /// `world.get_component_storage_mut::<Pos>().optimize()`.
    ///
    /// Registers `T` if it has no storage yet, the same as `add_component`.
    pub fn get_component_storage_mut<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        let idx = self.ensure_type_index::<T>();
        self.storage_dyn_mut(idx)
            .and_then(|s| s.as_any_mut().downcast_mut())
            .expect("storage type mismatch")
    }

    // ---- entity lifecycle ------------------------------------------------

    /// Creates a new entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.id_gen.acquire();
        self.directory.install(id);
        id
    }

    /// Starts a builder for an entity with components attached in a
    /// chained-call style, e.g. `world.build_entity().with(Pos(..)).with(Vel(..)).build()`.
    pub fn build_entity(&mut self) -> EntityBuilder<'_> {
        let id = self.create_entity();
        EntityBuilder { world: self, id }
    }

    /// Materializes the directory slot for an `id` reserved by the locked
    /// ID generator (dispatcher replay of a deferred `CreateEntity`).
    pub(crate) fn create_entity_with_id(&mut self, id: EntityId) {
        self.directory.install(id);
    }

    /// Destroys a live entity: erases its components, invalidates its
    /// handle, fixes up the active list, and releases the ID for reuse.
    ///
    /// # Panics
    /// Debug-asserts `id` is currently live (destroying a stale or
    /// never-issued handle is a programming error).
    pub fn destroy_entity(&mut self, id: EntityId) {
        debug_assert!(self.directory.is_valid(id), "destroy_entity of invalid handle {:?}", id);
        if !self.directory.is_valid(id) {
            return;
        }
        let mask = self.directory.teardown(id);
        for bit in mask.iter() {
            if let Some(storage) = self.storage_dyn_mut(bit) {
                storage.erase_any(id);
            }
        }
        self.id_gen.release(id);
        self.changed.push(id);
    }

    /// Destroys every active entity. Uses the fast teardown path that
    /// skips per-entity active-list fixups, since every list is cleared
    /// wholesale afterward (see `EntityDirectory::teardown_bulk`).
    pub fn destroy_all(&mut self) {
        self.directory.rebuild_ordered_if_dirty();
        let ids: Vec<EntityId> = self.directory.ordered_active().to_vec();
        for id in &ids {
            let mask = self.directory.teardown_bulk(*id);
            for bit in mask.iter() {
                if let Some(storage) = self.storage_dyn_mut(bit) {
                    storage.erase_any(*id);
                }
            }
            self.changed.push(*id);
        }
        self.directory.clear_all();
        self.id_gen.reset();
    }

    /// `true` if `id` names a currently-live entity.
    pub fn is_valid(&self, id: EntityId) -> bool {
        self.directory.is_valid(id)
    }

    // ---- components -------------------------------------------------------

    /// Attaches `value` as `id`'s `T` component.
    ///
    /// # Panics
    /// Debug-asserts `id` doesn't already have a `T` (precondition
    /// violation, not a race: within one call this always runs
    /// synchronously against the live bitmask).
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) {
        debug_assert!(self.directory.is_valid(id), "add_component on invalid handle {:?}", id);
        let bit = self.ensure_type_index::<T>();
        self.directory.flip_bit(id, bit, false);
        self.get_component_storage_mut::<T>().push_back(id, value);
        self.changed.push(id);
    }

    /// Removes `id`'s `T` component, if registered.
    ///
    /// # Panics
    /// Debug-asserts `id` currently has a `T` (removing an absent
    /// component is a programming error).
    pub fn remove_component<T: Component>(&mut self, id: EntityId) {
        debug_assert!(self.directory.is_valid(id), "remove_component on invalid handle {:?}", id);
        let bit = self.ensure_type_index::<T>();
        self.directory.flip_bit(id, bit, true);
        self.get_component_storage_mut::<T>().erase(id);
        self.changed.push(id);
    }

    /// Reference to `id`'s `T`, or `None` if absent or `id` is stale.
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        if !self.type_indices.contains_key(&TypeId::of::<T>()) {
            return None;
        }
        self.get_component_storage::<T>().get(id)
    }

    /// Mutable reference to `id`'s `T`, or `None` if absent or stale.
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        if !self.type_indices.contains_key(&TypeId::of::<T>()) {
            return None;
        }
        self.get_component_storage_mut::<T>().get_mut(id)
    }

    /// Attaches a bundle of up to three components at once.
    pub fn add_components<B: ComponentBundle>(&mut self, id: EntityId, bundle: B) {
        bundle.add_to(self, id);
    }

    /// Removes a bundle of up to three component types at once.
    pub fn remove_components<L: ComponentTypeList>(&mut self, id: EntityId) {
        L::remove_from(self, id);
    }

    // ---- queries ------------------------------------------------------------

    /// Index-sorted active entities, rebuilding the cached view first if
    /// it was marked dirty since the last rebuild.
    pub fn get_active_list(&mut self) -> &[EntityId] {
        self.directory.rebuild_ordered_if_dirty();
        self.directory.ordered_active()
    }

    /// Same entities as `get_active_list`, through a shared reference.
    /// Safe to call from inside a process's `remap`/`update`, where the
    /// list is guaranteed fresh because `World::update` rebuilds it
    /// before driving any process this frame.
    pub fn get_active_list_const(&self) -> &[EntityId] {
        self.directory.ordered_active()
    }

    /// One past the highest entity index ever assigned a slot.
    pub fn max_entity_index(&self) -> u32 {
        self.directory.max_index()
    }

    /// `true` iff `id` is live and its component bitmask is a superset of
    /// `required`.
    pub fn is_match_aspect(&self, id: EntityId, required: &BitMask) -> bool {
        match self.directory.mask_of(id) {
            Some(mask) => mask.contains(required),
            None => false,
        }
    }

    /// Appends `id` to the changed-set, flagging it for the next `remap`.
    /// Duplicates are fine; consumers tolerate them.
    pub fn notify_changes(&mut self, id: EntityId) {
        self.changed.push(id);
    }

    // ---- processes ------------------------------------------------------------

    /// Registers a process. Only callable while holding `&mut World`,
    /// which only happens in the MUTABLE phase — processes never see
    /// `&mut World`, so they structurally cannot call this on themselves.
    ///
    /// The world stores only a `Weak` handle (see `DESIGN.md` on why
    /// unregistration is caller-driven rather than `Drop`-triggered): the
    /// caller must keep its own strong `Arc` alive for as long as the
    /// process should keep running, or it silently stops being driven the
    /// next time its slot is upgraded.
    pub fn register_process(&mut self, process: Arc<Mutex<dyn Process>>) -> ProcessId {
        debug_assert_eq!(self.phase, Phase::Mutable, "register_process outside MUTABLE phase");
        self.processes.register(process)
    }

    /// Unregisters a previously-registered process.
    pub fn unregister_process(&mut self, id: ProcessId) {
        debug_assert_eq!(self.phase, Phase::Mutable, "unregister_process outside MUTABLE phase");
        self.processes.unregister(id);
    }

    // ---- the frame driver -------------------------------------------------------

    /// Drives one full MUTABLE → REMAP → UPDATE → MUTABLE cycle:
    ///
    /// 1. Locks the dispatcher and the ID generator.
    /// 2. If the changed-set is non-empty, delivers it to every active
    ///    process's `remap`, then clears it.
    /// 3. Delivers the full ordered active list to every pending
    ///    (first-tick) process's `remap`, promoting each to active.
    /// 4. Runs every active process's `update(dt)`, in registration order.
    /// 5. Unlocks the dispatcher, replaying every buffered command.
    pub fn update(&mut self, dt: f32) {
        self.dispatcher.lock();
        self.id_gen.lock();
        self.phase = Phase::Remap;
        self.directory.rebuild_ordered_if_dirty();

        // `ProcessRegistry` is pulled out of `self` for the duration of each
        // call below, because the registry needs `&mut self.processes`
        // while the `Process` callbacks it drives need `&World` (i.e. all
        // of `self`, `processes` field included) — an aliasing conflict
        // the borrow checker would otherwise reject.
        let mut processes = std::mem::take(&mut self.processes);

        if !self.changed.is_empty() {
            let changed = std::mem::take(&mut self.changed);
            let max_index = self.directory.max_index();
            processes.remap_active(self, &changed, max_index);
        }

        if processes.has_pending() {
            let ordered = self.directory.ordered_active().to_vec();
            let max_index = self.directory.max_index();
            processes.promote_pending(self, &ordered, max_index);
        }

        self.phase = Phase::Update;
        let commands = Commands { id_gen: &self.id_gen, dispatcher: &self.dispatcher };
        processes.update_active(self, &commands, dt);
        self.processes = processes;

        self.phase = Phase::Mutable;
        self.id_gen.unlock();
        self.dispatcher.unlock_and_drain(self);
    }
}

/// Chains `with(component)` calls onto a freshly-created entity.
#[must_use = "call .build() to finish, or the entity stays component-less"]
pub struct EntityBuilder<'a> {
    world: &'a mut World,
    id: EntityId,
}

impl<'a> EntityBuilder<'a> {
    /// Attaches `value` and returns `self` for chaining.
    pub fn with<T: Component>(self, value: T) -> Self {
        self.world.add_component(self.id, value);
        self
    }

    /// Finishes building, returning the entity's ID.
    pub fn build(self) -> EntityId {
        self.id
    }
}

/// A tuple of up to three component values, attachable in one call via
/// `World::add_components`.
pub trait ComponentBundle {
    /// Adds every element of the bundle to `id`.
    fn add_to(self, world: &mut World, id: EntityId);
}

/// A tuple of up to three component *types*, removable in one call via
/// `World::remove_components`.
pub trait ComponentTypeList {
    /// Removes every type in the list from `id`.
    fn remove_from(world: &mut World, id: EntityId);
}

macro_rules! impl_bundle_tuple {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentBundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn add_to(self, world: &mut World, id: EntityId) {
                let ($($name,)+) = self;
                $(world.add_component(id, $name);)+
            }
        }

        impl<$($name: Component),+> ComponentTypeList for ($($name,)+) {
            fn remove_from(world: &mut World, id: EntityId) {
                $(world.remove_component::<$name>(id);)+
            }
        }
    };
}

impl_bundle_tuple!(A0);
impl_bundle_tuple!(A0, A1);
impl_bundle_tuple!(A0, A1, A2);
