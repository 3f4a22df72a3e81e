//! Compile-time aspects: "give me entity + references to components
//! `{C0..Cn}`, each marked read or read-write" bundled into a
//! required-components bitmask and a per-entity view.

use crate::bitmask::BitMask;
use crate::world::{Component, World};

/// Marks a component as required read-only by an aspect.
pub struct Read<T>(std::marker::PhantomData<fn() -> T>);
/// Marks a component as required read-write by an aspect.
pub struct Write<T>(std::marker::PhantomData<fn() -> T>);

/// One element of an aspect tuple: names the component type and whether
/// the aspect needs it mutably.
pub trait AspectComponent {
    /// The underlying component type.
    type Component: Component;
    /// The reference type a view hands back for this element.
    type Ref<'a>;
    /// `true` if this element needs write access.
    const WRITE: bool;

    /// Builds the view reference for `id`. Precondition: `id` matches the
    /// owning aspect's required mask (the fold/remap step guarantees this
    /// for every id in a working set).
    ///
    /// # Safety
    /// Read-write elements hand out a `&mut` through a shared `&World`;
    /// the caller (the aspect's `view`/iteration helpers) must guarantee
    /// no two live views alias the same entity's component.
    unsafe fn view<'a>(world: &'a World, id: crate::entity::EntityId) -> Self::Ref<'a>;
}

impl<T: Component> AspectComponent for Read<T> {
    type Component = T;
    type Ref<'a> = &'a T;
    const WRITE: bool = false;

    unsafe fn view<'a>(world: &'a World, id: crate::entity::EntityId) -> Self::Ref<'a> {
        world
            .get_component_storage::<T>()
            .get(id)
            .expect("aspect view built for entity not matching its own aspect")
    }
}

impl<T: Component> AspectComponent for Write<T> {
    type Component = T;
    type Ref<'a> = &'a mut T;
    const WRITE: bool = true;

    unsafe fn view<'a>(world: &'a World, id: crate::entity::EntityId) -> Self::Ref<'a> {
        // SAFETY: forwarded to the caller's contract (see trait docs).
        unsafe {
            world
                .get_component_storage::<T>()
                .get_mut_unchecked(id)
                .expect("aspect view built for entity not matching its own aspect")
        }
    }
}

/// A compile-time bundle of up to three `Read<_>`/`Write<_>` elements.
/// Produces the required-components bitmask a process's remap step
/// matches entities against, and a per-entity view tuple.
pub trait Aspect {
    /// `(EntityId, refs...)` produced by `view`.
    type View<'a>;

    /// Bitmask with a bit set for every component type in this aspect.
    fn required_mask(world: &World) -> BitMask;

    /// Subset of `required_mask` that is read-only.
    fn readonly_mask(world: &World) -> BitMask;

    /// Builds the view for `id`.
    ///
    /// # Safety
    /// `id` must match `required_mask` (guaranteed for entities drawn from
    /// a working set folded by this aspect's required mask), and no other
    /// live view may alias one of this aspect's write elements for `id`.
    unsafe fn view<'a>(world: &'a World, id: crate::entity::EntityId) -> Self::View<'a>;
}

macro_rules! impl_aspect_tuple {
    ($($name:ident),+) => {
        impl<$($name: AspectComponent),+> Aspect for ($($name,)+) {
            type View<'a> = (crate::entity::EntityId, $($name::Ref<'a>,)+);

            fn required_mask(world: &World) -> BitMask {
                let mut mask = BitMask::new();
                $(mask.set(world.type_index_of::<$name::Component>());)+
                mask
            }

            fn readonly_mask(world: &World) -> BitMask {
                let mut mask = BitMask::new();
                $(
                    if !$name::WRITE {
                        mask.set(world.type_index_of::<$name::Component>());
                    }
                )+
                mask
            }

            unsafe fn view<'a>(world: &'a World, id: crate::entity::EntityId) -> Self::View<'a> {
                // SAFETY: forwarded to the caller's contract (see trait docs).
                unsafe { (id, $($name::view(world, id),)+) }
            }
        }
    };
}

impl_aspect_tuple!(A0);
impl_aspect_tuple!(A0, A1);
impl_aspect_tuple!(A0, A1, A2);

/// Iterates a working set (or one bucket's slice of it), yielding each
/// entity's aspect view.
///
/// # Safety
/// Every id in `working_set` must match `A`'s required mask, and the slice
/// must not be iterated more than once concurrently for aspects with a
/// `Write<_>` element on the same storage (bucket slices from one
/// `fold_and_reorder` call never repeat an id, so a single pass over one
/// working set is always sound; the caller is responsible if it combines
/// multiple working sets over the same aspect).
pub unsafe fn iter_aspect<'a, A: Aspect>(
    world: &'a World,
    working_set: &'a [crate::entity::EntityId],
) -> impl Iterator<Item = A::View<'a>> {
    working_set.iter().map(move |&id| {
        // SAFETY: forwarded to this function's contract.
        unsafe { A::view(world, id) }
    })
}

/// Applies `f` to every entity's view in `bucket_ids`, spread across
/// rayon's thread pool.
///
/// Entities within one bucket share no ordering requirement, so this is
/// sound to call per-bucket; calling it across bucket boundaries would
/// break the "bucket k before bucket k+1" guarantee the fold step exists
/// to provide (see `remap::fold_and_reorder`), so callers should drive one
/// bucket at a time, in ascending key order, when that ordering matters.
///
/// # Safety
/// Same contract as [`iter_aspect`].
#[cfg(feature = "parallel")]
pub unsafe fn par_iter_bucket<A, F>(world: &World, bucket_ids: &[crate::entity::EntityId], f: F)
where
    A: Aspect,
    F: Fn(A::View<'_>) + Send + Sync,
{
    use rayon::prelude::*;
    bucket_ids.par_iter().for_each(|&id| {
        // SAFETY: forwarded to this function's contract.
        let view = unsafe { A::view(world, id) };
        f(view);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{World, WorldConfig};

    #[derive(Debug, PartialEq)]
    struct Pos(f32, f32);
    #[derive(Debug, PartialEq)]
    struct Vel(f32, f32);

    #[test]
    fn required_and_readonly_masks() {
        let mut world = World::new(WorldConfig::default());
        world.register_component::<Pos>().unwrap();
        world.register_component::<Vel>().unwrap();

        type MyAspect = (Read<Pos>, Write<Vel>);
        let required = <MyAspect as Aspect>::required_mask(&world);
        let readonly = <MyAspect as Aspect>::readonly_mask(&world);

        assert!(required.get(world.type_index_of::<Pos>()));
        assert!(required.get(world.type_index_of::<Vel>()));
        assert!(readonly.get(world.type_index_of::<Pos>()));
        assert!(!readonly.get(world.type_index_of::<Vel>()));
    }

    #[test]
    #[cfg(feature = "parallel")]
    fn par_iter_bucket_writes_disjoint_entities() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut world = World::new(WorldConfig::default());
        let ids: Vec<_> = (0..64)
            .map(|i| world.build_entity().with(Vel(i as f32, 0.0)).build())
            .collect();

        let touched = AtomicUsize::new(0);
        unsafe {
            super::par_iter_bucket::<(Write<Vel>,), _>(&world, &ids, |(_, vel)| {
                vel.0 += 1.0;
                touched.fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(touched.load(Ordering::Relaxed), 64);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(world.get_component::<Vel>(*id), Some(&Vel(i as f32 + 1.0, 0.0)));
        }
    }

    #[test]
    fn view_reads_and_writes_through_world() {
        let mut world = World::new(WorldConfig::default());
        let id = world.create_entity();
        world.add_component(id, Pos(1.0, 2.0));
        world.add_component(id, Vel(0.5, 0.0));

        type MyAspect = (Read<Pos>, Write<Vel>);
        unsafe {
            let (got_id, pos, vel) = MyAspect::view(&world, id);
            assert_eq!(got_id, id);
            assert_eq!(*pos, Pos(1.0, 2.0));
            vel.0 += 1.0;
        }
        assert_eq!(world.get_component::<Vel>(id), Some(&Vel(1.5, 0.0)));
    }
}
