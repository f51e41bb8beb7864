//! # ECS World
//!
//! The central container: entity lifecycle, the component registry with one
//! pool per kind, and the system registry.

// SAFETY: the world runs component drop hooks on pool slots.
#![allow(unsafe_code)]

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::time::Instant;

use bytemuck::Pod;
use tracing::{debug, trace};

use super::component::{Component, ComponentId, ComponentIdAllocator};
use super::entity::{EntityAllocator, EntityId};
use super::layout::TypedLayout;
use super::mask::ComponentMask;
use super::system::{System, SystemRegistry};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult, SystemError};
use crate::memory::ComponentPool;

/// The ECS World - container for all entities, components and systems.
///
/// Invariant: for every live entity `e` and kind `c`, bit `c` of `e`'s mask
/// is set exactly when pool `c` has a slot for `e`. Every mutating method
/// updates both sides inside one `&mut self` call.
///
/// # Thread Safety
///
/// Single-threaded. The world is neither `Send` nor `Sync`.
///
/// # Example
///
/// ```rust
/// use oroboros_ecs::{ComponentMask, World};
///
/// let mut world = World::new();
/// let position = world.register_component("Position", 8usize).unwrap();
/// let velocity = world.register_component("Velocity", 8usize).unwrap();
///
/// let e1 = world.new_entity().unwrap();
/// world.insert_component(e1, position, [1.0f32, 2.0]).unwrap();
///
/// assert_eq!(world.get_entities(&ComponentMask::from(position)), vec![e1]);
/// assert!(world.get_entities(&ComponentMask::from(velocity)).is_empty());
/// ```
pub struct World {
    config: WorldConfig,
    component_ids: ComponentIdAllocator,
    /// Registered kinds, indexed by id.
    components: Vec<Component>,
    component_names: HashMap<String, ComponentId>,
    /// One pool per kind, parallel to `components`.
    pools: Vec<ComponentPool>,
    entities: EntityAllocator,
    systems: SystemRegistry,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Creates an empty world.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration is unusable.
    pub fn with_config(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            entities: EntityAllocator::new(config.entity_limit),
            config,
            component_ids: ComponentIdAllocator::new(),
            components: Vec::new(),
            component_names: HashMap::new(),
            pools: Vec::new(),
            systems: SystemRegistry::new(),
        }
    }

    /// The configuration this world was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Component registry
    // =========================================================================

    /// Registers a component kind using the default page size.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponent`] if the name is taken
    /// - [`EcsError::ComponentLimitReached`] for a 65th kind
    pub fn register_component(
        &mut self,
        name: impl Into<String>,
        layout: impl TypedLayout,
    ) -> EcsResult<ComponentId> {
        let page_size = self.config.default_page_size;
        self.register_component_with_page_size(name, layout, page_size)
    }

    /// Registers a component kind whose pool uses `page_size` slots per page.
    ///
    /// # Errors
    ///
    /// As [`register_component`](Self::register_component), plus
    /// [`EcsError::InvalidConfig`] for a zero page size or a page too large
    /// to allocate. A failed registration leaves the registry unchanged.
    pub fn register_component_with_page_size(
        &mut self,
        name: impl Into<String>,
        layout: impl TypedLayout,
        page_size: usize,
    ) -> EcsResult<ComponentId> {
        let name = name.into();
        if self.component_names.contains_key(&name) {
            return Err(EcsError::DuplicateComponent(name));
        }

        let layout = layout.component_layout();
        let pool = ComponentPool::try_new(layout.layout(), page_size).map_err(|e| match e {
            EcsError::InvalidConfig(reason) => {
                EcsError::InvalidConfig(format!("component {name}: {reason}"))
            }
            other => other,
        })?;
        // The id is issued last: nothing below can fail.
        let id = self.component_ids.allocate()?;
        debug!(
            component = %name,
            id = id.raw(),
            size = layout.size(),
            align = layout.align(),
            page_size,
            "registered component"
        );

        self.pools.push(pool);
        self.component_names.insert(name.clone(), id);
        self.components.push(Component::new(id, name, layout, page_size));
        Ok(id)
    }

    /// All registered kinds, in id order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// A registered kind by id.
    #[inline]
    #[must_use]
    pub fn component_info(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.index())
    }

    /// A registered kind by name.
    #[must_use]
    pub fn component_by_name(&self, name: &str) -> Option<&Component> {
        let id = self.component_names.get(name)?;
        self.components.get(id.index())
    }

    /// Looks up a kind's id by name.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no kind has this name.
    pub fn component_id(&self, name: &str) -> EcsResult<ComponentId> {
        self.component_names
            .get(name)
            .copied()
            .ok_or_else(|| EcsError::UnknownComponent(name.to_owned()))
    }

    /// Builds a query mask from kind names.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] for the first unknown name.
    pub fn mask_of(&self, names: &[&str]) -> EcsResult<ComponentMask> {
        names
            .iter()
            .map(|name| self.component_id(name))
            .collect::<EcsResult<ComponentMask>>()
    }

    /// The pool backing a kind.
    #[inline]
    #[must_use]
    pub fn pool(&self, id: ComponentId) -> Option<&ComponentPool> {
        self.pools.get(id.index())
    }

    fn registered(&self, id: ComponentId) -> EcsResult<&Component> {
        self.components
            .get(id.index())
            .ok_or(EcsError::InvalidComponentId(id))
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Bounds-checked existence test.
    #[inline]
    #[must_use]
    pub fn entity_exists(&self, id: EntityId) -> bool {
        self.entities.exists(id)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Creates an entity with no components.
    ///
    /// Reuses the smallest destroyed id if any, else the next unused id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityIdsExhausted`] when every id is live.
    pub fn new_entity(&mut self) -> EcsResult<EntityId> {
        self.entities.allocate()
    }

    /// Destroys an entity, dropping and releasing all of its components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] if the entity does not exist.
    pub fn destroy_entity(&mut self, id: EntityId) -> EcsResult<()> {
        let mask = self.entity_mask(id).ok_or(EcsError::EntityNotFound(id))?;
        for component in mask {
            self.detach(id, component)?;
        }
        self.entities.release(id)
    }

    /// Components currently attached to a live entity.
    #[inline]
    #[must_use]
    pub fn entity_mask(&self, id: EntityId) -> Option<ComponentMask> {
        self.entities.get(id).map(|e| e.components)
    }

    // =========================================================================
    // Component attach / detach
    // =========================================================================

    /// Whether a live entity carries a component. The mask is authoritative.
    #[inline]
    #[must_use]
    pub fn has_component(&self, id: EntityId, component: ComponentId) -> bool {
        self.entities
            .get(id)
            .is_some_and(|e| e.components.includes(component))
    }

    /// Attaches a component and returns its raw slot.
    ///
    /// The slot holds zeroes if its page is new, or stale bytes from a
    /// previous occupant otherwise.
    ///
    /// # Safety
    ///
    /// If the kind has a drop hook, the caller must construct a valid value
    /// of the kind's type in the slot before the component is removed, the
    /// entity is destroyed, or the world is dropped: all three run the hook
    /// on the slot.
    ///
    /// If the kind is plain data, every byte the caller writes must be
    /// initialized (no padding): the safe typed and byte views read the slot
    /// as raw bytes.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidComponentId`] if the kind is not registered
    /// - [`EcsError::EntityNotFound`] if the entity does not exist
    /// - [`EcsError::ComponentAlreadyPresent`] if it is already attached
    pub unsafe fn add_component(
        &mut self,
        id: EntityId,
        component: ComponentId,
    ) -> EcsResult<NonNull<u8>> {
        self.attach(id, component)
    }

    /// Updates pool and mask together. The pool goes first: it is the only
    /// step that can fail (allocation), and the mask bit follows only once
    /// the slot exists.
    fn attach(&mut self, id: EntityId, component: ComponentId) -> EcsResult<NonNull<u8>> {
        let pool = self
            .pools
            .get_mut(component.index())
            .ok_or(EcsError::InvalidComponentId(component))?;
        let entity = self.entities.get_mut(id).ok_or(EcsError::EntityNotFound(id))?;
        if entity.components.includes(component) {
            return Err(EcsError::ComponentAlreadyPresent {
                entity: id,
                component,
            });
        }

        let slot = pool.add(id);
        entity.components.include(component);
        trace!(entity = id.raw(), component = component.raw(), "component attached");
        Ok(slot)
    }

    /// Clears mask and pool bits, then drops the value. The slot memory
    /// stays mapped until the next structural change of that pool, so the
    /// drop runs after the bookkeeping is already consistent.
    fn detach(&mut self, id: EntityId, component: ComponentId) -> EcsResult<()> {
        let drop_fn = self.registered(component)?.layout().drop_fn();
        let entity = self.entities.get_mut(id).ok_or(EcsError::EntityNotFound(id))?;
        if !entity.components.includes(component) {
            return Err(EcsError::ComponentMissing {
                entity: id,
                component,
            });
        }
        let pool = &mut self.pools[component.index()];
        let slot = pool.get(id).ok_or(EcsError::ComponentMissing {
            entity: id,
            component,
        })?;

        entity.components.exclude(component);
        pool.remove(id);
        trace!(entity = id.raw(), component = component.raw(), "component detached");

        if let Some(drop_fn) = drop_fn {
            // SAFETY: `add_component` requires a valid value to be
            // constructed in the slot before removal. The slot was just
            // released and nothing else can reach it.
            unsafe { drop_fn(slot) };
        }
        Ok(())
    }

    /// Raw slot of an attached component.
    #[inline]
    #[must_use]
    pub fn get_component(&self, id: EntityId, component: ComponentId) -> Option<NonNull<u8>> {
        if !self.has_component(id, component) {
            return None;
        }
        self.pools.get(component.index())?.get(id)
    }

    /// Detaches a component, running its drop hook.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidComponentId`] if the kind is not registered
    /// - [`EcsError::EntityNotFound`] if the entity does not exist
    /// - [`EcsError::ComponentMissing`] if it is not attached
    pub fn remove_component(&mut self, id: EntityId, component: ComponentId) -> EcsResult<()> {
        self.detach(id, component)
    }

    // =========================================================================
    // Typed access (plain-data kinds)
    // =========================================================================

    /// Checks that `T` may view a kind's bytes.
    fn check_pod<T: Pod>(&self, component: ComponentId) -> EcsResult<()> {
        let layout = self.registered(component)?.layout();
        if !layout.is_plain_data() {
            return Err(EcsError::NotPlainData(component));
        }
        let (size, align) = (std::mem::size_of::<T>(), std::mem::align_of::<T>());
        if layout.size() != size || layout.align() < align {
            return Err(EcsError::LayoutMismatch {
                component,
                expected: layout.size(),
                expected_align: layout.align(),
                actual: size,
                actual_align: align,
            });
        }
        Ok(())
    }

    /// Attaches a component and writes `value` into it.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotPlainData`] or [`EcsError::LayoutMismatch`] if `T`
    /// cannot view the kind, plus everything
    /// [`add_component`](Self::add_component) reports.
    pub fn insert_component<T: Pod>(
        &mut self,
        id: EntityId,
        component: ComponentId,
        value: T,
    ) -> EcsResult<&mut T> {
        self.check_pod::<T>(component)?;
        self.attach(id, component)?;
        let value_slot = self.component_mut::<T>(id, component)?;
        *value_slot = value;
        Ok(value_slot)
    }

    /// Reads an attached plain-data component as `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotPlainData`], [`EcsError::LayoutMismatch`] or
    /// [`EcsError::ComponentMissing`].
    pub fn component<T: Pod>(&self, id: EntityId, component: ComponentId) -> EcsResult<&T> {
        self.check_pod::<T>(component)?;
        let bytes = self
            .component_bytes(id, component)
            .ok_or(EcsError::ComponentMissing {
                entity: id,
                component,
            })?;
        Ok(bytemuck::from_bytes(bytes))
    }

    /// Mutably views an attached plain-data component as `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotPlainData`], [`EcsError::LayoutMismatch`] or
    /// [`EcsError::ComponentMissing`].
    pub fn component_mut<T: Pod>(
        &mut self,
        id: EntityId,
        component: ComponentId,
    ) -> EcsResult<&mut T> {
        self.check_pod::<T>(component)?;
        let bytes = self
            .component_bytes_mut(id, component)
            .ok_or(EcsError::ComponentMissing {
                entity: id,
                component,
            })?;
        Ok(bytemuck::from_bytes_mut(bytes))
    }

    /// Bytes of an attached plain-data component.
    ///
    /// `None` if it is not attached or the kind has a drop hook.
    #[must_use]
    pub fn component_bytes(&self, id: EntityId, component: ComponentId) -> Option<&[u8]> {
        if !self.component_info(component)?.layout().is_plain_data()
            || !self.has_component(id, component)
        {
            return None;
        }
        self.pools[component.index()].slot_bytes(id)
    }

    /// Mutable bytes of an attached plain-data component.
    ///
    /// `None` if it is not attached or the kind has a drop hook.
    #[must_use]
    pub fn component_bytes_mut(&mut self, id: EntityId, component: ComponentId) -> Option<&mut [u8]> {
        if !self.component_info(component)?.layout().is_plain_data()
            || !self.has_component(id, component)
        {
            return None;
        }
        self.pools[component.index()].slot_bytes_mut(id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Live entities whose mask includes every kind in `mask`, ascending.
    ///
    /// The empty mask matches every live entity.
    #[must_use]
    pub fn get_entities(&self, mask: &ComponentMask) -> Vec<EntityId> {
        self.iter_entities(*mask).collect()
    }

    /// Every live entity, ascending.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.get_entities(&ComponentMask::new())
    }

    /// Lazy form of [`get_entities`](Self::get_entities).
    pub fn iter_entities(&self, mask: ComponentMask) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .iter()
            .filter(move |(_, e)| e.components.includes_mask(&mask))
            .map(|(id, _)| id)
    }

    /// Live entities that have all of `with` and none of `without`, ascending.
    #[must_use]
    pub fn entities_matching(&self, with: &ComponentMask, without: &ComponentMask) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, e)| e.components.includes_mask(with) && e.components.includes_not(without))
            .map(|(id, _)| id)
            .collect()
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Registers a named system, enabled.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if the name is taken.
    pub fn register_system<F>(&mut self, name: impl Into<String>, function: F) -> EcsResult<()>
    where
        F: FnMut(&mut World, f32) -> Result<(), SystemError> + 'static,
    {
        self.systems.register(name, Box::new(function))
    }

    /// Systems in ascending name order.
    pub fn systems(&self) -> impl Iterator<Item = &System> + '_ {
        self.systems.iter()
    }

    /// Systems in ascending name order, mutably (for toggling).
    pub fn systems_mut(&mut self) -> impl Iterator<Item = &mut System> + '_ {
        self.systems.iter_mut()
    }

    /// A system by name.
    #[must_use]
    pub fn system(&self, name: &str) -> Option<&System> {
        self.systems.get(name)
    }

    /// A system by name, mutably.
    pub fn system_mut(&mut self, name: &str) -> Option<&mut System> {
        self.systems.get_mut(name)
    }

    /// Enables or disables a system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if no system has this name.
    pub fn set_system_enabled(&mut self, name: &str, enabled: bool) -> EcsResult<()> {
        let system = self
            .systems
            .get_mut(name)
            .ok_or_else(|| EcsError::UnknownSystem(name.to_owned()))?;
        system.set_enabled(enabled);
        Ok(())
    }

    /// Runs a system once.
    ///
    /// A disabled system is skipped entirely: its function does not run and
    /// its recorded duration is unchanged.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownSystem`] if no system has this name
    /// - [`EcsError::SystemReentered`] if the system is already running
    /// - [`EcsError::SystemFailed`] carrying the function's own error
    ///
    /// # Panics
    ///
    /// Propagates a panic from the system function, after reattaching it.
    pub fn invoke_system(&mut self, name: &str, delta_time: f32) -> EcsResult<()> {
        let system = self
            .systems
            .get_mut(name)
            .ok_or_else(|| EcsError::UnknownSystem(name.to_owned()))?;
        if !system.enabled() {
            return Ok(());
        }
        let mut function = system.take_function()?;

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| function(self, delta_time)));
        let elapsed = start.elapsed();

        // Reattach before resuming a panic so the system stays invocable.
        if let Some(system) = self.systems.get_mut(name) {
            system.finish(function, elapsed);
        }
        let result = outcome.unwrap_or_else(|payload| panic::resume_unwind(payload));
        result.map_err(|source| EcsError::SystemFailed {
            system: name.to_owned(),
            source,
        })
    }

    /// Runs every enabled system once, in name order. Stops at the first error.
    ///
    /// # Errors
    ///
    /// The first error [`invoke_system`](Self::invoke_system) reports.
    pub fn invoke_all(&mut self, delta_time: f32) -> EcsResult<()> {
        let names: Vec<String> = self.systems.names().map(str::to_owned).collect();
        for name in names {
            self.invoke_system(&name, delta_time)?;
        }
        Ok(())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        for (component, pool) in self.components.iter().zip(&self.pools) {
            let Some(drop_fn) = component.layout().drop_fn() else {
                continue;
            };
            for id in pool.occupied() {
                if let Some(slot) = pool.get(id) {
                    // SAFETY: occupied slots of a kind with a drop hook hold
                    // a valid value (contract of `add_component`); each is
                    // dropped once and the pool is freed right after.
                    unsafe { drop_fn(slot) };
                }
            }
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("components", &self.components.len())
            .field("entities", &self.entities.alive_count())
            .field("entity_high_water", &self.entities.high_water())
            .field("systems", &self.systems.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentLayout;
    use std::cell::Cell;
    use std::rc::Rc;

    fn world_with_position_velocity() -> (World, ComponentId, ComponentId) {
        let mut world = World::new();
        let position = world.register_component("Position", 8usize).unwrap();
        let velocity = world.register_component("Velocity", 8usize).unwrap();
        (world, position, velocity)
    }

    fn assert_consistent(world: &World) {
        for id in world.entities() {
            for component in world.components() {
                let c = component.id();
                assert_eq!(
                    world.has_component(id, c),
                    world.pool(c).unwrap().has(id),
                    "mask and pool disagree for entity {id}, component {c}"
                );
            }
        }
    }

    #[test]
    fn test_world_creation() {
        let world = World::new();
        assert_eq!(world.entity_count(), 0);
        assert!(world.components().is_empty());
        assert_eq!(world.systems().count(), 0);
    }

    #[test]
    fn test_debug_reports_counts() {
        let mut world = World::new();
        let a = world.new_entity().unwrap();
        world.new_entity().unwrap();
        world.destroy_entity(a).unwrap();

        let debug = format!("{world:?}");
        assert!(debug.contains("entities: 1"), "{debug}");
        assert!(debug.contains("entity_high_water: 2"), "{debug}");
    }

    #[test]
    fn test_register_component_assigns_ids_in_order() {
        let (world, position, velocity) = world_with_position_velocity();
        assert_eq!(position, ComponentId::new(0));
        assert_eq!(velocity, ComponentId::new(1));
        assert_eq!(world.component_id("Velocity").unwrap(), velocity);
        assert_eq!(world.components()[1].name(), "Velocity");
        assert_eq!(world.pool(position).unwrap().component_size(), 8);
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let (mut world, _, _) = world_with_position_velocity();
        assert!(matches!(
            world.register_component("Position", 4usize),
            Err(EcsError::DuplicateComponent(name)) if name == "Position"
        ));
        assert_eq!(world.components().len(), 2);
    }

    #[test]
    fn test_unknown_component_name() {
        let world = World::new();
        assert!(matches!(
            world.component_id("Missing"),
            Err(EcsError::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_custom_page_size() {
        let mut world = World::new();
        let id = world
            .register_component_with_page_size("Tag", 0usize, 32)
            .unwrap();
        assert_eq!(world.component_info(id).unwrap().page_size(), 32);
        assert_eq!(world.pool(id).unwrap().page_size(), 32);
        assert!(world
            .register_component_with_page_size("Bad", 4usize, 0)
            .is_err());
    }

    #[test]
    fn test_oversized_page_leaves_registry_unchanged() {
        let mut world = World::new();
        assert!(matches!(
            world.register_component_with_page_size("Big", 4096usize, usize::MAX / 2),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(world.component_by_name("Big").is_none());

        let small = world.register_component("Small", 4usize).unwrap();
        assert_eq!(small, ComponentId::new(0));
        assert_eq!(world.component_info(small).unwrap().name(), "Small");

        let e = world.new_entity().unwrap();
        world.insert_component(e, small, 7u32).unwrap();
        assert_eq!(*world.component::<u32>(e, small).unwrap(), 7);
    }

    #[test]
    fn test_insert_and_read_typed() {
        let (mut world, position, _) = world_with_position_velocity();
        let e = world.new_entity().unwrap();

        world.insert_component(e, position, [1.5f32, -2.0]).unwrap();
        assert_eq!(*world.component::<[f32; 2]>(e, position).unwrap(), [1.5, -2.0]);

        world.component_mut::<[f32; 2]>(e, position).unwrap()[0] = 9.0;
        assert_eq!(world.component::<[f32; 2]>(e, position).unwrap()[0], 9.0);
        assert_consistent(&world);
    }

    #[test]
    fn test_layout_mismatch() {
        let (mut world, position, _) = world_with_position_velocity();
        let e = world.new_entity().unwrap();
        assert!(matches!(
            world.insert_component(e, position, 1u32),
            Err(EcsError::LayoutMismatch { expected: 8, actual: 4, .. })
        ));
        assert!(!world.has_component(e, position));
    }

    #[test]
    fn test_double_add_rejected() {
        let (mut world, position, _) = world_with_position_velocity();
        let e = world.new_entity().unwrap();
        world.insert_component(e, position, 0u64).unwrap();
        assert!(matches!(
            world.insert_component(e, position, 0u64),
            Err(EcsError::ComponentAlreadyPresent { .. })
        ));
        assert_consistent(&world);
    }

    #[test]
    fn test_remove_component() {
        let (mut world, position, velocity) = world_with_position_velocity();
        let e = world.new_entity().unwrap();
        world.insert_component(e, position, 1u64).unwrap();
        world.insert_component(e, velocity, 2u64).unwrap();

        world.remove_component(e, position).unwrap();
        assert!(!world.has_component(e, position));
        assert!(world.has_component(e, velocity));
        assert!(world.get_component(e, position).is_none());
        assert_consistent(&world);

        assert!(matches!(
            world.remove_component(e, position),
            Err(EcsError::ComponentMissing { .. })
        ));
    }

    #[test]
    fn test_operations_on_missing_entity() {
        let (mut world, position, _) = world_with_position_velocity();
        let ghost = EntityId::new(42);
        assert!(!world.entity_exists(ghost));
        assert!(!world.has_component(ghost, position));
        assert!(matches!(
            world.destroy_entity(ghost),
            Err(EcsError::EntityNotFound(_))
        ));
        assert!(matches!(
            world.insert_component(ghost, position, 0u64),
            Err(EcsError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_component_id() {
        let mut world = World::new();
        let e = world.new_entity().unwrap();
        assert!(matches!(
            world.remove_component(e, ComponentId::new(7)),
            Err(EcsError::InvalidComponentId(_))
        ));
    }

    #[test]
    fn test_destroy_releases_all_components() {
        let (mut world, position, velocity) = world_with_position_velocity();
        let e = world.new_entity().unwrap();
        world.insert_component(e, position, 1u64).unwrap();
        world.insert_component(e, velocity, 2u64).unwrap();

        world.destroy_entity(e).unwrap();
        assert!(!world.entity_exists(e));
        assert!(!world.pool(position).unwrap().has(e));
        assert!(!world.pool(velocity).unwrap().has(e));

        let reused = world.new_entity().unwrap();
        assert_eq!(reused, e);
        assert_eq!(world.entity_mask(reused), Some(ComponentMask::new()));
        assert_consistent(&world);
    }

    #[test]
    fn test_drop_hooks_run_on_remove_destroy_and_world_drop() {
        let drops = Rc::new(Cell::new(0));

        struct Tracked(Rc<Cell<u32>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let mut world = World::new();
        let tracked = world
            .register_component("Tracked", ComponentLayout::of::<Tracked>())
            .unwrap();
        let spawn = |world: &mut World| {
            let e = world.new_entity().unwrap();
            // SAFETY: the slot is sized and aligned for Tracked and a value
            // is written before anything can drop it.
            unsafe {
                let slot = world.add_component(e, tracked).unwrap();
                slot.cast::<Tracked>().as_ptr().write(Tracked(Rc::clone(&drops)));
            }
            e
        };

        let a = spawn(&mut world);
        let b = spawn(&mut world);
        let c = spawn(&mut world);

        world.remove_component(a, tracked).unwrap();
        assert_eq!(drops.get(), 1);
        world.destroy_entity(b).unwrap();
        assert_eq!(drops.get(), 2);

        // Byte views are refused for kinds with a drop hook
        assert!(world.component_bytes(c, tracked).is_none());
        assert!(matches!(
            world.component::<u64>(c, tracked),
            Err(EcsError::NotPlainData(_))
        ));

        drop(world);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn test_padded_rust_type_is_not_viewable() {
        let mut world = World::new();
        let pair = world
            .register_component("Pair", ComponentLayout::of::<(u8, u32)>())
            .unwrap();
        let e = world.new_entity().unwrap();
        // SAFETY: the slot is sized and aligned for (u8, u32); the kind is
        // not plain data, so its padding is never read as bytes.
        unsafe {
            let slot = world.add_component(e, pair).unwrap();
            slot.cast::<(u8, u32)>().as_ptr().write((1, 2));
        }

        assert!(world.has_component(e, pair));
        assert!(world.component_bytes(e, pair).is_none());
        assert!(world.component_bytes_mut(e, pair).is_none());
        assert!(matches!(
            world.component::<[u8; 8]>(e, pair),
            Err(EcsError::NotPlainData(_))
        ));
        let slot = world.get_component(e, pair).unwrap();
        // SAFETY: a (u8, u32) was written above and the component is attached.
        assert_eq!(unsafe { slot.cast::<(u8, u32)>().as_ptr().read() }, (1, 2));

        let pod = world
            .register_component("Pod", ComponentLayout::pod::<[u32; 2]>())
            .unwrap();
        world.insert_component(e, pod, [3u32, 4]).unwrap();
        assert_eq!(world.component_bytes(e, pod).map(<[u8]>::len), Some(8));
    }

    #[test]
    fn test_queries() {
        let (mut world, position, velocity) = world_with_position_velocity();
        let a = world.new_entity().unwrap();
        let b = world.new_entity().unwrap();
        let c = world.new_entity().unwrap();
        world.insert_component(a, position, 0u64).unwrap();
        world.insert_component(b, position, 0u64).unwrap();
        world.insert_component(b, velocity, 0u64).unwrap();
        world.insert_component(c, velocity, 0u64).unwrap();

        let both = ComponentMask::from(position) + velocity;
        assert_eq!(world.get_entities(&both), vec![b]);
        assert_eq!(world.get_entities(&ComponentMask::from(position)), vec![a, b]);
        assert_eq!(world.entities(), vec![a, b, c]);
        assert_eq!(
            world.entities_matching(&ComponentMask::from(position), &ComponentMask::from(velocity)),
            vec![a]
        );
        assert_eq!(world.mask_of(&["Position", "Velocity"]).unwrap(), both);
    }

    #[test]
    fn test_system_receives_world_and_delta() {
        let (mut world, position, _) = world_with_position_velocity();
        let e = world.new_entity().unwrap();
        world.insert_component(e, position, [0.0f32, 0.0]).unwrap();

        world
            .register_system("movement", move |world, dt| {
                for id in world.get_entities(&ComponentMask::from(position)) {
                    world.component_mut::<[f32; 2]>(id, position)?[0] += dt;
                }
                Ok(())
            })
            .unwrap();

        world.invoke_system("movement", 0.5).unwrap();
        world.invoke_system("movement", 0.25).unwrap();
        assert_eq!(world.component::<[f32; 2]>(e, position).unwrap()[0], 0.75);
    }

    #[test]
    fn test_disabled_system_skipped() {
        let mut world = World::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        world
            .register_system("physics", move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .unwrap();

        world.set_system_enabled("physics", false).unwrap();
        let before = world.system("physics").unwrap().last_duration();
        world.invoke_system("physics", 0.016).unwrap();

        assert_eq!(calls.get(), 0);
        assert_eq!(world.system("physics").unwrap().last_duration(), before);
    }

    #[test]
    fn test_system_error_propagates() {
        let mut world = World::new();
        world
            .register_system("broken", |_, _| Err("out of fuel".into()))
            .unwrap();

        let err = world.invoke_system("broken", 0.0).unwrap_err();
        let EcsError::SystemFailed { system, source } = err else {
            panic!("expected SystemFailed");
        };
        assert_eq!(system, "broken");
        assert_eq!(source.to_string(), "out of fuel");

        // The function is reattached after failing
        assert!(!world.system("broken").unwrap().is_running());
    }

    #[test]
    fn test_unknown_system() {
        let mut world = World::new();
        assert!(matches!(
            world.invoke_system("nothing", 0.0),
            Err(EcsError::UnknownSystem(_))
        ));
        assert!(world.set_system_enabled("nothing", true).is_err());
    }

    #[test]
    fn test_reentrant_invoke_rejected() {
        let mut world = World::new();
        world
            .register_system("recursive", |world, dt| {
                match world.invoke_system("recursive", dt) {
                    Err(EcsError::SystemReentered(_)) => Ok(()),
                    other => Err(format!("unexpected: {other:?}").into()),
                }
            })
            .unwrap();
        world.invoke_system("recursive", 0.0).unwrap();
    }

    #[test]
    fn test_system_reattached_after_panic() {
        let mut world = World::new();
        let armed = Rc::new(Cell::new(true));
        let trigger = Rc::clone(&armed);
        world
            .register_system("boom", move |_, _| {
                assert!(!trigger.replace(false), "first frame explodes");
                Ok(())
            })
            .unwrap();

        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = world.invoke_system("boom", 0.0);
        }));
        assert!(caught.is_err());
        assert!(!world.system("boom").unwrap().is_running());

        world.invoke_system("boom", 0.0).unwrap();
        assert!(!armed.get());
    }

    #[test]
    fn test_invoke_all_in_name_order() {
        let mut world = World::new();
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        for name in ["physics", "ai", "render"] {
            let order = Rc::clone(&order);
            world
                .register_system(name, move |_, _| {
                    order.borrow_mut().push(name);
                    Ok(())
                })
                .unwrap();
        }
        world.set_system_enabled("render", false).unwrap();

        world.invoke_all(0.016).unwrap();
        assert_eq!(*order.borrow(), vec!["ai", "physics"]);
    }
}
