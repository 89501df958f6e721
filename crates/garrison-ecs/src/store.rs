//! The entity/component store.
//!
//! Structural mutation (create/destroy) is deferred through two buffers
//! merged in [`Store::commit`], a command-buffer-then-apply tick shape
//! specialized to the closed component catalog of [`ComponentKind`]
//! instead of a generic command stream.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::entity::{CapacityExceeded, EntityAllocator, EntityId};

/// Per-entity bookkeeping that isn't itself a gameplay component: creation
/// timestamp, last-access timestamp, active flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct EntityMeta {
    pub(crate) created_at_ms: f64,
    pub(crate) last_access_ms: f64,
    pub(crate) active: bool,
}

/// Owns every entity and component in the simulation.
///
/// Iteration stability is provided by the
/// `committed` bitset: an entity only becomes visible to [`Store::query`]
/// once [`Store::commit`] has run at least once after its creation, and
/// stops being visible the instant [`Store::destroy_entity`] is called,
/// even though its slot isn't actually freed until the next `commit`.
pub struct Store {
    pub(crate) allocator: EntityAllocator,
    pub(crate) meta: Vec<Option<EntityMeta>>,
    pub(crate) committed: Vec<bool>,
    pub(crate) pending_add: Vec<EntityId>,
    pub(crate) pending_remove: Vec<EntityId>,

    pub(crate) transform: Vec<Option<Transform>>,
    pub(crate) movement: Vec<Option<Movement>>,
    pub(crate) health: Vec<Option<Health>>,
    pub(crate) team: Vec<Option<Team>>,
    pub(crate) ai: Vec<Option<Ai>>,
    pub(crate) harvester: Vec<Option<Harvester>>,
    pub(crate) deposit: Vec<Option<ResourceDeposit>>,
    pub(crate) refinery: Vec<Option<Refinery>>,
    pub(crate) selectable: Vec<Option<Selectable>>,
}

/// Blanket accessor trait implemented once per component type so
/// `get_component::<T>` / `query::<T>` stay generic instead of needing a
/// hand-written method per type at every call site.
pub trait Component: Sized + 'static {
    const KIND: ComponentKind;
    fn column(store: &Store) -> &Vec<Option<Self>>;
    fn column_mut(store: &mut Store) -> &mut Vec<Option<Self>>;
}

macro_rules! impl_component {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;
            fn column(store: &Store) -> &Vec<Option<Self>> {
                &store.$field
            }
            fn column_mut(store: &mut Store) -> &mut Vec<Option<Self>> {
                &mut store.$field
            }
        }
    };
}

impl_component!(Transform, Transform, transform);
impl_component!(Movement, Movement, movement);
impl_component!(Health, Health, health);
impl_component!(Team, Team, team);
impl_component!(Ai, Ai, ai);
impl_component!(Harvester, Harvester, harvester);
impl_component!(ResourceDeposit, ResourceDeposit, deposit);
impl_component!(Refinery, Refinery, refinery);
impl_component!(Selectable, Selectable, selectable);

impl Store {
    pub fn new(capacity: usize) -> Self {
        Self {
            allocator: EntityAllocator::new(capacity),
            meta: Vec::new(),
            committed: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            transform: Vec::new(),
            movement: Vec::new(),
            health: Vec::new(),
            team: Vec::new(),
            ai: Vec::new(),
            harvester: Vec::new(),
            deposit: Vec::new(),
            refinery: Vec::new(),
            selectable: Vec::new(),
        }
    }

    fn grow_columns_to(&mut self, slots: usize) {
        self.meta.resize(slots, None);
        self.committed.resize(slots, false);
        self.transform.resize(slots, None);
        self.movement.resize(slots, None);
        self.health.resize(slots, None);
        self.team.resize(slots, None);
        self.ai.resize(slots, None);
        self.harvester.resize(slots, None);
        self.deposit.resize(slots, None);
        self.refinery.resize(slots, None);
        self.selectable.resize(slots, None);
    }

    fn clear_slot(&mut self, idx: usize) {
        self.meta[idx] = None;
        self.committed[idx] = false;
        self.transform[idx] = None;
        self.movement[idx] = None;
        self.health[idx] = None;
        self.team[idx] = None;
        self.ai[idx] = None;
        self.harvester[idx] = None;
        self.deposit[idx] = None;
        self.refinery[idx] = None;
        self.selectable[idx] = None;
    }

    /// Create a new entity. Not visible to [`Store::query`] until the next
    /// [`Store::commit`] runs (deferred add).
    ///
    /// # Errors
    ///
    /// [`CapacityExceeded`] if the store is already at its configured
    /// entity limit; the store is left unchanged.
    pub fn create_entity(&mut self, now_ms: f64) -> Result<EntityId, CapacityExceeded> {
        let id = self.allocator.allocate()?;
        let idx = id.index() as usize;
        if idx >= self.meta.len() {
            self.grow_columns_to(self.allocator.slot_count());
        }
        self.meta[idx] = Some(EntityMeta {
            created_at_ms: now_ms,
            last_access_ms: now_ms,
            active: true,
        });
        self.pending_add.push(id);
        Ok(id)
    }

    /// Request destruction. Silently ignores stale/invalid handles.
    /// Visible effect is immediate for queries; the slot itself is only
    /// freed at the next [`Store::commit`] (deferred remove).
    pub fn destroy_entity(&mut self, id: EntityId) {
        if !self.allocator.is_alive(id) {
            return;
        }
        let idx = id.index() as usize;
        self.committed[idx] = false;
        if let Some(meta) = self.meta[idx].as_mut() {
            meta.active = false;
        }
        if !self.pending_remove.contains(&id) {
            self.pending_remove.push(id);
        }
    }

    /// Merge deferred structural mutations into the live tables. Invoked
    /// once per tick by the scheduler, between systems and the next tick's
    /// first system.
    pub fn commit(&mut self) {
        let removed: HashSet<EntityId> = self.pending_remove.drain(..).collect();
        for id in &removed {
            let idx = id.index() as usize;
            self.clear_slot(idx);
            self.allocator.deallocate(*id);
        }
        for id in self.pending_add.drain(..) {
            if removed.contains(&id) {
                continue; // created and destroyed within the same tick.
            }
            let idx = id.index() as usize;
            if self.allocator.is_alive(id) {
                self.committed[idx] = true;
            }
        }
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    pub fn alive_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// All entities currently visible to iteration (committed, not pending
    /// destruction). Snapshotted eagerly into a `Vec` at call time so later
    /// structural mutation within the same tick cannot perturb an
    /// in-progress iteration.
    pub fn entities(&self) -> Vec<EntityId> {
        self.committed
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(idx, _)| EntityId::new(idx as u32, self.allocator.generation_at(idx)))
            .collect()
    }

    fn has_kind(&self, idx: usize, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Transform => self.transform[idx].is_some(),
            ComponentKind::Movement => self.movement[idx].is_some(),
            ComponentKind::Health => self.health[idx].is_some(),
            ComponentKind::Team => self.team[idx].is_some(),
            ComponentKind::Ai => self.ai[idx].is_some(),
            ComponentKind::Harvester => self.harvester[idx].is_some(),
            ComponentKind::ResourceDeposit => self.deposit[idx].is_some(),
            ComponentKind::Refinery => self.refinery[idx].is_some(),
            ComponentKind::Selectable => self.selectable[idx].is_some(),
        }
    }

    /// All committed entities that carry every component kind in
    /// `required`.
    pub fn query(&self, required: &[ComponentKind]) -> Vec<EntityId> {
        self.committed
            .iter()
            .enumerate()
            .filter(|(idx, &c)| c && required.iter().all(|k| self.has_kind(*idx, *k)))
            .map(|(idx, _)| EntityId::new(idx as u32, self.allocator.generation_at(idx)))
            .collect()
    }

    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) {
        if !self.allocator.is_alive(id) {
            return; // InvalidHandle: no-op.
        }
        let idx = id.index() as usize;
        T::column_mut(self)[idx] = Some(value);
    }

    pub fn remove_component<T: Component>(&mut self, id: EntityId) {
        if !self.allocator.is_alive(id) {
            return;
        }
        let idx = id.index() as usize;
        T::column_mut(self)[idx] = None;
    }

    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        T::column(self)[id.index() as usize].as_ref()
    }

    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        let idx = id.index() as usize;
        T::column_mut(self)[idx].as_mut()
    }

    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id) && T::column(self)[id.index() as usize].is_some()
    }

    /// Record a read/write access for diagnostics. A no-op on stale handles.
    pub fn touch(&mut self, id: EntityId, now_ms: f64) {
        if !self.allocator.is_alive(id) {
            return;
        }
        if let Some(meta) = self.meta[id.index() as usize].as_mut() {
            meta.last_access_ms = now_ms;
        }
    }

    pub fn created_at(&self, id: EntityId) -> Option<f64> {
        self.meta.get(id.index() as usize)?.map(|m| m.created_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::new(64)
    }

    #[test]
    fn created_entity_invisible_until_commit() {
        let mut s = store();
        let e = s.create_entity(0.0).unwrap();
        s.add_component(e, Transform::at(0.0, 0.0));
        assert!(s.query(&[ComponentKind::Transform]).is_empty());
        s.commit();
        assert_eq!(s.query(&[ComponentKind::Transform]), vec![e]);
    }

    #[test]
    fn destroyed_entity_excluded_same_tick() {
        let mut s = store();
        let e = s.create_entity(0.0).unwrap();
        s.add_component(e, Transform::at(0.0, 0.0));
        s.commit();
        assert_eq!(s.query(&[ComponentKind::Transform]).len(), 1);

        s.destroy_entity(e);
        // Invariant 2: excluded from iteration in the same tick it died.
        assert!(s.query(&[ComponentKind::Transform]).is_empty());
        // But it is not actually removed/recycled until commit.
        assert!(s.is_alive(e));
        s.commit();
        assert!(!s.is_alive(e));
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut s = store();
        let e = s.create_entity(0.0).unwrap();
        s.commit();
        s.destroy_entity(e);
        s.commit();
        s.destroy_entity(e); // second call: silent no-op on stale handle.
        assert!(!s.is_alive(e));
    }

    #[test]
    fn stale_handle_get_component_returns_none_not_error() {
        let mut s = store();
        let e = s.create_entity(0.0).unwrap();
        s.commit();
        s.destroy_entity(e);
        s.commit();
        assert!(s.get_component::<Transform>(e).is_none());
    }

    #[test]
    fn create_at_capacity_fails_without_corrupting_store() {
        let mut s = Store::new(2);
        let _a = s.create_entity(0.0).unwrap();
        let _b = s.create_entity(0.0).unwrap();
        assert!(s.create_entity(0.0).is_err());
        assert_eq!(s.alive_count(), 2);
    }

    #[test]
    fn query_requires_all_components() {
        let mut s = store();
        let e1 = s.create_entity(0.0).unwrap();
        s.add_component(e1, Transform::at(0.0, 0.0));
        s.add_component(e1, Health::new(10.0));
        let e2 = s.create_entity(0.0).unwrap();
        s.add_component(e2, Transform::at(1.0, 1.0));
        s.commit();

        let both = s.query(&[ComponentKind::Transform, ComponentKind::Health]);
        assert_eq!(both, vec![e1]);
        let mut only_transform = s.query(&[ComponentKind::Transform]);
        only_transform.sort_by_key(|e| e.index());
        let mut expected = vec![e1, e2];
        expected.sort_by_key(|e| e.index());
        assert_eq!(only_transform, expected);
    }

    #[test]
    fn remove_component_drops_from_queries() {
        let mut s = store();
        let e = s.create_entity(0.0).unwrap();
        s.add_component(e, Transform::at(0.0, 0.0));
        s.add_component(e, Health::new(10.0));
        s.commit();
        assert!(s.has_component::<Health>(e));
        s.remove_component::<Health>(e);
        assert!(!s.has_component::<Health>(e));
        assert!(s.query(&[ComponentKind::Transform, ComponentKind::Health]).is_empty());
    }

    #[test]
    fn create_and_destroy_within_same_tick_frees_slot_on_commit() {
        let mut s = store();
        let e = s.create_entity(0.0).unwrap();
        s.destroy_entity(e);
        s.commit();
        assert!(!s.is_alive(e));
        assert_eq!(s.alive_count(), 0);
        // The slot should be recyclable.
        let e2 = s.create_entity(0.0).unwrap();
        assert_eq!(e2.index(), e.index());
        assert_eq!(e2.generation(), e.generation() + 1);
    }

    #[test]
    fn get_component_mut_updates_value() {
        let mut s = store();
        let e = s.create_entity(0.0).unwrap();
        s.add_component(e, Health::new(100.0));
        s.commit();
        s.get_component_mut::<Health>(e).unwrap().apply_delta(-30.0);
        assert_eq!(s.get_component::<Health>(e).unwrap().current, 70.0);
    }
}
