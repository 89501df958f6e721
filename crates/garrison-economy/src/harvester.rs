//! The harvester state machine: `ToDeposit -> Harvesting -> ToRefinery ->
//! Unloading -> ToDeposit`, with an `Idle` fallback when nothing reachable
//! remains.

use std::collections::HashMap;

use garrison_ecs::prelude::{ComponentKind, EntityId, Harvester, HarvesterMode, ResourceDeposit, SpatialIndex, Store, Transform};

use crate::credits::{DeltaReason, EconomyDelta, TeamLedger};

/// World-unit distance under which an entity is considered to have arrived
/// at its destination.
pub const ARRIVAL_EPSILON: f32 = 4.0;

/// Per-harvester state the economy system needs that doesn't belong in the
/// long-lived [`Harvester`] component: the sub-bail extraction remainder.
#[derive(Debug, Clone, Copy, Default)]
struct HarvesterRuntime {
    partial_credits: f32,
}

/// Drives every harvester's state machine for one tick.
#[derive(Debug, Clone)]
pub struct EconomySystem {
    pub extraction_rate_credits_per_sec: f32,
    pub deposit_search_radius: f32,
    runtimes: HashMap<EntityId, HarvesterRuntime>,
}

/// What happened to a harvester or deposit this tick, for the outbound
/// event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum EconomyEvent {
    CreditsChanged(EconomyDelta),
    DepositDepleted { deposit: EntityId },
    HarvesterRetargeted { harvester: EntityId },
    HarvesterIdled { harvester: EntityId },
}

impl Default for EconomySystem {
    fn default() -> Self {
        Self {
            extraction_rate_credits_per_sec: 200.0,
            deposit_search_radius: 600.0,
            runtimes: HashMap::new(),
        }
    }
}

impl EconomySystem {
    pub fn new(extraction_rate_credits_per_sec: f32, deposit_search_radius: f32) -> Self {
        Self {
            extraction_rate_credits_per_sec,
            deposit_search_radius,
            runtimes: HashMap::new(),
        }
    }

    /// Advances every harvester entity's state machine by `dt_ms` and
    /// applies credited unloads to `ledger`. Deposits at zero `remaining`
    /// are destroyed via `store.destroy_entity` (actual removal happens at
    /// the caller's next `commit()`).
    pub fn step(&mut self, store: &mut Store, spatial: &SpatialIndex, ledger: &mut TeamLedger, dt_ms: f64) -> Vec<EconomyEvent> {
        let mut events = Vec::new();
        let dt_sec = (dt_ms / 1000.0) as f32;
        let harvesters = store.query(&[ComponentKind::Harvester, ComponentKind::Transform]);

        for entity in harvesters {
            self.step_one(entity, store, spatial, ledger, dt_sec, &mut events);
        }
        events
    }

    fn step_one(&mut self, entity: EntityId, store: &mut Store, spatial: &SpatialIndex, ledger: &mut TeamLedger, dt_sec: f32, events: &mut Vec<EconomyEvent>) {
        let Some(mode) = store.get_component::<Harvester>(entity).map(|h| h.mode) else {
            return;
        };

        match mode {
            HarvesterMode::ToDeposit => self.tick_to_deposit(entity, store, spatial, events),
            HarvesterMode::Harvesting => self.tick_harvesting(entity, store, dt_sec, events),
            HarvesterMode::ToRefinery => self.tick_to_refinery(entity, store, events),
            HarvesterMode::Unloading => self.tick_unloading(entity, store, ledger, events),
            HarvesterMode::Idle => self.tick_idle(entity, store, spatial, events),
        }
    }

    fn tick_to_deposit(&mut self, entity: EntityId, store: &mut Store, spatial: &SpatialIndex, events: &mut Vec<EconomyEvent>) {
        let target = store.get_component::<Harvester>(entity).and_then(|h| h.target_deposit);
        let target = match target.filter(|&d| deposit_is_valid(store, d)) {
            Some(d) => d,
            None => {
                if let Some(found) = self.find_nearest_deposit(entity, store, spatial) {
                    if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                        h.target_deposit = Some(found);
                    }
                    events.push(EconomyEvent::HarvesterRetargeted { harvester: entity });
                    found
                } else {
                    if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                        h.mode = HarvesterMode::Idle;
                    }
                    events.push(EconomyEvent::HarvesterIdled { harvester: entity });
                    return;
                }
            }
        };

        if has_arrived(store, entity, target) {
            if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                h.mode = HarvesterMode::Harvesting;
            }
        }
    }

    fn tick_harvesting(&mut self, entity: EntityId, store: &mut Store, dt_sec: f32, events: &mut Vec<EconomyEvent>) {
        let Some(deposit_id) = store.get_component::<Harvester>(entity).and_then(|h| h.target_deposit) else {
            if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                h.mode = HarvesterMode::ToDeposit;
            }
            return;
        };
        if !deposit_is_valid(store, deposit_id) {
            if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                h.target_deposit = None;
                h.mode = HarvesterMode::ToDeposit;
            }
            events.push(EconomyEvent::HarvesterRetargeted { harvester: entity });
            return;
        }

        let runtime = self.runtimes.entry(entity).or_default();
        let (capacity, carrying) = {
            let h = store.get_component::<Harvester>(entity).unwrap();
            (h.capacity, h.carrying)
        };
        let deposit = store.get_component::<ResourceDeposit>(deposit_id).unwrap();
        let room = (capacity - carrying) as f32;
        let remaining_credits = deposit.credits_remaining() as f32;
        let desired = self.extraction_rate_credits_per_sec * dt_sec + runtime.partial_credits;
        let extractable = desired.min(room).min(remaining_credits).max(0.0);
        let bails = (extractable / ResourceDeposit::CREDITS_PER_BAIL as f32).floor() as u32;
        let credits_taken = bails * ResourceDeposit::CREDITS_PER_BAIL;
        runtime.partial_credits = extractable - credits_taken as f32;

        if bails > 0 {
            store.get_component_mut::<ResourceDeposit>(deposit_id).unwrap().remaining_bails -= bails;
            let h = store.get_component_mut::<Harvester>(entity).unwrap();
            h.carrying += credits_taken;
        }

        let deposit_now_empty = store.get_component::<ResourceDeposit>(deposit_id).unwrap().is_empty();
        let h = store.get_component_mut::<Harvester>(entity).unwrap();
        let full = h.is_full();
        if full || deposit_now_empty {
            h.mode = HarvesterMode::ToRefinery;
            self.runtimes.remove(&entity);
        }
        if deposit_now_empty {
            store.destroy_entity(deposit_id);
            events.push(EconomyEvent::DepositDepleted { deposit: deposit_id });
        }
    }

    fn tick_to_refinery(&mut self, entity: EntityId, store: &mut Store, events: &mut Vec<EconomyEvent>) {
        let home = store.get_component::<Harvester>(entity).and_then(|h| h.home_refinery);
        let Some(home) = home.filter(|&r| store.is_alive(r)) else {
            if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                h.mode = HarvesterMode::Idle;
            }
            events.push(EconomyEvent::HarvesterIdled { harvester: entity });
            return;
        };

        if has_arrived(store, entity, home) {
            if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                h.mode = HarvesterMode::Unloading;
            }
        }
    }

    fn tick_unloading(&mut self, entity: EntityId, store: &mut Store, ledger: &mut TeamLedger, events: &mut Vec<EconomyEvent>) {
        let Some(h) = store.get_component_mut::<Harvester>(entity) else {
            return;
        };
        let carrying = h.carrying;
        h.carrying = 0;
        h.mode = HarvesterMode::ToDeposit;
        h.target_deposit = None;

        if carrying > 0 {
            let team = store.get_component::<garrison_ecs::components::Team>(entity).map(|t| t.0).unwrap_or(0);
            let delta = ledger.credit(team, carrying, DeltaReason::RefineryUnload);
            events.push(EconomyEvent::CreditsChanged(delta));
        }
    }

    fn tick_idle(&mut self, entity: EntityId, store: &mut Store, spatial: &SpatialIndex, events: &mut Vec<EconomyEvent>) {
        let home_alive = store.get_component::<Harvester>(entity).and_then(|h| h.home_refinery).is_some_and(|r| store.is_alive(r));
        if !home_alive {
            return;
        }
        if let Some(found) = self.find_nearest_deposit(entity, store, spatial) {
            if let Some(h) = store.get_component_mut::<Harvester>(entity) {
                h.target_deposit = Some(found);
                h.mode = HarvesterMode::ToDeposit;
            }
            events.push(EconomyEvent::HarvesterRetargeted { harvester: entity });
        }
    }

    fn find_nearest_deposit(&self, entity: EntityId, store: &Store, spatial: &SpatialIndex) -> Option<EntityId> {
        let pos = store.get_component::<Transform>(entity)?;
        let candidates = spatial.query_radius(pos.x, pos.y, self.deposit_search_radius);
        candidates
            .into_iter()
            .filter(|&e| deposit_is_valid(store, e))
            .filter_map(|e| {
                let t = store.get_component::<Transform>(e)?;
                let dx = t.x - pos.x;
                let dy = t.y - pos.y;
                Some((e, dx * dx + dy * dy))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(e, _)| e)
    }
}

fn deposit_is_valid(store: &Store, id: EntityId) -> bool {
    store.get_component::<ResourceDeposit>(id).is_some_and(|d| !d.is_empty())
}

fn has_arrived(store: &Store, entity: EntityId, destination: EntityId) -> bool {
    let (Some(a), Some(b)) = (store.get_component::<Transform>(entity), store.get_component::<Transform>(destination)) else {
        return false;
    };
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt() <= ARRIVAL_EPSILON
}
