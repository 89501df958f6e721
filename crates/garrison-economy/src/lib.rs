//! C&C-authentic resource economy: harvester state machine and team
//! credit accounting. 1 bail = 25 credits; harvester capacity = 700
//! credits (28 bails); refinery unload is instantaneous in the core.

pub mod credits;
pub mod harvester;

pub use credits::{DeltaReason, EconomyDelta, InsufficientCredits, TeamLedger};
pub use harvester::{EconomyEvent, EconomySystem, ARRIVAL_EPSILON};

pub mod prelude {
    pub use crate::credits::{DeltaReason, EconomyDelta, InsufficientCredits, TeamLedger};
    pub use crate::harvester::{EconomyEvent, EconomySystem};
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_ecs::prelude::*;

    #[test]
    fn a_full_harvest_cycle_credits_the_team_exactly_once() {
        let mut store = Store::new(32);
        let mut spatial = SpatialIndex::new(Bounds::new(-1000.0, -1000.0, 2000.0, 2000.0));
        let mut ledger = TeamLedger::new();

        let refinery = store.create_entity(0.0).unwrap();
        store.add_component(refinery, Transform::at(0.0, 0.0));
        store.add_component(refinery, Refinery::new(2));
        store.add_component(refinery, Team(2));

        let deposit = store.create_entity(0.0).unwrap();
        store.add_component(deposit, Transform::at(20.0, 0.0));
        store.add_component(deposit, ResourceDeposit { remaining_bails: 28 });
        store.commit();
        spatial.insert(deposit, 20.0, 0.0);

        let harvester = store.create_entity(0.0).unwrap();
        store.add_component(harvester, Transform::at(20.0, 0.0));
        store.add_component(harvester, Harvester::new(refinery));
        store.add_component(harvester, Team(2));
        store.commit();

        let mut system = EconomySystem::new(10_000.0, 600.0);
        // One long tick to fully harvest (28 bails * 25 = 700 = capacity).
        system.step(&mut store, &spatial, &mut ledger, 5_000.0);
        assert_eq!(store.get_component::<Harvester>(harvester).unwrap().mode, HarvesterMode::ToRefinery);
        assert_eq!(store.get_component::<Harvester>(harvester).unwrap().carrying, 700);

        // Walk it home and unload.
        store.get_component_mut::<Transform>(harvester).unwrap().x = 0.0;
        let events = system.step(&mut store, &spatial, &mut ledger, 16.0);
        assert_eq!(store.get_component::<Harvester>(harvester).unwrap().mode, HarvesterMode::Unloading);

        let events2 = system.step(&mut store, &spatial, &mut ledger, 16.0);
        assert_eq!(ledger.balance(2), 700);
        assert_eq!(store.get_component::<Harvester>(harvester).unwrap().mode, HarvesterMode::ToDeposit);
        assert!(events.is_empty() || events2.iter().any(|e| matches!(e, EconomyEvent::CreditsChanged(_))));
    }
}
