//! Property tests for the entity/component store: random sequences of
//! create/destroy/add/remove should never leave the store in a state where
//! a dead entity answers queries or a live one loses unrelated data.

use garrison_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum StoreOp {
    Spawn(f32, f32),
    Destroy(usize),
    AddHealth(usize, f32),
    RemoveHealth(usize),
}

fn finite_f32() -> impl Strategy<Value = f32> {
    (-1_000_000i32..1_000_000i32).prop_map(|v| v as f32 * 0.01)
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (finite_f32(), finite_f32()).prop_map(|(x, y)| StoreOp::Spawn(x, y)),
        (0..100usize).prop_map(StoreOp::Destroy),
        (0..100usize, 1.0f32..500.0).prop_map(|(i, h)| StoreOp::AddHealth(i, h)),
        (0..100usize).prop_map(StoreOp::RemoveHealth),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn random_ops_preserve_store_invariants(ops in prop::collection::vec(store_op_strategy(), 1..50)) {
        let mut store = Store::new(128);
        let mut alive: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                StoreOp::Spawn(x, y) => {
                    if let Ok(e) = store.create_entity(0.0) {
                        store.add_component(e, Transform::at(x, y));
                        store.commit();
                        alive.push(e);
                    }
                }
                StoreOp::Destroy(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let e = alive.remove(idx);
                        store.destroy_entity(e);
                        store.commit();
                    }
                }
                StoreOp::AddHealth(idx, h) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        store.add_component(alive[idx], Health::new(h));
                    }
                }
                StoreOp::RemoveHealth(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        store.remove_component::<Health>(alive[idx]);
                    }
                }
            }

            prop_assert_eq!(store.alive_count(), alive.len());
            for &e in &alive {
                prop_assert!(store.is_alive(e));
                prop_assert!(store.get_component::<Transform>(e).is_some());
            }
            let queried = store.query(&[ComponentKind::Transform]);
            prop_assert!(queried.len() <= alive.len());
        }
    }

    /// A despawned entity's id must never resolve to live data again, even
    /// after its index is recycled by a later spawn with a new generation.
    #[test]
    fn stale_ids_stay_dead_after_recycle(
        spawn_count in 1..20usize,
        despawn_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let mut store = Store::new(64);
        let mut entities: Vec<EntityId> = Vec::new();
        for i in 0..spawn_count {
            let e = store.create_entity(0.0).unwrap();
            store.add_component(e, Transform::at(i as f32, 0.0));
            entities.push(e);
        }
        store.commit();

        let mut stale: Vec<EntityId> = Vec::new();
        for idx in despawn_indices {
            if !entities.is_empty() {
                let idx = idx % entities.len();
                let e = entities.remove(idx);
                store.destroy_entity(e);
                stale.push(e);
            }
        }
        store.commit();

        for _ in 0..stale.len() {
            let e = store.create_entity(0.0).unwrap();
            store.add_component(e, Transform::at(999.0, 999.0));
            entities.push(e);
        }
        store.commit();

        for &e in &stale {
            prop_assert!(!store.is_alive(e));
            prop_assert_eq!(store.get_component::<Transform>(e), None);
        }
        for &e in &entities {
            prop_assert!(store.is_alive(e));
            prop_assert!(store.get_component::<Transform>(e).is_some());
        }
    }
}
