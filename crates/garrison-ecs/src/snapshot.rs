//! Serializable capture/restore of a [`Store`]'s full state.
//!
//! The closed component catalog means every column is already a typed,
//! `Serialize`-able `Vec<Option<T>>`, so unlike a reflection-based ECS there
//! is no need to walk a type registry at snapshot time: the columns are
//! copied verbatim. Restoring re-derives the allocator and hands the columns
//! back unchanged, so entity indices and generations are preserved exactly.

use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::store::{EntityMeta, Store};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorSnapshot {
    pub generations: Vec<u32>,
    pub alive: Vec<bool>,
    pub free_indices: Vec<u32>,
    pub capacity: usize,
}

/// A complete, serializable snapshot of a [`Store`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub allocator: AllocatorSnapshot,
    pub committed: Vec<bool>,
    pub meta: Vec<Option<(f64, f64, bool)>>,
    pub transform: Vec<Option<Transform>>,
    pub movement: Vec<Option<Movement>>,
    pub health: Vec<Option<Health>>,
    pub team: Vec<Option<Team>>,
    pub ai: Vec<Option<Ai>>,
    pub harvester: Vec<Option<Harvester>>,
    pub deposit: Vec<Option<ResourceDeposit>>,
    pub refinery: Vec<Option<Refinery>>,
    pub selectable: Vec<Option<Selectable>>,
}

/// Raised when a [`StoreSnapshot`] cannot be restored as-is.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    #[error("allocator snapshot inconsistent: {generations} generations vs {alive} alive flags")]
    AllocatorLengthMismatch { generations: usize, alive: usize },
    #[error("free list contains out-of-bounds index {index} (allocator has {len} slots)")]
    FreeIndexOutOfBounds { index: u32, len: usize },
    #[error("column length {column_len} does not match allocator slot count {slot_count} for {column}")]
    ColumnLengthMismatch {
        column: &'static str,
        column_len: usize,
        slot_count: usize,
    },
}

impl Store {
    /// Capture every entity slot and component column. Pending (uncommitted)
    /// structural mutations are not part of the snapshot — callers should
    /// `commit()` first if they want those reflected.
    pub fn capture_snapshot(&self) -> StoreSnapshot {
        let (generations, alive, free_indices) = self.allocator.snapshot_state();
        StoreSnapshot {
            allocator: AllocatorSnapshot {
                generations,
                alive,
                free_indices,
                capacity: self.allocator.capacity(),
            },
            committed: self.committed.clone(),
            meta: self
                .meta
                .iter()
                .map(|m| m.map(|EntityMeta { created_at_ms, last_access_ms, active }| (created_at_ms, last_access_ms, active)))
                .collect(),
            transform: self.transform.clone(),
            movement: self.movement.clone(),
            health: self.health.clone(),
            team: self.team.clone(),
            ai: self.ai.clone(),
            harvester: self.harvester.clone(),
            deposit: self.deposit.clone(),
            refinery: self.refinery.clone(),
            selectable: self.selectable.clone(),
        }
    }

    /// Rebuild a `Store` from a previously captured snapshot. Validates
    /// internal consistency before touching anything so a malformed
    /// snapshot never hands back a half-built store.
    pub fn restore_from_snapshot(snapshot: &StoreSnapshot) -> Result<Store, SnapshotError> {
        let slot_count = snapshot.allocator.generations.len();
        if slot_count != snapshot.allocator.alive.len() {
            return Err(SnapshotError::AllocatorLengthMismatch {
                generations: slot_count,
                alive: snapshot.allocator.alive.len(),
            });
        }
        for &idx in &snapshot.allocator.free_indices {
            if idx as usize >= slot_count {
                return Err(SnapshotError::FreeIndexOutOfBounds { index: idx, len: slot_count });
            }
        }
        macro_rules! check_column {
            ($col:expr, $name:literal) => {
                if $col.len() != slot_count && !$col.is_empty() {
                    return Err(SnapshotError::ColumnLengthMismatch {
                        column: $name,
                        column_len: $col.len(),
                        slot_count,
                    });
                }
            };
        }
        check_column!(snapshot.committed, "committed");
        check_column!(snapshot.meta, "meta");
        check_column!(snapshot.transform, "transform");
        check_column!(snapshot.movement, "movement");
        check_column!(snapshot.health, "health");
        check_column!(snapshot.team, "team");
        check_column!(snapshot.ai, "ai");
        check_column!(snapshot.harvester, "harvester");
        check_column!(snapshot.deposit, "deposit");
        check_column!(snapshot.refinery, "refinery");
        check_column!(snapshot.selectable, "selectable");

        let allocator = crate::entity::EntityAllocator::restore_from_snapshot(
            snapshot.allocator.capacity,
            snapshot.allocator.generations.clone(),
            snapshot.allocator.alive.clone(),
            snapshot.allocator.free_indices.clone(),
        );

        let pad = |len: usize| -> usize { if len < slot_count { slot_count } else { len } };

        fn resized<T: Clone>(col: &[Option<T>], slots: usize) -> Vec<Option<T>> {
            let mut v = col.to_vec();
            v.resize(slots, None);
            v
        }

        Ok(Store {
            allocator,
            meta: {
                let mut v: Vec<Option<EntityMeta>> = snapshot
                    .meta
                    .iter()
                    .map(|m| m.map(|(created_at_ms, last_access_ms, active)| EntityMeta { created_at_ms, last_access_ms, active }))
                    .collect();
                v.resize(pad(v.len()), None);
                v
            },
            committed: {
                let mut v = snapshot.committed.clone();
                v.resize(pad(v.len()), false);
                v
            },
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            transform: resized(&snapshot.transform, slot_count),
            movement: resized(&snapshot.movement, slot_count),
            health: resized(&snapshot.health, slot_count),
            team: resized(&snapshot.team, slot_count),
            ai: resized(&snapshot.ai, slot_count),
            harvester: resized(&snapshot.harvester, slot_count),
            deposit: resized(&snapshot.deposit, slot_count),
            refinery: resized(&snapshot.refinery, slot_count),
            selectable: resized(&snapshot.selectable, slot_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentKind;

    #[test]
    fn snapshot_round_trip_preserves_entities_and_components() {
        let mut store = Store::new(16);
        let e1 = store.create_entity(0.0).unwrap();
        store.add_component(e1, Transform::at(3.0, 4.0));
        store.add_component(e1, Health::new(80.0));
        let e2 = store.create_entity(0.0).unwrap();
        store.add_component(e2, Team(2));
        store.commit();
        store.destroy_entity(e2);
        store.commit();

        let snap = store.capture_snapshot();
        let restored = Store::restore_from_snapshot(&snap).unwrap();

        assert!(restored.is_alive(e1));
        assert!(!restored.is_alive(e2));
        assert_eq!(restored.get_component::<Transform>(e1), Some(&Transform::at(3.0, 4.0)));
        assert_eq!(restored.query(&[ComponentKind::Transform]), vec![e1]);
    }

    #[test]
    fn restore_rejects_inconsistent_allocator_lengths() {
        let snap = StoreSnapshot {
            allocator: AllocatorSnapshot { generations: vec![0, 0], alive: vec![true], free_indices: vec![], capacity: 8 },
            committed: vec![],
            meta: vec![],
            transform: vec![],
            movement: vec![],
            health: vec![],
            team: vec![],
            ai: vec![],
            harvester: vec![],
            deposit: vec![],
            refinery: vec![],
            selectable: vec![],
        };
        assert!(Store::restore_from_snapshot(&snap).is_err());
    }

    #[test]
    fn restore_rejects_out_of_bounds_free_index() {
        let snap = StoreSnapshot {
            allocator: AllocatorSnapshot { generations: vec![0], alive: vec![false], free_indices: vec![5], capacity: 8 },
            committed: vec![],
            meta: vec![],
            transform: vec![],
            movement: vec![],
            health: vec![],
            team: vec![],
            ai: vec![],
            harvester: vec![],
            deposit: vec![],
            refinery: vec![],
            selectable: vec![],
        };
        assert!(Store::restore_from_snapshot(&snap).is_err());
    }

    #[test]
    fn generations_survive_round_trip_so_stale_handles_stay_stale() {
        let mut store = Store::new(4);
        let e0 = store.create_entity(0.0).unwrap();
        store.commit();
        store.destroy_entity(e0);
        store.commit();
        let e1 = store.create_entity(0.0).unwrap();
        store.commit();

        let snap = store.capture_snapshot();
        let restored = Store::restore_from_snapshot(&snap).unwrap();

        assert!(!restored.is_alive(e0));
        assert!(restored.is_alive(e1));
    }
}
