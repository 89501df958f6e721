//! Entity/component store and spatial index for the simulation core.
//!
//! Entities are generational handles ([`entity::EntityId`]) indexing into a
//! fixed set of dense component columns ([`components::ComponentKind`]).
//! Structural mutation is deferred and merged by [`store::Store::commit`]
//! so a system never observes a half-mutated world mid-tick. [`spatial`]
//! layers a quadtree over entity positions for region/radius queries.

pub mod components;
pub mod entity;
pub mod snapshot;
pub mod spatial;
pub mod store;

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// Creating an entity would exceed the store's configured capacity.
    #[error(transparent)]
    CapacityExceeded(#[from] entity::CapacityExceeded),
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::components::{
        Ai, AiLevel, AiState, BehaviorProfile, ComponentKind, Harvester, HarvesterMode, Health,
        Movement, Refinery, ResourceDeposit, Selectable, Team, Transform,
    };
    pub use crate::entity::{CapacityExceeded, EntityAllocator, EntityId};
    pub use crate::snapshot::{SnapshotError, StoreSnapshot};
    pub use crate::spatial::{Bounds, SpatialIndex};
    pub use crate::store::{Component, Store};
    pub use crate::EcsError;
}
