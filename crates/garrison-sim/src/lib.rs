//! Top-level simulation core: wires the entity/component store, spatial
//! index, pathfinding service, tactical AI, and economy from the other
//! crates into one steppable facade with a command/query surface,
//! configuration loading, and snapshot/restore.
//!
//! [`simulation::Simulation`] is the entry point. Build one from a
//! [`config::SimConfig`], drive it with [`simulation::Simulation::step`],
//! and issue [`commands::Order`]s through [`simulation::Simulation::issue`].

pub mod commands;
pub mod config;
pub mod events;
pub mod scheduler;
pub mod simulation;

pub use commands::{Blueprint, Order, OrderError};
pub use config::{ConfigError, EconomyConfig, GridConfig, SimConfig};
pub use events::{Event, EventQueue};
pub use scheduler::{Scheduler, System};
pub use simulation::{RestoreError, SimSnapshot, Simulation};

pub mod prelude {
    pub use crate::commands::{Blueprint, Order, OrderError};
    pub use crate::config::{ConfigError, EconomyConfig, GridConfig, SimConfig};
    pub use crate::events::{Event, EventQueue};
    pub use crate::simulation::{RestoreError, SimSnapshot, Simulation};
}
