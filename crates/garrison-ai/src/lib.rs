//! Tactical AI: rebuilds per-entity perception each tick, decides on a
//! cadence via Q-learning, drives low-level execution through a behavior
//! tree, and scores the outcome through a configurable reward engine.

pub mod action;
pub mod qlearning;
pub mod reward;
pub mod state;
pub mod tactical;

pub use action::{Action, Direction, ACTION_COUNT, IDLE_ACTION_ID};
pub use qlearning::{Backend, BackendError, Hyperparams, LinearBackend, ReplayBuffer, Selector, TabularBackend, Transition};
pub use reward::{compute_reward, GlobalSection, Outcome, RewardConfigError, RewardTable, SituationalMultipliers};
pub use state::{Nearby, TacticalContext, STATE_LEN};
pub use tactical::{step, Order, StepOutcome, TacticalRuntime};

pub mod prelude {
    pub use crate::action::{Action, Direction, ACTION_COUNT, IDLE_ACTION_ID};
    pub use crate::qlearning::{Backend, BackendError, Hyperparams, LinearBackend, ReplayBuffer, Selector, TabularBackend, Transition};
    pub use crate::reward::{compute_reward, GlobalSection, Outcome, RewardConfigError, RewardTable, SituationalMultipliers};
    pub use crate::state::{Nearby, TacticalContext, STATE_LEN};
    pub use crate::tactical::{step, Order, StepOutcome, TacticalRuntime};
}
