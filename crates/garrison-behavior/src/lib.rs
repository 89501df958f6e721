//! Behavior tree runtime: per-entity decision graphs ticked once per
//! frame, with cooperative time-slicing so no single tree blows the frame
//! budget, and reset-driven cancellation of in-flight async leaves.

pub mod node;
pub mod tree;

pub use node::{ActionId, DecoratorKind, NodeDef, NodeId, Status};
pub use tree::{ActionError, ActionProvider, Tree, TreeBuilder, TreeRuntime, DEFAULT_TIME_BUDGET_MS};
