//! Node descriptions for a behavior tree. Trees are a flat arena of
//! [`NodeDef`]s addressed by [`NodeId`] — a tagged variant over node kinds
//! rather than `Box<dyn Node>`, so composites own plain index lists instead
//! of trait objects.

use serde::{Deserialize, Serialize};

/// Index into a [`crate::tree::Tree`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Identifies a user-registered action callback; the tree itself never
/// holds the callable, only this reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub u32);

/// The result of ticking a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Running,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecoratorKind {
    Inverter,
    RepeatN(u32),
    UntilSuccess,
    UntilFailure,
}

/// One node in a tree's arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeDef {
    /// OR: ticks children left-to-right, succeeds on the first success.
    Selector {
        name: Option<String>,
        children: Vec<NodeId>,
        time_budget_ms: Option<f64>,
    },
    /// AND: ticks children left-to-right, fails on the first failure.
    Sequence {
        name: Option<String>,
        children: Vec<NodeId>,
        time_budget_ms: Option<f64>,
    },
    /// Leaf: hands off to a user-registered action by id, with an
    /// optional JSON context record describing parameters for that call.
    Action {
        name: Option<String>,
        action: ActionId,
        context: serde_json::Value,
    },
    Decorator {
        name: Option<String>,
        kind: DecoratorKind,
        child: NodeId,
    },
}

impl NodeDef {
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeDef::Selector { name, .. }
            | NodeDef::Sequence { name, .. }
            | NodeDef::Action { name, .. }
            | NodeDef::Decorator { name, .. } => name.as_deref(),
        }
    }
}
