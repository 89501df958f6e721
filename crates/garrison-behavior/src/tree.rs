//! Tree construction and the tick/reset algorithms.

use std::collections::HashSet;
use std::time::Instant;

use garrison_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::node::{ActionId, DecoratorKind, NodeDef, NodeId, Status};

/// Default time slice (milliseconds) a composite grants itself per tick
/// call before yielding `Running` to let the rest of the frame proceed.
pub const DEFAULT_TIME_BUDGET_MS: f64 = 5.0;

/// Supplies the actual behavior behind [`NodeDef::Action`] leaves. The
/// tree only ever holds an [`ActionId`]; the embedder owns what it does.
pub trait ActionProvider {
    /// Advance the named action one step for `entity`. Returning
    /// `Status::Running` means the action is still in flight; a later
    /// call (a subsequent frame) continues it. `Err` is logged and
    /// coerced to `Status::Failure`, matching a leaf callable raising.
    fn poll(
        &mut self,
        action: ActionId,
        entity: EntityId,
        dt_ms: f64,
        context: &serde_json::Value,
    ) -> Result<Status, ActionError>;

    /// Called when a `Running` action is abandoned by a tree reset before
    /// it resolved. The eventual result (if any) must be discarded.
    fn cancel(&mut self, action: ActionId, entity: EntityId) {
        let _ = (action, entity);
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("action {0:?} raised: {1}")]
pub struct ActionError(pub ActionId, pub String);

/// A tree's static description: a flat arena of nodes plus the root.
/// Cloneable and shareable across every entity that uses this behavior
/// profile; per-entity execution state lives in [`TreeRuntime`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<NodeDef>,
    root: NodeId,
    default_time_budget_ms: f64,
}

impl Tree {
    pub fn builder() -> TreeBuilder {
        TreeBuilder::default()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &NodeDef {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run one tick starting at the root, resuming whatever composite was
    /// left `Running` from a prior call. On a non-`Running` result the
    /// whole tree is reset so the next call re-enters cleanly from the
    /// root.
    pub fn tick(
        &self,
        runtime: &mut TreeRuntime,
        provider: &mut dyn ActionProvider,
        entity: EntityId,
        dt_ms: f64,
    ) -> Status {
        runtime.ensure_capacity(self.nodes.len());
        let start = Instant::now();
        let status = self.tick_node(self.root, runtime, provider, entity, dt_ms, start);
        if !matches!(status, Status::Running) {
            self.reset_subtree(self.root, runtime, provider, entity);
        }
        status
    }

    /// Explicitly abandon whatever is in flight, cancelling any pending
    /// async leaves. Used when an order supersedes the current behavior
    /// (e.g. a `stop_order`).
    pub fn cancel(&self, runtime: &mut TreeRuntime, provider: &mut dyn ActionProvider, entity: EntityId) {
        runtime.ensure_capacity(self.nodes.len());
        self.reset_subtree(self.root, runtime, provider, entity);
    }

    fn time_budget_for(&self, node: &NodeDef) -> f64 {
        match node {
            NodeDef::Selector { time_budget_ms, .. } | NodeDef::Sequence { time_budget_ms, .. } => {
                time_budget_ms.unwrap_or(self.default_time_budget_ms)
            }
            _ => self.default_time_budget_ms,
        }
    }

    fn budget_elapsed(&self, node: &NodeDef, start: Instant) -> bool {
        start.elapsed().as_secs_f64() * 1000.0 >= self.time_budget_for(node)
    }

    fn tick_node(
        &self,
        id: NodeId,
        runtime: &mut TreeRuntime,
        provider: &mut dyn ActionProvider,
        entity: EntityId,
        dt_ms: f64,
        start: Instant,
    ) -> Status {
        match &self.nodes[id.0] {
            NodeDef::Selector { children, .. } => {
                self.tick_composite(id, children, true, runtime, provider, entity, dt_ms, start)
            }
            NodeDef::Sequence { children, .. } => {
                self.tick_composite(id, children, false, runtime, provider, entity, dt_ms, start)
            }
            NodeDef::Action { action, context, name } => {
                let result = provider.poll(*action, entity, dt_ms, context);
                let status = match result {
                    Ok(status) => status,
                    Err(err) => {
                        warn!(node = name.as_deref().unwrap_or("<unnamed>"), error = %err, "action leaf raised, coercing to Failure");
                        Status::Failure
                    }
                };
                match status {
                    Status::Running => {
                        runtime.pending.insert(id);
                    }
                    _ => {
                        runtime.pending.remove(&id);
                    }
                }
                status
            }
            NodeDef::Decorator { kind, child, .. } => {
                self.tick_decorator(id, *kind, *child, runtime, provider, entity, dt_ms, start)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn tick_composite(
        &self,
        id: NodeId,
        children: &[NodeId],
        is_selector: bool,
        runtime: &mut TreeRuntime,
        provider: &mut dyn ActionProvider,
        entity: EntityId,
        dt_ms: f64,
        start: Instant,
    ) -> Status {
        if children.is_empty() {
            return if is_selector { Status::Failure } else { Status::Success };
        }
        let first = runtime.cursor[id.0].unwrap_or(0);
        for i in first..children.len() {
            let status = self.tick_node(children[i], runtime, provider, entity, dt_ms, start);
            let succeed_early = status == Status::Success && is_selector;
            let fail_early = status == Status::Failure && !is_selector;
            match status {
                Status::Running => {
                    runtime.cursor[id.0] = Some(i);
                    return Status::Running;
                }
                _ if succeed_early || fail_early => {
                    runtime.cursor[id.0] = None;
                    return status;
                }
                _ => {
                    // This child reached the "keep going" outcome for this
                    // composite kind (Failure under Selector, Success under
                    // Sequence). Move to the next child, yielding if our
                    // time slice for this call is spent.
                    if i + 1 < children.len() && self.budget_elapsed(&self.nodes[id.0], start) {
                        runtime.cursor[id.0] = Some(i + 1);
                        return Status::Running;
                    }
                }
            }
        }
        runtime.cursor[id.0] = None;
        if is_selector {
            Status::Failure
        } else {
            Status::Success
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn tick_decorator(
        &self,
        id: NodeId,
        kind: DecoratorKind,
        child: NodeId,
        runtime: &mut TreeRuntime,
        provider: &mut dyn ActionProvider,
        entity: EntityId,
        dt_ms: f64,
        start: Instant,
    ) -> Status {
        match kind {
            DecoratorKind::Inverter => match self.tick_node(child, runtime, provider, entity, dt_ms, start) {
                Status::Success => Status::Failure,
                Status::Failure => Status::Success,
                Status::Running => Status::Running,
            },
            DecoratorKind::RepeatN(n) => {
                let status = self.tick_node(child, runtime, provider, entity, dt_ms, start);
                match status {
                    Status::Running => Status::Running,
                    Status::Failure => {
                        runtime.repeat_count[id.0] = 0;
                        Status::Failure
                    }
                    Status::Success => {
                        runtime.repeat_count[id.0] += 1;
                        if runtime.repeat_count[id.0] >= n {
                            runtime.repeat_count[id.0] = 0;
                            Status::Success
                        } else {
                            Status::Running
                        }
                    }
                }
            }
            DecoratorKind::UntilSuccess => match self.tick_node(child, runtime, provider, entity, dt_ms, start) {
                Status::Success => Status::Success,
                Status::Running | Status::Failure => Status::Running,
            },
            DecoratorKind::UntilFailure => match self.tick_node(child, runtime, provider, entity, dt_ms, start) {
                Status::Failure => Status::Success,
                Status::Running | Status::Success => Status::Running,
            },
        }
    }

    fn reset_subtree(&self, id: NodeId, runtime: &mut TreeRuntime, provider: &mut dyn ActionProvider, entity: EntityId) {
        match &self.nodes[id.0] {
            NodeDef::Selector { children, .. } | NodeDef::Sequence { children, .. } => {
                runtime.cursor[id.0] = None;
                for &c in children {
                    self.reset_subtree(c, runtime, provider, entity);
                }
            }
            NodeDef::Decorator { child, .. } => {
                runtime.repeat_count[id.0] = 0;
                self.reset_subtree(*child, runtime, provider, entity);
            }
            NodeDef::Action { action, .. } => {
                if runtime.pending.remove(&id) {
                    provider.cancel(*action, entity);
                }
            }
        }
    }
}

/// Per-entity execution state for a [`Tree`]: which child each composite
/// was last running, repeat counters, and which action nodes have an
/// in-flight (`Running`) call.
#[derive(Debug, Clone, Default)]
pub struct TreeRuntime {
    cursor: Vec<Option<usize>>,
    repeat_count: Vec<u32>,
    pending: HashSet<NodeId>,
}

impl TreeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_capacity(&mut self, n: usize) {
        if self.cursor.len() < n {
            self.cursor.resize(n, None);
            self.repeat_count.resize(n, 0);
        }
    }
}

/// Builds a [`Tree`] by appending nodes and wiring child references.
#[derive(Default)]
pub struct TreeBuilder {
    nodes: Vec<NodeDef>,
    default_time_budget_ms: Option<f64>,
}

impl TreeBuilder {
    pub fn with_default_time_budget_ms(mut self, ms: f64) -> Self {
        self.default_time_budget_ms = Some(ms);
        self
    }

    pub fn selector(&mut self, name: impl Into<Option<String>>, children: Vec<NodeId>) -> NodeId {
        self.push(NodeDef::Selector {
            name: name.into(),
            children,
            time_budget_ms: None,
        })
    }

    pub fn sequence(&mut self, name: impl Into<Option<String>>, children: Vec<NodeId>) -> NodeId {
        self.push(NodeDef::Sequence {
            name: name.into(),
            children,
            time_budget_ms: None,
        })
    }

    pub fn action(&mut self, name: impl Into<Option<String>>, action: ActionId, context: serde_json::Value) -> NodeId {
        self.push(NodeDef::Action {
            name: name.into(),
            action,
            context,
        })
    }

    pub fn decorator(&mut self, name: impl Into<Option<String>>, kind: DecoratorKind, child: NodeId) -> NodeId {
        self.push(NodeDef::Decorator {
            name: name.into(),
            kind,
            child,
        })
    }

    fn push(&mut self, node: NodeDef) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn build(self, root: NodeId) -> Tree {
        Tree {
            default_time_budget_ms: self.default_time_budget_ms.unwrap_or(DEFAULT_TIME_BUDGET_MS),
            nodes: self.nodes,
            root,
        }
    }
}
