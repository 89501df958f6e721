//! The per-entity decision loop: glue between the behavior tree, the
//! Q-learning selector, and the reward engine.

use garrison_behavior::{ActionProvider, Status, Tree, TreeRuntime};
use garrison_ecs::components::{Ai, AiState};
use garrison_ecs::entity::EntityId;
use tracing::debug;

use crate::action::Action;
use crate::qlearning::{Selector, Transition};
use crate::reward::{compute_reward, Outcome, RewardTable};
use crate::state::TacticalContext;

/// A decision translated into something the movement/combat systems act
/// on. Distinct from the behavior tree's [`garrison_behavior::ActionId`]
/// leaves, which drive the low-level execution of whichever order is
/// currently selected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Order {
    Move { dx: f32, dy: f32 },
    AttackNearest,
    AttackWeakest,
    AttackStrongest,
    Retreat { dx: f32, dy: f32 },
    HoldPosition,
    Patrol,
    GatherNearestResource,
    Idle,
}

fn translate(action: Action, ctx: &TacticalContext) -> Order {
    match action {
        Action::Move(dir) => {
            let (dx, dy) = dir.to_vector();
            Order::Move { dx, dy }
        }
        Action::AttackNearest => Order::AttackNearest,
        Action::AttackWeakest => Order::AttackWeakest,
        Action::AttackStrongest => Order::AttackStrongest,
        Action::Retreat => {
            let (dx, dy) = ctx.nearest_threat.map(|t| (-t.direction.0, -t.direction.1)).unwrap_or((0.0, 0.0));
            Order::Retreat { dx, dy }
        }
        Action::HoldPosition => Order::HoldPosition,
        Action::Patrol => Order::Patrol,
        Action::GatherNearestResource => Order::GatherNearestResource,
        Action::Idle => Order::Idle,
    }
}

/// Per-entity state the tactical loop needs between ticks: the behavior
/// tree's cursor/pending state, the last action chosen (for backend-raise
/// fallback), and the state vector that action was chosen from (for the
/// replay transition once the resulting reward is known).
#[derive(Debug, Clone, Default)]
pub struct TacticalRuntime {
    pub tree_runtime: TreeRuntime,
    last_action: u8,
    pending_state: Option<[f32; crate::state::STATE_LEN]>,
}

impl TacticalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// The action id chosen on the last tick a decision was due, for
    /// diagnostic event emission by the caller.
    pub fn last_action(&self) -> u8 {
        self.last_action
    }
}

/// Result of one call to [`step`]: the order to dispatch (if a decision was
/// due this tick), the behavior tree's tick status, and the reward fed
/// back to the selector.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub order: Option<Order>,
    pub tree_status: Status,
    pub reward: f32,
}

/// Runs one full `Idle -> Perceiving -> Deciding -> Acting -> Learning ->
/// Idle` cycle for one entity. `outcome` describes what actually happened
/// as a result of the previously dispatched order (combat/movement/economy
/// systems resolve that; `None` means nothing reward-worthy happened).
#[allow(clippy::too_many_arguments)]
pub fn step(
    entity: EntityId,
    ai: &mut Ai,
    ctx: &TacticalContext,
    runtime: &mut TacticalRuntime,
    tree: &Tree,
    selector: &mut Selector,
    reward_table: &RewardTable,
    outcome: Option<Outcome>,
    provider: &mut dyn ActionProvider,
    now_ms: f64,
    dt_ms: f64,
) -> StepOutcome {
    ai.state = AiState::Perceiving;
    let combat_pressure = (ctx.nearby_enemies as f32 / 8.0).clamp(0.0, 1.0);

    ai.state = AiState::Deciding;
    let due = ai.enabled && now_ms - ai.last_decision_time_ms >= ai.effective_interval_ms(combat_pressure);
    let mut order = None;
    if due {
        let state_vec = ctx.to_state_vector();
        let action_id = selector.select(&state_vec, runtime.last_action);
        let action = Action::from_id(action_id);
        order = Some(translate(action, ctx));
        runtime.last_action = action_id;
        runtime.pending_state = Some(state_vec);
        ai.last_decision_time_ms = now_ms;
        debug!(?entity, action_id, ?order, "tactical decision made");
    }

    ai.state = AiState::Acting;
    let tree_status = tree.tick(&mut runtime.tree_runtime, provider, entity, dt_ms);

    ai.state = AiState::Learning;
    let reward = outcome.as_ref().map(|o| compute_reward(reward_table, o)).unwrap_or(0.0);
    if ai.learning_enabled {
        if let Some(prev_state) = runtime.pending_state {
            let next_state = ctx.to_state_vector();
            selector.learn(Transition {
                state: prev_state,
                action: runtime.last_action,
                reward,
                next_state,
                terminal: false,
            });
        }
    }

    ai.state = AiState::Idle;
    StepOutcome { order, tree_status, reward }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qlearning::{Backend, Hyperparams, LinearBackend};
    use crate::state::Nearby;
    use garrison_behavior::{ActionError, ActionId};
    use garrison_ecs::components::BehaviorProfile;
    use crate::reward::{GlobalSection, SituationalMultipliers};
    use std::collections::HashMap;

    struct NoopProvider;
    impl ActionProvider for NoopProvider {
        fn poll(&mut self, _action: ActionId, _entity: EntityId, _dt_ms: f64, _context: &serde_json::Value) -> Result<Status, ActionError> {
            Ok(Status::Success)
        }
    }

    fn empty_reward_table() -> RewardTable {
        RewardTable {
            global: GlobalSection {
                movement_scale: 1.0,
                combat_scale: 1.0,
                economic_scale: 1.0,
                tactical_scale: 1.0,
                time_decay_factor: 0.0,
                max_reward_magnitude: 100.0,
                exploration_bonus: 0.0,
                repetition_penalty: 0.0,
                diversity_bonus: 0.0,
            },
            movement: HashMap::new(),
            combat: HashMap::new(),
            tactical: HashMap::new(),
            economic: HashMap::new(),
            idle: HashMap::new(),
            situational: SituationalMultipliers::default(),
            special: HashMap::new(),
            meta_learning: HashMap::new(),
        }
    }

    fn context() -> TacticalContext {
        TacticalContext {
            own_health_ratio: 1.0,
            position: (0.0, 0.0),
            perception_radius: 100.0,
            nearby_allies: 1,
            nearby_enemies: 0,
            nearest_threat: None,
            nearest_resource_distance: None,
            ammo_energy_ratio: None,
            state: AiState::Idle,
        }
    }

    #[test]
    fn decision_is_withheld_until_interval_elapses() {
        let mut ai = Ai::new(BehaviorProfile::Scout, 1000.0);
        let mut runtime = TacticalRuntime::new();
        let mut b = garrison_behavior::TreeBuilder::default();
        let leaf = b.action(None, ActionId(0), serde_json::Value::Null);
        let tree = b.build(leaf);
        let mut selector = Selector::new(Backend::Linear(LinearBackend::default()), Hyperparams::default(), 42);
        let table = empty_reward_table();
        let mut provider = NoopProvider;

        let out = step(EntityId::new(0, 0), &mut ai, &context(), &mut runtime, &tree, &mut selector, &table, None, &mut provider, 0.0, 16.0);
        assert!(out.order.is_some());

        let out2 = step(EntityId::new(0, 0), &mut ai, &context(), &mut runtime, &tree, &mut selector, &table, None, &mut provider, 16.0, 16.0);
        assert!(out2.order.is_none());
    }

    #[test]
    fn ai_state_ends_each_step_back_at_idle() {
        let mut ai = Ai::new(BehaviorProfile::Scout, 1000.0);
        let mut runtime = TacticalRuntime::new();
        let mut b = garrison_behavior::TreeBuilder::default();
        let leaf = b.action(None, ActionId(0), serde_json::Value::Null);
        let tree = b.build(leaf);
        let mut selector = Selector::new(Backend::Linear(LinearBackend::default()), Hyperparams::default(), 1);
        let table = empty_reward_table();
        let mut provider = NoopProvider;

        step(EntityId::new(0, 0), &mut ai, &context(), &mut runtime, &tree, &mut selector, &table, None, &mut provider, 0.0, 16.0);
        assert_eq!(ai.state, AiState::Idle);
    }

    #[test]
    fn disabled_ai_never_issues_orders() {
        let mut ai = Ai::new(BehaviorProfile::Scout, 1000.0);
        ai.enabled = false;
        let mut runtime = TacticalRuntime::new();
        let mut b = garrison_behavior::TreeBuilder::default();
        let leaf = b.action(None, ActionId(0), serde_json::Value::Null);
        let tree = b.build(leaf);
        let mut selector = Selector::new(Backend::Linear(LinearBackend::default()), Hyperparams::default(), 1);
        let table = empty_reward_table();
        let mut provider = NoopProvider;

        let out = step(EntityId::new(0, 0), &mut ai, &context(), &mut runtime, &tree, &mut selector, &table, None, &mut provider, 0.0, 16.0);
        assert!(out.order.is_none());
    }

    #[test]
    fn retreat_direction_points_away_from_the_threat() {
        let ctx = TacticalContext {
            nearest_threat: Some(Nearby {
                entity: EntityId::new(1, 0),
                distance: 5.0,
                direction: (1.0, 0.0),
            }),
            ..context()
        };
        let order = translate(Action::Retreat, &ctx);
        assert_eq!(order, Order::Retreat { dx: -1.0, dy: 0.0 });
    }
}
