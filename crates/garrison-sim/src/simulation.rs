//! The top-level facade: owns the store, spatial index, pathfinding
//! service, economy, and tactical AI side-state, wires them into the
//! scheduler at the priorities the concurrency model names (movement
//! before AI), and exposes the inbound/outbound surface from
//! `crate::commands`/`crate::events`.
//!
//! Owns everything a tick touches; `step()` drives one frame and commits
//! deferred store mutations at the end. Snapshotting follows a
//! blake3-hashed capture/restore pattern: the hash covers the store,
//! ledger, and tick/time bookkeeping, and is checked before a restore
//! touches any live state.

use std::collections::HashMap;

use garrison_ai::qlearning::{Backend, Hyperparams, LinearBackend, Selector};
use garrison_ai::reward::{Outcome, RewardTable};
use garrison_ai::state::{Nearby, TacticalContext};
use garrison_ai::tactical::{self, Order as TacticalOrder, TacticalRuntime};
use garrison_behavior::{ActionError, ActionId, ActionProvider, Status, Tree, TreeBuilder};
use garrison_ecs::components::{Ai, BehaviorProfile, ComponentKind, Health, Movement, Team, Transform};
use garrison_ecs::entity::EntityId;
use garrison_ecs::snapshot::StoreSnapshot;
use garrison_ecs::spatial::{Bounds, SpatialIndex};
use garrison_ecs::store::Store;
use garrison_economy::{DeltaReason, EconomyEvent, EconomySystem, TeamLedger};
use garrison_pathfinding::{grid::NavGrid, PathfindingService};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::commands::{Blueprint, Order, OrderError};
use crate::config::SimConfig;
use crate::events::{Event, EventQueue};
use crate::scheduler::{Scheduler, System};

/// How far ahead of an agent a `Move`/`Retreat` action requests a path.
const ACTION_LOOKAHEAD_UNITS: f32 = 128.0;

/// A leaf ID bound to the single shared behavior tree every agent ticks.
/// Real per-profile trees with distinct leaves are an embedder concern —
/// this crate only needs the tree to drive `AiState`'s Acting phase, not
/// to author unit-specific execution graphs.
const ROOT_ACTION_ID: ActionId = ActionId(0);

/// Resolves every behavior-tree leaf to an immediate success. The tree's
/// role here is to exercise the `Idle -> ... -> Learning` cycle, not to
/// drive distinct low-level executions; an embedder building real unit
/// behaviors supplies its own `ActionProvider`.
struct NoopActionProvider;

impl ActionProvider for NoopActionProvider {
    fn poll(&mut self, _action: ActionId, _entity: EntityId, _dt_ms: f64, _context: &serde_json::Value) -> Result<Status, ActionError> {
        Ok(Status::Success)
    }
}

/// Per-entity and per-profile AI bookkeeping that doesn't belong in the
/// store: the shared tree, one selector per behavior profile (they don't
/// share a policy), per-entity tree/selector runtime, and `attack_order`
/// overrides.
struct AiRuntime {
    tree: Tree,
    provider: NoopActionProvider,
    selectors: HashMap<BehaviorProfile, Selector>,
    runtimes: HashMap<EntityId, TacticalRuntime>,
    overrides: HashMap<EntityId, EntityId>,
    /// Whether each entity had an in-flight movement target as of its last
    /// `AiSystem` tick, so arrival can be reward-scored on the tick it
    /// happens rather than re-detected every tick after.
    last_moving: HashMap<EntityId, bool>,
    reward_table: RewardTable,
    hyperparams: Hyperparams,
    seed: u64,
}

impl AiRuntime {
    fn new(reward_table: RewardTable, hyperparams: Hyperparams, seed: u64) -> Self {
        let mut builder = TreeBuilder::default();
        let leaf = builder.action(None, ROOT_ACTION_ID, serde_json::Value::Null);
        let tree = builder.build(leaf);
        Self {
            tree,
            provider: NoopActionProvider,
            selectors: HashMap::new(),
            runtimes: HashMap::new(),
            overrides: HashMap::new(),
            last_moving: HashMap::new(),
            reward_table,
            hyperparams,
            seed,
        }
    }

}

/// Translates what actually happened since this entity's last decision into
/// a reward-engine [`Outcome`]: a movement order that reached its
/// destination, or the entity's team gaining credits this tick (a harvester
/// unloading, most likely). Combat outcomes are left to an embedder that
/// resolves damage; this core only has movement and economy ground truth to
/// offer on its own.
fn observe_outcome(ctx: &mut SimContext, entity: EntityId, own_team: Option<Team>) -> Option<Outcome> {
    let moving_now = ctx.store.get_component::<Movement>(entity).map(|m| m.target.is_some()).unwrap_or(false);
    let was_moving = ctx.ai.last_moving.insert(entity, moving_now).unwrap_or(false);
    if was_moving && !moving_now {
        return Some(Outcome {
            section: "movement",
            term: "moveSuccess",
            scale: 1.0,
            health_ratio_key: None,
            threat_key: None,
            urgency_key: None,
            teamwork_bonus: 0.0,
            learning_bonus: 0.0,
        });
    }

    let team = own_team?;
    for event in ctx.events.pending() {
        if let Event::EconomyDelta { team: delta_team, before, after, .. } = event {
            if *delta_team == team.0 && after > before {
                return Some(Outcome {
                    section: "economic",
                    term: "creditsGained",
                    scale: (*after - *before) as f32,
                    health_ratio_key: None,
                    threat_key: None,
                    urgency_key: None,
                    teamwork_bonus: 0.0,
                    learning_bonus: 0.0,
                });
            }
        }
    }
    None
}

/// Everything a [`System`] registered on this simulation's scheduler can
/// touch. Disjoint fields are borrowed independently by each system so two
/// systems never need to share one `&mut` of the whole struct.
pub struct SimContext {
    pub store: Store,
    pub spatial: SpatialIndex,
    pub pathfinding: PathfindingService,
    pub economy: EconomySystem,
    pub ledger: TeamLedger,
    pub events: EventQueue,
    pub rng: Pcg32,
    pub now_ms: f64,
    world_bounds: Bounds,
    ai: AiRuntime,
}

struct MovementSystem;

impl System<SimContext> for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn update(&mut self, ctx: &mut SimContext, dt_ms: f64) {
        let entities = ctx.store.query(&[ComponentKind::Transform, ComponentKind::Movement]);
        for entity in entities {
            let Some(movement) = ctx.store.get_component::<Movement>(entity) else { continue };
            if movement.remaining_waypoints().is_empty() {
                continue;
            }
            let waypoint = movement.remaining_waypoints()[0];
            let max_speed = movement.max_speed;
            let cursor = movement.path_cursor;

            let transform = ctx.store.get_component_mut::<Transform>(entity).expect("queried for Transform");
            let (dx, dy) = (waypoint.0 - transform.x, waypoint.1 - transform.y);
            let distance = (dx * dx + dy * dy).sqrt();
            let step = max_speed * (dt_ms / 1000.0) as f32;

            if distance <= step.max(garrison_economy::ARRIVAL_EPSILON) {
                transform.x = waypoint.0;
                transform.y = waypoint.1;
                let (x, y) = (transform.x, transform.y);
                let movement = ctx.store.get_component_mut::<Movement>(entity).expect("queried for Movement");
                movement.path_cursor = cursor + 1;
                if movement.path_cursor >= movement.path.len() {
                    movement.velocity = (0.0, 0.0);
                    movement.target = None;
                }
                ctx.spatial.update(entity, x, y);
            } else {
                let (nx, ny) = (dx / distance, dy / distance);
                transform.x += nx * step;
                transform.y += ny * step;
                let (x, y) = (transform.x, transform.y);
                let movement = ctx.store.get_component_mut::<Movement>(entity).expect("queried for Movement");
                movement.velocity = (nx * max_speed, ny * max_speed);
                ctx.spatial.update(entity, x, y);
            }
        }
    }
}

struct EconomyTickSystem;

impl System<SimContext> for EconomyTickSystem {
    fn name(&self) -> &str {
        "economy"
    }

    fn update(&mut self, ctx: &mut SimContext, dt_ms: f64) {
        let raised = ctx.economy.step(&mut ctx.store, &ctx.spatial, &mut ctx.ledger, dt_ms);
        for event in raised {
            match event {
                EconomyEvent::CreditsChanged(delta) => {
                    ctx.events.push(Event::EconomyDelta { team: delta.team, before: delta.before, after: delta.after, reason: delta.reason });
                }
                EconomyEvent::DepositDepleted { .. } | EconomyEvent::HarvesterRetargeted { .. } | EconomyEvent::HarvesterIdled { .. } => {
                    debug!(?event, "economy state change");
                }
            }
        }
    }
}

struct AiSystem;

fn gather_context(store: &Store, spatial: &SpatialIndex, ai: &Ai, entity: EntityId, pos: (f32, f32)) -> TacticalContext {
    let own_health_ratio = store.get_component::<Health>(entity).map(|h| h.ratio()).unwrap_or(1.0);
    let own_team = store.get_component::<Team>(entity).copied();
    let radius = ai.perception_radius * ai.ai_level.perception_multiplier();

    let nearby = spatial.query_radius(pos.0, pos.1, radius);
    let mut allies = 0u32;
    let mut enemies = 0u32;
    let mut nearest_threat: Option<Nearby> = None;

    for other in nearby {
        if other == entity {
            continue;
        }
        let Some(other_transform) = store.get_component::<Transform>(other) else { continue };
        let dx = other_transform.x - pos.0;
        let dy = other_transform.y - pos.1;
        let distance = (dx * dx + dy * dy).sqrt();

        let other_team = store.get_component::<Team>(other).copied();
        let is_enemy = matches!((own_team, other_team), (Some(a), Some(b)) if a != b);
        if is_enemy {
            enemies += 1;
            let better = nearest_threat.map(|t| distance < t.distance).unwrap_or(true);
            if better && distance > 0.0 {
                nearest_threat = Some(Nearby { entity: other, distance, direction: (dx / distance, dy / distance) });
            }
        } else if other_team.is_some() {
            allies += 1;
        }
    }

    TacticalContext {
        own_health_ratio,
        position: pos,
        perception_radius: radius,
        nearby_allies: allies,
        nearby_enemies: enemies,
        nearest_threat,
        nearest_resource_distance: None,
        ammo_energy_ratio: None,
        state: ai.state,
    }
}

fn pick_target(store: &Store, spatial: &SpatialIndex, self_entity: EntityId, own_team: Option<Team>, pos: (f32, f32), radius: f32, by: TargetCriterion) -> Option<EntityId> {
    let mut best: Option<(EntityId, f32)> = None;
    for candidate in spatial.query_radius(pos.0, pos.1, radius) {
        if candidate == self_entity {
            continue;
        }
        let candidate_team = store.get_component::<Team>(candidate).copied();
        if !matches!((own_team, candidate_team), (Some(a), Some(b)) if a != b) {
            continue;
        }
        let Some(transform) = store.get_component::<Transform>(candidate) else { continue };
        let health = store.get_component::<Health>(candidate);
        if let Some(h) = health {
            if !h.alive {
                continue;
            }
        }
        let dx = transform.x - pos.0;
        let dy = transform.y - pos.1;
        let distance = (dx * dx + dy * dy).sqrt();
        let score = match by {
            TargetCriterion::Nearest => distance,
            TargetCriterion::Weakest => health.map(|h| h.ratio()).unwrap_or(1.0),
            TargetCriterion::Strongest => -health.map(|h| h.ratio()).unwrap_or(1.0),
        };
        if best.map(|(_, s)| score < s).unwrap_or(true) {
            best = Some((candidate, score));
        }
    }
    best.map(|(e, _)| e)
}

#[derive(Clone, Copy)]
enum TargetCriterion {
    Nearest,
    Weakest,
    Strongest,
}

impl System<SimContext> for AiSystem {
    fn name(&self) -> &str {
        "ai"
    }

    fn update(&mut self, ctx: &mut SimContext, dt_ms: f64) {
        let entities = ctx.store.query(&[ComponentKind::Ai, ComponentKind::Transform]);
        let now_ms = ctx.now_ms;

        for entity in entities {
            let Some(mut ai) = ctx.store.get_component::<Ai>(entity).cloned() else { continue };
            let Some(pos) = ctx.store.get_component::<Transform>(entity).map(|t| (t.x, t.y)) else { continue };
            let own_team = ctx.store.get_component::<Team>(entity).copied();

            let tctx = gather_context(&ctx.store, &ctx.spatial, &ai, entity, pos);
            let observed = observe_outcome(ctx, entity, own_team);
            let profile = ai.profile;
            let seed = ctx.ai.seed;
            let hyperparams = ctx.ai.hyperparams.clone();
            let selector = ctx
                .ai
                .selectors
                .entry(profile)
                .or_insert_with(|| Selector::new(Backend::Linear(LinearBackend::default()), hyperparams, seed));
            let runtime = ctx.ai.runtimes.entry(entity).or_default();
            let reward_table = &ctx.ai.reward_table;

            let outcome = tactical::step(entity, &mut ai, &tctx, runtime, &ctx.ai.tree, selector, reward_table, observed, &mut ctx.ai.provider, now_ms, dt_ms);
            let action_id = runtime.last_action();

            if let Some(order) = outcome.order {
                apply_order(ctx, entity, own_team, pos, order);
                ctx.events.push(Event::DecisionTrace { entity, action: action_id, reward: outcome.reward });
            }

            if let Some(slot) = ctx.store.get_component_mut::<Ai>(entity) {
                *slot = ai;
            }
        }
    }
}

fn apply_order(ctx: &mut SimContext, entity: EntityId, own_team: Option<Team>, pos: (f32, f32), order: TacticalOrder) {
    match order {
        TacticalOrder::Move { dx, dy } => request_path(ctx, entity, (pos.0 + dx * ACTION_LOOKAHEAD_UNITS, pos.1 + dy * ACTION_LOOKAHEAD_UNITS)),
        TacticalOrder::Retreat { dx, dy } => request_path(ctx, entity, (pos.0 + dx * ACTION_LOOKAHEAD_UNITS, pos.1 + dy * ACTION_LOOKAHEAD_UNITS)),
        TacticalOrder::AttackNearest | TacticalOrder::AttackWeakest | TacticalOrder::AttackStrongest => {
            let radius = ACTION_LOOKAHEAD_UNITS * 4.0;
            let criterion = match order {
                TacticalOrder::AttackNearest => TargetCriterion::Nearest,
                TacticalOrder::AttackWeakest => TargetCriterion::Weakest,
                _ => TargetCriterion::Strongest,
            };
            if let Some(target) = pick_target(&ctx.store, &ctx.spatial, entity, own_team, pos, radius, criterion) {
                ctx.ai.overrides.insert(entity, target);
                if let Some(target_pos) = ctx.store.get_component::<Transform>(target).map(|t| (t.x, t.y)) {
                    request_path(ctx, entity, target_pos);
                }
            }
        }
        TacticalOrder::HoldPosition => {
            if let Some(movement) = ctx.store.get_component_mut::<Movement>(entity) {
                movement.target = None;
                movement.path.clear();
                movement.path_cursor = 0;
                movement.velocity = (0.0, 0.0);
            }
        }
        // Patrol and resource-gathering route planning are an embedder
        // concern (waypoint loops, deposit selection heuristics); this
        // core only guarantees the harvester state machine in
        // `garrison-economy` keeps moving a harvester on its own.
        TacticalOrder::Patrol | TacticalOrder::GatherNearestResource | TacticalOrder::Idle => {}
    }
}

fn request_path(ctx: &mut SimContext, entity: EntityId, destination: (f32, f32)) {
    let Some(from) = ctx.store.get_component::<Transform>(entity).map(|t| (t.x, t.y)) else { return };
    match ctx.pathfinding.find_path(from, destination) {
        Ok(result) => {
            if result.waypoints.is_empty() {
                ctx.events.push(Event::PathFailed { entity });
                return;
            }
            if let Some(movement) = ctx.store.get_component_mut::<Movement>(entity) {
                movement.target = Some(destination);
                movement.path = result.waypoints.clone();
                movement.path_cursor = 0;
                movement.path_incomplete = result.incomplete;
            }
            ctx.events.push(Event::PathReady { entity, waypoints: result.waypoints });
        }
        Err(err) => {
            warn!(?entity, %err, "path request rejected");
            ctx.events.push(Event::PathFailed { entity });
        }
    }
}

/// Blake3-hashed outer wrapper around a store snapshot plus the economy
/// ledger and tick/time bookkeeping that isn't part of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    store: StoreSnapshot,
    ledger: TeamLedger,
    tick: u64,
    now_ms: f64,
    hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("snapshot hash mismatch: stored document was modified or corrupted")]
    HashMismatch,
    #[error(transparent)]
    InvalidStore(#[from] garrison_ecs::snapshot::SnapshotError),
}

fn compute_hash(store: &StoreSnapshot, ledger: &TeamLedger, tick: u64, now_ms: f64) -> String {
    #[derive(Serialize)]
    struct Hashable<'a> {
        store: &'a StoreSnapshot,
        ledger: &'a TeamLedger,
        tick: u64,
        now_ms_bits: u64,
    }
    let bytes = serde_json::to_vec(&Hashable { store, ledger, tick, now_ms_bits: now_ms.to_bits() }).expect("snapshot state is always serializable");
    blake3::hash(&bytes).to_hex().to_string()
}

/// The embeddable simulation core: one entity/component store, one spatial
/// index, one pathfinding service, one economy, and the tactical AI
/// side-state, advanced one `step` at a time.
pub struct Simulation {
    scheduler: Scheduler<SimContext>,
    ctx: SimContext,
    tick: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let grid = NavGrid::new(config.grid.width_cells as i32, config.grid.height_cells as i32, config.grid.cell_size);
        let world_width = config.grid.width_cells as f32 * config.grid.cell_size;
        let world_height = config.grid.height_cells as f32 * config.grid.cell_size;

        let world_bounds = Bounds::new(0.0, 0.0, world_width, world_height);
        let ctx = SimContext {
            store: Store::new(4096),
            spatial: SpatialIndex::new(world_bounds),
            pathfinding: PathfindingService::new(grid),
            economy: EconomySystem::new(config.economy.extraction_rate_credits_per_sec, config.economy.deposit_search_radius),
            ledger: TeamLedger::new(),
            events: EventQueue::new(),
            rng: Pcg32::seed_from_u64(config.seed),
            now_ms: 0.0,
            world_bounds,
            ai: AiRuntime::new(config.reward_table, config.hyperparams, config.seed),
        };

        let mut scheduler = Scheduler::new();
        scheduler.register(Box::new(MovementSystem), 5);
        scheduler.register(Box::new(EconomyTickSystem), 10);
        scheduler.register(Box::new(AiSystem), 20);

        Self { scheduler, ctx, tick: 0 }
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    pub fn ledger(&self) -> &TeamLedger {
        &self.ctx.ledger
    }

    /// Direct, mutable access to the credit ledger for scenario setup
    /// (funding teams before play begins). There is no `grant_credits`
    /// order in the command surface — only `build_order` debits and a
    /// refinery unload credits — so seeding starting balances goes through
    /// this accessor rather than a synthetic order with no in-game cause.
    pub fn ledger_mut(&mut self) -> &mut TeamLedger {
        &mut self.ctx.ledger
    }

    /// Advances the simulation by one tick: runs every registered system in
    /// priority order, then commits deferred structural mutations so the
    /// next tick never observes a half-mutated world. `dt_ms` above 250ms
    /// is treated as a stall and clamped, so one slow host frame can't
    /// make a harvester or pathfinding request overshoot its destination.
    pub fn step(&mut self, dt_ms: f64) -> Vec<Event> {
        let dt_ms = dt_ms.clamp(0.0, 250.0);
        self.ctx.now_ms += dt_ms;
        let faulted = self.scheduler.step(&mut self.ctx, dt_ms);
        for name in faulted {
            warn!(system = %name, "system faulted this tick, continuing with its prior state");
        }
        self.ctx.store.commit();
        self.tick += 1;
        self.ctx.events.drain()
    }

    /// Validates and applies one inbound order. A rejected order never
    /// partially mutates the world: validation runs to completion before
    /// any store or ledger write.
    pub fn issue(&mut self, order: Order) -> Result<(), OrderError> {
        order.validate_shape()?;
        match order {
            Order::Move { entities, destination } => {
                for &entity in &entities {
                    if !self.ctx.store.is_alive(entity) {
                        return Err(OrderError::UnknownEntity(entity));
                    }
                }
                if entities.len() == 1 {
                    request_path(&mut self.ctx, entities[0], destination);
                } else {
                    let starts: Vec<(EntityId, (f32, f32))> =
                        entities.iter().filter_map(|&e| self.ctx.store.get_component::<Transform>(e).map(|t| (e, (t.x, t.y)))).collect();
                    if let Ok(paths) = self.ctx.pathfinding.find_paths_group(&starts, destination) {
                        for (entity, result) in paths {
                            if let Some(movement) = self.ctx.store.get_component_mut::<Movement>(entity) {
                                movement.target = Some(destination);
                                movement.path = result.waypoints.clone();
                                movement.path_cursor = 0;
                                movement.path_incomplete = result.incomplete;
                            }
                            if result.waypoints.is_empty() {
                                self.ctx.events.push(Event::PathFailed { entity });
                            } else {
                                self.ctx.events.push(Event::PathReady { entity, waypoints: result.waypoints });
                            }
                        }
                    }
                }
                Ok(())
            }
            Order::Attack { entity, target } => {
                if !self.ctx.store.is_alive(entity) {
                    return Err(OrderError::UnknownEntity(entity));
                }
                if !self.ctx.store.is_alive(target) {
                    return Err(OrderError::UnknownEntity(target));
                }
                self.ctx.ai.overrides.insert(entity, target);
                if let Some(target_pos) = self.ctx.store.get_component::<Transform>(target).map(|t| (t.x, t.y)) {
                    request_path(&mut self.ctx, entity, target_pos);
                }
                Ok(())
            }
            Order::Stop { entity } => {
                if !self.ctx.store.is_alive(entity) {
                    return Err(OrderError::UnknownEntity(entity));
                }
                self.ctx.ai.overrides.remove(&entity);
                if let Some(movement) = self.ctx.store.get_component_mut::<Movement>(entity) {
                    movement.target = None;
                    movement.path.clear();
                    movement.path_cursor = 0;
                    movement.velocity = (0.0, 0.0);
                }
                Ok(())
            }
            Order::Build { team, blueprint } => {
                self.spawn_unit(team, &blueprint)?;
                Ok(())
            }
        }
    }

    fn spawn_unit(&mut self, team: u8, blueprint: &Blueprint) -> Result<EntityId, OrderError> {
        self.ctx.ledger.debit(team, blueprint.cost, DeltaReason::BuildOrder)?;
        let entity = self.ctx.store.create_entity(self.ctx.now_ms)?;
        self.ctx.store.add_component(entity, Transform::at(0.0, 0.0));
        self.ctx.store.add_component(entity, Health::new(blueprint.max_health));
        self.ctx.store.add_component(entity, Team(team));
        self.ctx.store.add_component(
            entity,
            Movement { velocity: (0.0, 0.0), max_speed: blueprint.max_speed, target: None, path: Vec::new(), path_cursor: 0, path_incomplete: false },
        );
        self.ctx.store.commit();
        self.ctx.spatial.insert(entity, 0.0, 0.0);
        self.ctx.events.push(Event::EntitySpawned { entity });
        Ok(entity)
    }

    /// Captures a complete, restorable snapshot of simulation state: the
    /// store (entities, components, allocator), the economy ledger, and
    /// tick/time bookkeeping. Q-learning weights and the replay buffer are
    /// intentionally excluded — they are large and, per the reward/Q
    /// invariants, monotonically improve with more play, so restoring them
    /// would roll back learning progress rather than just world state.
    pub fn snapshot(&self) -> SimSnapshot {
        let store = self.ctx.store.capture_snapshot();
        let ledger = self.ctx.ledger.clone();
        let hash = compute_hash(&store, &ledger, self.tick, self.ctx.now_ms);
        SimSnapshot { store, ledger, tick: self.tick, now_ms: self.ctx.now_ms, hash }
    }

    /// Restores from a snapshot, recomputing and checking its hash before
    /// touching any live state — a tampered or corrupted snapshot is
    /// rejected outright rather than partially applied.
    pub fn restore(&mut self, snapshot: &SimSnapshot) -> Result<(), RestoreError> {
        let expected = compute_hash(&snapshot.store, &snapshot.ledger, snapshot.tick, snapshot.now_ms);
        if expected != snapshot.hash {
            return Err(RestoreError::HashMismatch);
        }
        let store = Store::restore_from_snapshot(&snapshot.store)?;

        self.ctx.store = store;
        self.ctx.ledger = snapshot.ledger.clone();
        self.tick = snapshot.tick;
        self.ctx.now_ms = snapshot.now_ms;
        self.ctx.events = EventQueue::new();
        self.ctx.ai.runtimes.clear();
        self.ctx.ai.overrides.clear();
        self.ctx.ai.last_moving.clear();

        let mut spatial = SpatialIndex::new(self.ctx.world_bounds);
        for entity in self.ctx.store.query(&[ComponentKind::Transform]) {
            if let Some(t) = self.ctx.store.get_component::<Transform>(entity) {
                spatial.insert(entity, t.x, t.y);
            }
        }
        self.ctx.spatial = spatial;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_ai::reward::{GlobalSection, SituationalMultipliers};
    use std::collections::HashMap as Map;

    fn config() -> SimConfig {
        SimConfig {
            grid: crate::config::GridConfig { width_cells: 64, height_cells: 64, cell_size: 32.0 },
            economy: crate::config::EconomyConfig { extraction_rate_credits_per_sec: 10_000.0, deposit_search_radius: 600.0 },
            hyperparams: Hyperparams::default(),
            reward_table: RewardTable {
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
                movement: Map::new(),
                combat: Map::new(),
                tactical: Map::new(),
                economic: Map::new(),
                idle: Map::new(),
                situational: SituationalMultipliers::default(),
                special: Map::new(),
                meta_learning: Map::new(),
            },
            seed: 7,
        }
    }

    #[test]
    fn build_order_debits_the_team_and_spawns_a_unit() {
        let mut sim = Simulation::new(config());
        sim.ctx.ledger.credit(1, 1000, DeltaReason::RefineryUnload);
        let events = {
            sim.issue(Order::Build { team: 1, blueprint: Blueprint::new("scout", 400, 50.0, 100.0) }).unwrap();
            sim.step(16.0)
        };
        assert_eq!(sim.ledger().balance(1), 600);
        assert!(events.iter().any(|e| matches!(e, Event::EntitySpawned { .. })));
    }

    #[test]
    fn build_order_is_rejected_when_the_team_cannot_afford_it() {
        let mut sim = Simulation::new(config());
        let err = sim.issue(Order::Build { team: 1, blueprint: Blueprint::new("scout", 400, 50.0, 100.0) }).unwrap_err();
        assert!(matches!(err, OrderError::InsufficientCredits(_)));
        assert_eq!(sim.store().query(&[ComponentKind::Team]).len(), 0, "a rejected build must not spawn an entity");
    }

    #[test]
    fn move_order_on_an_unknown_entity_is_rejected() {
        let mut sim = Simulation::new(config());
        let ghost = EntityId::new(999, 0);
        let err = sim.issue(Order::Move { entities: vec![ghost], destination: (10.0, 10.0) }).unwrap_err();
        assert!(matches!(err, OrderError::UnknownEntity(_)));
    }

    #[test]
    fn stop_order_clears_an_in_flight_path() {
        let mut sim = Simulation::new(config());
        let entity = sim.spawn_unit(1, &Blueprint::new("scout", 0, 50.0, 100.0)).unwrap_or_else(|_| {
            sim.ctx.ledger.credit(1, 1000, DeltaReason::RefineryUnload);
            sim.spawn_unit(1, &Blueprint::new("scout", 0, 50.0, 100.0)).unwrap()
        });
        sim.issue(Order::Move { entities: vec![entity], destination: (500.0, 0.0) }).unwrap();
        sim.issue(Order::Stop { entity }).unwrap();
        let movement = sim.store().get_component::<Movement>(entity).unwrap();
        assert!(movement.path.is_empty());
        assert!(movement.target.is_none());
    }

    #[test]
    fn observe_outcome_rewards_a_completed_move_on_the_tick_it_arrives() {
        let mut sim = Simulation::new(config());
        let entity = sim.spawn_unit(1, &Blueprint::new("scout", 0, 50.0, 100.0)).unwrap_or_else(|_| {
            sim.ctx.ledger.credit(1, 1000, DeltaReason::RefineryUnload);
            sim.spawn_unit(1, &Blueprint::new("scout", 0, 50.0, 100.0)).unwrap()
        });
        let team = Some(Team(1));

        // No in-flight order yet: nothing to reward.
        assert!(observe_outcome(&mut sim.ctx, entity, team).is_none());

        // An order is now in flight; still nothing to reward while it's pending.
        sim.ctx.store.get_component_mut::<Movement>(entity).unwrap().target = Some((500.0, 0.0));
        assert!(observe_outcome(&mut sim.ctx, entity, team).is_none());

        // The order completes (MovementSystem clears target on arrival).
        sim.ctx.store.get_component_mut::<Movement>(entity).unwrap().target = None;
        let outcome = observe_outcome(&mut sim.ctx, entity, team).expect("arrival is reward-worthy");
        assert_eq!(outcome.section, "movement");
        assert_eq!(outcome.term, "moveSuccess");

        // The transition has already been consumed; a still-idle entity earns nothing more.
        assert!(observe_outcome(&mut sim.ctx, entity, team).is_none());
    }

    #[test]
    fn observe_outcome_rewards_a_same_tick_credit_gain_for_the_entitys_own_team() {
        let mut sim = Simulation::new(config());
        sim.ctx.ledger.credit(1, 1000, DeltaReason::RefineryUnload);
        let entity = sim.spawn_unit(1, &Blueprint::new("scout", 200, 50.0, 100.0)).unwrap();
        let team = Some(Team(1));

        // Establish a non-moving baseline so the movement branch doesn't fire.
        assert!(observe_outcome(&mut sim.ctx, entity, team).is_none());

        sim.ctx.events.push(Event::EconomyDelta { team: 1, before: 800, after: 850, reason: DeltaReason::RefineryUnload });
        let outcome = observe_outcome(&mut sim.ctx, entity, team).expect("a credit gain for this entity's team is reward-worthy");
        assert_eq!(outcome.section, "economic");
        assert_eq!(outcome.term, "creditsGained");
        assert_eq!(outcome.scale, 50.0);

        // A gain credited to a different team, in a fresh tick, must not reward this entity.
        sim.ctx.events.drain();
        sim.ctx.events.push(Event::EconomyDelta { team: 2, before: 0, after: 50, reason: DeltaReason::RefineryUnload });
        assert!(observe_outcome(&mut sim.ctx, entity, team).is_none());
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let mut sim = Simulation::new(config());
        sim.ctx.ledger.credit(1, 1000, DeltaReason::RefineryUnload);
        sim.issue(Order::Build { team: 1, blueprint: Blueprint::new("scout", 200, 50.0, 100.0) }).unwrap();
        sim.step(16.0);

        let snap = sim.snapshot();
        sim.ctx.ledger.credit(1, 5000, DeltaReason::RefineryUnload);
        sim.restore(&snap).unwrap();

        assert_eq!(sim.ledger().balance(1), 800);
    }

    #[test]
    fn restore_rejects_a_tampered_snapshot_hash() {
        let sim = Simulation::new(config());
        let mut snap = sim.snapshot();
        snap.hash = "not-the-real-hash".to_string();
        let mut sim2 = Simulation::new(config());
        assert!(matches!(sim2.restore(&snap), Err(RestoreError::HashMismatch)));
    }
}
