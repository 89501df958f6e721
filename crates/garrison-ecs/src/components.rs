//! Component shapes for the simulation's closed catalog.
//!
//! The set of component types is fixed and enumerated by [`ComponentKind`]
//! rather than open to arbitrary caller-registered types. Each variant
//! corresponds to one dense column in [`crate::store::Store`].

use std::collections::VecDeque;

use crate::entity::EntityId;
use serde::{Deserialize, Serialize};

/// One entry per component type the store knows how to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform,
    Movement,
    Health,
    Team,
    Ai,
    Harvester,
    ResourceDeposit,
    Refinery,
    Selectable,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 9] = [
        ComponentKind::Transform,
        ComponentKind::Movement,
        ComponentKind::Health,
        ComponentKind::Team,
        ComponentKind::Ai,
        ComponentKind::Harvester,
        ComponentKind::ResourceDeposit,
        ComponentKind::Refinery,
        ComponentKind::Selectable,
    ];
}

/// World-space pose. `scale` must stay positive; `x`/`y`/`rotation` must
/// stay finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale: f32,
}

impl Transform {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            rotation: 0.0,
            scale: 1.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.rotation.is_finite() && self.scale > 0.0
    }
}

/// Movement state: velocity, the path the pathfinding service handed back,
/// and a cursor into it. `0 <= path_cursor <= path.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Movement {
    pub velocity: (f32, f32),
    pub max_speed: f32,
    pub target: Option<(f32, f32)>,
    pub path: Vec<(f32, f32)>,
    pub path_cursor: usize,
    /// Set when the pathfinding service returned a partial result because
    /// its node-expansion budget ran out; the Movement system re-requests
    /// from the tail once this waypoint is reached.
    pub path_incomplete: bool,
}

impl Movement {
    pub fn is_valid(&self) -> bool {
        self.path_cursor <= self.path.len()
    }

    pub fn remaining_waypoints(&self) -> &[(f32, f32)] {
        &self.path[self.path_cursor.min(self.path.len())..]
    }
}

/// `0 <= current <= max`; `alive` iff `current > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub alive: bool,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            alive: max > 0.0,
        }
    }

    pub fn ratio(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    /// Apply damage/healing, clamping `current` into `[0, max]` and
    /// resyncing `alive`. Returns the clamped delta actually applied.
    pub fn apply_delta(&mut self, delta: f32) -> f32 {
        let before = self.current;
        self.current = (self.current + delta).clamp(0.0, self.max);
        self.alive = self.current > 0.0;
        self.current - before
    }
}

/// Small stable team identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team(pub u8);

/// Behavior-tree template selector, resolved against the AI behavior
/// configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorProfile {
    Scout,
    CombatUnit,
    Harvester,
    Defender,
    Idle,
}

/// Scales perception radius and decision quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiLevel {
    Easy,
    Normal,
    Hard,
}

impl AiLevel {
    /// Perception-radius multiplier applied on top of the base
    /// `perception_radius` configured on the [`Ai`] component.
    pub fn perception_multiplier(self) -> f32 {
        match self {
            AiLevel::Easy => 0.75,
            AiLevel::Normal => 1.0,
            AiLevel::Hard => 1.35,
        }
    }

    /// Decision-quality factor: lower exploration, sharper play at Hard.
    pub fn exploration_scale(self) -> f32 {
        match self {
            AiLevel::Easy => 1.5,
            AiLevel::Normal => 1.0,
            AiLevel::Hard => 0.5,
        }
    }
}

/// `Idle -> Perceiving -> Deciding -> Acting -> Learning -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AiState {
    #[default]
    Idle,
    Perceiving,
    Deciding,
    Acting,
    Learning,
}

impl AiState {
    pub fn next(self) -> AiState {
        match self {
            AiState::Idle => AiState::Perceiving,
            AiState::Perceiving => AiState::Deciding,
            AiState::Deciding => AiState::Acting,
            AiState::Acting => AiState::Learning,
            AiState::Learning => AiState::Idle,
        }
    }
}

/// Per-entity AI configuration and cursor state. The tactical context,
/// memory, and Q-learning handle it references are held by side tables in
/// `garrison-ai`, keyed by [`EntityId`] — they are rebuilt each perception
/// cycle and therefore do not belong in the store's long-lived component
/// data; this component never retains back-pointers to nearby entities
/// across ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ai {
    pub enabled: bool,
    pub profile: BehaviorProfile,
    pub state: AiState,
    pub last_decision_time_ms: f64,
    pub decision_interval_ms: f64,
    pub adaptive_decision_timing: bool,
    pub learning_enabled: bool,
    pub exploration_rate: f32,
    pub perception_radius: f32,
    pub ai_level: AiLevel,
    pub debug: bool,
}

impl Ai {
    pub fn new(profile: BehaviorProfile, decision_interval_ms: f64) -> Self {
        Self {
            enabled: true,
            profile,
            state: AiState::Idle,
            last_decision_time_ms: 0.0,
            decision_interval_ms,
            adaptive_decision_timing: false,
            learning_enabled: true,
            exploration_rate: 0.1,
            perception_radius: 200.0,
            ai_level: AiLevel::Normal,
            debug: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.decision_interval_ms > 0.0
    }

    /// Effective decision interval after adaptive scaling, bounded to
    /// `[0.25, 4.0]` of the base interval.
    pub fn effective_interval_ms(&self, combat_pressure: f32) -> f64 {
        if !self.adaptive_decision_timing {
            return self.decision_interval_ms;
        }
        let factor = (1.0 - combat_pressure.clamp(0.0, 1.0) * 0.75).clamp(0.25, 4.0);
        self.decision_interval_ms * factor as f64
    }
}

/// `to-deposit | harvesting | to-refinery | unloading` plus an idle
/// fallback for when no refinery/deposit is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HarvesterMode {
    #[default]
    ToDeposit,
    Harvesting,
    ToRefinery,
    Unloading,
    Idle,
}

/// `carrying <= capacity`. Capacity defaults to the C&C-authentic 700
/// credits (28 bails at 25 credits/bail).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harvester {
    pub capacity: u32,
    pub carrying: u32,
    pub home_refinery: Option<EntityId>,
    pub target_deposit: Option<EntityId>,
    pub mode: HarvesterMode,
}

impl Harvester {
    pub const DEFAULT_CAPACITY: u32 = 700;

    pub fn new(home_refinery: EntityId) -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            carrying: 0,
            home_refinery: Some(home_refinery),
            target_deposit: None,
            mode: HarvesterMode::ToDeposit,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.carrying <= self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.carrying >= self.capacity
    }
}

/// `remaining >= 0`; 1 bail = 25 credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeposit {
    pub remaining_bails: u32,
}

impl ResourceDeposit {
    pub const CREDITS_PER_BAIL: u32 = 25;

    pub fn is_empty(&self) -> bool {
        self.remaining_bails == 0
    }

    pub fn credits_remaining(&self) -> u32 {
        self.remaining_bails * Self::CREDITS_PER_BAIL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Refinery {
    pub owning_team: u8,
    pub pending_unload: VecDeque<EntityId>,
}

impl Refinery {
    pub fn new(owning_team: u8) -> Self {
        Self {
            owning_team,
            pending_unload: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Selectable {
    pub group: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_validity() {
        assert!(Transform::at(1.0, 2.0).is_valid());
        assert!(!Transform {
            x: f32::NAN,
            y: 0.0,
            rotation: 0.0,
            scale: 1.0
        }
        .is_valid());
        assert!(!Transform {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale: 0.0
        }
        .is_valid());
    }

    #[test]
    fn health_clamps_and_tracks_alive() {
        let mut h = Health::new(100.0);
        assert!(h.alive);
        h.apply_delta(-150.0);
        assert_eq!(h.current, 0.0);
        assert!(!h.alive);
        h.apply_delta(40.0);
        assert_eq!(h.current, 40.0);
        assert!(h.alive);
    }

    #[test]
    fn health_ratio_bounds() {
        let h = Health::new(50.0);
        assert_eq!(h.ratio(), 1.0);
        let mut h2 = h;
        h2.apply_delta(-25.0);
        assert_eq!(h2.ratio(), 0.5);
    }

    #[test]
    fn harvester_full_at_capacity() {
        let fake_refinery = EntityId::new(0, 0);
        let mut h = Harvester::new(fake_refinery);
        assert!(h.is_valid());
        h.carrying = Harvester::DEFAULT_CAPACITY;
        assert!(h.is_full());
    }

    #[test]
    fn deposit_credits_conversion() {
        let d = ResourceDeposit { remaining_bails: 10 };
        assert_eq!(d.credits_remaining(), 250);
    }

    #[test]
    fn ai_effective_interval_bounds() {
        let mut ai = Ai::new(BehaviorProfile::CombatUnit, 1000.0);
        ai.adaptive_decision_timing = true;
        let busy = ai.effective_interval_ms(1.0);
        let calm = ai.effective_interval_ms(0.0);
        assert!(busy < calm);
        assert!(busy >= ai.decision_interval_ms * 0.25);
        assert!(calm <= ai.decision_interval_ms * 4.0);
    }

    #[test]
    fn ai_state_cycles() {
        let s = AiState::Idle;
        assert_eq!(s.next(), AiState::Perceiving);
        assert_eq!(s.next().next().next().next().next(), AiState::Perceiving);
    }
}
