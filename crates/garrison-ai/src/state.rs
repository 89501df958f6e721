//! Tactical context and the fixed-length numeric state vector derived from
//! it. The vector's layout is constant for a given `AiLevel`/profile
//! configuration: 11 components, every one clamped to `[0, 1]` or `[-1, 1]`.

use garrison_ecs::components::AiState;
use garrison_ecs::entity::EntityId;

/// Number of components in the Q-learning state representation.
pub const STATE_LEN: usize = 11;

/// `[0, 1]` ordinal position for `AiState`.
fn state_ordinal_norm(state: AiState) -> f32 {
    match state {
        AiState::Idle => 0.0,
        AiState::Perceiving => 0.25,
        AiState::Deciding => 0.5,
        AiState::Acting => 0.75,
        AiState::Learning => 1.0,
    }
}

/// Nearest entity of interest within perception range, with distance and
/// bearing already resolved against the observer.
#[derive(Debug, Clone, Copy)]
pub struct Nearby {
    pub entity: EntityId,
    pub distance: f32,
    pub direction: (f32, f32),
}

/// The rebuilt-every-tick perception snapshot that feeds both action
/// selection and the behavior tree's action context.
#[derive(Debug, Clone)]
pub struct TacticalContext {
    pub own_health_ratio: f32,
    pub position: (f32, f32),
    pub perception_radius: f32,
    pub nearby_allies: u32,
    pub nearby_enemies: u32,
    pub nearest_threat: Option<Nearby>,
    pub nearest_resource_distance: Option<f32>,
    pub ammo_energy_ratio: Option<f32>,
    pub state: AiState,
}

fn bucket(count: u32, cap: u32) -> f32 {
    (count.min(cap) as f32) / (cap as f32)
}

fn normalize_distance(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        0.0
    } else {
        (distance / radius).clamp(0.0, 1.0)
    }
}

impl TacticalContext {
    /// Project this context into the fixed 11-component vector consumed by
    /// the Q-learning backend. Every slot is pre-clamped; a caller never
    /// needs to re-validate the result.
    pub fn to_state_vector(&self) -> [f32; STATE_LEN] {
        let (threat_distance, threat_dir) = match self.nearest_threat {
            Some(n) => (normalize_distance(n.distance, self.perception_radius), n.direction),
            None => (1.0, (0.0, 0.0)),
        };
        let resource_distance = self
            .nearest_resource_distance
            .map(|d| normalize_distance(d, self.perception_radius))
            .unwrap_or(1.0);

        [
            self.own_health_ratio.clamp(0.0, 1.0),
            (self.position.0 / self.perception_radius.max(1.0)).clamp(-1.0, 1.0),
            (self.position.1 / self.perception_radius.max(1.0)).clamp(-1.0, 1.0),
            bucket(self.nearby_allies, 8),
            bucket(self.nearby_enemies, 8),
            threat_distance,
            threat_dir.0.clamp(-1.0, 1.0),
            threat_dir.1.clamp(-1.0, 1.0),
            resource_distance,
            state_ordinal_norm(self.state),
            self.ammo_energy_ratio.unwrap_or(1.0).clamp(0.0, 1.0),
        ]
    }
}
