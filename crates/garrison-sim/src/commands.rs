//! Inbound orders: the write half of the command/query surface. A `Blueprint`
//! is the minimal shape `build_order` needs — a name, a credit cost, and the
//! starting stats of the spawned unit — since nothing upstream of this crate
//! names a richer build-catalog schema.
//!
//! `attack_order` does not resolve damage. No §4 component models weapons or
//! hit resolution; the only named combat behavior is the AI's own
//! `AttackNearest`/`AttackWeakest`/`AttackStrongest` action translation in
//! `garrison-ai::tactical`, which turns a decision into movement intent
//! toward a target. `attack_order` sets the same kind of intent — an
//! override consulted the next time that entity's AI runs, bypassing normal
//! target selection — and leaves health mutation to whatever combat layer
//! the embedder wires on top, the same way the core doesn't render or read
//! input.

use garrison_ecs::entity::EntityId;

/// A minimal unit template for `build_order`. Real content (model, faction,
/// abilities) lives above this crate; this is only what the economy and
/// spawn path need.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub name: String,
    pub cost: u32,
    pub max_health: f32,
    pub max_speed: f32,
}

impl Blueprint {
    pub fn new(name: impl Into<String>, cost: u32, max_health: f32, max_speed: f32) -> Self {
        Self { name: name.into(), cost, max_health, max_speed }
    }

    fn validate(&self) -> Result<(), OrderError> {
        if self.cost == 0 {
            return Err(OrderError::InvalidBlueprint("cost must be greater than zero"));
        }
        if !(self.max_health > 0.0 && self.max_health.is_finite()) {
            return Err(OrderError::InvalidBlueprint("maxHealth must be a positive finite number"));
        }
        if !(self.max_speed > 0.0 && self.max_speed.is_finite()) {
            return Err(OrderError::InvalidBlueprint("maxSpeed must be a positive finite number"));
        }
        Ok(())
    }
}

/// One inbound player/director order. `Simulation::issue` validates and
/// applies these; a rejected order never partially mutates the world.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Move { entities: Vec<EntityId>, destination: (f32, f32) },
    Attack { entity: EntityId, target: EntityId },
    Stop { entity: EntityId },
    Build { team: u8, blueprint: Blueprint },
}

/// Rejected orders surface as `InvalidRequest` per the error taxonomy:
/// reject with a diagnostic, never silently coerce the request into
/// something else.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("move order named no entities")]
    EmptyEntityList,
    #[error("move destination ({0}, {1}) is not finite")]
    NonFiniteDestination(f32, f32),
    #[error("entity {0:?} is unknown or no longer alive")]
    UnknownEntity(EntityId),
    #[error("blueprint is invalid: {0}")]
    InvalidBlueprint(&'static str),
    #[error(transparent)]
    InsufficientCredits(#[from] garrison_economy::InsufficientCredits),
    #[error(transparent)]
    CapacityExceeded(#[from] garrison_ecs::entity::CapacityExceeded),
}

impl Order {
    /// Structural validation that doesn't need world state: empty entity
    /// lists, non-finite coordinates, malformed blueprints. Existence checks
    /// against a live `Store` happen in `Simulation::issue`.
    pub(crate) fn validate_shape(&self) -> Result<(), OrderError> {
        match self {
            Order::Move { entities, destination } => {
                if entities.is_empty() {
                    return Err(OrderError::EmptyEntityList);
                }
                if !destination.0.is_finite() || !destination.1.is_finite() {
                    return Err(OrderError::NonFiniteDestination(destination.0, destination.1));
                }
                Ok(())
            }
            Order::Attack { .. } | Order::Stop { .. } => Ok(()),
            Order::Build { blueprint, .. } => blueprint.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_order_rejects_an_empty_entity_list() {
        let order = Order::Move { entities: vec![], destination: (1.0, 2.0) };
        assert!(matches!(order.validate_shape(), Err(OrderError::EmptyEntityList)));
    }

    #[test]
    fn move_order_rejects_a_non_finite_destination() {
        let order = Order::Move { entities: vec![EntityId::new(0, 0)], destination: (f32::NAN, 0.0) };
        assert!(matches!(order.validate_shape(), Err(OrderError::NonFiniteDestination(_, _))));
    }

    #[test]
    fn build_order_rejects_a_zero_cost_blueprint() {
        let order = Order::Build { team: 1, blueprint: Blueprint::new("scout", 0, 50.0, 100.0) };
        assert!(matches!(order.validate_shape(), Err(OrderError::InvalidBlueprint(_))));
    }

    #[test]
    fn attack_and_stop_orders_have_no_structural_preconditions() {
        let attack = Order::Attack { entity: EntityId::new(0, 0), target: EntityId::new(1, 0) };
        assert!(attack.validate_shape().is_ok());
        let stop = Order::Stop { entity: EntityId::new(0, 0) };
        assert!(stop.validate_shape().is_ok());
    }
}
