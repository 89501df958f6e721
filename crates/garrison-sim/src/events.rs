//! Outbound events accumulated during a tick and drained in insertion order
//! at tick end: a plain append-only queue rather than a replayable change
//! log (the core does not persist state; `Simulation::snapshot` covers
//! replay).

use garrison_ecs::entity::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    EntitySpawned { entity: EntityId },
    EntityDestroyed { entity: EntityId },
    PathReady { entity: EntityId, waypoints: Vec<(f32, f32)> },
    PathFailed { entity: EntityId },
    EconomyDelta { team: u8, before: u32, after: u32, reason: garrison_economy::DeltaReason },
    DecisionTrace { entity: EntityId, action: u8, reward: f32 },
}

#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Vec<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.pending.push(event);
    }

    /// Remove and return every event queued since the last drain, in the
    /// order they were pushed.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    /// Events queued so far this tick, without draining them. Lets a system
    /// later in the same tick (AI, scheduled after economy) react to what an
    /// earlier system already reported, without stealing the events the
    /// caller drains at tick end.
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_events_in_insertion_order_and_empties_the_queue() {
        let mut q = EventQueue::new();
        q.push(Event::EntitySpawned { entity: EntityId::new(1, 0) });
        q.push(Event::EntityDestroyed { entity: EntityId::new(1, 0) });

        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Event::EntitySpawned { .. }));
        assert!(matches!(drained[1], Event::EntityDestroyed { .. }));
        assert!(q.is_empty());
    }
}
