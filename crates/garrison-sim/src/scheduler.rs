//! Priority-ordered system scheduler.
//!
//! Systems run once per tick in a fixed order, then deferred store
//! mutations are committed. Systems are ordered by `(priority,
//! insertion_index)` rather than a named dependency list, since
//! lower-numbered priorities running first (movement before AI) is the
//! only ordering contract needed here. A system can panic mid-update (a
//! Q-learning backend raising on a malformed state vector, say), so `step`
//! wraps each call in `catch_unwind` rather than letting one bad system
//! take down the whole tick.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

/// A unit of per-tick work over some shared context `C`. `C` is typically a
/// bundle of store + spatial index + side systems owned by the embedder's
/// [`crate::simulation::Simulation`].
pub trait System<C> {
    fn name(&self) -> &str;
    fn update(&mut self, ctx: &mut C, dt_ms: f64);
}

struct Entry<C> {
    system: Box<dyn System<C>>,
    priority: i32,
    insertion: u64,
    removed: bool,
}

/// Dispatches registered systems in ascending `(priority, insertion order)`
/// each tick, then lets the caller commit deferred structural mutations.
pub struct Scheduler<C> {
    entries: Vec<Entry<C>>,
    next_insertion: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_insertion: 0 }
    }

    /// Register a system at the given priority. Lower priority numbers run
    /// earlier. Ties between systems break by registration order.
    pub fn register(&mut self, system: Box<dyn System<C>>, priority: i32) {
        let insertion = self.next_insertion;
        self.next_insertion += 1;
        self.entries.push(Entry { system, priority, insertion, removed: false });
        self.entries.sort_by_key(|e| (e.priority, e.insertion));
    }

    /// Remove every system with the given name. Idempotent: removing a name
    /// that isn't registered is a no-op. Takes effect starting the next
    /// `step`; a call to `step` already in progress still executed the old
    /// Entry list.
    pub fn remove(&mut self, name: &str) {
        for e in &mut self.entries {
            if e.system.name() == name {
                e.removed = true;
            }
        }
        self.entries.retain(|e| !e.removed);
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.system.name()).collect()
    }

    pub fn system_count(&self) -> usize {
        self.entries.len()
    }

    /// Run every registered system once, in priority order. A system that
    /// panics mid-`update` is caught, logged, and skipped for the rest of
    /// this tick; subsequent systems still run and the panicking system
    /// remains registered (the embedder decides whether to `remove` it).
    ///
    /// Returns the names of systems that faulted this tick, for diagnostic
    /// event emission by the caller.
    pub fn step(&mut self, ctx: &mut C, dt_ms: f64) -> Vec<String> {
        let mut faulted = Vec::new();
        for entry in &mut self.entries {
            let name = entry.system.name().to_string();
            let system = &mut entry.system;
            let result = catch_unwind(AssertUnwindSafe(|| system.update(ctx, dt_ms)));
            if result.is_err() {
                error!(system = %name, "system update panicked, tick proceeding without it");
                faulted.push(name);
            }
        }
        faulted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        order: Vec<&'static str>,
    }

    struct Recorder {
        name: &'static str,
    }

    impl System<Ctx> for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn update(&mut self, ctx: &mut Ctx, _dt_ms: f64) {
            ctx.order.push(self.name);
        }
    }

    struct Panicker;
    impl System<Ctx> for Panicker {
        fn name(&self) -> &str {
            "panicker"
        }
        fn update(&mut self, _ctx: &mut Ctx, _dt_ms: f64) {
            panic!("boom");
        }
    }

    #[test]
    fn systems_run_in_priority_then_insertion_order() {
        let mut sched: Scheduler<Ctx> = Scheduler::new();
        sched.register(Box::new(Recorder { name: "ai" }), 10);
        sched.register(Box::new(Recorder { name: "movement" }), 5);
        sched.register(Box::new(Recorder { name: "economy" }), 5);

        let mut ctx = Ctx { order: Vec::new() };
        sched.step(&mut ctx, 16.0);

        assert_eq!(ctx.order, vec!["movement", "economy", "ai"]);
    }

    #[test]
    fn remove_is_idempotent_and_takes_effect_next_step() {
        let mut sched: Scheduler<Ctx> = Scheduler::new();
        sched.register(Box::new(Recorder { name: "movement" }), 5);
        sched.remove("movement");
        sched.remove("movement");
        assert_eq!(sched.system_count(), 0);

        let mut ctx = Ctx { order: Vec::new() };
        sched.step(&mut ctx, 16.0);
        assert!(ctx.order.is_empty());
    }

    #[test]
    fn a_panicking_system_is_caught_and_the_tick_proceeds() {
        let panic_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let mut sched: Scheduler<Ctx> = Scheduler::new();
        sched.register(Box::new(Recorder { name: "before" }), 1);
        sched.register(Box::new(Panicker), 2);
        sched.register(Box::new(Recorder { name: "after" }), 3);

        let mut ctx = Ctx { order: Vec::new() };
        let faulted = sched.step(&mut ctx, 16.0);

        std::panic::set_hook(panic_hook);

        assert_eq!(ctx.order, vec!["before", "after"]);
        assert_eq!(faulted, vec!["panicker".to_string()]);
        assert_eq!(sched.system_count(), 3, "a faulting system is not auto-removed");
    }
}
