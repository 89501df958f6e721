//! Minimal wiring demo: load a config, build a couple of units, issue a
//! group move, and step the simulation while printing the events it emits.
//!
//! Run with `cargo run -p garrison-sim --example skirmish`.

use garrison_sim::prelude::*;

const CONFIG_RON: &str = r#"(
    grid: (width_cells: 64, height_cells: 64, cell_size: 32.0),
    economy: (extraction_rate_credits_per_sec: 200.0, deposit_search_radius: 600.0),
    hyperparams: (
        learning_rate: 0.01,
        discount: 0.95,
        exploration_rate: 0.1,
        exploration_decay: 0.999,
        exploration_min: 0.01,
        target_sync_interval: 200,
        minibatch_size: 32,
        replay_capacity: 10000,
        max_reward_magnitude: 100.0,
    ),
    reward_table: (
        global: (
            movement_scale: 1.0, combat_scale: 1.0, economic_scale: 1.0, tactical_scale: 1.0,
            time_decay_factor: 0.01, max_reward_magnitude: 100.0, exploration_bonus: 0.0,
            repetition_penalty: 0.0, diversity_bonus: 0.0,
        ),
        movement: {}, combat: {}, tactical: {}, economic: {}, idle: {},
        situational: (health: {}, threat: {}, urgency: {}, teamwork: {}, learning: {}),
        special: {}, meta_learning: {},
    ),
    seed: 42,
)"#;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let config = SimConfig::from_ron_str(CONFIG_RON)?;
    let mut sim = Simulation::new(config);

    // A scenario has no in-game source of starting funds; seed the team
    // directly for this demo the way a match-setup step would.
    sim.ledger_mut().credit(1, 1_000, garrison_economy::DeltaReason::RefineryUnload);

    sim.issue(Order::Build { team: 1, blueprint: Blueprint::new("scout", 400, 50.0, 250.0) })?;
    sim.issue(Order::Build { team: 1, blueprint: Blueprint::new("scout", 400, 50.0, 250.0) })?;
    let squad = sim.store().query(&[garrison_ecs::components::ComponentKind::Team]);

    sim.issue(Order::Move { entities: squad, destination: (800.0, 0.0) })?;

    for tick in 0..60 {
        let events = sim.step(16.0);
        for event in events {
            println!("tick {tick}: {event:?}");
        }
    }

    println!("team 1 balance: {}", sim.ledger().balance(1));
    Ok(())
}
