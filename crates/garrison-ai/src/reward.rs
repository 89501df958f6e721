//! Reward computation, driven entirely by a configuration table rather than
//! hardcoded magnitudes, so tuning never requires a rebuild.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::qlearning::clamp_reward;

#[derive(Debug, Error)]
pub enum RewardConfigError {
    #[error("reward table missing required section: {0}")]
    MissingSection(&'static str),
    #[error("global.timeDecayFactor must be non-negative, got {0}")]
    NegativeTimeDecay(f32),
}

/// Per-situation multipliers applied as a strict product, per §4.7's
/// "multiply by the applicable situational multipliers" rule.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SituationalMultipliers {
    pub health: HashMap<String, f32>,
    pub threat: HashMap<String, f32>,
    pub urgency: HashMap<String, f32>,
    pub teamwork: HashMap<String, f32>,
    pub learning: HashMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSection {
    pub movement_scale: f32,
    pub combat_scale: f32,
    pub economic_scale: f32,
    pub tactical_scale: f32,
    pub time_decay_factor: f32,
    pub max_reward_magnitude: f32,
    pub exploration_bonus: f32,
    pub repetition_penalty: f32,
    pub diversity_bonus: f32,
}

/// The full reward table: one named base-term map per section, plus the
/// global scales and the situational multiplier tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardTable {
    pub global: GlobalSection,
    pub movement: HashMap<String, f32>,
    pub combat: HashMap<String, f32>,
    pub tactical: HashMap<String, f32>,
    pub economic: HashMap<String, f32>,
    pub idle: HashMap<String, f32>,
    pub situational: SituationalMultipliers,
    pub special: HashMap<String, f32>,
    pub meta_learning: HashMap<String, f32>,
}

impl RewardTable {
    /// Asserts every required section is present (non-empty maps are fine,
    /// missing maps are not — they're constructed by `serde` as empty, so
    /// this only ever fails the `global.timeDecayFactor` invariant in
    /// practice; the section-presence check exists for tables built by
    /// hand rather than deserialized).
    pub fn validate(&self) -> Result<(), RewardConfigError> {
        if self.global.time_decay_factor < 0.0 {
            return Err(RewardConfigError::NegativeTimeDecay(self.global.time_decay_factor));
        }
        for (section, terms) in [
            ("movement", &self.movement),
            ("combat", &self.combat),
            ("tactical", &self.tactical),
            ("economic", &self.economic),
            ("idle", &self.idle),
            ("special", &self.special),
            ("metaLearning", &self.meta_learning),
        ] {
            for (name, magnitude) in terms {
                if magnitude.abs() > self.global.max_reward_magnitude {
                    warn!(section, term = name, magnitude, cap = self.global.max_reward_magnitude, "base reward term exceeds global cap");
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, section: &str, term: &str) -> f32 {
        let table = match section {
            "movement" => &self.movement,
            "combat" => &self.combat,
            "tactical" => &self.tactical,
            "economic" => &self.economic,
            "idle" => &self.idle,
            "special" => &self.special,
            _ => return 0.0,
        };
        *table.get(term).unwrap_or(&0.0)
    }
}

/// The per-tick outcome the reward engine scores.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub section: &'static str,
    pub term: &'static str,
    pub scale: f32,
    pub health_ratio_key: Option<String>,
    pub threat_key: Option<String>,
    pub urgency_key: Option<String>,
    pub teamwork_bonus: f32,
    pub learning_bonus: f32,
}

/// Computes a scalar reward: base term × scale, times the product of any
/// present situational multipliers, plus team/learning bonuses, clamped to
/// the table's global cap.
pub fn compute_reward(table: &RewardTable, outcome: &Outcome) -> f32 {
    let base = table.lookup(outcome.section, outcome.term) * outcome.scale;

    let mut multiplier = 1.0f32;
    if let Some(key) = &outcome.health_ratio_key {
        multiplier *= *table.situational.health.get(key).unwrap_or(&1.0);
    }
    if let Some(key) = &outcome.threat_key {
        multiplier *= *table.situational.threat.get(key).unwrap_or(&1.0);
    }
    if let Some(key) = &outcome.urgency_key {
        multiplier *= *table.situational.urgency.get(key).unwrap_or(&1.0);
    }

    let raw = base * multiplier + outcome.teamwork_bonus + outcome.learning_bonus;
    clamp_reward(raw, table.global.max_reward_magnitude)
}
