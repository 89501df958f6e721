//! Loads and validates the configuration a [`crate::simulation::Simulation`]
//! needs to start: the navigation grid's dimensions, the economy's rates,
//! the Q-learning hyperparameters, and the reward table. `ron`/`serde_json`
//! deserialize into an intermediate struct with every section optional, so
//! a missing section fails fast naming itself rather than `serde` rejecting
//! the whole document with a generic parse error.

use garrison_ai::qlearning::Hyperparams;
use garrison_ai::reward::{RewardConfigError, RewardTable};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config missing required section: {0}")]
    MissingSection(&'static str),
    #[error("config.grid.{field} must be greater than zero, got {value}")]
    InvalidGridDimension { field: &'static str, value: f32 },
    #[error("config.economy.{field} must be greater than zero, got {value}")]
    InvalidEconomyRate { field: &'static str, value: f32 },
    #[error("config.hyperparams.{field} is out of range: {detail}")]
    InvalidHyperparam { field: &'static str, detail: String },
    #[error(transparent)]
    InvalidRewardTable(#[from] RewardConfigError),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub width_cells: usize,
    pub height_cells: usize,
    pub cell_size: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub extraction_rate_credits_per_sec: f32,
    pub deposit_search_radius: f32,
}

/// Everything `Simulation::new` needs, fully validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub grid: GridConfig,
    pub economy: EconomyConfig,
    pub hyperparams: Hyperparams,
    pub reward_table: RewardTable,
    pub seed: u64,
}

/// Mirrors [`SimConfig`] with every section optional, so deserialization
/// never fails before the presence check below runs.
#[derive(Debug, Deserialize)]
struct RawSimConfig {
    grid: Option<GridConfig>,
    economy: Option<EconomyConfig>,
    hyperparams: Option<Hyperparams>,
    reward_table: Option<RewardTable>,
    seed: Option<u64>,
}

impl SimConfig {
    /// Parses a RON document and validates it. Reports the first missing
    /// required section or out-of-range value, in a fixed field order, so
    /// the same malformed document always names the same field.
    pub fn from_ron_str(src: &str) -> Result<SimConfig, ConfigError> {
        let raw: RawSimConfig = ron::from_str(src).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(src: &str) -> Result<SimConfig, ConfigError> {
        let raw: RawSimConfig = serde_json::from_str(src).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSimConfig) -> Result<SimConfig, ConfigError> {
        let grid = raw.grid.ok_or(ConfigError::MissingSection("grid"))?;
        let economy = raw.economy.ok_or(ConfigError::MissingSection("economy"))?;
        let hyperparams = raw.hyperparams.ok_or(ConfigError::MissingSection("hyperparams"))?;
        let reward_table = raw.reward_table.ok_or(ConfigError::MissingSection("rewardTable"))?;
        let seed = raw.seed.ok_or(ConfigError::MissingSection("seed"))?;

        let config = SimConfig { grid, economy, hyperparams, reward_table, seed };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.width_cells == 0 {
            return Err(ConfigError::InvalidGridDimension { field: "widthCells", value: 0.0 });
        }
        if self.grid.height_cells == 0 {
            return Err(ConfigError::InvalidGridDimension { field: "heightCells", value: 0.0 });
        }
        if !(self.grid.cell_size > 0.0 && self.grid.cell_size.is_finite()) {
            return Err(ConfigError::InvalidGridDimension { field: "cellSize", value: self.grid.cell_size });
        }
        if !(self.economy.extraction_rate_credits_per_sec > 0.0 && self.economy.extraction_rate_credits_per_sec.is_finite()) {
            return Err(ConfigError::InvalidEconomyRate {
                field: "extractionRateCreditsPerSec",
                value: self.economy.extraction_rate_credits_per_sec,
            });
        }
        if !(self.economy.deposit_search_radius > 0.0 && self.economy.deposit_search_radius.is_finite()) {
            return Err(ConfigError::InvalidEconomyRate { field: "depositSearchRadius", value: self.economy.deposit_search_radius });
        }
        if !(0.0..=1.0).contains(&self.hyperparams.exploration_rate) {
            return Err(ConfigError::InvalidHyperparam {
                field: "explorationRate",
                detail: format!("must be within [0, 1], got {}", self.hyperparams.exploration_rate),
            });
        }
        if self.hyperparams.minibatch_size == 0 {
            return Err(ConfigError::InvalidHyperparam { field: "minibatchSize", detail: "must be greater than zero".to_string() });
        }
        self.reward_table.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_ron() -> &'static str {
        r#"(
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
        )"#
    }

    #[test]
    fn a_fully_populated_document_parses_and_validates() {
        let config = SimConfig::from_ron_str(valid_ron()).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.grid.width_cells, 64);
    }

    #[test]
    fn a_missing_section_is_named_in_the_error() {
        let src = r#"(
            economy: (extraction_rate_credits_per_sec: 200.0, deposit_search_radius: 600.0),
            seed: 1,
        )"#;
        let err = SimConfig::from_ron_str(src).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection("grid")));
    }

    #[test]
    fn a_zero_cell_size_is_rejected() {
        let src = valid_ron().replace("cell_size: 32.0", "cell_size: 0.0");
        let err = SimConfig::from_ron_str(&src).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGridDimension { field: "cellSize", .. }));
    }

    #[test]
    fn an_out_of_range_exploration_rate_is_rejected() {
        let src = valid_ron().replace("exploration_rate: 0.1,", "exploration_rate: 1.5,");
        let err = SimConfig::from_ron_str(&src).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHyperparam { field: "explorationRate", .. }));
    }
}
