use crate::error::{check_unit_interval, Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const NUM_EPISODES: usize = 50_000;
pub const LEARNING_RATE: f64 = 0.2;
pub const DISCOUNT_RATE: f64 = 0.9;
pub const EXPLORATION_RATE: f64 = 0.3;
pub const LOG_EVERY: usize = 1_000;

/// Terminal rewards fed back through each side's visited states.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rewards {
    pub win: f64,
    pub loss: f64,
    /// Draw reward for the side that moved first.
    pub draw_first: f64,
    pub draw_second: f64,
}

impl Default for Rewards {
    fn default() -> Self {
        Rewards {
            win: 1.0,
            loss: 0.0,
            draw_first: 0.5,
            draw_second: 0.5,
        }
    }
}

/// Every `every` episodes both exploration rates are multiplied by `factor`,
/// but never drop below `floor`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplorationDecay {
    pub every: usize,
    pub factor: f64,
    pub floor: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    pub learning_rate: f64,
    pub discount: f64,
    pub p1_exploration_rate: f64,
    pub p2_exploration_rate: f64,
    pub rewards: Rewards,
    pub exploration_decay: Option<ExplorationDecay>,
    /// Progress is logged every `log_every` episodes; 0 turns it off.
    pub log_every: usize,
    pub seed: Option<u64>,
    pub resume_p1: Option<PathBuf>,
    pub resume_p2: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            episodes: NUM_EPISODES,
            learning_rate: LEARNING_RATE,
            discount: DISCOUNT_RATE,
            p1_exploration_rate: EXPLORATION_RATE,
            p2_exploration_rate: EXPLORATION_RATE,
            rewards: Rewards::default(),
            exploration_decay: None,
            log_every: LOG_EVERY,
            seed: None,
            resume_p1: None,
            resume_p2: None,
        }
    }
}

impl TrainingConfig {
    /// Reads a JSON config; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: TrainingConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::configuration(format!(
                "learning rate must be within (0, 1], got {}",
                self.learning_rate
            )));
        }
        check_unit_interval("discount", self.discount)?;
        check_unit_interval("player 1 exploration rate", self.p1_exploration_rate)?;
        check_unit_interval("player 2 exploration rate", self.p2_exploration_rate)?;
        let rewards = self.rewards;
        if ![rewards.win, rewards.loss, rewards.draw_first, rewards.draw_second]
            .iter()
            .all(|r| r.is_finite())
        {
            return Err(Error::configuration("rewards must be finite"));
        }
        if let Some(decay) = self.exploration_decay {
            if decay.every == 0 {
                return Err(Error::configuration("exploration decay interval must be positive"));
            }
            check_unit_interval("exploration decay factor", decay.factor)?;
            check_unit_interval("exploration floor", decay.floor)?;
        }
        Ok(())
    }
}
