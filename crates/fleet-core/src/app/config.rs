//! Engine configuration

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::environment::DataPaths;
use crate::policy::{DEFAULT_COOLDOWN_CYCLES, DEFAULT_FATIGUE_WINDOW};

/// Prefix of every environment variable read by `EngineConfig::from_env`.
pub const ENV_PREFIX: &str = "FLEET_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a valid value")]
    Invalid { key: String, value: String },
}

/// Where inputs and outputs live and how the engine is tuned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the four input files
    pub data_dir: PathBuf,
    /// Directory receiving history and tallies
    pub output_dir: PathBuf,
    pub history_file: String,
    pub tally_file: String,
    /// Consecutive cycles per run (sharing one cooldown table)
    pub cycles: u32,
    /// RNG seed; entropy when absent
    pub seed: Option<u64>,
    /// History records inspected for fatigue
    pub fatigue_window: usize,
    /// Evaluation steps a sold server is held
    pub cooldown_cycles: u32,
    /// Report left by the external failure analysis, if any
    pub analysis_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            history_file: "historical_results.json".to_string(),
            tally_file: "server_actions.json".to_string(),
            cycles: 1,
            seed: None,
            fatigue_window: DEFAULT_FATIGUE_WINDOW,
            cooldown_cycles: DEFAULT_COOLDOWN_CYCLES,
            analysis_file: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `FLEET_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(dir) = var("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(dir);
        }
        if let Some(name) = var("HISTORY_FILE") {
            cfg.history_file = name;
        }
        if let Some(name) = var("TALLY_FILE") {
            cfg.tally_file = name;
        }
        if let Some(path) = var("ANALYSIS_FILE") {
            cfg.analysis_file = Some(PathBuf::from(path));
        }

        if let Some(v) = var("CYCLES") {
            cfg.cycles = parse("CYCLES", v)?;
        }
        if let Some(v) = var("SEED") {
            cfg.seed = Some(parse("SEED", v)?);
        }
        if let Some(v) = var("FATIGUE_WINDOW") {
            cfg.fatigue_window = parse("FATIGUE_WINDOW", v)?;
        }
        if let Some(v) = var("COOLDOWN_CYCLES") {
            cfg.cooldown_cycles = parse("COOLDOWN_CYCLES", v)?;
        }

        Ok(cfg)
    }

    pub fn data_paths(&self) -> DataPaths {
        DataPaths::in_dir(&self.data_dir)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(&self.history_file)
    }

    pub fn tally_path(&self) -> PathBuf {
        self.output_dir.join(&self.tally_file)
    }

    pub fn analysis_path(&self) -> Option<&Path> {
        self.analysis_file.as_deref()
    }
}

fn parse<T: FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: format!("{ENV_PREFIX}{name}"),
        value,
    })
}
