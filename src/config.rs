//! Process settings: `.env`, environment overrides and JSON presets.

use std::path::Path;

use crate::domain::GenerationConfig;
use crate::error::{ConfigError, StoreError};
use crate::io::read_json;

pub const ENV_WORKERS: &str = "METSIM_WORKERS";
pub const ENV_SEED: &str = "METSIM_SEED";
pub const ENV_LOG: &str = "METSIM_LOG";

/// Settings taken from the environment; CLI flags win over these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub workers: Option<usize>,
    pub seed: Option<u64>,
    pub log: Option<String>,
}

impl Settings {
    /// Load `.env` (if any) and read the `METSIM_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let workers = match lookup(ENV_WORKERS) {
            Some(raw) => {
                let n: usize = raw.trim().parse().map_err(|_| ConfigError::InvalidSetting {
                    field: ENV_WORKERS,
                    reason: format!("'{raw}' is not a worker count"),
                })?;
                if n == 0 {
                    return Err(ConfigError::InvalidSetting {
                        field: ENV_WORKERS,
                        reason: "must be at least 1".to_string(),
                    });
                }
                Some(n)
            }
            None => None,
        };
        let seed = lookup(ENV_SEED)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidSetting {
                    field: ENV_SEED,
                    reason: format!("'{raw}' is not an unsigned integer"),
                })
            })
            .transpose()?;
        let log = lookup(ENV_LOG).filter(|s| !s.trim().is_empty());

        Ok(Self { workers, seed, log })
    }
}

/// Read a (possibly partial) generation preset; missing fields take defaults.
pub fn load_generation_preset(path: &Path) -> Result<GenerationConfig, StoreError> {
    read_json(path)
}
