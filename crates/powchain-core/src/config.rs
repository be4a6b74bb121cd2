//! Chain and miner configuration.

use crate::constants::{DEFAULT_DIFFICULTY, GENESIS_PAYLOAD, PROGRESS_INTERVAL};
use serde::{Deserialize, Serialize};

/// How the nonce space is scanned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Single thread, nonce 1, 2, 3, ...
    #[default]
    Sequential,
    /// Rayon workers over the nonce range; still returns the smallest nonce.
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerConfig {
    #[serde(default)]
    pub strategy: SearchStrategy,
    /// Attempts between progress events. 0 disables them.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::default(),
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

/// Fixed at chain construction; `Chain::append` falls back to
/// `default_difficulty` when no difficulty is passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_difficulty")]
    pub default_difficulty: u32,
    #[serde(default = "default_genesis_payload")]
    pub genesis_payload: String,
    #[serde(default)]
    pub miner: MinerConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            default_difficulty: DEFAULT_DIFFICULTY,
            genesis_payload: GENESIS_PAYLOAD.to_string(),
            miner: MinerConfig::default(),
        }
    }
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_genesis_payload() -> String {
    GENESIS_PAYLOAD.to_string()
}

fn default_progress_interval() -> u64 {
    PROGRESS_INTERVAL
}
