pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod pow;

pub use chain::{Chain, MiningSummary};
pub use config::{ChainConfig, MinerConfig, SearchStrategy};
pub use error::{ChainError, Result};

use constants::{HASH_SIZE, SENTINEL_HASH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type Hash = [u8; HASH_SIZE];

/// Diagnostics recorded by the proof-of-work search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningStats {
    pub attempts: u64,
    pub elapsed: Duration,
}

impl MiningStats {
    /// Hashes per second; 0 when the search finished below timer resolution.
    pub fn hash_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}

/// A sealed chain entry.
///
/// `hash` is always produced from the other fields, either once (difficulty 0)
/// or by the nonce search. The only way to make it disagree with the contents
/// is [`Block::tamper`].
///
/// Blocks serialize for display but never deserialize: the constructors are
/// the only way to obtain one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Block {
    index: u64,
    timestamp: u64,
    payload: String,
    previous_hash: Hash,
    nonce: u64,
    difficulty: u32,
    hash: Hash,
    mining: Option<MiningStats>,
}

/// Seconds since the unix epoch; a clock before 1970 reads as 0.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl Block {
    /// Build and seal a block stamped with the current time, mining it
    /// sequentially when `difficulty > 0`.
    pub fn new(
        index: u64,
        payload: impl Into<String>,
        previous_hash: Hash,
        difficulty: u32,
    ) -> Result<Self> {
        Self::with_miner(index, payload, previous_hash, difficulty, &MinerConfig::default())
    }

    pub fn with_miner(
        index: u64,
        payload: impl Into<String>,
        previous_hash: Hash,
        difficulty: u32,
        miner: &MinerConfig,
    ) -> Result<Self> {
        Self::seal(index, unix_now(), payload.into(), previous_hash, difficulty, miner)
    }

    /// Same as [`Block::new`] with a caller-chosen timestamp, so the
    /// resulting hash and nonce are reproducible.
    pub fn with_timestamp(
        index: u64,
        timestamp: u64,
        payload: impl Into<String>,
        previous_hash: Hash,
        difficulty: u32,
    ) -> Result<Self> {
        Self::seal(
            index,
            timestamp,
            payload.into(),
            previous_hash,
            difficulty,
            &MinerConfig::default(),
        )
    }

    fn seal(
        index: u64,
        timestamp: u64,
        payload: String,
        previous_hash: Hash,
        difficulty: u32,
        miner: &MinerConfig,
    ) -> Result<Self> {
        pow::check_difficulty(difficulty)?;
        let mut block = Self {
            index,
            timestamp,
            payload,
            previous_hash,
            nonce: 0,
            difficulty,
            hash: SENTINEL_HASH,
            mining: None,
        };
        if difficulty == 0 {
            block.hash = block.recompute_hash();
        } else {
            let found = pow::search(&block, difficulty, miner)?;
            block.nonce = found.nonce;
            block.hash = found.hash;
            block.mining = Some(found.stats);
        }
        Ok(block)
    }

    /// Canonical encoding fed to SHA-256:
    /// `index | timestamp | payload_len | payload | previous_hash | nonce`,
    /// integers as little-endian u64.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let payload = self.payload.as_bytes();
        let mut bytes = Vec::with_capacity(8 + 8 + 8 + payload.len() + HASH_SIZE + 8);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&self.previous_hash);
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Hasher primed with every field except the trailing nonce.
    pub(crate) fn prefix_hasher(&self) -> Sha256 {
        let payload = self.payload.as_bytes();
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update((payload.len() as u64).to_le_bytes());
        hasher.update(payload);
        hasher.update(self.previous_hash);
        hasher
    }

    /// Hash of the current fields. Does not touch the stored hash.
    pub fn recompute_hash(&self) -> Hash {
        finish_hash(self.prefix_hasher(), self.nonce)
    }

    /// Store the recomputed hash and return it.
    pub fn reseal(&mut self) -> Hash {
        self.hash = self.recompute_hash();
        self.hash
    }

    /// Overwrite the payload without rehashing. Test and demo hook.
    pub fn tamper(&mut self, payload: impl Into<String>) {
        self.payload = payload.into();
    }

    pub(crate) fn relink(&mut self, previous_hash: Hash) {
        self.previous_hash = previous_hash;
    }

    pub fn has_stale_hash(&self) -> bool {
        self.hash != self.recompute_hash()
    }

    /// Whether the stored hash still satisfies this block's difficulty.
    pub fn meets_difficulty(&self) -> bool {
        pow::meets_difficulty(&self.hash, self.difficulty)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn mining(&self) -> Option<&MiningStats> {
        self.mining.as_ref()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn previous_hash_hex(&self) -> String {
        hex::encode(self.previous_hash)
    }
}

pub(crate) fn finish_hash(mut hasher: Sha256, nonce: u64) -> Hash {
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}
