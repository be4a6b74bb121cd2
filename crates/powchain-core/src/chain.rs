use crate::{
    constants::SENTINEL_HASH,
    error::{ChainError, Result},
    pow, Block, ChainConfig, Hash,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Append-only, single-writer block sequence.
///
/// Blocks are only reachable through shared references. The mutation hooks
/// are `tamper`, which breaks integrity on purpose, and `reseal`/`repair`,
/// which restore it.
#[derive(Clone, Debug, Serialize)]
pub struct Chain {
    config: ChainConfig,
    blocks: Vec<Block>,
}

/// Totals over the blocks that went through a nonce search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MiningSummary {
    pub mined_blocks: usize,
    pub total_attempts: u64,
    pub total_elapsed: Duration,
}

impl MiningSummary {
    pub fn hash_rate(&self) -> f64 {
        let secs = self.total_elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_attempts as f64 / secs
        } else {
            0.0
        }
    }
}

impl Chain {
    /// Empty chain whose appends default to `default_difficulty`.
    pub fn new(default_difficulty: u32) -> Self {
        Self::with_config(ChainConfig {
            default_difficulty,
            ..ChainConfig::default()
        })
    }

    pub fn with_config(config: ChainConfig) -> Self {
        Self {
            config,
            blocks: Vec::new(),
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn default_difficulty(&self) -> u32 {
        self.config.default_difficulty
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn latest(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Seal block 0 with the configured genesis payload and the all-zero
    /// previous hash. Fails if the chain already has blocks.
    pub fn create_genesis(&mut self, difficulty: u32) -> Result<&Block> {
        if !self.blocks.is_empty() {
            return Err(ChainError::AlreadyInitialized);
        }
        let genesis = Block::with_miner(
            0,
            self.config.genesis_payload.clone(),
            SENTINEL_HASH,
            difficulty,
            &self.config.miner,
        )?;
        info!("Created genesis block {}", genesis.hash_hex());
        self.blocks.push(genesis);
        Ok(&self.blocks[0])
    }

    /// Seal `payload` onto the tail. `None` uses the configured default
    /// difficulty. An empty chain first gets an unmined genesis block.
    pub fn append(
        &mut self,
        payload: impl Into<String>,
        difficulty: Option<u32>,
    ) -> Result<&Block> {
        let difficulty = difficulty.unwrap_or(self.config.default_difficulty);
        pow::check_difficulty(difficulty)?;
        if self.blocks.is_empty() {
            self.create_genesis(0)?;
        }
        let previous_hash = self
            .blocks
            .last()
            .map_or(SENTINEL_HASH, |tail| *tail.hash());
        let block = Block::with_miner(
            self.blocks.len() as u64,
            payload,
            previous_hash,
            difficulty,
            &self.config.miner,
        )?;
        self.blocks.push(block);
        let pos = self.blocks.len() - 1;
        Ok(&self.blocks[pos])
    }

    /// Check every block in order and report the first problem.
    ///
    /// For each block the stored hash is compared with a fresh one first
    /// (`StaleHash`), then its link to the predecessor (`BrokenLink`). Block 0
    /// must link to the all-zero sentinel. Proof-of-work is not rechecked, so
    /// a repaired chain validates even though its hashes were never re-mined;
    /// see [`Chain::underworked_blocks`].
    pub fn validate(&self) -> Result<()> {
        let result = self.first_violation();
        if let Err(err) = &result {
            warn!("chain validation failed: {err}");
        }
        result
    }

    fn first_violation(&self) -> Result<()> {
        let Some(genesis) = self.blocks.first() else {
            return Ok(());
        };
        if genesis.has_stale_hash() {
            return Err(ChainError::StaleHash { index: 0 });
        }
        if genesis.previous_hash() != &SENTINEL_HASH {
            return Err(ChainError::BrokenLink { index: 0 });
        }
        for (i, pair) in self.blocks.windows(2).enumerate() {
            let (prev, cur) = (&pair[0], &pair[1]);
            let index = i as u64 + 1;
            if cur.has_stale_hash() {
                return Err(ChainError::StaleHash { index });
            }
            if cur.previous_hash() != prev.hash() {
                return Err(ChainError::BrokenLink { index });
            }
        }
        Ok(())
    }

    /// Overwrite a block's payload and leave its hash stale.
    pub fn tamper(&mut self, index: u64, payload: impl Into<String>) -> Result<()> {
        let pos = self.position(index)?;
        self.blocks[pos].tamper(payload);
        warn!("Tampered with block {index}");
        Ok(())
    }

    /// Recompute and store one block's hash, leaving its successors alone.
    pub fn reseal(&mut self, index: u64) -> Result<Hash> {
        let pos = self.position(index)?;
        Ok(self.blocks[pos].reseal())
    }

    /// Reseal `from_index`, then relink and reseal every later block.
    ///
    /// Hashes are recomputed directly whatever each block's difficulty, so no
    /// nonce search runs. Returns the number of blocks rehashed.
    pub fn repair(&mut self, from_index: u64) -> Result<usize> {
        let from = self.position(from_index)?;
        self.blocks[from].reseal();
        for pos in from + 1..self.blocks.len() {
            let previous_hash = *self.blocks[pos - 1].hash();
            let block = &mut self.blocks[pos];
            block.relink(previous_hash);
            block.reseal();
        }
        let rehashed = self.blocks.len() - from;
        info!("Repaired chain from block {from_index}, rehashed {rehashed} blocks");
        Ok(rehashed)
    }

    /// Blocks whose stored hash no longer meets the difficulty they were
    /// mined at, typically because `repair` rehashed them.
    pub fn underworked_blocks(&self) -> Vec<u64> {
        self.blocks
            .iter()
            .filter(|b| !b.meets_difficulty())
            .map(Block::index)
            .collect()
    }

    pub fn mining_summary(&self) -> MiningSummary {
        self.blocks
            .iter()
            .filter_map(Block::mining)
            .fold(MiningSummary::default(), |mut acc, stats| {
                acc.mined_blocks += 1;
                acc.total_attempts += stats.attempts;
                acc.total_elapsed += stats.elapsed;
                acc
            })
    }

    fn position(&self, index: u64) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|pos| *pos < self.blocks.len())
            .ok_or(ChainError::InvalidIndex {
                index,
                len: self.blocks.len(),
            })
    }
}
