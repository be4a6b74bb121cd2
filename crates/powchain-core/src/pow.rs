//! Proof-of-work nonce search.
//!
//! A hash satisfies difficulty `d` when its hex rendering starts with at least
//! `d` `'0'` characters, i.e. the digest has `d` leading zero nibbles. The
//! search scans nonces 1, 2, 3, ... and keeps the first one that qualifies, so
//! the same block fields always yield the same nonce whichever strategy runs.

use crate::{
    constants::{MAX_DIFFICULTY, SENTINEL_HASH},
    error::{ChainError, Result},
    finish_hash, Block, Hash, MinerConfig, MiningStats, SearchStrategy,
};
use rayon::prelude::*;
use sha2::Sha256;
use std::time::Instant;
use tracing::{debug, info};

/// Nonces handed to the rayon pool per round of the parallel search.
const PARALLEL_WINDOW: u64 = 1 << 16;

/// Outcome of a completed search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Found {
    pub nonce: u64,
    pub hash: Hash,
    pub stats: MiningStats,
}

pub fn check_difficulty(difficulty: u32) -> Result<()> {
    if difficulty > MAX_DIFFICULTY {
        return Err(ChainError::InvalidDifficulty {
            difficulty,
            max: MAX_DIFFICULTY,
        });
    }
    Ok(())
}

/// Number of leading `'0'` characters in the hex rendering of `hash`.
pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}

pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    count_leading_zero_nibbles(hash) >= difficulty
}

/// Mine `block`'s fields at `difficulty`, ignoring its current nonce and hash.
///
/// Blocks until a nonce is found. There is no timeout: each extra unit of
/// difficulty multiplies the expected work by 16. Difficulties no digest can
/// reach are rejected up front.
pub fn search(block: &Block, difficulty: u32, miner: &MinerConfig) -> Result<Found> {
    check_difficulty(difficulty)?;
    let base = block.prefix_hasher();
    let started = Instant::now();
    let (nonce, hash) = match miner.strategy {
        SearchStrategy::Sequential => {
            search_sequential(&base, block.index(), difficulty, miner.progress_interval)
        }
        SearchStrategy::Parallel => search_parallel(&base, block.index(), difficulty),
    };
    let stats = MiningStats {
        // Both strategies stop at the smallest qualifying nonce, which is
        // also the number of sequential attempts it takes to reach it.
        attempts: nonce,
        elapsed: started.elapsed(),
    };
    info!(
        "Mined block {} with nonce {} in {} attempts ({:.2?}), hash {}",
        block.index(),
        nonce,
        stats.attempts,
        stats.elapsed,
        hex::encode(hash)
    );
    Ok(Found { nonce, hash, stats })
}

fn search_sequential(
    base: &Sha256,
    index: u64,
    difficulty: u32,
    progress_interval: u64,
) -> (u64, Hash) {
    let mut nonce = 0u64;
    loop {
        nonce = nonce.wrapping_add(1);
        let hash = finish_hash(base.clone(), nonce);
        if progress_interval > 0 && nonce % progress_interval == 0 {
            debug!(
                "block {index}: attempt {nonce}, hash {}...",
                &hex::encode(hash)[..20]
            );
        }
        if meets_difficulty(&hash, difficulty) {
            return (nonce, hash);
        }
    }
}

fn search_parallel(base: &Sha256, index: u64, difficulty: u32) -> (u64, Hash) {
    let mut start = 1u64;
    loop {
        let end = start.saturating_add(PARALLEL_WINDOW);
        let found = (start..end).into_par_iter().find_first(|nonce| {
            let hash = finish_hash(base.clone(), *nonce);
            meets_difficulty(&hash, difficulty)
        });
        if let Some(nonce) = found {
            return (nonce, finish_hash(base.clone(), nonce));
        }
        debug!("block {index}: no nonce below {end}, widening search");
        start = if end == u64::MAX { 1 } else { end };
    }
}

/// One row of [`compare_difficulties`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifficultyReport {
    pub difficulty: u32,
    pub stats: MiningStats,
    /// Attempts relative to the first row.
    pub multiplier: f64,
}

/// Mine the same test block at difficulty 1..=`max_difficulty` and report
/// what each level cost.
pub fn compare_difficulties(
    max_difficulty: u32,
    miner: &MinerConfig,
) -> Result<Vec<DifficultyReport>> {
    check_difficulty(max_difficulty)?;
    let mut reports: Vec<DifficultyReport> = Vec::new();
    for difficulty in 1..=max_difficulty {
        let block = Block::with_miner(
            1,
            format!("Test block for difficulty {difficulty}"),
            SENTINEL_HASH,
            difficulty,
            miner,
        )?;
        let stats = block.mining().copied().unwrap_or(MiningStats {
            attempts: 0,
            elapsed: Default::default(),
        });
        let base = reports.first().map_or(stats.attempts, |r| r.stats.attempts);
        let multiplier = if base > 0 {
            stats.attempts as f64 / base as f64
        } else {
            0.0
        };
        reports.push(DifficultyReport {
            difficulty,
            stats,
            multiplier,
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::{
        layer::{Context, SubscriberExt},
        Layer,
    };

    const TS: u64 = 1_600_000_000;

    /// Counts debug-level events, which the sequential search uses for progress.
    struct DebugCounter(Arc<AtomicU64>);

    impl<S: Subscriber> Layer<S> for DebugCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::DEBUG {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn progress_events(
        template: &Block,
        difficulty: u32,
        progress_interval: u64,
    ) -> (u64, Found) {
        let count = Arc::new(AtomicU64::new(0));
        let subscriber = tracing_subscriber::registry().with(DebugCounter(count.clone()));
        let miner = MinerConfig {
            strategy: SearchStrategy::Sequential,
            progress_interval,
        };
        let found = tracing::subscriber::with_default(subscriber, || {
            search(template, difficulty, &miner)
        })
        .unwrap();
        (count.load(Ordering::SeqCst), found)
    }

    #[test]
    fn leading_zero_nibbles_examples() {
        let mut h = [0u8; 32];
        assert_eq!(count_leading_zero_nibbles(&h), 64);
        h[0] = 0x0F; // "0f"
        assert_eq!(count_leading_zero_nibbles(&h), 1);
        h[0] = 0x10; // "10"
        assert_eq!(count_leading_zero_nibbles(&h), 0);
        h = [0u8; 32];
        h[1] = 0x80; // "0080"
        assert_eq!(count_leading_zero_nibbles(&h), 2);
        h[1] = 0x04; // "0004"
        assert_eq!(count_leading_zero_nibbles(&h), 3);
    }

    #[test]
    fn nibbles_agree_with_hex_rendering() {
        let block = Block::with_timestamp(1, TS, "hex check", SENTINEL_HASH, 0).unwrap();
        let rendered = block.hash_hex();
        let zeros = rendered.chars().take_while(|c| *c == '0').count() as u32;
        assert_eq!(count_leading_zero_nibbles(block.hash()), zeros);
    }

    #[test]
    fn difficulty_bounds() {
        assert!(check_difficulty(0).is_ok());
        assert!(check_difficulty(64).is_ok());
        assert!(check_difficulty(65).is_err());
    }

    #[test]
    fn mined_nonce_is_smallest() {
        let block =
            Block::with_timestamp(1, TS, "Alice sends 10 BTC to Bob", SENTINEL_HASH, 3).unwrap();
        assert!(meets_difficulty(block.hash(), 3));
        assert!(block.hash_hex().starts_with("000"));
        let base = block.prefix_hasher();
        for nonce in 1..block.nonce() {
            assert!(!meets_difficulty(&finish_hash(base.clone(), nonce), 3));
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let template = Block::with_timestamp(4, TS, "parallel", SENTINEL_HASH, 0).unwrap();
        let sequential = search(&template, 3, &MinerConfig::default()).unwrap();
        let parallel = search(
            &template,
            3,
            &MinerConfig {
                strategy: SearchStrategy::Parallel,
                progress_interval: 0,
            },
        )
        .unwrap();
        assert_eq!(sequential.nonce, parallel.nonce);
        assert_eq!(sequential.hash, parallel.hash);
        assert_eq!(parallel.stats.attempts, parallel.nonce);
    }

    #[test]
    fn search_ignores_existing_nonce() {
        let mined = Block::with_timestamp(2, TS, "again", SENTINEL_HASH, 2).unwrap();
        let again = search(&mined, 2, &MinerConfig::default()).unwrap();
        assert_eq!(again.nonce, mined.nonce());
        assert_eq!(&again.hash, mined.hash());
    }

    #[test]
    fn comparison_rows() {
        let reports = compare_difficulties(2, &MinerConfig::default()).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].difficulty, 1);
        assert_eq!(reports[0].multiplier, 1.0);
        assert!(reports.iter().all(|r| r.stats.attempts > 0));
    }

    #[test]
    fn comparison_rejects_unreachable() {
        assert!(compare_difficulties(65, &MinerConfig::default()).is_err());
    }

    #[test]
    fn search_rejects_unreachable_difficulty() {
        let template = Block::with_timestamp(1, TS, "too hard", SENTINEL_HASH, 0).unwrap();
        for strategy in [SearchStrategy::Sequential, SearchStrategy::Parallel] {
            let miner = MinerConfig {
                strategy,
                progress_interval: 0,
            };
            assert_eq!(
                search(&template, 65, &miner).unwrap_err(),
                ChainError::InvalidDifficulty {
                    difficulty: 65,
                    max: 64
                }
            );
        }
    }

    #[test]
    fn progress_reported_every_interval() {
        let template = Block::with_timestamp(5, TS, "progress", SENTINEL_HASH, 0).unwrap();
        let (every_attempt, found) = progress_events(&template, 2, 1);
        assert_eq!(every_attempt, found.nonce);

        let (every_tenth, found) = progress_events(&template, 2, 10);
        assert_eq!(every_tenth, found.nonce / 10);
    }

    #[test]
    fn zero_interval_disables_progress() {
        let template = Block::with_timestamp(5, TS, "progress", SENTINEL_HASH, 0).unwrap();
        let (events, found) = progress_events(&template, 2, 0);
        assert_eq!(events, 0);
        assert!(meets_difficulty(&found.hash, 2));
    }
}
