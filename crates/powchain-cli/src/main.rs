use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use powchain_core::{
    constants::SENTINEL_HASH, pow, Block, Chain, ChainConfig, MinerConfig, SearchStrategy,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powchain")]
#[command(about = "Hash-chain integrity and proof-of-work playground")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk through tampering, detection and cascade repair on a 3-block chain
    Demo,
    /// Mine a single block and print it as JSON
    Mine {
        /// Block payload
        #[arg(long)]
        payload: String,
        /// Required leading zero hex characters
        #[arg(long, default_value_t = 2)]
        difficulty: u32,
        /// Search the nonce space on all cores
        #[arg(long)]
        parallel: bool,
    },
    /// Build a chain of mined blocks and print it with a mining summary
    Build {
        /// Blocks to append after genesis
        #[arg(long, default_value_t = 3)]
        blocks: u32,
        /// Difficulty for appended blocks
        #[arg(long, default_value_t = 2)]
        difficulty: u32,
        /// Difficulty for the genesis block
        #[arg(long, default_value_t = 0)]
        genesis_difficulty: u32,
        /// Search the nonce space on all cores
        #[arg(long)]
        parallel: bool,
    },
    /// Mine a test block at each difficulty up to the maximum and compare cost
    Compare {
        #[arg(long, default_value_t = 4)]
        max_difficulty: u32,
        /// Search the nonce space on all cores
        #[arg(long)]
        parallel: bool,
    },
}

#[derive(Serialize)]
struct BlockView<'a> {
    index: u64,
    timestamp: u64,
    payload: &'a str,
    previous_hash: String,
    hash: String,
    nonce: u64,
    difficulty: u32,
    attempts: Option<u64>,
    mining_time_secs: Option<f64>,
}

impl<'a> From<&'a Block> for BlockView<'a> {
    fn from(block: &'a Block) -> Self {
        Self {
            index: block.index(),
            timestamp: block.timestamp(),
            payload: block.payload(),
            previous_hash: block.previous_hash_hex(),
            hash: block.hash_hex(),
            nonce: block.nonce(),
            difficulty: block.difficulty(),
            attempts: block.mining().map(|s| s.attempts),
            mining_time_secs: block.mining().map(|s| s.elapsed.as_secs_f64()),
        }
    }
}

#[derive(Serialize)]
struct ChainView<'a> {
    blocks: Vec<BlockView<'a>>,
    valid: bool,
    mined_blocks: usize,
    total_attempts: u64,
    total_mining_time_secs: f64,
    hash_rate: f64,
}

fn miner(parallel: bool) -> MinerConfig {
    MinerConfig {
        strategy: if parallel {
            SearchStrategy::Parallel
        } else {
            SearchStrategy::Sequential
        },
        ..MinerConfig::default()
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Describe the chain's validity; errors other than validation failures
/// are passed up.
fn status(chain: &Chain) -> Result<String> {
    match chain.validate() {
        Ok(()) => Ok("valid".to_string()),
        Err(err) if err.is_validation_failure() => Ok(format!("INVALID ({err})")),
        Err(err) => Err(err).context("validate chain"),
    }
}

fn demo() -> Result<()> {
    let mut chain = Chain::new(0);
    chain.create_genesis(0)?;
    chain.append("Alice sends 10 coins to Bob", None)?;
    chain.append("Bob sends 5 coins to Charlie", None)?;
    info!("built demo chain of {} blocks", chain.len());
    println!("1. original chain of {} blocks: {}", chain.len(), status(&chain)?);
    for block in chain.blocks() {
        println!("   #{} {} {}", block.index(), block.hash_hex(), block.payload());
    }

    chain.tamper(1, "Alice sends 100 coins to Bob")?;
    println!("2. block 1 payload rewritten: {}", status(&chain)?);

    let rehashed = chain.reseal(1).context("reseal block 1")?;
    println!(
        "3. block 1 rehashed to {}: {}",
        hex::encode(rehashed),
        status(&chain)?
    );

    let count = chain.repair(1).context("repair from block 1")?;
    info!("cascade repair from block 1 touched {count} blocks");
    println!("4. cascade repair rehashed {count} blocks: {}", status(&chain)?);
    Ok(())
}

fn build(blocks: u32, difficulty: u32, genesis_difficulty: u32, parallel: bool) -> Result<()> {
    let mut chain = Chain::with_config(ChainConfig {
        default_difficulty: difficulty,
        miner: miner(parallel),
        ..ChainConfig::default()
    });
    chain.create_genesis(genesis_difficulty)?;
    for i in 1..=blocks {
        chain
            .append(format!("Block {i} - Transaction {i}"), None)
            .with_context(|| format!("append block {i}"))?;
    }
    let summary = chain.mining_summary();
    info!(
        "built chain of {} blocks, {} mined in {} attempts",
        chain.len(),
        summary.mined_blocks,
        summary.total_attempts
    );
    print_json(&ChainView {
        blocks: chain.blocks().iter().map(BlockView::from).collect(),
        valid: chain.validate().is_ok(),
        mined_blocks: summary.mined_blocks,
        total_attempts: summary.total_attempts,
        total_mining_time_secs: summary.total_elapsed.as_secs_f64(),
        hash_rate: summary.hash_rate(),
    })
}

fn compare(max_difficulty: u32, parallel: bool) -> Result<()> {
    info!("comparing difficulties 1..={max_difficulty}");
    let reports = pow::compare_difficulties(max_difficulty, &miner(parallel))?;
    println!(
        "{:<12} {:<12} {:<12} {:<15} Multiplier",
        "Difficulty", "Attempts", "Time (s)", "Hash Rate"
    );
    for r in reports {
        println!(
            "{:<12} {:<12} {:<12.4} {:<15.0} {:.1}x",
            r.difficulty,
            r.stats.attempts,
            r.stats.elapsed.as_secs_f64(),
            r.stats.hash_rate(),
            r.multiplier
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .pretty()
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo => demo()?,
        Command::Mine {
            payload,
            difficulty,
            parallel,
        } => {
            let config = miner(parallel);
            let block = Block::with_miner(1, payload, SENTINEL_HASH, difficulty, &config)
                .context("mine block")?;
            print_json(&BlockView::from(&block))?;
        }
        Command::Build {
            blocks,
            difficulty,
            genesis_difficulty,
            parallel,
        } => build(blocks, difficulty, genesis_difficulty, parallel)?,
        Command::Compare {
            max_difficulty,
            parallel,
        } => compare(max_difficulty, parallel)?,
    }
    Ok(())
}
