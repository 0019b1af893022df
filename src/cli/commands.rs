use crate::core::Coordinate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_MINER: &str = "miner-1";
const DEFAULT_COORDINATE: &str = "250,250,250";

#[derive(Debug, Parser)]
#[command(name = "triad-ledger", about = "Single-node ledger with proof-of-fractal-work mining")]
pub struct Opt {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "mine", about = "Mine blocks synchronously and print a summary")]
    Mine {
        #[arg(long, default_value_t = 3, help = "Number of blocks to mine")]
        blocks: u32,
        #[arg(long, default_value = DEFAULT_MINER, help = "Address receiving the rewards")]
        address: String,
        #[arg(long, default_value = DEFAULT_COORDINATE, help = "Mining coordinate as a,b,c")]
        coordinate: Coordinate,
        #[arg(
            long,
            default_value_t = 2,
            help = "Synthetic transactions submitted before each block"
        )]
        transactions: usize,
        #[arg(long, help = "Override the configured difficulty")]
        difficulty: Option<u32>,
        #[arg(long, help = "Write the resulting chain as JSON to this file")]
        export: Option<PathBuf>,
    },
    #[command(name = "run", about = "Mine in the background while submitting synthetic traffic")]
    Run {
        #[arg(long, default_value_t = 30, help = "How long to run, in seconds")]
        duration: u64,
        #[arg(long, default_value = DEFAULT_MINER, help = "Address receiving the rewards")]
        address: String,
        #[arg(long, default_value = DEFAULT_COORDINATE, help = "Starting coordinate as a,b,c")]
        coordinate: Coordinate,
        #[arg(long, help = "Keep the coordinate fixed")]
        no_auto_adjust: bool,
        #[arg(long, default_value_t = 5, help = "Seconds between status reports")]
        status_interval: u64,
        #[arg(long, help = "Override the configured difficulty")]
        difficulty: Option<u32>,
        #[arg(long, help = "Write the resulting chain as JSON to this file")]
        export: Option<PathBuf>,
    },
    #[command(name = "verify", about = "Replay an exported chain and report its validity")]
    Verify {
        #[arg(help = "Chain JSON written by mine or run")]
        path: PathBuf,
        #[arg(long = "balance", help = "Address whose balance to report (repeatable)")]
        balances: Vec<String>,
        #[arg(long, help = "Override the configured difficulty")]
        difficulty: Option<u32>,
    },
    #[command(name = "score", about = "Show the score and neighbours of a coordinate")]
    Score {
        #[arg(help = "Coordinate as a,b,c")]
        coordinate: Coordinate,
        #[arg(long, default_value_t = 50, help = "Neighbour distance")]
        distance: u16,
        #[arg(long, default_value_t = 5, help = "Number of noisy score samples")]
        samples: usize,
        #[arg(long, help = "Seed for the noise source")]
        seed: Option<u64>,
    },
}
