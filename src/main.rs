// This is the entry point for the ledger CLI
// Every command builds a Node in-process, so there is nothing to connect to
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};
use triad_ledger::{
    Command, Config, DifficultyAdjustment, IterationOutcome, Node, Opt, RandomNoise, GLOBAL_CONFIG,
};

// Accounts used for synthetic traffic
const ACCOUNTS: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

fn main() {
    // Info by default, RUST_LOG still wins when it is set
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.config, opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// The --config file replaces the environment-derived configuration entirely
fn load_config(path: Option<PathBuf>, difficulty: Option<u32>) -> triad_ledger::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(&path)?,
        None => GLOBAL_CONFIG.clone(),
    };
    if let Some(difficulty) = difficulty {
        config.difficulty = difficulty;
    }
    config.validate()?;
    Ok(config)
}

fn run_command(
    config_path: Option<PathBuf>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        // Mine a fixed number of blocks on this thread, then summarise
        Command::Mine {
            blocks,
            address,
            coordinate,
            transactions,
            difficulty,
            export,
        } => {
            let config = load_config(config_path, difficulty)?;
            let auto_adjust = config.mining.auto_adjust;
            let node = Node::new(config)?;

            let mut mined = 0;
            let mut attempts = 0;
            while mined < blocks {
                attempts += 1;
                submit_synthetic(&node, transactions);
                match node.mine_block(&address, coordinate, auto_adjust)? {
                    IterationOutcome::Accepted(block) => {
                        mined += 1;
                        println!(
                            "Block {} mined: {} ({} transactions)",
                            block.get_index(),
                            block.get_hash(),
                            block.get_transactions().len()
                        );
                    }
                    IterationOutcome::Exhausted => {
                        warn!("Attempt {attempts} exhausted the nonce space")
                    }
                    IterationOutcome::Rejected(reason) => {
                        warn!("Attempt {attempts} rejected: {reason}")
                    }
                    IterationOutcome::Interrupted => break,
                }
            }

            print_summary(&node, &address)?;
            if let Some(path) = export {
                node.export_to(&path)?;
            }
        }
        // Mine in the background for a while, feeding the pool as we go
        Command::Run {
            duration,
            address,
            coordinate,
            no_auto_adjust,
            status_interval,
            difficulty,
            export,
        } => {
            let config = load_config(config_path, difficulty)?;
            let node = Node::new(config)?;
            node.start_mining(&address, coordinate, !no_auto_adjust)?;

            let started = Instant::now();
            let mut last_report = Instant::now();
            let status_interval = Duration::from_secs(status_interval.max(1));
            while started.elapsed() < Duration::from_secs(duration) {
                thread::sleep(Duration::from_secs(1));
                submit_synthetic(&node, 1);
                if last_report.elapsed() >= status_interval {
                    println!("{}", serde_json::to_string(&node.get_status())?);
                    last_report = Instant::now();
                }
            }

            node.stop_mining();
            print_summary(&node, &address)?;
            if let Some(path) = export {
                node.export_to(&path)?;
            }
        }
        // Rebuild a ledger from an export; replay fails on the first bad block
        Command::Verify {
            path,
            balances,
            difficulty,
        } => {
            let config = load_config(config_path, difficulty)?;
            let node = load_chain(config, &path)?;
            let valid = node.is_chain_valid();
            println!(
                "Chain at {}: {} blocks, valid: {valid}",
                path.display(),
                node.chain_stats().total_blocks
            );
            for address in balances {
                println!("Balance of {address}: {}", node.get_balance(&address)?);
            }
            if !valid {
                return Err("Chain failed validation".into());
            }
        }
        // Print what the engine would make of a coordinate
        Command::Score {
            coordinate,
            distance,
            samples,
            seed,
        } => {
            let noise = match seed {
                Some(seed) => RandomNoise::seeded(seed),
                None => RandomNoise::new(),
            };
            let difficulty = GLOBAL_CONFIG.difficulty;
            let mut adjustment = DifficultyAdjustment::with_noise(difficulty, Box::new(noise))?;
            println!("Coordinate {coordinate}");
            for n in 1..=samples {
                println!("  sample {n}: score {:.4}", adjustment.score(&coordinate));
            }
            let neighbors = coordinate.neighbors(distance)?;
            println!("{} neighbours at distance {distance}:", neighbors.len());
            for neighbor in neighbors {
                println!("  {neighbor} (distance {:.2})", coordinate.distance_to(&neighbor));
            }
        }
    }
    Ok(())
}

fn load_chain(config: Config, path: &Path) -> triad_ledger::Result<Node> {
    info!("Replaying chain from {}", path.display());
    Node::load(config, path)
}

// Random transfers between the synthetic accounts; pool errors are only logged
fn submit_synthetic(node: &Node, count: usize) {
    let mut rng = rand::thread_rng();
    for _ in 0..count {
        let pair: Vec<&&str> = ACCOUNTS.choose_multiple(&mut rng, 2).collect();
        let amount = (rng.gen_range(1.0..100.0_f64) * 100.0).round() / 100.0;
        if let Err(e) = node.submit_transaction(pair[0], pair[1], amount, "synthetic") {
            warn!("Synthetic transaction dropped: {e}");
        }
    }
}

fn print_summary(node: &Node, address: &str) -> triad_ledger::Result<()> {
    let stats = node.chain_stats();
    let status = node.get_status();
    println!("Chain height: {}", status.chain_height);
    println!("Transactions: {}", stats.total_transactions);
    println!("Average block time: {:.2}s", stats.average_block_time);
    println!("Current difficulty: {}", status.difficulty);
    if let Some(coordinate) = status.coordinate {
        println!("Coordinate: {coordinate}");
    }
    println!("Pending: {}", status.pending_count);
    println!("Balance of {address}: {}", node.get_balance(address)?);
    println!("Chain valid: {}", node.is_chain_valid());
    Ok(())
}
