//! Ledger integration tests
//!
//! Exercises the public API end to end: mining through the coordinator,
//! export and replay, tamper detection and concurrent submission.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use triad_ledger::core::{zero_hash, BLOCK_REWARD};
use triad_ledger::{
    Block, Config, ConsensusParams, Coordinate, FixedNoise, IterationOutcome, Ledger,
    LedgerError, Miner, MiningSettings, Node, ProofOfWork, SearchOutcome, Transaction,
};

fn quick_settings() -> MiningSettings {
    MiningSettings {
        auto_adjust: false,
        initial_backoff: 0.01,
        max_backoff: 0.05,
        error_pause: 0.01,
        ..Default::default()
    }
}

fn quick_config() -> Config {
    Config {
        difficulty: 1,
        consensus: ConsensusParams::default(),
        mining: quick_settings(),
    }
}

fn test_miner(ledger: &Arc<Ledger>, address: &str) -> Miner {
    Miner::with_noise(
        Arc::clone(ledger),
        quick_settings(),
        address,
        Coordinate::new(100, 100, 100).unwrap(),
        Box::new(FixedNoise(0.0)),
    )
    .unwrap()
}

fn mine_accepted(miner: &Miner) -> Block {
    match miner.mine_once().unwrap() {
        IterationOutcome::Accepted(block) => block,
        other => panic!("expected an accepted block, got {other:?}"),
    }
}

#[test]
fn test_proof_of_work_validation() {
    let reward = Transaction::new_reward("minerX", BLOCK_REWARD, 1_700_000_000.0).unwrap();
    let block = Block::new(
        1,
        1_700_000_000.0,
        vec![reward],
        "minerX",
        Coordinate::new(10, 20, 30).unwrap(),
        &zero_hash(),
    )
    .unwrap();

    let mut pow = ProofOfWork::with_noise(1, Box::new(FixedNoise(0.0))).unwrap();
    let SearchOutcome::Solved(solved) = pow.search(block, 1_000_000).unwrap() else {
        panic!("difficulty 1 should be solvable");
    };

    assert!(ProofOfWork::validate(&solved.block, 1));
    assert!(solved.block.get_hash().starts_with('0'));
}

#[test]
fn test_end_to_end_mining() {
    let ledger = Arc::new(Ledger::new(1).unwrap());
    let miner = test_miner(&ledger, "minerX");

    for expected_index in 1..=3 {
        let block = mine_accepted(&miner);
        assert_eq!(block.get_index(), expected_index);
        assert_eq!(block.get_transactions().len(), 1);
    }

    assert_eq!(ledger.height(), 4);
    assert_eq!(ledger.balance_of("minerX").unwrap(), 150.0);
    assert!(ledger.is_chain_valid());
    assert_eq!(ledger.stats().total_rewards, 150.0);
}

#[test]
fn test_double_spend_rejected() {
    let ledger = Arc::new(Ledger::new(1).unwrap());
    let tx = Transaction::with_timestamp("alice", "bob", 7.0, "", 1_700_000_000.0).unwrap();

    ledger.add_pending_transaction(tx.clone()).unwrap();
    assert!(matches!(
        ledger.add_pending_transaction(tx.clone()),
        Err(LedgerError::Duplicate(_))
    ));

    let miner = test_miner(&ledger, "minerX");
    let block = mine_accepted(&miner);
    assert_eq!(block.get_transactions().len(), 2);

    // Once committed, the same id is refused forever
    assert!(matches!(
        ledger.add_pending_transaction(tx),
        Err(LedgerError::Duplicate(_))
    ));
    assert_eq!(ledger.balance_of("bob").unwrap(), 7.0);
}

#[test]
fn test_reward_cannot_be_submitted() {
    let node = Node::new(quick_config()).unwrap();
    let forged = Transaction::new_reward("mallory", BLOCK_REWARD, 1_700_000_000.0).unwrap();
    assert!(matches!(node.submit(forged), Err(LedgerError::Validation(_))));
    assert_eq!(node.get_status().pending_count, 0);
}

#[test]
fn test_export_replay_round_trip() {
    let node = Node::new(quick_config()).unwrap();
    node.submit_transaction("alice", "bob", 12.0, "invoice 7").unwrap();
    for _ in 0..3 {
        node.mine_block("minerX", Coordinate::new(100, 100, 100).unwrap(), false)
            .unwrap();
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("chain.json");
    node.export_to(&path).unwrap();

    let replayed = Node::load(quick_config(), &path).unwrap();
    assert!(replayed.is_chain_valid());
    assert_eq!(replayed.ledger().blocks(), node.ledger().blocks());
    assert_eq!(replayed.get_balance("bob").unwrap(), 12.0);
    assert_eq!(replayed.get_balance("minerX").unwrap(), 150.0);
}

#[test]
fn test_tampered_export_rejected() {
    let node = Node::new(quick_config()).unwrap();
    node.submit_transaction("alice", "bob", 1.0, "").unwrap();
    for _ in 0..3 {
        node.mine_block("minerX", Coordinate::new(100, 100, 100).unwrap(), false)
            .unwrap();
    }
    let mut chain: serde_json::Value = serde_json::from_str(&node.export_chain().unwrap()).unwrap();
    chain[1]["transactions"][0]["amount"] = serde_json::json!(1_000_000.0);

    let result = Node::from_export(quick_config(), &chain.to_string());
    assert!(matches!(result, Err(LedgerError::Consensus(_))));

    // Replay at a higher minimum difficulty than the chain was mined at
    let mut strict = quick_config();
    strict.difficulty = 32;
    assert!(Node::from_export(strict, &node.export_chain().unwrap()).is_err());
}

#[test]
fn test_concurrent_submission_during_mining() {
    let node = Arc::new(Node::new(quick_config()).unwrap());
    node.start_mining("minerX", Coordinate::new(100, 100, 100).unwrap(), false)
        .unwrap();

    let mut handles = Vec::new();
    for worker in 0..4 {
        let node = Arc::clone(&node);
        handles.push(thread::spawn(move || {
            let mut ids = Vec::new();
            for n in 0..25 {
                let id = node
                    .submit_transaction(&format!("sender-{worker}"), "bob", f64::from(n) + 1.0, "")
                    .unwrap();
                ids.push(id);
            }
            ids
        }));
    }
    let submitted: Vec<String> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    let deadline = Instant::now() + Duration::from_secs(60);
    while node.get_status().pending_count > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    node.stop_mining();

    assert!(!node.get_status().active);
    assert!(node.is_chain_valid());

    let mut seen = HashSet::new();
    for block in node.ledger().blocks() {
        for id in block.transaction_ids() {
            assert!(seen.insert(id), "transaction committed twice");
        }
    }
    for id in &submitted {
        assert!(
            seen.contains(id) || node.ledger().is_pending(id),
            "transaction {id} was lost"
        );
    }
}
