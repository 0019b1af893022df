use crate::core::{Coordinate, Transaction, NETWORK_SENDER};
use crate::error::{LedgerError, Result};
use crate::utils::{canonical_string, canonicalize, is_hex_digest, sha256_hex, HASH_HEX_LEN};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Previous-hash value carried by the genesis block
pub fn zero_hash() -> String {
    "0".repeat(HASH_HEX_LEN)
}

/// Literal leading-zero prefix a hash needs at the given difficulty
pub fn target_prefix(difficulty: u32) -> String {
    "0".repeat(difficulty as usize)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "BlockRecord")]
pub struct Block {
    index: u64,
    timestamp: f64,
    transactions: Vec<Transaction>,
    miner: String,
    coordinate: Coordinate,
    previous_hash: String,
    hash: String,
    nonce: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockRecord {
    index: u64,
    timestamp: f64,
    #[serde(default)]
    transactions: Vec<Transaction>,
    miner: String,
    coordinate: Coordinate,
    previous_hash: String,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    nonce: u64,
}

impl TryFrom<BlockRecord> for Block {
    type Error = LedgerError;

    fn try_from(record: BlockRecord) -> Result<Self> {
        let mut block = Block::new(
            record.index,
            record.timestamp,
            record.transactions,
            &record.miner,
            record.coordinate,
            &record.previous_hash,
        )?;
        if !record.hash.is_empty() && !is_hex_digest(&record.hash) {
            return Err(LedgerError::Validation(
                "Block hash must be empty or a 64-character hex string".to_string(),
            ));
        }
        block.hash = record.hash;
        block.nonce = record.nonce;
        Ok(block)
    }
}

impl Block {
    /// Create an unmined block (empty hash, nonce 0)
    pub fn new(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        miner: &str,
        coordinate: Coordinate,
        previous_hash: &str,
    ) -> Result<Block> {
        if !timestamp.is_finite() || timestamp <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "Block timestamp must be a positive number, got {timestamp}"
            )));
        }
        if miner.is_empty() {
            return Err(LedgerError::Validation(
                "Miner address must be a non-empty string".to_string(),
            ));
        }
        if !is_hex_digest(previous_hash) {
            return Err(LedgerError::Validation(
                "Previous hash must be a 64-character hex string".to_string(),
            ));
        }

        Ok(Block {
            index,
            timestamp,
            transactions,
            miner: miner.to_string(),
            coordinate,
            previous_hash: previous_hash.to_string(),
            hash: String::new(),
            nonce: 0,
        })
    }

    /// First block of every chain. It carries no transactions and its hash is
    /// not subject to the difficulty target.
    pub fn generate_genesis_block(timestamp: f64) -> Result<Block> {
        let mut block = Block::new(
            0,
            timestamp,
            vec![],
            NETWORK_SENDER,
            Coordinate::ORIGIN,
            &zero_hash(),
        )?;
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// Canonical JSON of every field except `hash`, ready for hashing.
    /// The nonce entry can be overwritten in place with [`Block::hash_preimage_with_nonce`].
    pub fn hash_preimage(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("hash");
        }
        Ok(canonicalize(value))
    }

    /// Hash of a preimage after setting its nonce
    pub fn hash_preimage_with_nonce(preimage: &mut Value, nonce: u64) -> Result<String> {
        if let Value::Object(map) = preimage {
            map.insert("nonce".to_string(), Value::from(nonce));
        }
        Ok(sha256_hex(canonical_string(preimage)?.as_bytes()))
    }

    pub fn calculate_hash(&self) -> Result<String> {
        let mut preimage = self.hash_preimage()?;
        Self::hash_preimage_with_nonce(&mut preimage, self.nonce)
    }

    /// Whether the stored hash equals the recomputed one
    pub fn has_valid_hash(&self) -> bool {
        matches!(self.calculate_hash(), Ok(hash) if hash == self.hash)
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.hash.len() == HASH_HEX_LEN && self.hash.starts_with(&target_prefix(difficulty))
    }

    // Only the proof-of-work search writes these.
    pub(crate) fn set_proof(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn reward_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_reward())
    }

    pub fn transaction_ids(&self) -> Vec<String> {
        self.transactions
            .iter()
            .map(|tx| tx.get_id().to_string())
            .collect()
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_miner(&self) -> &str {
        &self.miner
    }

    pub fn get_coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn get_previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn get_hash(&self) -> &str {
        &self.hash
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(json: &str) -> Result<Block> {
        Ok(serde_json::from_str(json)?)
    }

    /// Mutable access for tamper-detection tests
    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}
