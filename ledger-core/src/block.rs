//! Blocks: a flat container of transactions plus the fields needed to
//! link and validate the chain. No header/merkle-root split — the
//! block hash covers the transaction list directly.

use crate::transaction::{Transaction, TransactionKind};
use crate::utxo::{Utxo, UtxoIndex};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use shared::Hash256;

/// The fixed genesis timestamp, in milliseconds since the epoch.
pub const GENESIS_TIMESTAMP_MS: i64 = 1_609_459_200_000;
pub const GENESIS_DIFFICULTY: u8 = 4;
pub const GENESIS_REWARD: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u32,
    pub timestamp: i64,
    pub previous_hash: String,
    pub nonce: u64,
    #[serde(rename = "powDifficulty")]
    pub difficulty: u8,
    pub transactions: Vec<Transaction>,
    pub hash: String,
}

/// Whether a block is secured by proof-of-work or proof-of-stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    ProofOfWork,
    ProofOfStake,
}

impl Block {
    /// Builds a block and computes (but does not verify) its hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the transactions cannot be serialized.
    pub fn new(
        index: u32,
        timestamp: i64,
        previous_hash: String,
        nonce: u64,
        difficulty: u8,
        transactions: Vec<Transaction>,
    ) -> Result<Self> {
        let hash = canonical_hash(timestamp, &transactions, &previous_hash, nonce)?;
        Ok(Self {
            index,
            timestamp,
            previous_hash,
            nonce,
            difficulty,
            transactions,
            hash: hash.to_hex(),
        })
    }

    /// Builds a block from fields whose `hash` is already known — used
    /// when reconstructing a block the worker or a peer already hashed,
    /// so the stored hash is preserved verbatim rather than recomputed.
    #[must_use]
    pub fn from_parts(
        index: u32,
        timestamp: i64,
        previous_hash: String,
        nonce: u64,
        difficulty: u8,
        transactions: Vec<Transaction>,
        hash: String,
    ) -> Self {
        Self {
            index,
            timestamp,
            previous_hash,
            nonce,
            difficulty,
            transactions,
            hash,
        }
    }

    /// The fixed genesis block: `index=0`, `previous_hash="0"`.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing the genesis transaction fails, which
    /// should not happen for this fixed, well-formed payload.
    pub fn genesis() -> Result<Self> {
        let coinbase = Transaction::coinbase(
            "genesis".to_string(),
            GENESIS_REWARD,
            GENESIS_TIMESTAMP_MS,
            0,
        );
        Self::new(
            0,
            GENESIS_TIMESTAMP_MS,
            "0".to_string(),
            0,
            GENESIS_DIFFICULTY,
            vec![coinbase],
        )
    }

    /// Recomputes the canonical hash for this block's current fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the transactions cannot be serialized.
    pub fn compute_hash(&self) -> Result<Hash256> {
        canonical_hash(
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// PoS iff there are at least two transactions and the second is a
    /// coinstake; otherwise PoW. Structural, not a stored tag.
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        if self.transactions.len() >= 2
            && matches!(self.transactions[1].kind(), TransactionKind::Coinstake)
        {
            BlockKind::ProofOfStake
        } else {
            BlockKind::ProofOfWork
        }
    }

    #[must_use]
    pub fn is_proof_of_work(&self) -> bool {
        matches!(self.kind(), BlockKind::ProofOfWork)
    }

    #[must_use]
    pub fn is_proof_of_stake(&self) -> bool {
        matches!(self.kind(), BlockKind::ProofOfStake)
    }

    /// For PoW blocks: whether `hash` starts with `difficulty` zero
    /// hex nibbles.
    #[must_use]
    pub fn meets_difficulty(&self) -> bool {
        shared::leading_zero_nibbles(&self.hash) >= u32::from(self.difficulty)
    }

    #[must_use]
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    #[must_use]
    pub fn coinstake(&self) -> Option<&Transaction> {
        if self.is_proof_of_stake() {
            self.transactions.get(1)
        } else {
            None
        }
    }

    /// Applies this block's transactions to `utxo`: remove every
    /// referenced input, then add every new output. Does not check
    /// that inputs exist first — callers validate before applying.
    pub fn apply_to_utxo(&self, utxo: &mut UtxoIndex) {
        for tx in &self.transactions {
            let tx_hash = tx.hash().ok();
            for input in &tx.inputs {
                utxo.remove(&input.previous_tx, input.output_index);
            }
            if let Some(tx_hash) = tx_hash {
                for (i, output) in tx.outputs.iter().enumerate() {
                    let idx = u32::try_from(i).unwrap_or(u32::MAX);
                    utxo.insert(Utxo::new(tx_hash, idx, output.clone(), tx.timestamp));
                }
            }
        }
    }
}

/// SHA-256 over a fixed-key-order JSON encoding of
/// `{timestamp, transactions, previous_hash, nonce}` — `index` and
/// `difficulty` are deliberately excluded from the hashed payload.
fn canonical_hash(
    timestamp: i64,
    transactions: &[Transaction],
    previous_hash: &str,
    nonce: u64,
) -> Result<Hash256> {
    #[derive(Serialize)]
    struct Canonical<'a> {
        timestamp: i64,
        transactions: &'a [Transaction],
        previous_hash: &'a str,
        nonce: u64,
    }
    let canonical = Canonical {
        timestamp,
        transactions,
        previous_hash,
        nonce,
    };
    let bytes =
        serde_json::to_vec(&canonical).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    Ok(Hash256::sha256(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_pow_with_fixed_fields() {
        let genesis = Block::genesis().unwrap();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.timestamp, GENESIS_TIMESTAMP_MS);
        assert!(genesis.is_proof_of_work());
    }

    #[test]
    fn hash_is_deterministic() {
        let genesis = Block::genesis().unwrap();
        assert_eq!(genesis.hash, genesis.compute_hash().unwrap().to_hex());
    }

    #[test]
    fn block_with_coinstake_second_tx_is_pos() {
        let coinbase = Transaction::coinbase("staker".into(), 10, 2_000, 0);
        let input = crate::transaction::TxInput::new(Hash256::sha256(b"prev"), 0, vec![9]);
        let coinstake = Transaction::coinstake(input, "staker".into(), 500, 2_000, 0);
        let block = Block::new(1, 2_000, "0".into(), 0, 4, vec![coinbase, coinstake]).unwrap();
        assert!(block.is_proof_of_stake());
    }

    #[test]
    fn apply_to_utxo_adds_outputs() {
        let genesis = Block::genesis().unwrap();
        let mut utxo = UtxoIndex::new();
        genesis.apply_to_utxo(&mut utxo);
        assert_eq!(utxo.balance("genesis"), GENESIS_REWARD);
    }
}
