//! The UTXO index: a per-address set of unspent outputs, rebuilt by
//! deterministic replay of the chain in order.

use crate::transaction::TxOutput;
use serde::{Deserialize, Serialize};
use shared::Hash256;
use std::collections::{HashMap, HashSet};

/// A specific, still-unspent output of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: Hash256,
    pub output_index: u32,
    pub output: TxOutput,
    /// Timestamp of the transaction that created this output, carried
    /// alongside the UTXO so coinstake age checks don't need a
    /// separate transaction-hash index.
    pub created_at_ms: i64,
}

impl Utxo {
    #[must_use]
    pub const fn new(tx_hash: Hash256, output_index: u32, output: TxOutput, created_at_ms: i64) -> Self {
        Self {
            tx_hash,
            output_index,
            output,
            created_at_ms,
        }
    }
}

/// `address → set<UTXO>`, updated atomically per block: every input's
/// referenced output is removed, then every new output is added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtxoIndex {
    by_address: HashMap<String, HashSet<Utxo>>,
}

impl UtxoIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the UTXO with this exact `(tx_hash, output_index)` from
    /// whichever address set holds it, returning it if found.
    pub fn remove(&mut self, tx_hash: &Hash256, output_index: u32) -> Option<Utxo> {
        for set in self.by_address.values_mut() {
            if let Some(found) = set
                .iter()
                .find(|u| &u.tx_hash == tx_hash && u.output_index == output_index)
                .cloned()
            {
                set.remove(&found);
                return Some(found);
            }
        }
        None
    }

    /// Returns the referenced UTXO without removing it.
    #[must_use]
    pub fn get(&self, tx_hash: &Hash256, output_index: u32) -> Option<&Utxo> {
        self.by_address.values().find_map(|set| {
            set.iter()
                .find(|u| &u.tx_hash == tx_hash && u.output_index == output_index)
        })
    }

    pub fn insert(&mut self, utxo: Utxo) {
        self.by_address
            .entry(utxo.output.address.clone())
            .or_default()
            .insert(utxo);
    }

    /// All unspent outputs currently assigned to `address`.
    #[must_use]
    pub fn for_address(&self, address: &str) -> Vec<&Utxo> {
        self.by_address
            .get(address)
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }

    /// Sum of unspent amounts for `address` — spec's `balance(address)`.
    #[must_use]
    pub fn balance(&self, address: &str) -> u64 {
        self.for_address(address)
            .iter()
            .map(|u| u.output.amount)
            .sum()
    }

    #[must_use]
    pub fn contains(&self, tx_hash: &Hash256, output_index: u32) -> bool {
        self.get(tx_hash, output_index).is_some()
    }

    pub fn clear(&mut self) {
        self.by_address.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(tag: &[u8], idx: u32, address: &str, amount: u64) -> Utxo {
        Utxo::new(Hash256::sha256(tag), idx, TxOutput::new(address.into(), amount), 0)
    }

    #[test]
    fn insert_and_balance() {
        let mut index = UtxoIndex::new();
        index.insert(utxo(b"tx1", 0, "alice", 100));
        index.insert(utxo(b"tx2", 0, "alice", 50));
        index.insert(utxo(b"tx3", 0, "bob", 10));

        assert_eq!(index.balance("alice"), 150);
        assert_eq!(index.balance("bob"), 10);
        assert_eq!(index.balance("carol"), 0);
    }

    #[test]
    fn remove_spends_a_utxo() {
        let mut index = UtxoIndex::new();
        let tx_hash = Hash256::sha256(b"tx1");
        index.insert(Utxo::new(tx_hash, 0, TxOutput::new("alice".into(), 100), 0));

        assert!(index.contains(&tx_hash, 0));
        let removed = index.remove(&tx_hash, 0);
        assert!(removed.is_some());
        assert!(!index.contains(&tx_hash, 0));
        assert_eq!(index.balance("alice"), 0);
    }

    #[test]
    fn remove_missing_utxo_returns_none() {
        let mut index = UtxoIndex::new();
        assert!(index.remove(&Hash256::zero(), 0).is_none());
    }
}
