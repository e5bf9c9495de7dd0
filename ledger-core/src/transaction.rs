//! UTXO-model transactions: inputs spending prior outputs, outputs
//! creating new ones, and the coinbase/coinstake/normal classification.

use serde::{Deserialize, Serialize};
use shared::Hash256;

/// A reference to a specific output of a prior confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_tx: Hash256,
    pub output_index: u32,
    pub signature: Vec<u8>,
}

impl TxInput {
    #[must_use]
    pub const fn new(previous_tx: Hash256, output_index: u32, signature: Vec<u8>) -> Self {
        Self {
            previous_tx,
            output_index,
            signature,
        }
    }
}

/// A new unit of value assigned to an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

impl TxOutput {
    #[must_use]
    pub const fn new(address: String, amount: u64) -> Self {
        Self { address, amount }
    }
}

/// Structural classification of a transaction, derived from its shape
/// rather than an explicit tag (spec.md's "kind discriminator").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Empty inputs, exactly one output: the block reward.
    Coinbase,
    /// Non-empty inputs, at least two outputs, `outputs[0].amount == 0`.
    Coinstake,
    /// Anything else: every input must carry a signature.
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub timestamp: i64,
    pub nonce: u64,
}

impl Transaction {
    #[must_use]
    pub const fn new(
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        timestamp: i64,
        nonce: u64,
    ) -> Self {
        Self {
            inputs,
            outputs,
            timestamp,
            nonce,
        }
    }

    /// Builds the coinbase transaction paying `reward` to `address`.
    #[must_use]
    pub fn coinbase(address: String, reward: u64, timestamp: i64, nonce: u64) -> Self {
        Self::new(vec![], vec![TxOutput::new(address, reward)], timestamp, nonce)
    }

    /// Builds a coinstake transaction: `input` spends a UTXO of `staker`,
    /// a zero-amount marker output comes first, and the staked amount is
    /// returned to `staker` as the second output.
    #[must_use]
    pub fn coinstake(
        input: TxInput,
        staker: String,
        staked_amount: u64,
        timestamp: i64,
        nonce: u64,
    ) -> Self {
        let outputs = vec![
            TxOutput::new(staker.clone(), 0),
            TxOutput::new(staker, staked_amount),
        ];
        Self::new(vec![input], outputs, timestamp, nonce)
    }

    /// Structural classification, per spec: coinbase / coinstake / normal.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        if self.inputs.is_empty() && self.outputs.len() == 1 {
            return TransactionKind::Coinbase;
        }
        if !self.inputs.is_empty() && self.outputs.len() >= 2 && self.outputs[0].amount == 0 {
            return TransactionKind::Coinstake;
        }
        TransactionKind::Normal
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        matches!(self.kind(), TransactionKind::Coinbase)
    }

    #[must_use]
    pub fn is_coinstake(&self) -> bool {
        matches!(self.kind(), TransactionKind::Coinstake)
    }

    /// Canonical SHA-256 hash over a fixed-key-order JSON encoding of
    /// `{inputs, outputs, timestamp, nonce}`. Stable across platforms
    /// because `serde_json` preserves field declaration order here and
    /// neither side uses a `HashMap`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be serialized, which
    /// should not happen for well-formed values of this type.
    pub fn hash(&self) -> crate::Result<Hash256> {
        canonical_hash(&self.inputs, &self.outputs, self.timestamp, self.nonce)
    }

    /// The hash a signer binds to: identical to `hash()` but computed
    /// with every input's `signature` field blanked out, avoiding the
    /// circularity of a signature having to cover itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be serialized.
    pub fn signing_hash(&self) -> crate::Result<Hash256> {
        let blanked: Vec<TxInput> = self
            .inputs
            .iter()
            .map(|input| TxInput::new(input.previous_tx, input.output_index, vec![]))
            .collect();
        canonical_hash(&blanked, &self.outputs, self.timestamp, self.nonce)
    }

    /// Structural validity: coinbase is trivially valid; every other
    /// non-coinbase input must carry a non-empty signature.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.is_coinbase() {
            return true;
        }
        if self.outputs.is_empty() {
            return false;
        }
        self.inputs.iter().all(|input| !input.signature.is_empty())
    }

    /// Sum of output amounts, saturating on overflow detection.
    #[must_use]
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.amount))
    }
}

fn canonical_hash(
    inputs: &[TxInput],
    outputs: &[TxOutput],
    timestamp: i64,
    nonce: u64,
) -> crate::Result<Hash256> {
    #[derive(Serialize)]
    struct Canonical<'a> {
        inputs: &'a [TxInput],
        outputs: &'a [TxOutput],
        timestamp: i64,
        nonce: u64,
    }
    let canonical = Canonical {
        inputs,
        outputs,
        timestamp,
        nonce,
    };
    let bytes = serde_json::to_vec(&canonical)
        .map_err(|e| crate::LedgerError::Serialization(e.to_string()))?;
    Ok(Hash256::sha256(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coinbase_is_classified_as_coinbase() {
        let tx = Transaction::coinbase("alice".into(), 12_500, 1_000, 0);
        assert_eq!(tx.kind(), TransactionKind::Coinbase);
        assert!(tx.is_valid());
    }

    #[test]
    fn coinstake_is_classified_as_coinstake() {
        let input = TxInput::new(Hash256::sha256(b"prev"), 0, vec![1, 2, 3]);
        let tx = Transaction::coinstake(input, "alice".into(), 500, 1_000, 0);
        assert_eq!(tx.kind(), TransactionKind::Coinstake);
        assert_eq!(tx.outputs[0].amount, 0);
        assert_eq!(tx.outputs[1].amount, 500);
    }

    #[test]
    fn normal_transaction_requires_signatures() {
        let unsigned = TxInput::new(Hash256::sha256(b"prev"), 0, vec![]);
        let tx = Transaction::new(
            vec![unsigned],
            vec![TxOutput::new("bob".into(), 10)],
            1_000,
            0,
        );
        assert_eq!(tx.kind(), TransactionKind::Normal);
        assert!(!tx.is_valid());
    }

    #[test]
    fn hash_is_deterministic_and_nonzero() {
        let tx = Transaction::coinbase("alice".into(), 12_500, 1_000, 0);
        let h1 = tx.hash().unwrap();
        let h2 = tx.hash().unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, Hash256::zero());
    }

    #[test]
    fn different_nonce_changes_hash() {
        let a = Transaction::coinbase("alice".into(), 12_500, 1_000, 0);
        let b = Transaction::coinbase("alice".into(), 12_500, 1_000, 1);
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn total_output_value_sums_outputs() {
        let tx = Transaction::new(
            vec![],
            vec![TxOutput::new("a".into(), 10), TxOutput::new("b".into(), 20)],
            0,
            0,
        );
        assert_eq!(tx.total_output_value(), Some(30));
    }
}
