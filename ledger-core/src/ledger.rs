//! The ledger engine: chain storage, the validation pipeline, hybrid
//! PoW/PoS consensus rules, difficulty retargeting, chain replacement,
//! and snapshot persistence. Everything else in this crate exists to
//! serve this module.

use crate::block::{Block, BlockKind};
use crate::config::{
    BLOCK_TIME_MS, DIFFICULTY_ADJUSTMENT_FACTOR, DIFFICULTY_ADJUSTMENT_INTERVAL, POS_BLOCK_REWARD,
    POW_BLOCK_REWARD, POW_CUTOFF,
};
use crate::error::{LedgerError, StateError, ValidationError};
use crate::mining::{spawn_worker, MiningJob, WorkerMessage};
use crate::stake::{StakeInfo, StakeRegistry, MIN_STAKE_AMOUNT};
use crate::transaction::{Transaction, TransactionKind, TxInput, TxOutput};
use crate::utxo::{Utxo, UtxoIndex};
use crate::Result;
use shared::KeyPair;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[must_use]
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// The replicated ledger: chain, mempool, UTXO index, and stake
/// registry. The node wraps this in `std::sync::Mutex` — the
/// "replace-mutex" that serializes every chain-mutating operation.
#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    utxo: UtxoIndex,
    stakes: StakeRegistry,
    snapshot_path: Option<PathBuf>,
}

impl Ledger {
    /// An in-memory ledger seeded with just the genesis block.
    ///
    /// # Errors
    ///
    /// Returns an error if the genesis block cannot be hashed.
    pub fn genesis() -> Result<Self> {
        let genesis = Block::genesis()?;
        let mut utxo = UtxoIndex::new();
        genesis.apply_to_utxo(&mut utxo);
        Ok(Self {
            chain: vec![genesis],
            pending: Vec::new(),
            utxo,
            stakes: StakeRegistry::new(),
            snapshot_path: None,
        })
    }

    /// Loads the ledger from `path`, writing a fresh genesis snapshot
    /// if the file does not exist yet. Any failure — I/O, malformed
    /// JSON, or a broken invariant — is fatal: a corrupt snapshot is
    /// never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` on I/O or structural failure.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut ledger = Self::genesis()?;
            ledger.snapshot_path = Some(path.to_path_buf());
            ledger.persist()?;
            return Ok(ledger);
        }

        let bytes = std::fs::read(path)
            .map_err(|e| LedgerError::Persistence(format!("reading snapshot: {e}")))?;
        let chain: Vec<Block> = serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::Persistence(format!("parsing snapshot: {e}")))?;

        validate_chain(&chain)?;
        let utxo = replay_utxo(&chain);

        Ok(Self {
            chain,
            pending: Vec::new(),
            utxo,
            stakes: StakeRegistry::new(),
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.chain)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        std::fs::write(path, bytes)
            .map_err(|e| LedgerError::Persistence(format!("writing snapshot: {e}")))?;
        Ok(())
    }

    #[must_use]
    pub fn latest_block(&self) -> &Block {
        self.chain.last().expect("chain always has a genesis block")
    }

    #[must_use]
    pub fn chain_snapshot(&self) -> &[Block] {
        &self.chain
    }

    #[must_use]
    pub fn pending_snapshot(&self) -> &[Transaction] {
        &self.pending
    }

    #[must_use]
    pub fn balance(&self, address: &str) -> u64 {
        self.utxo.balance(address)
    }

    /// Independently recomputed via full chain replay, for consistency
    /// checks against the incrementally maintained `balance`.
    #[must_use]
    pub fn total_balance(&self, address: &str) -> u64 {
        replay_utxo(&self.chain).balance(address)
    }

    #[must_use]
    pub fn get_stake(&self, address: &str) -> Option<StakeInfo> {
        self.stakes.get(address).copied()
    }

    #[must_use]
    pub fn is_chain_valid(&self) -> bool {
        validate_chain(&self.chain).is_ok()
    }

    /// Verifies `tx.is_valid()` and that it has at least one input and
    /// output, then appends it to the mempool.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTransactions` if the
    /// transaction is structurally invalid.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() || !tx.is_valid() {
            return Err(ValidationError::InvalidTransactions.into());
        }
        self.pending.push(tx);
        Ok(())
    }

    /// Selects UTXOs of `from` greedily until their sum covers `amount`,
    /// builds `[{to, amount}, {from, change}]` outputs (change omitted
    /// if zero), and signs each input with `signer`. Returns the
    /// transaction without adding it to the mempool.
    ///
    /// # Errors
    ///
    /// Returns `StateError::InsufficientFunds` if `from`'s UTXOs don't
    /// cover `amount`.
    pub fn create_transaction(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        signer: &KeyPair,
    ) -> Result<Transaction> {
        let candidates = self.utxo.for_address(from);
        let mut selected: Vec<&Utxo> = Vec::new();
        let mut total = 0u64;
        for utxo in candidates {
            selected.push(utxo);
            total = total.saturating_add(utxo.output.amount);
            if total >= amount {
                break;
            }
        }
        if total < amount {
            return Err(StateError::InsufficientFunds.into());
        }

        let mut outputs = vec![TxOutput::new(to.to_string(), amount)];
        let change = total - amount;
        if change > 0 {
            outputs.push(TxOutput::new(from.to_string(), change));
        }

        let timestamp = now_ms();
        let inputs: Vec<TxInput> = selected
            .iter()
            .map(|u| TxInput::new(u.tx_hash, u.output_index, vec![]))
            .collect();

        let mut tx = Transaction::new(inputs, outputs, timestamp, 0);
        let signing_hash = tx.signing_hash()?;
        for input in &mut tx.inputs {
            let signed = shared::SignedData::sign(signer, signing_hash.as_bytes())
                .map_err(|e| LedgerError::Serialization(e.to_string()))?;
            input.signature = serde_json::to_vec(&signed)
                .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        }
        Ok(tx)
    }

    /// Requires `amount >= MIN_STAKE_AMOUNT` and sufficient balance.
    /// Mines a locking transaction returning the staked amount to
    /// `address`, then registers the stake.
    ///
    /// # Errors
    ///
    /// Returns `StateError::BelowMinimumStake` or
    /// `StateError::InsufficientBalanceForStaking`.
    pub fn stake(&mut self, address: &str, amount: u64, signer: &KeyPair) -> Result<()> {
        if amount < MIN_STAKE_AMOUNT {
            return Err(StateError::BelowMinimumStake.into());
        }
        if self.balance(address) < amount {
            return Err(StateError::InsufficientBalanceForStaking.into());
        }

        let tx = self.create_transaction(address, address, amount, signer)?;
        self.add_transaction(tx)?;

        let now = now_ms();
        self.stakes.add(address, amount, now);
        Ok(())
    }

    /// Decrements a stake. Errors: `NoStake`, `InsufficientStake`.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn unstake(&mut self, address: &str, amount: u64) -> Result<()> {
        if self.stakes.get(address).is_none() {
            return Err(StateError::NoStake.into());
        }
        self.stakes
            .subtract(address, amount)
            .ok_or(StateError::InsufficientStake)?;
        Ok(())
    }

    /// Records a stake registered elsewhere (another node signed and
    /// locked the funds) for this node's own view of the registry — a
    /// peer `STAKE` gossip carries no private key, so it can only
    /// update bookkeeping, never create the locking transaction.
    pub fn observe_stake(&mut self, address: &str, amount: u64) {
        self.stakes.add(address, amount, now_ms());
    }

    /// The `UNSTAKE` counterpart of `observe_stake`.
    pub fn observe_unstake(&mut self, address: &str, amount: u64) {
        self.stakes.subtract(address, amount);
    }

    /// Validates and appends a locally produced block. Clears mempool
    /// entries now confirmed, applies the UTXO delta, and persists on
    /// success.
    ///
    /// # Errors
    ///
    /// See `ValidationError` variants for the full taxonomy.
    pub fn append_mined_block(&mut self, block: Block) -> Result<()> {
        validate_next_block(&self.chain, &self.utxo, &block)?;
        self.commit_block(block);
        self.persist()?;
        Ok(())
    }

    /// Same validation path as `append_mined_block`; a no-op if the
    /// block's hash is already present in the chain.
    ///
    /// # Errors
    ///
    /// See `append_mined_block`.
    pub fn try_append_peer_block(&mut self, block: Block) -> Result<()> {
        if self.chain.iter().any(|b| b.hash == block.hash) {
            return Ok(());
        }
        self.append_mined_block(block)
    }

    fn commit_block(&mut self, block: Block) {
        block.apply_to_utxo(&mut self.utxo);
        if let Some(coinstake) = block.coinstake() {
            if let TransactionKind::Coinstake = coinstake.kind() {
                let staker = coinstake.outputs[1].address.clone();
                self.stakes.record_win(&staker, block.timestamp);
            }
        }
        let included: std::collections::HashSet<String> = block
            .transactions
            .iter()
            .filter_map(|tx| tx.hash().ok().map(|h| h.to_hex()))
            .collect();
        self.pending.retain(|tx| {
            tx.hash()
                .map(|h| !included.contains(&h.to_hex()))
                .unwrap_or(true)
        });
        self.chain.push(block);
    }

    /// Accepts only chains strictly longer than the current one and
    /// passing full validation from genesis. On success: rebuilds the
    /// UTXO index by replay, drops mempool transactions now confirmed,
    /// and persists.
    ///
    /// # Errors
    ///
    /// Returns an error only if the new chain is longer but fails
    /// validation; a shorter-or-equal chain is a silent no-op (`Ok(false)`).
    pub fn replace_chain(&mut self, new_chain: Vec<Block>) -> Result<bool> {
        if new_chain.len() <= self.chain.len() {
            return Ok(false);
        }
        validate_chain(&new_chain)?;

        let new_utxo = replay_utxo(&new_chain);
        let included: std::collections::HashSet<String> = new_chain
            .iter()
            .flat_map(|b| &b.transactions)
            .filter_map(|tx| tx.hash().ok().map(|h| h.to_hex()))
            .collect();
        self.pending.retain(|tx| {
            tx.hash()
                .map(|h| !included.contains(&h.to_hex()))
                .unwrap_or(true)
        });

        self.chain = new_chain;
        self.utxo = new_utxo;
        self.persist()?;
        info!(len = self.chain.len(), "chain replaced");
        Ok(true)
    }

    /// Deterministic convenience used in tests and by the standalone
    /// miner's synchronous fallback: mines (PoW phase) or proposes
    /// (PoS phase) a block and appends it.
    ///
    /// # Errors
    ///
    /// Propagates mining/validation failures.
    pub fn mine_pending(&mut self, miner_address: &str, signer: &KeyPair) -> Result<Block> {
        if (self.chain.len() as u32) < POW_CUTOFF {
            let block = self.mine_pow_block(miner_address)?;
            self.append_mined_block(block.clone())?;
            return Ok(block);
        }

        if self.stakes.get(miner_address).is_none() {
            warn!(
                address = miner_address,
                "no stake registered, emitting transition PoW block"
            );
            let block = self.mine_pow_block(miner_address)?;
            self.append_mined_block(block.clone())?;
            return Ok(block);
        }

        match self.generate_stake_block(miner_address, signer)? {
            Some(block) => {
                self.append_mined_block(block.clone())?;
                Ok(block)
            }
            None => Err(LedgerError::Validation(ValidationError::BadStake(
                "not eligible to propose".to_string(),
            ))),
        }
    }

    fn mine_pow_block(&self, miner_address: &str) -> Result<Block> {
        let parent = self.latest_block();
        let index = u32::try_from(self.chain.len()).unwrap_or(u32::MAX);
        let difficulty = expected_difficulty(&self.chain);
        let min_timestamp = (parent.timestamp + BLOCK_TIME_MS + 1).max(now_ms());

        let job = MiningJob {
            index,
            miner_address: miner_address.to_string(),
            difficulty,
            previous_hash: parent.hash.clone(),
            pending_transactions: self.pending.clone(),
            min_timestamp,
        };
        let rx = spawn_worker(job);
        loop {
            match rx
                .recv()
                .map_err(|_| LedgerError::Persistence("miner worker disconnected".to_string()))?
            {
                WorkerMessage::Found(block) => return Ok(block),
                WorkerMessage::Error(e) => return Err(LedgerError::Serialization(e)),
                WorkerMessage::Progress { .. } => {}
            }
        }
    }

    /// Eligibility check plus weighted lottery, then coinstake assembly
    /// per the spec's selection rule. Returns `None` if the address is
    /// not eligible or does not win this attempt.
    ///
    /// # Errors
    ///
    /// Propagates errors from block construction.
    pub fn generate_stake_block(&self, address: &str, signer: &KeyPair) -> Result<Option<Block>> {
        let now = now_ms();
        let Some(info) = self.stakes.get(address) else {
            return Ok(None);
        };
        if !info.eligible_to_propose(now) {
            return Ok(None);
        }

        let probability = self.stakes.win_probability(address);
        let draw: f64 = rand::random();
        if draw > probability {
            return Ok(None);
        }

        let candidate = self
            .utxo
            .for_address(address)
            .into_iter()
            .find(|u| u.output.amount >= info.amount)
            .cloned();
        let Some(utxo) = candidate else {
            return Ok(None);
        };

        let coinstake_input = TxInput::new(utxo.tx_hash, utxo.output_index, vec![]);
        let mut coinstake =
            Transaction::coinstake(coinstake_input, address.to_string(), info.amount, now, 0);
        let signing_hash = coinstake.signing_hash()?;
        let signed = shared::SignedData::sign(signer, signing_hash.as_bytes())
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        coinstake.inputs[0].signature =
            serde_json::to_vec(&signed).map_err(|e| LedgerError::Serialization(e.to_string()))?;

        let coinbase = Transaction::coinbase(address.to_string(), POS_BLOCK_REWARD, now, 0);

        let mut transactions = vec![coinbase, coinstake];
        transactions.extend(self.pending.clone());

        let parent = self.latest_block();
        let index = u32::try_from(self.chain.len()).unwrap_or(u32::MAX);
        let timestamp = (parent.timestamp + BLOCK_TIME_MS + 1).max(now);
        let difficulty = expected_difficulty(&self.chain);

        let block = Block::new(
            index,
            timestamp,
            parent.hash.clone(),
            0,
            difficulty,
            transactions,
        )?;
        Ok(Some(block))
    }
}

/// Every `DIFFICULTY_ADJUSTMENT_INTERVAL` blocks, compares the time
/// taken over that window against the expected time and nudges
/// difficulty up or down (minimum 1). Chains shorter than the interval
/// return the genesis difficulty.
#[must_use]
pub fn expected_difficulty(chain: &[Block]) -> u8 {
    let interval = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
    if chain.len() <= interval {
        return crate::block::GENESIS_DIFFICULTY;
    }

    let head = &chain[chain.len() - 1];
    let reference = &chain[chain.len() - 1 - interval];
    let time_taken = head.timestamp - reference.timestamp;
    let time_expected = BLOCK_TIME_MS * i64::from(DIFFICULTY_ADJUSTMENT_INTERVAL);
    let current = i64::from(head.difficulty);

    let new_difficulty = if time_taken < time_expected / DIFFICULTY_ADJUSTMENT_FACTOR {
        current + 1
    } else if time_taken > time_expected * DIFFICULTY_ADJUSTMENT_FACTOR {
        (current - 1).max(1)
    } else {
        current
    };

    u8::try_from(new_difficulty.clamp(1, 64)).unwrap_or(1)
}

/// Full validation pipeline for one block at the tip of `chain`,
/// against `utxo_before` (the UTXO state prior to this block).
fn validate_next_block(chain: &[Block], utxo_before: &UtxoIndex, block: &Block) -> Result<()> {
    if !block.transactions.iter().all(Transaction::is_valid) {
        return Err(ValidationError::InvalidTransactions.into());
    }

    let parent = chain.last().ok_or(ValidationError::InvalidGenesis)?;
    if block.previous_hash != parent.hash {
        return Err(ValidationError::WrongParent.into());
    }
    let expected_index = u32::try_from(chain.len()).unwrap_or(u32::MAX);
    if block.index != expected_index {
        return Err(ValidationError::WrongIndex.into());
    }
    if block.timestamp - parent.timestamp < BLOCK_TIME_MS {
        return Err(ValidationError::BlockTooSoon.into());
    }

    match block.kind() {
        BlockKind::ProofOfWork => {
            if block.index >= POW_CUTOFF {
                return Err(ValidationError::PowAfterCutoff.into());
            }
            if block.difficulty != expected_difficulty(chain) {
                return Err(ValidationError::BadDifficulty.into());
            }
            if !block.meets_difficulty() {
                return Err(ValidationError::BadProofOfWork.into());
            }
        }
        BlockKind::ProofOfStake => {
            validate_coinstake(block, utxo_before)?;
        }
    }

    Ok(())
}

fn validate_coinstake(block: &Block, utxo_before: &UtxoIndex) -> Result<()> {
    let cs = block
        .coinstake()
        .ok_or_else(|| ValidationError::BadStake("missing coinstake".to_string()))?;
    if !matches!(cs.kind(), TransactionKind::Coinstake) {
        return Err(ValidationError::BadStake("second tx is not a coinstake".to_string()).into());
    }

    let staked_output = &cs.outputs[1];
    if staked_output.amount < MIN_STAKE_AMOUNT {
        return Err(ValidationError::BadStake("stake below minimum".to_string()).into());
    }

    let input = cs
        .inputs
        .first()
        .ok_or_else(|| ValidationError::BadStake("coinstake has no input".to_string()))?;
    let prev = utxo_before
        .get(&input.previous_tx, input.output_index)
        .ok_or_else(|| ValidationError::BadStake("referenced output not found".to_string()))?;

    if prev.output.amount != staked_output.amount || prev.output.address != staked_output.address
    {
        return Err(ValidationError::BadStake("referenced output mismatch".to_string()).into());
    }

    let now = now_ms();
    if now - prev.created_at_ms < crate::stake::MIN_STAKE_AGE_MS {
        return Err(ValidationError::BadStake("stake not mature".to_string()).into());
    }

    Ok(())
}

/// Full-chain validation: genesis equivalence, then every inter-block
/// link and per-block rule, replaying the UTXO index as it goes.
fn validate_chain(chain: &[Block]) -> Result<()> {
    let genesis = Block::genesis()?;
    let Some(first) = chain.first() else {
        return Err(ValidationError::InvalidGenesis.into());
    };
    if first != &genesis {
        return Err(ValidationError::InvalidGenesis.into());
    }

    let mut utxo = UtxoIndex::new();
    first.apply_to_utxo(&mut utxo);

    for i in 1..chain.len() {
        let prefix = &chain[..i];
        validate_next_block(prefix, &utxo, &chain[i])?;
        if chain[i].previous_hash != chain[i - 1].hash {
            return Err(ValidationError::BrokenLink(u32::try_from(i).unwrap_or(u32::MAX)).into());
        }
        chain[i].apply_to_utxo(&mut utxo);
    }

    Ok(())
}

/// Rebuilds the UTXO index from scratch by replaying every block.
#[must_use]
pub fn replay_utxo(chain: &[Block]) -> UtxoIndex {
    let mut utxo = UtxoIndex::new();
    for block in chain {
        block.apply_to_utxo(&mut utxo);
    }
    utxo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_only_chain_has_expected_shape() {
        let ledger = Ledger::genesis().unwrap();
        assert_eq!(ledger.chain_snapshot().len(), 1);
        let genesis = &ledger.chain_snapshot()[0];
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.index, 0);
        assert!(genesis.is_proof_of_work());
    }

    #[test]
    fn mining_pow_blocks_accrues_reward() {
        let mut ledger = Ledger::genesis().unwrap();
        let signer = KeyPair::generate();
        for _ in 0..5 {
            ledger.mine_pending("miner1", &signer).unwrap();
        }
        assert_eq!(ledger.chain_snapshot().len(), 6);
        assert_eq!(ledger.total_balance("miner1"), 5 * POW_BLOCK_REWARD);
        assert_eq!(ledger.balance("miner1"), ledger.total_balance("miner1"));
    }

    #[test]
    fn stake_below_minimum_fails() {
        let mut ledger = Ledger::genesis().unwrap();
        let signer = KeyPair::generate();
        let err = ledger.stake("nobody", 50, &signer).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::State(StateError::BelowMinimumStake)
        ));
    }

    #[test]
    fn stake_with_insufficient_balance_fails() {
        let mut ledger = Ledger::genesis().unwrap();
        let signer = KeyPair::generate();
        let err = ledger
            .stake("user_with_0_balance", 100, &signer)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::State(StateError::InsufficientBalanceForStaking)
        ));
    }

    #[test]
    fn replace_chain_rejects_shorter_or_equal() {
        let mut ledger = Ledger::genesis().unwrap();
        let current = ledger.chain_snapshot().to_vec();
        assert!(!ledger.replace_chain(current).unwrap());
    }

    #[test]
    fn try_append_peer_block_is_idempotent() {
        let mut ledger = Ledger::genesis().unwrap();
        let block = ledger.mine_pow_block("miner1").unwrap();
        ledger.append_mined_block(block.clone()).unwrap();
        // Re-delivering the same block is a silent no-op, not an error.
        ledger.try_append_peer_block(block).unwrap();
        assert_eq!(ledger.chain_snapshot().len(), 2);
    }

    #[test]
    fn replace_chain_accepts_a_longer_valid_chain_and_rebuilds_utxo() {
        let mut short = Ledger::genesis().unwrap();
        let signer = KeyPair::generate();
        for _ in 0..2 {
            short.mine_pending("miner1", &signer).unwrap();
        }

        let mut longer = Ledger::genesis().unwrap();
        for _ in 0..3 {
            longer.mine_pending("miner2", &signer).unwrap();
        }
        let longer_chain = longer.chain_snapshot().to_vec();

        assert!(short.replace_chain(longer_chain).unwrap());
        assert_eq!(short.chain_snapshot().len(), 4);
        assert_eq!(short.balance("miner2"), 3 * POW_BLOCK_REWARD);
        assert_eq!(short.balance("miner1"), 0);
    }

    #[test]
    fn transition_to_pos_after_pow_cutoff() {
        let mut ledger = Ledger::genesis().unwrap();
        let signer = KeyPair::generate();
        for _ in 0..(POW_CUTOFF as usize) {
            ledger.mine_pending("miner1", &signer).unwrap();
        }
        assert_eq!(ledger.chain_snapshot().len(), POW_CUTOFF as usize + 1);

        // `stake_start_ms = 0` simulates a stake registered long ago, so
        // eligibility (which gates on wall-clock age) is satisfied
        // without a test actually waiting out MIN_STAKE_AGE_MS in real
        // time.
        ledger.stakes.add("miner1", 100, 0);
        let head = ledger.mine_pending("miner1", &signer).unwrap();

        assert!(head.is_proof_of_stake());
        assert_eq!(ledger.get_stake("miner1").unwrap().amount, 100);
    }

    /// Builds a chain whose genesis block matches the fixed genesis in
    /// `index`/`previous_hash`/`timestamp` but carries an
    /// attacker-controlled coinbase and an unrelated `hash` string — the
    /// shape a pre-fix `validate_chain` accepted.
    fn forged_genesis_chain() -> Vec<Block> {
        let mut forged = Ledger::genesis().unwrap().chain_snapshot().to_vec();
        forged[0].transactions = vec![Transaction::coinbase(
            "attacker".to_string(),
            1_000_000_000,
            crate::block::GENESIS_TIMESTAMP_MS,
            0,
        )];
        forged[0].hash = "unrelated-forged-hash".to_string();
        // `replace_chain` only bothers validating a chain longer than the
        // current one, so pad with a second block; its content is
        // irrelevant since the genesis check rejects before it is ever
        // reached.
        forged.push(forged[0].clone());
        forged
    }

    #[test]
    fn replace_chain_rejects_a_forged_genesis() {
        let mut victim = Ledger::genesis().unwrap();
        let err = victim.replace_chain(forged_genesis_chain()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvalidGenesis)
        ));
        // the attacker's coinbase must never have been credited.
        assert_eq!(victim.balance("attacker"), 0);
    }

    #[test]
    fn load_or_init_rejects_a_tampered_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        let bytes = serde_json::to_vec_pretty(&forged_genesis_chain()).unwrap();
        std::fs::write(&path, bytes).unwrap();

        let err = Ledger::load_or_init(&path).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvalidGenesis)
        ));
    }

    #[test]
    fn invalid_previous_hash_is_rejected() {
        let mut ledger = Ledger::genesis().unwrap();
        let mut block = ledger.mine_pow_block("miner1").unwrap();
        block.previous_hash = "tampered".to_string();
        let err = ledger.append_mined_block(block).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::WrongParent)
        ));
    }
}
