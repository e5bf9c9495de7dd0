//! The synchronous PoW worker contract: given an immutable job
//! description, search for a winning nonce on a dedicated thread and
//! report progress/result over a channel. Deliberately free of any
//! async runtime dependency — the root crate's `miner` module bridges
//! this into tokio.

use crate::block::Block;
use crate::config::POW_BLOCK_REWARD;
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// How often (in attempts) the worker reports progress.
const PROGRESS_INTERVAL: u64 = 100_000;

/// Everything the worker needs to search for a block; it shares no
/// memory with the ledger beyond this snapshot.
#[derive(Debug, Clone)]
pub struct MiningJob {
    pub index: u32,
    pub miner_address: String,
    pub difficulty: u8,
    pub previous_hash: String,
    pub pending_transactions: Vec<Transaction>,
    pub min_timestamp: i64,
}

/// Messages the worker emits on its one-way channel.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Progress { nonce: u64 },
    Found(Block),
    Error(String),
}

#[must_use]
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Spawns the worker thread, returning the receiving end of its
/// message channel and a cancellation flag the caller can set to make
/// the worker abandon its nonce search at the next loop iteration
/// (checked every attempt, so cancellation is near-immediate rather
/// than waiting on the next `PROGRESS_INTERVAL`).
#[must_use]
pub fn spawn_worker(job: MiningJob) -> (Receiver<WorkerMessage>, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    thread::spawn(move || run_worker(job, &tx, &worker_cancel));
    (rx, cancel)
}

fn run_worker(job: MiningJob, tx: &Sender<WorkerMessage>, cancel: &AtomicBool) {
    let timestamp = now_ms().max(job.min_timestamp);

    let coinbase = Transaction::coinbase(job.miner_address, POW_BLOCK_REWARD, timestamp, 0);
    let mut transactions = Vec::with_capacity(job.pending_transactions.len() + 1);
    transactions.push(coinbase);
    transactions.extend(job.pending_transactions);

    let mut nonce: u64 = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }

        let block = match Block::new(
            job.index,
            timestamp,
            job.previous_hash.clone(),
            nonce,
            job.difficulty,
            transactions.clone(),
        ) {
            Ok(block) => block,
            Err(e) => {
                let _ = tx.send(WorkerMessage::Error(e.to_string()));
                return;
            }
        };

        if block.meets_difficulty() {
            let _ = tx.send(WorkerMessage::Found(block));
            return;
        }

        nonce += 1;
        if nonce % PROGRESS_INTERVAL == 0 && tx.send(WorkerMessage::Progress { nonce }).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_finds_a_block_at_low_difficulty() {
        let job = MiningJob {
            index: 1,
            miner_address: "miner1".to_string(),
            difficulty: 1,
            previous_hash: "0".to_string(),
            pending_transactions: vec![],
            min_timestamp: 0,
        };
        let (rx, _cancel) = spawn_worker(job);
        let mut found = None;
        while let Ok(msg) = rx.recv() {
            match msg {
                WorkerMessage::Found(block) => {
                    found = Some(block);
                    break;
                }
                WorkerMessage::Error(e) => panic!("worker errored: {e}"),
                WorkerMessage::Progress { .. } => {}
            }
        }
        let block = found.expect("worker should find a block");
        assert!(block.meets_difficulty());
        assert!(block.coinbase().unwrap().is_coinbase());
    }

    #[test]
    fn cancel_flag_stops_the_worker_without_a_result() {
        let job = MiningJob {
            index: 1,
            miner_address: "miner1".to_string(),
            difficulty: u8::MAX,
            previous_hash: "0".to_string(),
            pending_transactions: vec![],
            min_timestamp: 0,
        };
        let (rx, cancel) = spawn_worker(job);
        cancel.store(true, Ordering::Relaxed);

        for msg in rx {
            assert!(
                !matches!(msg, WorkerMessage::Found(_)),
                "cancelled worker must not report a found block"
            );
        }
    }
}
