//! The async owner of the PoW search: starts the synchronous worker on
//! a blocking thread, bridges its messages into tokio, and drives the
//! start/stop/schedule-next-round lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use ledger_core::config::{BLOCK_TIME_MS, POW_CUTOFF};
use ledger_core::{Ledger, MiningJob, WorkerMessage};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::network::{self, Network};

#[must_use]
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// A running miner; dropping this without calling `stop` leaves the
/// background task running until the process exits.
pub struct Miner {
    cancel: watch::Sender<bool>,
    active_worker: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    handle: JoinHandle<()>,
}

impl Miner {
    /// Starts mining iff `chain.len() < POW_CUTOFF`, as `miner_address`.
    #[must_use]
    pub fn start(ledger: Arc<Mutex<Ledger>>, network: Arc<Network>, miner_address: String) -> Self {
        let (cancel, cancel_rx) = watch::channel(false);
        let active_worker = Arc::new(Mutex::new(None));
        let handle = tokio::spawn(run_loop(
            ledger,
            network,
            miner_address,
            cancel_rx,
            Arc::clone(&active_worker),
        ));
        Self {
            cancel,
            active_worker,
            handle,
        }
    }

    /// Cancels any pending schedule and signals the current worker
    /// thread's cancel flag, so an in-progress nonce search abandons
    /// itself at its next loop iteration instead of grinding to
    /// completion after the result is discarded.
    pub fn stop(self) {
        let _ = self.cancel.send(true);
        if let Some(worker_cancel) = self.active_worker.lock().expect("active_worker mutex poisoned").as_ref() {
            worker_cancel.store(true, Ordering::Relaxed);
        }
        self.handle.abort();
    }
}

/// Moves the worker's synchronous `std::sync::mpsc::Receiver` onto a
/// blocking thread and forwards every message into a tokio channel,
/// returning the worker's cancel flag alongside.
fn bridge_worker(job: MiningJob) -> (mpsc::Receiver<WorkerMessage>, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::channel(64);
    let (std_rx, cancel) = ledger_core::spawn_worker(job);
    tokio::task::spawn_blocking(move || {
        for message in std_rx {
            if tx.blocking_send(message).is_err() {
                break;
            }
        }
    });
    (rx, cancel)
}

async fn run_loop(
    ledger: Arc<Mutex<Ledger>>,
    network: Arc<Network>,
    miner_address: String,
    mut cancel_rx: watch::Receiver<bool>,
    active_worker: Arc<Mutex<Option<Arc<AtomicBool>>>>,
) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }

        let (chain_len, head_timestamp) = {
            let guard = ledger.lock().expect("ledger mutex poisoned");
            (guard.chain_snapshot().len() as u32, guard.latest_block().timestamp)
        };
        if chain_len >= POW_CUTOFF {
            info!("pow cutoff reached, miner stopping itself");
            return;
        }

        let delta = now_ms() - head_timestamp;
        if delta < BLOCK_TIME_MS {
            let wait_ms = (BLOCK_TIME_MS - delta).max(0) as u64;
            tokio::time::sleep(std::time::Duration::from_millis(wait_ms)).await;
        }
        if *cancel_rx.borrow() {
            return;
        }

        let job = {
            let guard = ledger.lock().expect("ledger mutex poisoned");
            let parent = guard.latest_block();
            MiningJob {
                index: chain_len,
                miner_address: miner_address.clone(),
                difficulty: ledger_core::expected_difficulty(guard.chain_snapshot()),
                previous_hash: parent.hash.clone(),
                pending_transactions: guard.pending_snapshot().to_vec(),
                min_timestamp: (parent.timestamp + BLOCK_TIME_MS + 1).max(now_ms()),
            }
        };

        let (mut rx, worker_cancel) = bridge_worker(job);
        *active_worker.lock().expect("active_worker mutex poisoned") = Some(Arc::clone(&worker_cancel));

        let mut produced = None;
        while let Some(message) = rx.recv().await {
            match message {
                WorkerMessage::Found(block) => {
                    produced = Some(block);
                    break;
                }
                WorkerMessage::Error(e) => {
                    warn!(error = %e, "mining worker failed");
                    break;
                }
                WorkerMessage::Progress { nonce } => debug!(nonce, "mining progress"),
            }
        }

        *active_worker.lock().expect("active_worker mutex poisoned") = None;

        if *cancel_rx.borrow() {
            return;
        }

        if let Some(block) = produced {
            let result = {
                let mut guard = ledger.lock().expect("ledger mutex poisoned");
                guard.append_mined_block(block.clone())
            };
            match result {
                Ok(()) => {
                    info!(index = block.index, "mined block");
                    network::broadcast_block(&network, block);
                }
                Err(e) => warn!(error = %e, "failed to submit mined block"),
            }
        }
    }
}
