//! The staking service: a `CHECK_FREQUENCY`-ticking task that attempts
//! to propose a PoS block, retrying once after a short delay on
//! failure.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledger_core::stake::STAKE_CHECK_INTERVAL_MS;
use ledger_core::{Ledger, Result as LedgerResult};
use shared::KeyPair;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::network::{self, Network};

const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct StakingService {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl StakingService {
    #[must_use]
    pub fn start(
        ledger: Arc<Mutex<Ledger>>,
        network: Arc<Network>,
        address: String,
        signer: KeyPair,
    ) -> Self {
        let (cancel, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(ledger, network, address, signer, cancel_rx));
        Self { cancel, handle }
    }

    pub fn stop(self) {
        let _ = self.cancel.send(true);
        self.handle.abort();
    }
}

async fn run_loop(
    ledger: Arc<Mutex<Ledger>>,
    network: Arc<Network>,
    address: String,
    signer: KeyPair,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let tick = Duration::from_millis(STAKE_CHECK_INTERVAL_MS as u64);
    loop {
        tokio::select! {
            () = tokio::time::sleep(tick) => {}
            _ = cancel_rx.changed() => {
                if *cancel_rx.borrow() {
                    return;
                }
            }
        }
        if *cancel_rx.borrow() {
            return;
        }

        if let Err(e) = attempt_proposal(&ledger, &network, &address, &signer) {
            warn!(error = %e, "stake proposal failed, retrying shortly");
            tokio::time::sleep(RETRY_DELAY).await;
            if let Err(e) = attempt_proposal(&ledger, &network, &address, &signer) {
                warn!(error = %e, "stake proposal retry failed, waiting for next tick");
            }
        }
    }
}

fn attempt_proposal(
    ledger: &Arc<Mutex<Ledger>>,
    network: &Arc<Network>,
    address: &str,
    signer: &KeyPair,
) -> LedgerResult<()> {
    let proposed = {
        let guard = ledger.lock().expect("ledger mutex poisoned");
        guard.generate_stake_block(address, signer)?
    };
    let Some(block) = proposed else {
        return Ok(());
    };
    {
        let mut guard = ledger.lock().expect("ledger mutex poisoned");
        guard.append_mined_block(block.clone())?;
    }
    info!(index = block.index, "proposed stake block");
    network::broadcast_block(network, block);
    Ok(())
}
