pub mod block;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mining;
pub mod stake;
pub mod transaction;
pub mod utxo;

pub use block::{Block, BlockKind};
pub use error::{LedgerError, Result, StateError, ValidationError};
pub use ledger::{expected_difficulty, replay_utxo, Ledger};
pub use mining::{spawn_worker, MiningJob, WorkerMessage};
pub use stake::{StakeInfo, StakeRegistry};
pub use transaction::{Transaction, TransactionKind, TxInput, TxOutput};
pub use utxo::{Utxo, UtxoIndex};

pub use shared::{Hash256, KeyPair};
