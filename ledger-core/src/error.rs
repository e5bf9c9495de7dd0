use thiserror::Error;

/// Errors raised while validating a block or transaction against chain rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("one or more transactions in the block are invalid")]
    InvalidTransactions,

    #[error("block arrived before BLOCK_TIME elapsed since its parent")]
    BlockTooSoon,

    #[error("block's previous_hash does not match the current chain tip")]
    WrongParent,

    #[error("block index does not follow the chain tip")]
    WrongIndex,

    #[error("proof-of-work block submitted at or after POW_CUTOFF")]
    PowAfterCutoff,

    #[error("block difficulty does not match the expected retarget value")]
    BadDifficulty,

    #[error("block hash does not meet its declared difficulty")]
    BadProofOfWork,

    #[error("proof-of-stake block fails coinstake validation: {0}")]
    BadStake(String),

    #[error("genesis block does not match the fixed genesis")]
    InvalidGenesis,

    #[error("chain contains a broken parent-hash link at index {0}")]
    BrokenLink(u32),
}

/// Errors raised by ledger operations that mutate UTXOs or stake state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("address does not have enough spendable balance")]
    InsufficientFunds,

    #[error("address does not have enough balance to stake that amount")]
    InsufficientBalanceForStaking,

    #[error("address has no registered stake")]
    NoStake,

    #[error("address does not have that much staked")]
    InsufficientStake,

    #[error("stake amount is below MIN_STAKE_AMOUNT")]
    BelowMinimumStake,
}

/// Top-level ledger error, composing the validation and state taxonomies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
