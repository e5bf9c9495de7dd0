//! Process-wide consensus constants. Kept as plain `const`s rather than
//! a runtime-configurable struct: these are protocol parameters, not
//! deployment knobs, and the root crate's CLI config wires around them.

/// Block index at which PoW is no longer accepted.
pub const POW_CUTOFF: u32 = 100;
/// Reward paid to a successful PoS block proposer.
pub const POS_BLOCK_REWARD: u64 = 10;
/// Reward paid to a successful PoW miner.
pub const POW_BLOCK_REWARD: u64 = 12_500;
/// Minimum spacing between consecutive blocks, in seconds.
pub const BLOCK_TIME_SECS: i64 = 600;
/// Minimum spacing between consecutive blocks, in milliseconds.
pub const BLOCK_TIME_MS: i64 = BLOCK_TIME_SECS * 1000;
/// Blocks between difficulty retarget evaluations.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u32 = 10;
/// Clamp factor for a single retarget step.
pub const DIFFICULTY_ADJUSTMENT_FACTOR: i64 = 4;
