pub const HASH_SIZE: usize = 32;
/// Four leading zero hex characters.
pub const POW_DIFFICULTY_BITS: u32 = 16;
/// Candidates each parallel window hands to a single worker.
pub const PROOFS_PER_WORKER_WINDOW: u64 = 4096;
/// Sender recorded on block reward transactions.
pub const REWARD_SENDER: &str = "0";
pub const DEFAULT_BLOCK_REWARD: u64 = 1;
