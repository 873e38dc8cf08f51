use crate::chain::Rejection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("chain invalid: {0}")]
    ChainInvalid(#[from] Rejection),
    #[error("invalid block hash encoding: {0}")]
    InvalidHash(#[from] hex::FromHexError),
    #[error("proof search cancelled")]
    SearchCancelled,
    #[error("no proof found within {limit} candidates")]
    SearchExhausted { limit: u64 },
    #[error("failed to start proof workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
