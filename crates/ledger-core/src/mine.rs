use crate::constants::PROOFS_PER_WORKER_WINDOW;
use crate::error::LedgerError;
use crate::pow::{is_valid_proof, ProofSearch};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};

/// Pool of `workers` proof-search threads, built once per miner.
pub fn proof_pool(workers: usize) -> Result<ThreadPool, LedgerError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?)
}

/// Searches proofs on `pool`. Candidates are scanned in consecutive windows
/// and the lowest valid candidate of the first window holding one wins, so
/// the result equals `pow::find_proof(reference)`.
pub fn find_proof_parallel(
    reference: u64,
    pool: &ThreadPool,
    search: &ProofSearch,
) -> Result<u64, LedgerError> {
    let workers = pool.current_num_threads();
    let limit = search.max_iterations.unwrap_or(u64::MAX);
    let window = PROOFS_PER_WORKER_WINDOW.saturating_mul(workers as u64);
    let mut start = 0u64;

    while start < limit {
        if search.cancel.is_cancelled() {
            debug!(reference, tried = start, "parallel proof search cancelled");
            return Err(LedgerError::SearchCancelled);
        }
        let end = start.saturating_add(window).min(limit);

        // A raised token ends the window early; the hit is re-checked below.
        let hit = pool.install(|| {
            (start..end)
                .into_par_iter()
                .find_first(|c| search.cancel.is_cancelled() || is_valid_proof(reference, *c))
        });

        if let Some(candidate) = hit {
            if is_valid_proof(reference, candidate) {
                info!(reference, proof = candidate, workers, "proof found");
                return Ok(candidate);
            }
            return Err(LedgerError::SearchCancelled);
        }
        start = end;
    }
    Err(LedgerError::SearchExhausted { limit })
}
