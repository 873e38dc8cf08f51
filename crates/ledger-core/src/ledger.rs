use crate::chain::Chain;
use crate::config::MinerConfig;
use crate::constants::REWARD_SENDER;
use crate::error::LedgerError;
use crate::mine::{find_proof_parallel, proof_pool};
use crate::pow::{find_proof_with, CancelToken, ProofSearch};
use crate::Block;
use rayon::ThreadPool;
use tracing::{info, warn};

/// Owns one chain and drives the accept → mine → append sequence.
#[derive(Debug, Default)]
pub struct Ledger {
    chain: Chain,
    config: MinerConfig,
    // Built on the first parallel search and reused after.
    pool: Option<ThreadPool>,
}

impl Ledger {
    pub fn new(config: MinerConfig) -> Self {
        Self {
            chain: Chain::new(),
            config,
            pool: None,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn submit_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> bool {
        self.chain.add_transaction(sender, recipient, amount)
    }

    pub fn register_node(&mut self, address: impl Into<String>) -> bool {
        self.chain.register_node(address)
    }

    pub fn mine(&mut self, miner: &str) -> Result<Block, LedgerError> {
        self.mine_with(miner, &CancelToken::new())
    }

    /// Find a proof against the tip, credit `miner` with the block reward and
    /// append the resulting block. The search is deterministic, so a block
    /// that fails validation is discarded and the rejection returned rather
    /// than searched for again.
    pub fn mine_with(&mut self, miner: &str, cancel: &CancelToken) -> Result<Block, LedgerError> {
        let search = ProofSearch::new(self.config.max_iterations, cancel.clone());
        let reference = self.chain.latest_block().proof();
        let proof = self.search(reference, &search)?;
        self.commit_mined(miner, proof)
    }

    /// Record the reward, then build and commit the block for `proof`. On
    /// rejection the reward is withdrawn so the buffer is as it was.
    fn commit_mined(&mut self, miner: &str, proof: u64) -> Result<Block, LedgerError> {
        let pending_before = self.chain.pending_transactions().len();
        self.chain.add_transaction(REWARD_SENDER, miner, self.config.reward);

        let previous_hash = self.chain.latest_block().content_hash();
        let candidate = self.chain.prepare_block(proof, previous_hash);
        match self.chain.commit_block(candidate) {
            Ok(block) => {
                info!(index = block.index(), proof, miner, "mined block");
                Ok(block.clone())
            }
            Err(err) => {
                warn!(proof, error = %err, "mined block discarded");
                self.chain.truncate_pending(pending_before);
                Err(err)
            }
        }
    }

    fn search(&mut self, reference: u64, search: &ProofSearch) -> Result<u64, LedgerError> {
        if self.config.workers <= 1 {
            return find_proof_with(reference, search);
        }
        let pool = match self.pool.take() {
            Some(pool) => pool,
            None => proof_pool(self.config.workers)?,
        };
        let found = find_proof_parallel(reference, &pool, search);
        self.pool = Some(pool);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rejection, Transaction};

    #[test]
    fn mining_sequence_end_to_end() {
        let mut ledger = Ledger::new(MinerConfig::default());
        let block = ledger.mine("Aaron Lucas").unwrap();

        let blocks = ledger.chain().blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(block, blocks[1]);
        assert_eq!(block.proof(), 88914);
        assert_eq!(*blocks[1].previous_hash(), blocks[0].content_hash());
        assert!(ledger.chain().pending_transactions().is_empty());
        assert!(Chain::is_valid_transition(&blocks[1], &blocks[0]));
        assert_eq!(
            blocks[1].transactions(),
            &[Transaction::new(REWARD_SENDER, "Aaron Lucas", 1)]
        );
    }

    #[test]
    fn submitted_transactions_precede_reward() {
        let mut ledger = Ledger::new(MinerConfig {
            reward: 50,
            ..MinerConfig::default()
        });
        assert!(ledger.submit_transaction("alice", "bob", 7));
        let block = ledger.mine("miner").unwrap();
        assert_eq!(
            block.transactions(),
            &[
                Transaction::new("alice", "bob", 7),
                Transaction::new(REWARD_SENDER, "miner", 50),
            ]
        );
    }

    #[test]
    fn parallel_workers_mine_the_same_proof() {
        let mut sequential = Ledger::new(MinerConfig::default());
        let mut parallel = Ledger::new(MinerConfig {
            workers: 4,
            ..MinerConfig::default()
        });
        let a = sequential.mine("m").unwrap();
        let b = parallel.mine("m").unwrap();
        assert_eq!(a.proof(), b.proof());
        parallel.chain().validate().unwrap();
    }

    #[test]
    fn capped_search_leaves_chain_untouched() {
        let mut ledger = Ledger::new(MinerConfig {
            max_iterations: Some(10),
            ..MinerConfig::default()
        });
        ledger.submit_transaction("alice", "bob", 1);
        let err = ledger.mine("miner").unwrap_err();
        assert!(matches!(err, LedgerError::SearchExhausted { limit: 10 }));
        assert_eq!(ledger.chain().blocks().len(), 1);
        assert_eq!(ledger.chain().pending_transactions().len(), 1);
    }

    #[test]
    fn cancelled_mining_returns_error() {
        let mut ledger = Ledger::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            ledger.mine_with("miner", &cancel),
            Err(LedgerError::SearchCancelled)
        ));
        assert_eq!(ledger.chain().blocks().len(), 1);
    }

    #[test]
    fn rejected_block_restores_pending() {
        let mut ledger = Ledger::default();
        ledger.submit_transaction("alice", "bob", 7);

        let err = ledger.commit_mined("miner", 88915).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ChainInvalid(Rejection::InvalidProof {
                reference: 0,
                proof: 88915
            })
        ));
        assert_eq!(ledger.chain().blocks().len(), 1);
        assert_eq!(
            ledger.chain().pending_transactions(),
            &[Transaction::new("alice", "bob", 7)]
        );

        // The next successful block pays exactly one reward.
        let block = ledger.mine("miner").unwrap();
        assert_eq!(
            block.transactions(),
            &[
                Transaction::new("alice", "bob", 7),
                Transaction::new(REWARD_SENDER, "miner", 1),
            ]
        );
    }

    #[test]
    fn worker_pool_is_reused_across_blocks() {
        let mut ledger = Ledger::new(MinerConfig {
            workers: 2,
            ..MinerConfig::default()
        });
        assert!(ledger.pool.is_none());
        ledger.mine("m").unwrap();
        let threads = ledger.pool.as_ref().map(|p| p.current_num_threads());
        assert_eq!(threads, Some(2));
        ledger.mine("m").unwrap();
        assert_eq!(ledger.chain().blocks()[2].proof(), 49714);
        ledger.chain().validate().unwrap();
    }

    #[test]
    fn rejection_error_names_reason() {
        let err = LedgerError::from(Rejection::InvalidProof {
            reference: 0,
            proof: 1,
        });
        assert_eq!(
            err.to_string(),
            "chain invalid: proof 1 does not solve reference proof 0"
        );
    }
}
