use crate::error::LedgerError;
use crate::pow::is_valid_proof;
use crate::{now_millis, Block, BlockRecord, Hash, Transaction, GENESIS_PREVIOUS_HASH};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

/// First rule a candidate block breaks against its predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("index {found} does not follow {previous}")]
    IndexNotContiguous { previous: u64, found: u64 },
    #[error("previous hash of block {index} does not match its predecessor")]
    PreviousHashMismatch { index: u64 },
    #[error("proof {proof} does not solve reference proof {reference}")]
    InvalidProof { reference: u64, proof: u64 },
    #[error("timestamp {found} is not after {previous}")]
    TimestampNotIncreasing { previous: u64, found: u64 },
    #[error("genesis block is malformed")]
    MalformedGenesis,
}

/// Accepted blocks plus the transactions waiting for the next one.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    known_nodes: BTreeSet<String>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        let mut chain = Self {
            blocks: Vec::new(),
            pending: Vec::new(),
            known_nodes: BTreeSet::new(),
        };
        chain.construct_genesis();
        chain
    }

    fn construct_genesis(&mut self) {
        self.construct_block(0, GENESIS_PREVIOUS_HASH);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn known_nodes(&self) -> &BTreeSet<String> {
        &self.known_nodes
    }

    pub fn latest_block(&self) -> &Block {
        self.blocks.last().expect("chain always holds the genesis block")
    }

    /// Queue a transaction for the next block. No balance or double-spend
    /// checks are made.
    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> bool {
        self.pending.push(Transaction::new(sender, recipient, amount));
        true
    }

    /// Drop pending transactions queued after the first `len`.
    pub(crate) fn truncate_pending(&mut self, len: usize) {
        self.pending.truncate(len);
    }

    pub fn register_node(&mut self, address: impl Into<String>) -> bool {
        self.known_nodes.insert(address.into());
        true
    }

    // Current time, bumped past the tip so timestamps strictly increase.
    fn next_timestamp(&self) -> u64 {
        let now = now_millis();
        match self.blocks.last() {
            Some(tip) => now.max(tip.timestamp().saturating_add(1)),
            None => now,
        }
    }

    /// Block that `construct_block` would append, without touching the chain.
    pub fn prepare_block(&self, proof: u64, previous_hash: Hash) -> Block {
        Block::new(
            self.blocks.len() as u64,
            proof,
            previous_hash,
            self.pending.clone(),
            Some(self.next_timestamp()),
        )
    }

    /// Append a block built from the pending buffer and clear the buffer.
    /// The block is not validated.
    pub fn construct_block(&mut self, proof: u64, previous_hash: Hash) -> &Block {
        let block = Block::new(
            self.blocks.len() as u64,
            proof,
            previous_hash,
            std::mem::take(&mut self.pending),
            Some(self.next_timestamp()),
        );
        info!(
            index = block.index(),
            proof,
            txs = block.transactions().len(),
            "constructed block"
        );
        self.blocks.push(block);
        self.latest_block()
    }

    /// Validate `block` against the tip and append it. When the block carries
    /// the front of the pending buffer, those transactions are removed in the
    /// same step; a block built elsewhere consumed none of them and the buffer
    /// is kept. A rejected block leaves the chain and the buffer unchanged.
    pub fn commit_block(&mut self, block: Block) -> Result<&Block, LedgerError> {
        if let Err(reason) = Self::check_transition(&block, self.latest_block()) {
            warn!(index = block.index(), %reason, "rejected block");
            return Err(reason.into());
        }

        if self.pending.starts_with(block.transactions()) {
            self.pending.drain(..block.transactions().len());
        }
        info!(
            index = block.index(),
            hash = %hex::encode(block.content_hash()),
            "committed block"
        );
        self.blocks.push(block);
        Ok(self.latest_block())
    }

    /// Checks, in order: index contiguity, hash linkage, proof of work,
    /// strictly increasing timestamp.
    pub fn check_transition(candidate: &Block, previous: &Block) -> Result<(), Rejection> {
        if previous.index().checked_add(1) != Some(candidate.index()) {
            return Err(Rejection::IndexNotContiguous {
                previous: previous.index(),
                found: candidate.index(),
            });
        }
        if *candidate.previous_hash() != previous.content_hash() {
            return Err(Rejection::PreviousHashMismatch {
                index: candidate.index(),
            });
        }
        if !is_valid_proof(previous.proof(), candidate.proof()) {
            return Err(Rejection::InvalidProof {
                reference: previous.proof(),
                proof: candidate.proof(),
            });
        }
        if candidate.timestamp() <= previous.timestamp() {
            return Err(Rejection::TimestampNotIncreasing {
                previous: previous.timestamp(),
                found: candidate.timestamp(),
            });
        }
        Ok(())
    }

    pub fn is_valid_transition(candidate: &Block, previous: &Block) -> bool {
        Self::check_transition(candidate, previous).is_ok()
    }

    /// Audit the whole chain: genesis shape, then every adjacent pair.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let genesis = &self.blocks[0];
        if genesis.index() != 0
            || genesis.proof() != 0
            || *genesis.previous_hash() != GENESIS_PREVIOUS_HASH
            || !genesis.transactions().is_empty()
        {
            return Err(Rejection::MalformedGenesis.into());
        }
        for pair in self.blocks.windows(2) {
            Self::check_transition(&pair[1], &pair[0])?;
        }
        Ok(())
    }

    pub fn deserialize_block(record: BlockRecord) -> Result<Block, LedgerError> {
        Block::from_record(record)
    }
}
