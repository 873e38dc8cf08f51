pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::{Chain, Rejection};
pub use config::MinerConfig;
pub use error::LedgerError;
pub use ledger::Ledger;

pub type Hash = [u8; constants::HASH_SIZE];

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: Hash = [0u8; 32];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    fn encode_into(&self, bytes: &mut Vec<u8>) {
        encode_str(bytes, &self.sender);
        encode_str(bytes, &self.recipient);
        bytes.extend_from_slice(&self.amount.to_le_bytes());
    }
}

fn encode_str(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u64).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

/// Milliseconds since the Unix epoch. A clock set before 1970 reads as 0.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One ledger step. Fields are fixed at construction; the content hash is
/// derived on every call and never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    index: u64,
    proof: u64,
    previous_hash: Hash,
    transactions: Vec<Transaction>,
    timestamp: u64,
}

impl Block {
    /// Build a block. Without an explicit `timestamp` the current wall-clock
    /// time (milliseconds) is captured.
    pub fn new(
        index: u64,
        proof: u64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        timestamp: Option<u64>,
    ) -> Self {
        Self {
            index,
            proof,
            previous_hash,
            transactions,
            timestamp: timestamp.unwrap_or_else(now_millis),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn proof(&self) -> u64 {
        self.proof
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Canonical encoding fed to the digest. Field order is index, proof,
    /// previous hash, transactions, timestamp. Integers are u64 little-endian,
    /// strings and the transaction list are length-prefixed.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 8 + 32 + 8 + self.transactions.len() * 48 + 8);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.proof.to_le_bytes());
        bytes.extend_from_slice(&self.previous_hash);
        bytes.extend_from_slice(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            tx.encode_into(&mut bytes);
        }
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    pub fn content_hash(&self) -> Hash {
        sha256(&self.hash_bytes())
    }

    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            index: self.index,
            proof: self.proof,
            previous_hash: hex::encode(self.previous_hash),
            transactions: self.transactions.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Rebuild a block from its external record, keeping the recorded timestamp.
    pub fn from_record(record: BlockRecord) -> Result<Self, LedgerError> {
        let mut previous_hash = [0u8; 32];
        hex::decode_to_slice(&record.previous_hash, &mut previous_hash)?;
        Ok(Self {
            index: record.index,
            proof: record.proof,
            previous_hash,
            transactions: record.transactions,
            timestamp: record.timestamp,
        })
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {} - {} txs - {}",
            self.index,
            self.proof,
            hex::encode(self.previous_hash),
            self.transactions.len(),
            self.timestamp
        )
    }
}

/// Field set a transport or storage layer exchanges for a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub index: u64,
    pub proof: u64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
    pub timestamp: u64,
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        block.to_record()
    }
}

impl TryFrom<BlockRecord> for Block {
    type Error = LedgerError;

    fn try_from(record: BlockRecord) -> Result<Self, Self::Error> {
        Block::from_record(record)
    }
}

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub mod pow {
    use super::{sha256, Hash};
    use crate::constants::POW_DIFFICULTY_BITS;
    use crate::error::LedgerError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tracing::debug;

    /// Shared flag that stops a running proof search.
    #[derive(Clone, Debug, Default)]
    pub struct CancelToken(Arc<AtomicBool>);

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Bounds for a proof search. The default is unbounded and never cancelled.
    #[derive(Clone, Debug, Default)]
    pub struct ProofSearch {
        pub max_iterations: Option<u64>,
        pub cancel: CancelToken,
    }

    impl ProofSearch {
        pub fn new(max_iterations: Option<u64>, cancel: CancelToken) -> Self {
            Self {
                max_iterations,
                cancel,
            }
        }
    }

    /// Digest of the candidate's decimal text followed by the reference's.
    pub fn proof_digest(reference: u64, candidate: u64) -> Hash {
        sha256(format!("{candidate}{reference}").as_bytes())
    }

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }

    /// True when the digest starts with four zero hex characters.
    pub fn is_valid_proof(reference: u64, candidate: u64) -> bool {
        count_leading_zero_bits(&proof_digest(reference, candidate)) >= POW_DIFFICULTY_BITS
    }

    /// Lowest candidate, counting up from 0, that satisfies `is_valid_proof`.
    /// Runs until one is found.
    pub fn find_proof(reference: u64) -> u64 {
        let mut candidate = 0u64;
        while !is_valid_proof(reference, candidate) {
            candidate = candidate.wrapping_add(1);
        }
        candidate
    }

    /// `find_proof` with an iteration cap and a cancellation check on every
    /// candidate.
    pub fn find_proof_with(reference: u64, search: &ProofSearch) -> Result<u64, LedgerError> {
        let limit = search.max_iterations.unwrap_or(u64::MAX);
        for candidate in 0..limit {
            if search.cancel.is_cancelled() {
                debug!(reference, tried = candidate, "proof search cancelled");
                return Err(LedgerError::SearchCancelled);
            }
            if is_valid_proof(reference, candidate) {
                debug!(reference, proof = candidate, "proof found");
                return Ok(candidate);
            }
        }
        Err(LedgerError::SearchExhausted { limit })
    }
}
