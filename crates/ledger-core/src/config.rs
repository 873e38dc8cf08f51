use crate::constants::DEFAULT_BLOCK_REWARD;
use serde::Deserialize;

/// Knobs for the mining sequence.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Amount credited to the miner by each reward transaction.
    pub reward: u64,
    /// Proof-search threads; 1 keeps the search on the calling thread.
    pub workers: usize,
    /// Cap on candidates tried per search. `None` searches until found.
    pub max_iterations: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            reward: DEFAULT_BLOCK_REWARD,
            workers: 1,
            max_iterations: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: MinerConfig = serde_json::from_str(r#"{"workers":4}"#).unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.reward, 1);
        assert_eq!(cfg.max_iterations, None);
    }

    #[test]
    fn empty_config_is_default() {
        let cfg: MinerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, MinerConfig::default());
    }
}
