pub(crate) const DEFAULT_MINER: &str = "miner";
pub(crate) const DEFAULT_BLOCKS: u32 = 1;
