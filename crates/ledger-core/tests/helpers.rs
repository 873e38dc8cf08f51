#![allow(dead_code)]

use ledger_core::{Ledger, MinerConfig};

pub fn mined_ledger(blocks: usize) -> Ledger {
    // Fixed miner identity so runs are comparable.
    let mut ledger = Ledger::new(MinerConfig::default());
    for i in 0..blocks {
        ledger.submit_transaction(format!("user-{i}"), format!("user-{}", i + 1), i as u64);
        ledger.mine("miner-1").expect("mining should succeed");
    }
    ledger
}
