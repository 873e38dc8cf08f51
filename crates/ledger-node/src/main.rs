mod constants;

use anyhow::Result;
use clap::Parser;
use constants::{DEFAULT_BLOCKS, DEFAULT_MINER};
use ledger_core::constants::DEFAULT_BLOCK_REWARD;
use ledger_core::pow::CancelToken;
use ledger_core::{BlockRecord, Ledger, LedgerError, MinerConfig, Transaction};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Mine blocks onto an in-memory ledger and print the chain")]
struct Args {
    /// Identifier credited with each block reward
    #[arg(long, default_value = DEFAULT_MINER)]
    miner: String,

    /// Number of blocks to mine
    #[arg(long, default_value_t = DEFAULT_BLOCKS)]
    blocks: u32,

    /// Amount paid to the miner per block
    #[arg(long, default_value_t = DEFAULT_BLOCK_REWARD)]
    reward: u64,

    /// Proof-search threads
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Candidates to try per block before giving up
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Transaction queued before mining, as sender:recipient:amount
    #[arg(long = "tx", value_parser = parse_tx)]
    txs: Vec<Transaction>,

    /// Peer address to record
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Print blocks as JSON records
    #[arg(long)]
    json: bool,
}

fn parse_tx(s: &str) -> Result<Transaction, String> {
    let mut parts = s.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(sender), Some(recipient), Some(amount))
            if !sender.is_empty() && !recipient.is_empty() =>
        {
            let amount = amount
                .parse::<u64>()
                .map_err(|e| format!("invalid amount {amount:?}: {e}"))?;
            Ok(Transaction::new(sender, recipient, amount))
        }
        _ => Err(format!("expected sender:recipient:amount, got {s:?}")),
    }
}

fn mine_blocks(
    mut ledger: Ledger,
    miner: &str,
    blocks: u32,
    cancel: &CancelToken,
) -> (Ledger, Option<LedgerError>) {
    for _ in 0..blocks {
        if let Err(err) = ledger.mine_with(miner, cancel) {
            return (ledger, Some(err));
        }
    }
    (ledger, None)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut ledger = Ledger::new(MinerConfig {
        reward: args.reward,
        workers: args.workers,
        max_iterations: args.max_iterations,
    });
    for peer in &args.peers {
        ledger.register_node(peer.as_str());
    }
    for tx in args.txs {
        ledger.submit_transaction(tx.sender, tx.recipient, tx.amount);
    }

    info!(miner = %args.miner, blocks = args.blocks, workers = args.workers, "mining started");
    let cancel = CancelToken::new();
    let mut mining = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        let miner = args.miner.clone();
        let blocks = args.blocks;
        move || mine_blocks(ledger, &miner, blocks, &cancel)
    });

    let (ledger, failure) = tokio::select! {
        joined = &mut mining => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, cancelling proof search");
            cancel.cancel();
            mining.await?
        }
    };

    let chain = ledger.chain();
    chain.validate()?;
    if args.json {
        let records: Vec<BlockRecord> = chain.blocks().iter().map(BlockRecord::from).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for block in chain.blocks() {
            println!("{block} - {}", hex::encode(block.content_hash()));
        }
    }

    match failure {
        Some(err) => Err(err.into()),
        None => {
            info!(height = chain.latest_block().index(), "mining finished");
            Ok(())
        }
    }
}
