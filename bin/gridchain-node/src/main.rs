//! Dev entry point: an in-memory broker with an optional local miner.
//!
//! The REST surface, wallet and on-disk engine are wired elsewhere; this
//! binary exists to run the core mesh on its own.

mod args;

use std::sync::Arc;

use tracing::*;

use gridchain_common::logging::{self, LoggerConfig};
use gridchain_consensus::AllHandlers;
use gridchain_db::mem::MemDb;
use gridchain_flow::WindowedMeanRetarget;
use gridchain_miner::FairMiner;
use gridchain_primitives::group::{BrokerConfig, ChainIndex, GroupIndex};
use gridchain_primitives::params::Params;
use gridchain_primitives::time::SystemClock;

fn main() {
    let args: args::Args = argh::from_env();
    logging::init(LoggerConfig::new("gridchain-node".into()));
    if let Err(e) = main_inner(args) {
        error!(err = %e, "node failed");
    }
    logging::finalize();
}

fn main_inner(args: args::Args) -> anyhow::Result<()> {
    let broker = BrokerConfig::new(args.broker_from, args.broker_until, args.groups)
        .map_err(|e| anyhow::anyhow!("bad broker range: {e}"))?;
    let params = Arc::new(Params::standard(
        args.groups,
        broker,
        GroupIndex(args.main_group),
    ));

    let db = Arc::new(MemDb::new());
    let handlers = AllHandlers::build(params.clone(), db, Box::new(WindowedMeanRetarget));
    info!(groups = params.groups(), "node started");

    let miner = if args.mine {
        let chain_txs = ChainIndex::all(params.groups())
            .map(|c| handlers.chain_sender(c))
            .collect();
        let miner = FairMiner::spawn(
            params.clone(),
            handlers.flow_sender(),
            chain_txs,
            Some(handlers.tx_sender()),
            handlers.events(),
            Arc::new(SystemClock),
        );
        miner.start();
        info!(main_group = %params.main_group(), "miner started");
        Some(miner)
    } else {
        None
    };

    wait_for_shutdown()?;

    info!("shutting down");
    if let Some(miner) = miner {
        miner.stop();
        miner.shutdown();
    }
    handlers.shutdown();
    Ok(())
}

fn wait_for_shutdown() -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        tokio::signal::ctrl_c().await?;
        Ok(())
    })
}
