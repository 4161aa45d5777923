//! The miner against a live handler mesh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gridchain_consensus::{AllHandlers, NodeEvent};
use gridchain_db::mem::MemDb;
use gridchain_flow::WindowedMeanRetarget;
use gridchain_miner::FairMiner;
use gridchain_primitives::group::{BrokerConfig, ChainIndex, GroupIndex};
use gridchain_primitives::params::Params;
use gridchain_primitives::time::SystemClock;

#[test]
fn test_miner_produces_blocks_on_every_target_group() {
    let broker = BrokerConfig::new(0, 2, 2).unwrap();
    let params = Arc::new(Params::standard(2, broker, GroupIndex(0)));

    let db = Arc::new(MemDb::new());
    let handlers = AllHandlers::build(params.clone(), db, Box::new(WindowedMeanRetarget));
    let mut events = handlers.events().subscribe();

    let chain_txs = ChainIndex::all(2)
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

    // Wait for at least two blocks on each of the miner's chains.
    let mut seen = [0u32; 2];
    let deadline = Instant::now() + Duration::from_secs(30);
    while seen.iter().any(|n| *n < 2) {
        assert!(Instant::now() < deadline, "mining timed out, seen {seen:?}");
        match events.blocking_recv() {
            Ok(NodeEvent::BlockAdded { chain, .. }) if chain.from == GroupIndex(0) => {
                seen[chain.to.value() as usize] += 1;
            }
            Ok(_) => continue,
            Err(e) => panic!("event stream broke: {e}"),
        }
    }

    miner.stop();

    let counts = miner.mining_counts();
    assert!(counts.iter().all(|c| *c > 0), "counts {counts:?}");

    // Every accepted block satisfied its own target.
    {
        let flow = handlers.flow().read();
        for to in 0..2 {
            let chain = ChainIndex::new(0, to, 2).unwrap();
            let tip = flow.best_tip(chain);
            assert!(flow.height_of(&tip).unwrap() >= 2);
        }
    }

    miner.shutdown();
    handlers.shutdown();
}
