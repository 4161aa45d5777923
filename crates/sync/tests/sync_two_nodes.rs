//! Syncing a fresh broker from a populated peer.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gridchain_consensus::AllHandlers;
use gridchain_db::mem::MemDb;
use gridchain_flow::flow::AddOutcome;
use gridchain_flow::{BlockFlow, WindowedMeanRetarget};
use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::{BrokerConfig, ChainIndex, GroupIndex};
use gridchain_primitives::params::Params;
use gridchain_primitives::time::Timestamp;
use gridchain_state::block::{compute_tx_merkle_root, Block};
use gridchain_state::header::{BlockHeader, Nonce};
use gridchain_sync::{PeerSession, PeerState, SyncError, SyncPeer, SyncRequest, SyncResponse, SyncStatus, Synchronizer};

/// Serves sync traffic straight out of another node's flow and block map.
struct LoopbackPeer {
    flow: Arc<parking_lot::RwLock<BlockFlow>>,
    blocks: HashMap<Buf32, Block>,
}

impl SyncPeer for LoopbackPeer {
    fn exchange(&mut self, request: &SyncRequest) -> Result<SyncResponse, SyncError> {
        Ok(SyncResponse {
            inventories: self.flow.read().get_sync_inventories(&request.locators),
        })
    }

    fn fetch_block(
        &mut self,
        _chain: ChainIndex,
        hash: Buf32,
    ) -> Result<Option<Block>, SyncError> {
        Ok(self.blocks.get(&hash).cloned())
    }

    fn fetch_header(
        &mut self,
        _chain: ChainIndex,
        hash: Buf32,
    ) -> Result<Option<BlockHeader>, SyncError> {
        Ok(self.blocks.get(&hash).map(|b| b.header.clone()))
    }
}

fn params(broker_from: u8, broker_until: u8) -> Arc<Params> {
    let broker = BrokerConfig::new(broker_from, broker_until, 2).unwrap();
    Arc::new(Params::standard(2, broker, GroupIndex(broker_from)))
}

fn mine_on(flow: &mut BlockFlow, blocks: &mut HashMap<Buf32, Block>, chain: ChainIndex, ts: u128) {
    let tpl = flow.prepare_template(chain).unwrap();
    let mut header = BlockHeader {
        deps: tpl.deps,
        tx_merkle_root: compute_tx_merkle_root(&[]),
        timestamp: Timestamp(ts),
        target: tpl.target,
        nonce: Nonce::zero(),
    };
    while !header.pow_ok() {
        header.nonce = header.nonce.wrapping_next();
    }
    let block = Block {
        header,
        transactions: vec![],
    };
    match flow.add_block(chain, &block).unwrap() {
        AddOutcome::Added(_) => {}
        AddOutcome::AlreadyKnown => panic!("mined duplicate"),
    }
    blocks.insert(*block.hash().inner(), block);
}

#[test]
fn test_fresh_broker_syncs_from_peer() {
    // Peer node: a populated flow.
    let peer_params = params(0, 2);
    let mut peer_flow = BlockFlow::new(peer_params, Box::new(WindowedMeanRetarget));
    let mut peer_blocks = HashMap::new();
    let mut ts = 1_000u128;
    for round in 0..3 {
        for chain in ChainIndex::all(2) {
            mine_on(&mut peer_flow, &mut peer_blocks, chain, ts);
            ts += 500 + round as u128;
        }
    }
    let peer_flow = Arc::new(parking_lot::RwLock::new(peer_flow));
    let mut peer = LoopbackPeer {
        flow: peer_flow.clone(),
        blocks: peer_blocks,
    };

    // Local node: empty mesh, broker owning only group 0, so row (1,1) is
    // synced header-only.
    let local_params = params(0, 1);
    let db = Arc::new(MemDb::new());
    let handlers = AllHandlers::build(local_params.clone(), db, Box::new(WindowedMeanRetarget));
    let synchronizer = Synchronizer::new(
        local_params,
        handlers.flow().clone(),
        ChainIndex::all(2).map(|c| handlers.chain_sender(c)).collect(),
        handlers.flow_sender(),
    );

    let mut session = PeerSession::new();
    let mut synced = false;
    for _ in 0..20 {
        match synchronizer.run_round(&mut session, &mut peer).unwrap() {
            SyncStatus::Synced => {
                synced = true;
                break;
            }
            SyncStatus::Fetched(_) => {
                // Let the handlers drain before asking again.
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
    assert!(synced, "never reached synced state");
    assert_eq!(session.state(), PeerState::Synced);

    // Tips and weights agree with the peer on every chain.
    let local = handlers.flow().read();
    let remote = peer_flow.read();
    for chain in ChainIndex::all(2) {
        let remote_tip = remote.best_tip(chain);
        assert_eq!(local.best_tip(chain), remote_tip);
        assert_eq!(
            local.weight(&remote_tip).unwrap(),
            remote.weight(&remote_tip).unwrap()
        );
    }
    drop(local);

    handlers.shutdown();
}

#[test]
fn test_malformed_inventories_score_peer_down() {
    struct BadPeer;
    impl SyncPeer for BadPeer {
        fn exchange(&mut self, _request: &SyncRequest) -> Result<SyncResponse, SyncError> {
            Ok(SyncResponse {
                inventories: vec![vec![]],
            })
        }
        fn fetch_block(
            &mut self,
            _chain: ChainIndex,
            _hash: Buf32,
        ) -> Result<Option<Block>, SyncError> {
            Ok(None)
        }
        fn fetch_header(
            &mut self,
            _chain: ChainIndex,
            _hash: Buf32,
        ) -> Result<Option<BlockHeader>, SyncError> {
            Ok(None)
        }
    }

    let local_params = params(0, 2);
    let db = Arc::new(MemDb::new());
    let handlers = AllHandlers::build(local_params.clone(), db, Box::new(WindowedMeanRetarget));
    let synchronizer = Synchronizer::new(
        local_params,
        handlers.flow().clone(),
        ChainIndex::all(2).map(|c| handlers.chain_sender(c)).collect(),
        handlers.flow_sender(),
    );

    let mut session = PeerSession::new();
    let before = session.score();
    let err = synchronizer.run_round(&mut session, &mut BadPeer).unwrap_err();
    assert!(matches!(err, SyncError::Protocol(_)));
    assert!(session.score() < before);

    handlers.shutdown();
}
