//! End-to-end mesh behavior over an in-memory database.

use std::sync::Arc;

use tokio::sync::oneshot;

use gridchain_consensus::{AllHandlers, ChainMessage, FlowMessage, NodeEvent, Origin};
use gridchain_db::mem::MemDb;
use gridchain_db::traits::{ChainProvider, Database};
use gridchain_flow::flow::BlockFlowTemplate;
use gridchain_flow::WindowedMeanRetarget;
use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::{BrokerConfig, ChainIndex, GroupIndex};
use gridchain_primitives::params::Params;
use gridchain_primitives::time::Timestamp;
use gridchain_state::block::Block;
use gridchain_state::header::{BlockHeader, Nonce};
use gridchain_state::transaction::Transaction;

fn mesh() -> (AllHandlers, Arc<MemDb>) {
    let broker = BrokerConfig::new(0, 1, 2).unwrap();
    let params = Arc::new(Params::standard(2, broker, GroupIndex(0)));
    let db = Arc::new(MemDb::new());
    let handlers = AllHandlers::build(params, db.clone(), Box::new(WindowedMeanRetarget));
    (handlers, db)
}

fn chain(from: u8, to: u8) -> ChainIndex {
    ChainIndex::new(from, to, 2).unwrap()
}

fn template(handlers: &AllHandlers, chain: ChainIndex) -> BlockFlowTemplate {
    let (tx, rx) = oneshot::channel();
    handlers
        .flow_sender()
        .blocking_send(FlowMessage::PrepareTemplate { chain, reply: tx })
        .unwrap();
    rx.blocking_recv().unwrap().unwrap()
}

fn solve_block(tpl: BlockFlowTemplate, ts: u128, txs: Vec<Transaction>) -> Block {
    let mut header = BlockHeader {
        deps: tpl.deps,
        tx_merkle_root: gridchain_state::block::compute_tx_merkle_root(&txs),
        timestamp: Timestamp(ts),
        target: tpl.target,
        nonce: Nonce::zero(),
    };
    while !header.pow_ok() {
        header.nonce = header.nonce.wrapping_next();
    }
    Block {
        header,
        transactions: txs,
    }
}

fn wait_for_block(
    rx: &mut tokio::sync::broadcast::Receiver<NodeEvent>,
    want: ChainIndex,
) -> (u64, u64) {
    loop {
        match rx.blocking_recv().unwrap() {
            NodeEvent::BlockAdded {
                chain,
                height,
                weight,
                ..
            } if chain == want => return (height, weight),
            _ => continue,
        }
    }
}

#[test]
fn test_block_flows_through_mesh() {
    let (handlers, db) = mesh();
    let mut events = handlers.events().subscribe();

    let c = chain(0, 0);
    let coinbase = Transaction::coinbase(Buf32::new([1; 32]));
    let block = solve_block(template(&handlers, c), 1_000, vec![coinbase]);
    let id = block.hash();

    handlers
        .chain_sender(c)
        .blocking_send(ChainMessage::AddBlock {
            block,
            origin: Origin::Local,
        })
        .unwrap();

    let (height, weight) = wait_for_block(&mut events, c);
    assert_eq!(height, 1);
    assert_eq!(weight, 1);

    // Persisted with its chain record.
    let rec = db.chain_provider().get_block(&id).unwrap().unwrap();
    assert_eq!(rec.chain, c);
    let ids = db.chain_provider().get_hashes_at_height(c, 1).unwrap();
    assert_eq!(ids, vec![id]);
    let cursor = db.chain_provider().get_chain_state(c).unwrap().unwrap();
    assert_eq!(cursor.tip, id);

    handlers.shutdown();
}

#[test]
fn test_orphan_admitted_after_parent() {
    let (handlers, _db) = mesh();
    let mut events = handlers.events().subscribe();

    let c = chain(0, 0);
    let parent = solve_block(template(&handlers, c), 1_000, vec![]);

    // Build the child against a flow view that already has the parent,
    // without telling the handlers yet.
    let child = {
        let mut flow = gridchain_flow::BlockFlow::new(
            handlers.params().clone(),
            Box::new(WindowedMeanRetarget),
        );
        flow.add_block(c, &parent).unwrap();
        let tpl = flow.prepare_template(c).unwrap();
        solve_block(tpl, 2_000, vec![])
    };

    let sender = handlers.chain_sender(c);
    sender
        .blocking_send(ChainMessage::AddBlock {
            block: child.clone(),
            origin: Origin::Sync,
        })
        .unwrap();
    sender
        .blocking_send(ChainMessage::AddBlock {
            block: parent.clone(),
            origin: Origin::Sync,
        })
        .unwrap();

    // Parent lands first, then the parked child follows automatically.
    let (h1, _) = wait_for_block(&mut events, c);
    let (h2, _) = wait_for_block(&mut events, c);
    assert_eq!((h1, h2), (1, 2));

    assert!(handlers.flow().read().contains(&child.hash()));
    handlers.shutdown();
}

#[test]
fn test_header_only_chain_takes_headers() {
    let (handlers, db) = mesh();
    let mut events = handlers.events().subscribe();

    // Broker owns group 0 only, so (1, 1) is header-only.
    let c = chain(1, 1);
    let block = solve_block(template(&handlers, c), 1_000, vec![]);
    let header = block.header.clone();
    let id = header.hash();

    let sender = handlers.chain_sender(c);
    // A full block for a header-only chain is refused outright.
    sender
        .blocking_send(ChainMessage::AddBlock {
            block,
            origin: Origin::Sync,
        })
        .unwrap();
    sender
        .blocking_send(ChainMessage::AddHeader {
            header,
            origin: Origin::Sync,
        })
        .unwrap();

    let (height, _) = wait_for_block(&mut events, c);
    assert_eq!(height, 1);

    // Stored as a header record, not a block.
    assert!(db.chain_provider().get_block(&id).unwrap().is_none());
    assert!(db.chain_provider().get_header(&id).unwrap().is_some());
    handlers.shutdown();
}

#[test]
fn test_duplicate_blocks_are_deduped() {
    let (handlers, _db) = mesh();
    let mut events = handlers.events().subscribe();

    let c = chain(0, 1);
    let block = solve_block(template(&handlers, c), 1_000, vec![]);

    let sender = handlers.chain_sender(c);
    for _ in 0..3 {
        sender
            .blocking_send(ChainMessage::AddBlock {
                block: block.clone(),
                origin: Origin::Local,
            })
            .unwrap();
    }

    let (height, _) = wait_for_block(&mut events, c);
    assert_eq!(height, 1);

    // Mine a follow-up to prove exactly one copy was admitted.
    let next = solve_block(template(&handlers, c), 2_000, vec![]);
    sender
        .blocking_send(ChainMessage::AddBlock {
            block: next,
            origin: Origin::Local,
        })
        .unwrap();
    let (height, _) = wait_for_block(&mut events, c);
    assert_eq!(height, 2);

    handlers.shutdown();
}
