//! End-to-end flow scenarios over a two-group grid.

use std::sync::Arc;

use ethnum::U256;

use gridchain_flow::{AddOutcome, BlockFlow, ValidationError, WindowedMeanRetarget};
use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::{BrokerConfig, ChainIndex, GroupIndex};
use gridchain_primitives::params::Params;
use gridchain_primitives::time::Timestamp;
use gridchain_state::deps::BlockDeps;
use gridchain_state::header::{BlockHeader, Nonce, Target};
use gridchain_state::id::BlockId;

fn params() -> Arc<Params> {
    let broker = BrokerConfig::new(0, 2, 2).unwrap();
    Arc::new(Params::standard(2, broker, GroupIndex(0)))
}

fn flow() -> BlockFlow {
    BlockFlow::new(params(), Box::new(WindowedMeanRetarget))
}

fn chain(from: u8, to: u8) -> ChainIndex {
    ChainIndex::new(from, to, 2).unwrap()
}

fn solve(mut header: BlockHeader) -> BlockHeader {
    while !header.pow_ok() {
        header.nonce = header.nonce.wrapping_next();
    }
    header
}

fn header_from_deps(deps: BlockDeps, target: Target, ts: u128) -> BlockHeader {
    solve(BlockHeader {
        deps,
        tx_merkle_root: Buf32::zero(),
        timestamp: Timestamp(ts),
        target,
        nonce: Nonce::zero(),
    })
}

fn mine_header(flow: &BlockFlow, chain: ChainIndex, ts: u128) -> BlockHeader {
    let tpl = flow.prepare_template(chain).unwrap();
    header_from_deps(tpl.deps, tpl.target, ts)
}

fn add(flow: &mut BlockFlow, chain: ChainIndex, header: &BlockHeader) -> u64 {
    match flow.add_header(chain, header).unwrap() {
        AddOutcome::Added(info) => info.weight,
        AddOutcome::AlreadyKnown => panic!("expected fresh block"),
    }
}

#[test]
fn test_sequential_two_group_weights() {
    let mut flow = flow();

    let order = [chain(0, 0), chain(1, 1), chain(0, 1), chain(0, 0)];
    let mut weights = Vec::new();
    for (i, c) in order.iter().enumerate() {
        let header = mine_header(&flow, *c, (i as u128 + 1) * 1000);
        weights.push(add(&mut flow, *c, &header));
    }

    assert_eq!(weights, vec![1, 2, 3, 4]);
}

#[test]
fn test_parallel_two_group_weights() {
    let mut flow = flow();
    let chains: Vec<ChainIndex> = ChainIndex::all(2).collect();

    let mut round_weights = Vec::new();
    for round in 0..3u128 {
        // All templates are prepared against the same tips, as parallel
        // miners would see them.
        let headers: Vec<BlockHeader> = chains
            .iter()
            .map(|c| mine_header(&flow, *c, (round + 1) * 1000))
            .collect();
        let weights: Vec<u64> = chains
            .iter()
            .zip(&headers)
            .map(|(c, h)| add(&mut flow, *c, h))
            .collect();
        round_weights.push(weights);
    }

    assert_eq!(round_weights[0], vec![1, 1, 1, 1]);
    assert_eq!(round_weights[2], vec![8, 8, 8, 8]);
}

#[test]
fn test_fork_tolerance() {
    let mut flow = flow();
    let c = chain(0, 0);

    let tpl = flow.prepare_template(c).unwrap();
    let b11 = header_from_deps(tpl.deps.clone(), tpl.target, 1000);
    let b12 = header_from_deps(tpl.deps, tpl.target, 2000);
    assert_ne!(b11.hash(), b12.hash());

    assert_eq!(add(&mut flow, c, &b11), 1);
    assert_eq!(add(&mut flow, c, &b12), 1);
    assert_eq!(flow.dag(c).tips_iter().count(), 2);

    let b13 = mine_header(&flow, c, 3000);
    assert_eq!(add(&mut flow, c, &b13), 2);
}

#[test]
fn test_weight_monotone_along_chain() {
    let mut flow = flow();
    let c = chain(0, 0);

    let mut prev = 0;
    for i in 1..=6u128 {
        let header = mine_header(&flow, c, i * 1000);
        let w = add(&mut flow, c, &header);
        assert!(w > prev);
        prev = w;
    }
}

#[test]
fn test_duplicate_add_reports_known() {
    let mut flow = flow();
    let c = chain(1, 0);
    let header = mine_header(&flow, c, 1000);

    add(&mut flow, c, &header);
    assert_eq!(
        flow.add_header(c, &header).unwrap(),
        AddOutcome::AlreadyKnown
    );
}

#[test]
fn test_unknown_parent_is_parkable() {
    let mut flow = flow();
    let c = chain(0, 0);

    let mut header = mine_header(&flow, c, 1000);
    let phantom = BlockId(Buf32::new([0xaa; 32]));
    let mut deps: Vec<BlockId> = header.deps.iter().copied().collect();
    deps[0] = phantom;
    header.deps = BlockDeps::build(deps, 2).unwrap();
    let header = solve(header);

    assert_eq!(
        flow.add_header(c, &header),
        Err(ValidationError::UnknownParent(phantom))
    );
}

#[test]
fn test_timestamp_must_advance() {
    let mut flow = flow();
    let c = chain(0, 0);

    let header = mine_header(&flow, c, 0);
    assert_eq!(
        flow.add_header(c, &header),
        Err(ValidationError::BadTimestamp)
    );
}

#[test]
fn test_pow_is_enforced() {
    let mut flow = flow();
    let c = chain(0, 0);

    let tpl = flow.prepare_template(c).unwrap();
    // An impossible target cannot have a matching nonce.
    let header = BlockHeader {
        deps: tpl.deps,
        tx_merkle_root: Buf32::zero(),
        timestamp: Timestamp(1000),
        target: Target(U256::ONE),
        nonce: Nonce::zero(),
    };
    assert_eq!(flow.add_header(c, &header), Err(ValidationError::BadPoW));
}

#[test]
fn test_accepted_blocks_satisfy_pow() {
    let mut flow = flow();
    for (i, c) in ChainIndex::all(2).enumerate() {
        let header = mine_header(&flow, c, (i as u128 + 1) * 500);
        assert!(header.hash_u256() < header.target.0);
        add(&mut flow, c, &header);
    }
}

#[test]
fn test_locators_and_inventories() {
    let mut f = flow();
    let c = chain(0, 0);

    let mut mined = Vec::new();
    for i in 1..=5u128 {
        let header = mine_header(&f, c, i * 1000);
        mined.push(*header.hash().inner());
        add(&mut f, c, &header);
    }

    let locators = f.get_sync_locators();
    assert_eq!(locators.len(), 4);
    // Tip first, genesis last.
    assert_eq!(locators[0][0], mined[4]);
    assert_eq!(
        *locators[0].last().unwrap(),
        *f.dag(c).genesis().inner()
    );

    // A fresh node asks with its own (genesis-only) locators and should be
    // told about everything we mined, oldest first.
    let empty = flow();
    let inventories = f.get_sync_inventories(&empty.get_sync_locators());
    assert_eq!(inventories[0], mined);
    assert!(inventories[1].is_empty());

    // A synced peer gets empty inventories on every chain.
    let synced = f.get_sync_inventories(&f.get_sync_locators());
    assert!(synced.iter().all(|inv| inv.is_empty()));
}
