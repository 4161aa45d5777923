//! Wire round-trips over generated values.

use gridchain_primitives::codec::{Decode, Encode};
use gridchain_state::block::Block;
use gridchain_state::header::BlockHeader;
use gridchain_state::transaction::{Transaction, TxOutputPoint};
use gridchain_test_utils::ArbitraryGenerator;

fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug>(v: &T) {
    let bytes = v.encode_to_vec();
    let back = T::decode_exact(&bytes).unwrap();
    assert_eq!(&back, v);
}

#[test]
fn test_output_point_roundtrip() {
    for seed in 0..32u64 {
        let gen = ArbitraryGenerator::new_with_seed(seed, 4096);
        let op: TxOutputPoint = gen.generate();
        roundtrip(&op);
    }
}

#[test]
fn test_transaction_roundtrip() {
    for seed in 0..32u64 {
        let gen = ArbitraryGenerator::new_with_seed(seed, 64 * 1024);
        let tx: Transaction = gen.generate();
        roundtrip(&tx);
    }
}

#[test]
fn test_header_roundtrip() {
    for seed in 0..32u64 {
        let gen = ArbitraryGenerator::new_with_seed(seed, 64 * 1024);
        let header: BlockHeader = gen.generate();
        roundtrip(&header);
    }
}

#[test]
fn test_block_roundtrip() {
    for seed in 0..16u64 {
        let gen = ArbitraryGenerator::new_with_seed(seed, 128 * 1024);
        let block: Block = gen.generate();
        roundtrip(&block);
    }
}

#[test]
fn test_header_hash_survives_roundtrip() {
    let gen = ArbitraryGenerator::new();
    let header: BlockHeader = gen.generate();
    let decoded = BlockHeader::decode_exact(&header.encode_to_vec()).unwrap();
    assert_eq!(decoded.hash(), header.hash());
}
