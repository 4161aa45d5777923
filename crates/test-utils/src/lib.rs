//! Test helpers shared across crates.

use arbitrary::{Arbitrary, Unstructured};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::time::Timestamp;
use gridchain_state::block::genesis_block;
use gridchain_state::block::Block;

const ARB_GEN_LEN: usize = 16 * 1024;

/// Deterministic source of arbitrary values for fixtures.
pub struct ArbitraryGenerator {
    buf: Vec<u8>,
}

impl ArbitraryGenerator {
    pub fn new() -> Self {
        Self::new_with_size(ARB_GEN_LEN)
    }

    pub fn new_with_size(n: usize) -> Self {
        Self::new_with_seed(0x67726964, n)
    }

    pub fn new_with_seed(seed: u64, n: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buf = vec![0; n];
        rng.fill_bytes(&mut buf);
        Self { buf }
    }

    pub fn generate<'a, T: Arbitrary<'a>>(&'a self) -> T {
        let mut u = Unstructured::new(&self.buf);
        T::arbitrary(&mut u).expect("test-utils: generate arbitrary")
    }
}

impl Default for ArbitraryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A linear run of dummy blocks above a chain's genesis.  Headers link by
/// timestamp only, for structure-level tests that don't validate.
pub fn gen_chain_blocks(chain: ChainIndex, len: usize) -> Vec<Block> {
    let mut out = Vec::with_capacity(len);
    let mut block = genesis_block(chain);
    for i in 0..len {
        block.header.timestamp = Timestamp((i as u128 + 1) * 1_000);
        out.push(block.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::buf::Buf32;

    #[test]
    fn test_generator_is_deterministic() {
        let a: Buf32 = ArbitraryGenerator::new().generate();
        let b: Buf32 = ArbitraryGenerator::new().generate();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gen_chain_blocks() {
        let chain = ChainIndex::new(0, 1, 2).unwrap();
        let blocks = gen_chain_blocks(chain, 3);
        assert_eq!(blocks.len(), 3);
    }
}
