//! Blocks and the per-chain genesis.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{CodecError, Decode, Encode};
use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::hash;
use gridchain_primitives::time::Timestamp;

use crate::deps::BlockDeps;
use crate::header::{BlockHeader, Nonce, Target};
use crate::id::BlockId;
use crate::transaction::Transaction;

#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize, Arbitrary)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> BlockId {
        self.header.hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Whether the header's merkle root commits to this body.
    pub fn merkle_root_ok(&self) -> bool {
        compute_tx_merkle_root(&self.transactions) == self.header.tx_merkle_root
    }
}

impl Encode for Block {
    fn encode(&self, w: &mut Vec<u8>) {
        self.header.encode(w);
        self.transactions.encode(w);
    }
}

impl Decode for Block {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            header: BlockHeader::decode(r)?,
            transactions: Vec::decode(r)?,
        })
    }
}

/// Pairwise blake2b over the tx ids.  The odd leaf is duplicated, an empty
/// body hashes to zero.
pub fn compute_tx_merkle_root(txs: &[Transaction]) -> Buf32 {
    if txs.is_empty() {
        return Buf32::zero();
    }

    let mut level: Vec<Buf32> = txs.iter().map(|tx| *tx.id().inner()).collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(pair[0].as_slice());
            buf[32..].copy_from_slice(pair.last().unwrap().as_slice());
            next.push(hash::blake2b(&buf));
        }
        level = next;
    }
    level[0]
}

/// The deterministic genesis block of one chain.  The chain index is folded
/// into the nonce so every chain starts from a distinct hash.
pub fn genesis_block(chain: ChainIndex) -> Block {
    let mut nonce_bytes = [0u8; 32];
    nonce_bytes[0] = chain.from.value();
    nonce_bytes[1] = chain.to.value();
    Block {
        header: BlockHeader {
            deps: BlockDeps::genesis(),
            tx_merkle_root: Buf32::zero(),
            timestamp: Timestamp::zero(),
            target: Target::max(),
            nonce: Nonce(Buf32::new(nonce_bytes)),
        },
        transactions: Vec::new(),
    }
}

/// Genesis blocks for the whole grid, in canonical row-major order.
pub fn genesis_blocks(groups: u8) -> Vec<Block> {
    ChainIndex::all(groups).map(genesis_block).collect()
}
