//! Mining templates: a flow template wrapped with a body and timestamp.

use gridchain_flow::flow::BlockFlowTemplate;
use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::time::Timestamp;
use gridchain_state::block::{compute_tx_merkle_root, Block};
use gridchain_state::deps::BlockDeps;
use gridchain_state::header::{BlockHeader, Nonce, Target};
use gridchain_state::transaction::Transaction;

/// A block awaiting a valid nonce.
#[derive(Clone, Debug)]
pub struct BlockTemplate {
    pub chain: ChainIndex,
    pub deps: BlockDeps,
    pub target: Target,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
}

impl BlockTemplate {
    /// Wraps a flow template with a coinbase paying `lock_script_hash`
    /// plus any pooled transactions.
    pub fn new(
        flow_template: BlockFlowTemplate,
        lock_script_hash: Buf32,
        mut pooled: Vec<Transaction>,
        timestamp: Timestamp,
    ) -> Self {
        let mut transactions = vec![Transaction::coinbase(lock_script_hash)];
        transactions.append(&mut pooled);
        Self {
            chain: flow_template.chain,
            deps: flow_template.deps,
            target: flow_template.target,
            timestamp,
            transactions,
        }
    }

    pub fn header_with_nonce(&self, nonce: Nonce) -> BlockHeader {
        BlockHeader {
            deps: self.deps.clone(),
            tx_merkle_root: compute_tx_merkle_root(&self.transactions),
            timestamp: self.timestamp,
            target: self.target,
            nonce,
        }
    }

    pub fn into_block(self, nonce: Nonce) -> Block {
        let header = self.header_with_nonce(nonce);
        Block {
            header,
            transactions: self.transactions,
        }
    }
}
