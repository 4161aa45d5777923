//! Tagged message variants exchanged inside the mesh.  Replies travel on
//! oneshot channels instead of ask-style futures.

use tokio::sync::oneshot;

use gridchain_flow::flow::{AddOutcome, BlockFlowTemplate};
use gridchain_flow::FlowError;
use gridchain_flow::ValidationError;
use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::ChainIndex;
use gridchain_state::block::Block;
use gridchain_state::header::BlockHeader;
use gridchain_state::id::TxId;
use gridchain_state::transaction::Transaction;

use crate::errors::TxRejection;

/// Where an item came from, for reporting and peer scoring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Sync,
}

#[derive(Debug)]
pub enum ChainMessage {
    AddBlock { block: Block, origin: Origin },
    AddHeader { header: BlockHeader, origin: Origin },
}

pub type CommitResult = Result<AddOutcome, ValidationError>;

#[derive(Debug)]
pub enum FlowMessage {
    PrepareTemplate {
        chain: ChainIndex,
        reply: oneshot::Sender<Result<BlockFlowTemplate, FlowError>>,
    },
    CommitBlock {
        chain: ChainIndex,
        block: Block,
        reply: Option<oneshot::Sender<CommitResult>>,
    },
    CommitHeader {
        chain: ChainIndex,
        header: BlockHeader,
        reply: Option<oneshot::Sender<CommitResult>>,
    },
    GetLocators {
        reply: oneshot::Sender<Vec<Vec<Buf32>>>,
    },
    GetInventories {
        locators: Vec<Vec<Buf32>>,
        reply: oneshot::Sender<Vec<Vec<Buf32>>>,
    },
}

#[derive(Debug)]
pub enum TxMessage {
    SubmitTx {
        tx: Transaction,
        reply: oneshot::Sender<Result<TxId, TxRejection>>,
    },
    TakeReady {
        chain: ChainIndex,
        max: usize,
        reply: oneshot::Sender<Vec<Transaction>>,
    },
    BlockCommitted {
        txs: Vec<TxId>,
    },
}
