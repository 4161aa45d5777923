//! Per-chain intake: dedup, kind enforcement, snapshot validation, then
//! hand-off to the flow handler.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::*;

use gridchain_flow::flow::AddOutcome;
use gridchain_flow::{BlockFlow, ValidationError};
use gridchain_primitives::group::ChainIndex;
use gridchain_state::id::BlockId;

use crate::message::{ChainMessage, CommitResult, FlowMessage};

/// Where an item sits in its intake lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemStatus {
    Received,
    Validating,
    Accepted,
    Rejected,
    PendingParent,
}

pub struct ChainHandlerState {
    chain: ChainIndex,

    /// Full chains take blocks, header-only chains take headers.
    full: bool,

    flow: Arc<RwLock<BlockFlow>>,
    flow_tx: mpsc::Sender<FlowMessage>,
    statuses: HashMap<BlockId, ItemStatus>,
}

impl ChainHandlerState {
    pub fn new(
        chain: ChainIndex,
        full: bool,
        flow: Arc<RwLock<BlockFlow>>,
        flow_tx: mpsc::Sender<FlowMessage>,
    ) -> Self {
        Self {
            chain,
            full,
            flow,
            flow_tx,
            statuses: HashMap::new(),
        }
    }

    pub fn status_of(&self, id: &BlockId) -> Option<ItemStatus> {
        self.statuses.get(id).copied()
    }
}

pub fn chain_handler_task(mut state: ChainHandlerState, mut rx: mpsc::Receiver<ChainMessage>) {
    while let Some(msg) = rx.blocking_recv() {
        process_msg(&mut state, msg);
    }
    debug!(chain = %state.chain, "chain handler exiting");
}

fn process_msg(state: &mut ChainHandlerState, msg: ChainMessage) {
    match msg {
        ChainMessage::AddBlock { block, origin } => {
            if !state.full {
                warn!(chain = %state.chain, ?origin, "got full block for header-only chain");
                return;
            }
            let id = block.hash();
            if !begin_item(state, id) {
                return;
            }

            // Snapshot validation against a possibly lagging flow; the
            // flow handler revalidates before commit.
            let precheck = state.flow.read().precheck_header(state.chain, &block.header);
            if let Err(e) = &precheck {
                if !matches!(e, ValidationError::UnknownParent(_)) {
                    warn!(chain = %state.chain, %id, err = %e, "rejecting block");
                    state.statuses.insert(id, ItemStatus::Rejected);
                    return;
                }
            }

            state.statuses.insert(id, ItemStatus::Validating);
            let (reply_tx, reply_rx) = oneshot::channel();
            let msg = FlowMessage::CommitBlock {
                chain: state.chain,
                block,
                reply: Some(reply_tx),
            };
            if state.flow_tx.blocking_send(msg).is_err() {
                warn!(chain = %state.chain, "flow handler gone");
                return;
            }
            finish_item(state, id, reply_rx);
        }

        ChainMessage::AddHeader { header, origin } => {
            if state.full {
                // A related chain wants bodies; a bare header is not
                // useful to it.
                warn!(chain = %state.chain, ?origin, "got bare header for full chain");
                return;
            }
            let id = header.hash();
            if !begin_item(state, id) {
                return;
            }

            let precheck = state.flow.read().precheck_header(state.chain, &header);
            if let Err(e) = &precheck {
                if !matches!(e, ValidationError::UnknownParent(_)) {
                    warn!(chain = %state.chain, %id, err = %e, "rejecting header");
                    state.statuses.insert(id, ItemStatus::Rejected);
                    return;
                }
            }

            state.statuses.insert(id, ItemStatus::Validating);
            let (reply_tx, reply_rx) = oneshot::channel();
            let msg = FlowMessage::CommitHeader {
                chain: state.chain,
                header,
                reply: Some(reply_tx),
            };
            if state.flow_tx.blocking_send(msg).is_err() {
                warn!(chain = %state.chain, "flow handler gone");
                return;
            }
            finish_item(state, id, reply_rx);
        }
    }
}

/// Dedup and intake.  Rejected and parked items may be retried.
fn begin_item(state: &mut ChainHandlerState, id: BlockId) -> bool {
    match state.statuses.get(&id) {
        Some(ItemStatus::Accepted) | Some(ItemStatus::Validating) => {
            trace!(chain = %state.chain, %id, "duplicate item");
            false
        }
        _ => {
            state.statuses.insert(id, ItemStatus::Received);
            true
        }
    }
}

fn finish_item(
    state: &mut ChainHandlerState,
    id: BlockId,
    reply_rx: oneshot::Receiver<CommitResult>,
) {
    let status = match reply_rx.blocking_recv() {
        Ok(Ok(AddOutcome::Added(info))) => {
            debug!(chain = %state.chain, %id, weight = info.weight, "item accepted");
            ItemStatus::Accepted
        }
        Ok(Ok(AddOutcome::AlreadyKnown)) => ItemStatus::Accepted,
        Ok(Err(ValidationError::UnknownParent(parent))) => {
            debug!(chain = %state.chain, %id, %parent, "parked pending parent");
            ItemStatus::PendingParent
        }
        Ok(Err(e)) => {
            warn!(chain = %state.chain, %id, err = %e, "item rejected by flow");
            ItemStatus::Rejected
        }
        Err(_) => {
            warn!(chain = %state.chain, %id, "flow handler dropped reply");
            ItemStatus::Rejected
        }
    };
    state.statuses.insert(id, status);
}
