//! Pulls missing chain data from one peer and funnels it through the
//! chain handlers.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::*;

use gridchain_consensus::{ChainMessage, FlowMessage, Origin};
use gridchain_flow::BlockFlow;
use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::params::Params;
use gridchain_state::block::Block;
use gridchain_state::header::BlockHeader;

use crate::messages::{SyncRequest, SyncResponse};
use crate::session::PeerSession;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("peer disconnected")]
    Disconnected,

    #[error("malformed peer message: {0}")]
    Protocol(&'static str),

    #[error("local handler gone")]
    HandlerGone,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// The peer had nothing new on any chain.
    Synced,
    /// Items were fetched and handed to the chain handlers.
    Fetched(usize),
}

/// The remote side of a sync session, as the core sees it.  The transport
/// below the message boundary lives elsewhere.
pub trait SyncPeer {
    fn exchange(&mut self, request: &SyncRequest) -> Result<SyncResponse, SyncError>;

    fn fetch_block(&mut self, chain: ChainIndex, hash: Buf32) -> Result<Option<Block>, SyncError>;

    fn fetch_header(
        &mut self,
        chain: ChainIndex,
        hash: Buf32,
    ) -> Result<Option<BlockHeader>, SyncError>;
}

pub struct Synchronizer {
    params: Arc<Params>,
    flow: Arc<RwLock<BlockFlow>>,
    chain_txs: Vec<mpsc::Sender<ChainMessage>>,
    flow_tx: mpsc::Sender<FlowMessage>,
}

impl Synchronizer {
    pub fn new(
        params: Arc<Params>,
        flow: Arc<RwLock<BlockFlow>>,
        chain_txs: Vec<mpsc::Sender<ChainMessage>>,
        flow_tx: mpsc::Sender<FlowMessage>,
    ) -> Self {
        Self {
            params,
            flow,
            chain_txs,
            flow_tx,
        }
    }

    /// Answers a peer's locator request from the local flow.
    pub fn serve(&self, request: &SyncRequest) -> Result<SyncResponse, SyncError> {
        if request.locators.len() != self.params.chain_count() {
            return Err(SyncError::Protocol("locator arity"));
        }
        Ok(SyncResponse {
            inventories: self.flow.read().get_sync_inventories(&request.locators),
        })
    }

    /// One locator/inventory round against a peer: publish our locators,
    /// fetch what we miss, feed it to the handlers in inventory order.
    pub fn run_round(
        &self,
        session: &mut PeerSession,
        peer: &mut impl SyncPeer,
    ) -> Result<SyncStatus, SyncError> {
        session.finish_handshake();

        let request = SyncRequest {
            locators: self.flow.read().get_sync_locators(),
        };
        let response = peer.exchange(&request)?;

        if response.inventories.len() != self.params.chain_count() {
            session.score_down();
            return Err(SyncError::Protocol("inventory arity"));
        }

        if response.is_all_empty() {
            session.mark_synced();
            return Ok(SyncStatus::Synced);
        }
        session.begin_syncing();

        let mut fetched = 0usize;
        let groups = self.params.groups();
        for chain in ChainIndex::all(groups) {
            let inventory = &response.inventories[chain.flat_index(groups)];
            for hash in inventory {
                self.fetch_one(session, peer, chain, *hash)?;
                fetched += 1;
            }
        }

        debug!(%fetched, "sync round complete");
        Ok(SyncStatus::Fetched(fetched))
    }

    fn fetch_one(
        &self,
        session: &mut PeerSession,
        peer: &mut impl SyncPeer,
        chain: ChainIndex,
        hash: Buf32,
    ) -> Result<(), SyncError> {
        let sender = &self.chain_txs[chain.flat_index(self.params.groups())];
        if self.params.broker().relates_to(chain) {
            let Some(block) = peer.fetch_block(chain, hash)? else {
                session.score_down();
                return Err(SyncError::Protocol("advertised block missing"));
            };
            sender
                .blocking_send(ChainMessage::AddBlock {
                    block,
                    origin: Origin::Sync,
                })
                .map_err(|_| SyncError::HandlerGone)?;
        } else {
            let Some(header) = peer.fetch_header(chain, hash)? else {
                session.score_down();
                return Err(SyncError::Protocol("advertised header missing"));
            };
            sender
                .blocking_send(ChainMessage::AddHeader {
                    header,
                    origin: Origin::Sync,
                })
                .map_err(|_| SyncError::HandlerGone)?;
        }
        Ok(())
    }

    /// Locators as the flow handler currently sees them.  Goes through the
    /// handler rather than the lock so callers observe its serialized
    /// state.
    pub fn local_locators(&self) -> Result<Vec<Vec<Buf32>>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.flow_tx
            .blocking_send(FlowMessage::GetLocators { reply: tx })
            .map_err(|_| SyncError::HandlerGone)?;
        rx.blocking_recv().map_err(|_| SyncError::HandlerGone)
    }
}
