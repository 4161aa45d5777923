//! Mesh construction.
//!
//! Builds the flow handler, one chain handler per chain and the tx
//! handler, wiring typed send-ends between them.  Handlers own their
//! mailboxes; everything else holds only senders, so the reference cycle
//! between components never becomes an ownership cycle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::*;

use gridchain_db::traits::Database;
use gridchain_flow::{BlockFlow, RetargetStrategy};
use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::params::Params;

use crate::chain_handler::{chain_handler_task, ChainHandlerState};
use crate::events::EventBus;
use crate::flow_handler::{flow_handler_task, FlowHandlerState};
use crate::message::{ChainMessage, FlowMessage, TxMessage};
use crate::tx_handler::{tx_handler_task, TxHandlerState};

const MAILBOX_CAP: usize = 256;
const EVENT_CAP: usize = 1024;

pub struct AllHandlers {
    params: Arc<Params>,
    flow: Arc<RwLock<BlockFlow>>,
    flow_tx: mpsc::Sender<FlowMessage>,
    chain_txs: Vec<mpsc::Sender<ChainMessage>>,
    tx_tx: mpsc::Sender<TxMessage>,
    events: EventBus,
    handles: Vec<JoinHandle<()>>,
}

impl AllHandlers {
    /// Builds and starts the whole mesh.
    pub fn build<D>(params: Arc<Params>, db: Arc<D>, retarget: Box<dyn RetargetStrategy>) -> Self
    where
        D: Database + Send + Sync + 'static,
    {
        let flow = Arc::new(RwLock::new(BlockFlow::new(params.clone(), retarget)));
        let events = EventBus::new(EVENT_CAP);
        let mut handles = Vec::new();

        let (tx_tx, tx_rx) = mpsc::channel(MAILBOX_CAP);
        {
            let state = TxHandlerState::new(params.clone(), events.clone());
            handles.push(
                thread::Builder::new()
                    .name("tx-handler".into())
                    .spawn(move || tx_handler_task(state, tx_rx))
                    .expect("handlers: spawn tx"),
            );
        }

        let (flow_tx, flow_rx) = mpsc::channel(MAILBOX_CAP);
        {
            let state = FlowHandlerState::new(
                params.clone(),
                db,
                flow.clone(),
                events.clone(),
                Some(tx_tx.clone()),
            );
            handles.push(
                thread::Builder::new()
                    .name("flow-handler".into())
                    .spawn(move || flow_handler_task(state, flow_rx))
                    .expect("handlers: spawn flow"),
            );
        }

        let mut chain_txs = Vec::with_capacity(params.chain_count());
        for chain in ChainIndex::all(params.groups()) {
            let (chain_tx, chain_rx) = mpsc::channel(MAILBOX_CAP);
            let full = params.broker().relates_to(chain);
            let state = ChainHandlerState::new(chain, full, flow.clone(), flow_tx.clone());
            handles.push(
                thread::Builder::new()
                    .name(format!("chain-handler-{}-{}", chain.from, chain.to))
                    .spawn(move || chain_handler_task(state, chain_rx))
                    .expect("handlers: spawn chain"),
            );
            chain_txs.push(chain_tx);
        }

        info!(
            chains = chain_txs.len(),
            "handler mesh started"
        );

        Self {
            params,
            flow,
            flow_tx,
            chain_txs,
            tx_tx,
            events,
            handles,
        }
    }

    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }

    /// Shared read view of the flow; only the flow handler writes it.
    pub fn flow(&self) -> &Arc<RwLock<BlockFlow>> {
        &self.flow
    }

    pub fn flow_sender(&self) -> mpsc::Sender<FlowMessage> {
        self.flow_tx.clone()
    }

    pub fn chain_sender(&self, chain: ChainIndex) -> mpsc::Sender<ChainMessage> {
        self.chain_txs[chain.flat_index(self.params.groups())].clone()
    }

    pub fn tx_sender(&self) -> mpsc::Sender<TxMessage> {
        self.tx_tx.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Closes every mailbox and joins the workers.
    pub fn shutdown(self) {
        let Self {
            flow_tx,
            chain_txs,
            tx_tx,
            handles,
            ..
        } = self;
        drop(chain_txs);
        drop(flow_tx);
        drop(tx_tx);
        for handle in handles {
            let _ = handle.join();
        }
    }
}
