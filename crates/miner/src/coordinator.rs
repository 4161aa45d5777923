//! The mining coordinator.
//!
//! Owns one worker per target group.  Templates come from the flow
//! handler, found blocks go to the chain handlers, and a fresh template is
//! requested only once the block is seen back as `BlockAdded`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::*;

use gridchain_consensus::{ChainMessage, EventBus, FlowMessage, NodeEvent, Origin, TxMessage};
use gridchain_primitives::buf::Buf32;
use gridchain_primitives::crypto::generate_keypair_for_group;
use gridchain_primitives::group::{pub_key_to_group, ChainIndex, GroupIndex};
use gridchain_primitives::hash;
use gridchain_primitives::params::Params;
use gridchain_primitives::time::{Clock, Timestamp};

use crate::template::BlockTemplate;
use crate::worker::{worker_task, MiningResult, MiningTask};

const MAILBOX_CAP: usize = 256;
const TEMPLATE_TX_LIMIT: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MinerMessage {
    Start,
    Stop,
}

#[derive(Debug)]
pub enum CoordMsg {
    Control(MinerMessage),
    Result(MiningResult),
    Added(ChainIndex),
    Shutdown,
}

/// Handle to a running miner.
pub struct FairMiner {
    coord_tx: mpsc::Sender<CoordMsg>,
    counts: Arc<Mutex<Vec<u64>>>,
    handles: Vec<JoinHandle<()>>,
}

impl FairMiner {
    pub fn spawn(
        params: Arc<Params>,
        flow_tx: mpsc::Sender<FlowMessage>,
        chain_txs: Vec<mpsc::Sender<ChainMessage>>,
        tx_tx: Option<mpsc::Sender<TxMessage>>,
        events: &EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let groups = params.groups();
        let main = params.main_group();

        // One ground keypair per target group; the derivation invariant is
        // what makes coinbases land in their group.
        let addresses: Vec<Buf32> = (0..groups)
            .map(|to| {
                let (_, pk) = generate_keypair_for_group(GroupIndex(to), groups);
                assert_eq!(
                    pub_key_to_group(&pk.serialize(), groups),
                    GroupIndex(to),
                    "miner: ground key escaped its group"
                );
                hash::blake2b(&pk.serialize())
            })
            .collect();

        let (coord_tx, coord_rx) = mpsc::channel(MAILBOX_CAP);
        let counts = Arc::new(Mutex::new(vec![0u64; groups as usize]));
        let mut handles = Vec::new();

        let mut task_txs = Vec::with_capacity(groups as usize);
        for to in 0..groups {
            let (task_tx, task_rx) = mpsc::channel(4);
            let result_tx = coord_tx.clone();
            let nonce_step = params.nonce_step();
            handles.push(
                thread::Builder::new()
                    .name(format!("miner-worker-{to}"))
                    .spawn(move || worker_task(nonce_step, task_rx, result_tx))
                    .expect("miner: spawn worker"),
            );
            task_txs.push(task_tx);
        }

        // Forward our own chains' BlockAdded events into the mailbox.  The
        // forwarder is detached: it exits when the event bus closes or the
        // coordinator goes away, whichever it notices first.
        {
            let mut event_rx = events.subscribe();
            let coord_tx = coord_tx.clone();
            thread::Builder::new()
                .name("miner-events".into())
                .spawn(move || loop {
                    match event_rx.blocking_recv() {
                        Ok(NodeEvent::BlockAdded { chain, .. }) if chain.from == main => {
                            if coord_tx.blocking_send(CoordMsg::Added(chain)).is_err() {
                                break;
                            }
                        }
                        Ok(_) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(%n, "miner lagging behind node events");
                            continue;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                })
                .expect("miner: spawn event forwarder");
        }

        let state = CoordinatorState {
            params,
            flow_tx,
            chain_txs,
            tx_tx,
            clock,
            task_txs,
            counts: counts.clone(),
            addresses,
            last_timestamps: Vec::new(),
            mining: false,
            epoch: 0,
        };
        handles.push(
            thread::Builder::new()
                .name("miner-coordinator".into())
                .spawn(move || coordinator_task(state, coord_rx))
                .expect("miner: spawn coordinator"),
        );

        Self {
            coord_tx,
            counts,
            handles,
        }
    }

    pub fn start(&self) {
        let _ = self
            .coord_tx
            .blocking_send(CoordMsg::Control(MinerMessage::Start));
    }

    pub fn stop(&self) {
        let _ = self
            .coord_tx
            .blocking_send(CoordMsg::Control(MinerMessage::Stop));
    }

    /// Nonces tried so far per target group.
    pub fn mining_counts(&self) -> Vec<u64> {
        self.counts.lock().clone()
    }

    pub fn shutdown(self) {
        let _ = self.coord_tx.blocking_send(CoordMsg::Shutdown);
        drop(self.coord_tx);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

struct CoordinatorState {
    params: Arc<Params>,
    flow_tx: mpsc::Sender<FlowMessage>,
    chain_txs: Vec<mpsc::Sender<ChainMessage>>,
    tx_tx: Option<mpsc::Sender<TxMessage>>,
    clock: Arc<dyn Clock>,
    task_txs: Vec<mpsc::Sender<MiningTask>>,
    counts: Arc<Mutex<Vec<u64>>>,
    addresses: Vec<Buf32>,

    /// Last template timestamp per target group, kept strictly increasing.
    last_timestamps: Vec<Timestamp>,

    mining: bool,
    epoch: u64,
}

fn coordinator_task(mut state: CoordinatorState, mut rx: mpsc::Receiver<CoordMsg>) {
    state.last_timestamps = vec![Timestamp::zero(); state.params.groups() as usize];

    while let Some(msg) = rx.blocking_recv() {
        match msg {
            CoordMsg::Control(MinerMessage::Start) => {
                if state.mining {
                    continue;
                }
                info!("miner starting");
                state.mining = true;
                state.epoch += 1;
                for to in 0..state.params.groups() {
                    dispatch_new_template(&mut state, GroupIndex(to));
                }
            }

            CoordMsg::Control(MinerMessage::Stop) => {
                info!("miner stopping");
                state.mining = false;
                // In-flight slices finish but their results are stale now.
                state.epoch += 1;
            }

            CoordMsg::Result(result) => handle_result(&mut state, result),

            CoordMsg::Added(chain) => {
                if state.mining && chain.from == state.params.main_group() {
                    dispatch_new_template(&mut state, chain.to);
                }
            }

            CoordMsg::Shutdown => break,
        }
    }
    info!("miner coordinator exiting");
}

fn handle_result(state: &mut CoordinatorState, result: MiningResult) {
    if !state.mining || result.epoch != state.epoch {
        trace!(chain = %result.chain, "discarding stale mining result");
        return;
    }

    let to = result.chain.to.value() as usize;
    state.counts.lock()[to] += result.mining_count;

    match result.block {
        Some(block) => {
            debug!(chain = %result.chain, id = %block.hash(), "submitting mined block");
            let sender = &state.chain_txs[result
                .chain
                .flat_index(state.params.groups())];
            if sender
                .blocking_send(ChainMessage::AddBlock {
                    block,
                    origin: Origin::Local,
                })
                .is_err()
            {
                warn!(chain = %result.chain, "chain handler gone");
            }
            // A fresh template follows once BlockAdded comes back.
        }
        None => {
            // Nothing in this slice; keep scanning the same template.
            let task = MiningTask {
                template: result.template,
                epoch: state.epoch,
            };
            let _ = state.task_txs[to].blocking_send(task);
        }
    }
}

fn dispatch_new_template(state: &mut CoordinatorState, to: GroupIndex) {
    let chain = ChainIndex {
        from: state.params.main_group(),
        to,
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if state
        .flow_tx
        .blocking_send(FlowMessage::PrepareTemplate {
            chain,
            reply: reply_tx,
        })
        .is_err()
    {
        warn!("flow handler gone, cannot fetch template");
        return;
    }
    let flow_template = match reply_rx.blocking_recv() {
        Ok(Ok(t)) => t,
        Ok(Err(e)) => {
            warn!(%chain, err = %e, "template preparation failed");
            return;
        }
        Err(_) => return,
    };

    let pooled = fetch_pooled(state, chain);

    // Timestamps must strictly advance along a chain even when blocks land
    // within one clock tick.
    let slot = to.value() as usize;
    let now = state.clock.now();
    let ts = if now > state.last_timestamps[slot] {
        now
    } else {
        Timestamp(state.last_timestamps[slot].millis() + 1)
    };
    state.last_timestamps[slot] = ts;

    let template = BlockTemplate::new(flow_template, state.addresses[slot], pooled, ts);
    let task = MiningTask {
        template,
        epoch: state.epoch,
    };
    let _ = state.task_txs[slot].blocking_send(task);
}

fn fetch_pooled(
    state: &CoordinatorState,
    chain: ChainIndex,
) -> Vec<gridchain_state::transaction::Transaction> {
    let Some(tx_tx) = &state.tx_tx else {
        return Vec::new();
    };
    let (reply_tx, reply_rx) = oneshot::channel();
    if tx_tx
        .blocking_send(TxMessage::TakeReady {
            chain,
            max: TEMPLATE_TX_LIMIT,
            reply: reply_tx,
        })
        .is_err()
    {
        return Vec::new();
    }
    reply_rx.blocking_recv().unwrap_or_default()
}
