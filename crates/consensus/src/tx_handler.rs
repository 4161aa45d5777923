//! Transaction intake and per-chain ready queues.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::*;

use gridchain_primitives::group::{ChainIndex, GroupIndex};
use gridchain_primitives::params::Params;
use gridchain_state::id::TxId;
use gridchain_state::transaction::Transaction;

use crate::errors::TxRejection;
use crate::events::{EventBus, NodeEvent};
use crate::message::TxMessage;

pub struct TxHandlerState {
    params: Arc<Params>,
    events: EventBus,
    pooled: HashSet<TxId>,
    ready: HashMap<ChainIndex, VecDeque<Transaction>>,
}

impl TxHandlerState {
    pub fn new(params: Arc<Params>, events: EventBus) -> Self {
        Self {
            params,
            events,
            pooled: HashSet::new(),
            ready: HashMap::new(),
        }
    }

    /// Deterministic chain routing from the tx id and its first output.
    fn route(&self, tx: &Transaction) -> ChainIndex {
        let groups = self.params.groups();
        let id = tx.id();
        let from = id.inner().as_slice()[0] % groups;
        let to = tx
            .unsigned
            .outputs
            .first()
            .map(|o| o.lock_script_hash.as_slice()[0] % groups)
            .unwrap_or(from);
        ChainIndex {
            from: GroupIndex(from),
            to: GroupIndex(to),
        }
    }
}

pub fn tx_handler_task(mut state: TxHandlerState, mut rx: mpsc::Receiver<TxMessage>) {
    while let Some(msg) = rx.blocking_recv() {
        process_msg(&mut state, msg);
    }
    debug!("tx handler exiting");
}

fn process_msg(state: &mut TxHandlerState, msg: TxMessage) {
    match msg {
        TxMessage::SubmitTx { tx, reply } => {
            let _ = reply.send(submit(state, tx));
        }

        TxMessage::TakeReady { chain, max, reply } => {
            let queue = state.ready.entry(chain).or_default();
            let take = max.min(queue.len());
            let txs: Vec<Transaction> = queue.drain(..take).collect();
            let _ = reply.send(txs);
        }

        TxMessage::BlockCommitted { txs } => {
            for id in txs {
                if state.pooled.remove(&id) {
                    for queue in state.ready.values_mut() {
                        queue.retain(|tx| tx.id() != id);
                    }
                    state.events.publish(NodeEvent::TxConfirmed { id });
                }
            }
        }
    }
}

fn submit(state: &mut TxHandlerState, tx: Transaction) -> Result<TxId, TxRejection> {
    let id = tx.id();
    if state.pooled.contains(&id) {
        return Err(TxRejection::Duplicate);
    }
    if !tx.is_coinbase() && tx.signatures.is_empty() {
        return Err(TxRejection::MissingSignature);
    }

    let chain = state.route(&tx);
    trace!(%id, %chain, "pooled tx");
    state.pooled.insert(id);
    state.ready.entry(chain).or_default().push_back(tx);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::buf::Buf32;
    use gridchain_primitives::buf::Buf64;
    use gridchain_primitives::crypto::Signature;
    use gridchain_primitives::group::BrokerConfig;
    use gridchain_state::transaction::{TxOutput, TxOutputPoint, UnsignedTx};

    fn state() -> TxHandlerState {
        let broker = BrokerConfig::new(0, 2, 2).unwrap();
        let params = Arc::new(Params::standard(2, broker, GroupIndex(0)));
        TxHandlerState::new(params, EventBus::new(16))
    }

    fn tx(n: u8) -> Transaction {
        Transaction {
            unsigned: UnsignedTx {
                inputs: vec![TxOutputPoint {
                    short_key: n as u32,
                    tx_id: Buf32::new([n; 32]),
                    output_index: 0,
                }],
                outputs: vec![TxOutput {
                    amount: 10,
                    lock_script_hash: Buf32::new([n; 32]),
                    tokens: vec![],
                }],
            },
            signatures: vec![Signature(Buf64::new([n; 64]))],
        }
    }

    #[test]
    fn test_submit_dedup_and_take() {
        let mut state = state();
        let t = tx(1);
        let id = submit(&mut state, t.clone()).unwrap();
        assert_eq!(submit(&mut state, t.clone()), Err(TxRejection::Duplicate));

        let chain = state.route(&t);
        let queue = state.ready.get_mut(&chain).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id(), id);
    }

    #[test]
    fn test_unsigned_rejected() {
        let mut state = state();
        let mut t = tx(2);
        t.signatures.clear();
        assert_eq!(submit(&mut state, t), Err(TxRejection::MissingSignature));
    }

    #[test]
    fn test_commit_clears_pool() {
        let mut state = state();
        let t = tx(3);
        let id = submit(&mut state, t.clone()).unwrap();

        process_msg(&mut state, TxMessage::BlockCommitted { txs: vec![id] });
        assert!(!state.pooled.contains(&id));
        assert!(state.ready.values().all(|q| q.is_empty()));
    }
}
