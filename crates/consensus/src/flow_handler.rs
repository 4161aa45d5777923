//! The single serializer of DAG mutations.
//!
//! Everything that changes the flow goes through this handler's mailbox in
//! arrival order.  Persistence happens before the in-memory flow mutates,
//! so an aborted batch leaves the handler state untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::*;

use gridchain_db::errors::DbError;
use gridchain_db::traits::{
    BlockRecord, ChainStateEntry, ChainStore, Database, HeaderRecord, WriteOp,
};
use gridchain_flow::flow::AddOutcome;
use gridchain_flow::{BlockFlow, OrphanBuffer, OrphanItem, ValidationError};
use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::params::Params;
use gridchain_state::header::Target;
use gridchain_state::id::TxId;

use crate::events::{EventBus, NodeEvent};
use crate::message::{CommitResult, FlowMessage, TxMessage};

const DB_RETRIES: usize = 3;
const DB_RETRY_DELAY: Duration = Duration::from_millis(50);

pub struct FlowHandlerState<D: Database> {
    params: Arc<Params>,
    db: Arc<D>,
    flow: Arc<RwLock<BlockFlow>>,
    orphans: OrphanBuffer,
    events: EventBus,
    tx_tx: Option<mpsc::Sender<TxMessage>>,

    /// Retarget output per chain, refreshed when the chain grows.
    target_cache: HashMap<ChainIndex, Target>,
}

impl<D: Database> FlowHandlerState<D> {
    pub fn new(
        params: Arc<Params>,
        db: Arc<D>,
        flow: Arc<RwLock<BlockFlow>>,
        events: EventBus,
        tx_tx: Option<mpsc::Sender<TxMessage>>,
    ) -> Self {
        let orphans = OrphanBuffer::new(params.orphan_buffer_cap());
        Self {
            params,
            db,
            flow,
            orphans,
            events,
            tx_tx,
            target_cache: HashMap::new(),
        }
    }
}

pub fn flow_handler_task<D: Database>(
    mut state: FlowHandlerState<D>,
    mut rx: mpsc::Receiver<FlowMessage>,
) {
    while let Some(msg) = rx.blocking_recv() {
        process_msg(&mut state, msg);
    }
    info!("flow handler exiting");
}

fn process_msg<D: Database>(state: &mut FlowHandlerState<D>, msg: FlowMessage) {
    match msg {
        FlowMessage::PrepareTemplate { chain, reply } => {
            let flow = state.flow.read();
            let template = flow.get_best_deps(chain).map(|deps| {
                let target = *state
                    .target_cache
                    .entry(chain)
                    .or_insert_with(|| flow.next_target(chain));
                gridchain_flow::flow::BlockFlowTemplate {
                    chain,
                    deps,
                    target,
                }
            });
            let _ = reply.send(template);
        }

        FlowMessage::CommitBlock {
            chain,
            block,
            reply,
        } => {
            let result = admit(state, OrphanItem::Block(chain, block));
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }

        FlowMessage::CommitHeader {
            chain,
            header,
            reply,
        } => {
            let result = admit(state, OrphanItem::Header(chain, header));
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }

        FlowMessage::GetLocators { reply } => {
            let _ = reply.send(state.flow.read().get_sync_locators());
        }

        FlowMessage::GetInventories { locators, reply } => {
            let _ = reply.send(state.flow.read().get_sync_inventories(&locators));
        }
    }
}

/// Admits an item, parking it if a dependency is missing, then drains any
/// orphans the admission resolved.
fn admit<D: Database>(state: &mut FlowHandlerState<D>, item: OrphanItem) -> CommitResult {
    let result = commit_one(state, &item);

    match &result {
        Ok(AddOutcome::Added(info)) => {
            let mut resolved = vec![info.id];
            while let Some(done) = resolved.pop() {
                for orphan in state.orphans.take_dependents(&done) {
                    let id = orphan.id();
                    match commit_one(state, &orphan) {
                        Ok(AddOutcome::Added(info)) => resolved.push(info.id),
                        Ok(AddOutcome::AlreadyKnown) => {}
                        Err(ValidationError::UnknownParent(missing)) => {
                            state.orphans.insert(missing, orphan);
                        }
                        Err(e) => {
                            warn!(%id, err = %e, "dropping unparked orphan");
                        }
                    }
                }
            }
        }
        Err(ValidationError::UnknownParent(missing)) => {
            debug!(%missing, "parking item on missing dependency");
            state.orphans.insert(*missing, item);
        }
        _ => {}
    }

    result
}

fn commit_one<D: Database>(state: &mut FlowHandlerState<D>, item: &OrphanItem) -> CommitResult {
    let (chain, header) = match item {
        OrphanItem::Block(chain, block) => (*chain, &block.header),
        OrphanItem::Header(chain, header) => (*chain, header),
    };
    let id = header.hash();

    let mut flow = state.flow.write();
    if flow.contains(&id) {
        return Ok(AddOutcome::AlreadyKnown);
    }
    if let OrphanItem::Block(_, block) = item {
        if !block.merkle_root_ok() {
            return Err(ValidationError::BadMerkleRoot);
        }
    }

    // Validate before any write so a failed batch leaves nothing behind.
    flow.precheck_header(chain, header)?;

    let parent = header.deps.parent(chain);
    let height = flow
        .height_of(&parent)
        .expect("flow: validated parent height")
        + 1;

    if let Err(e) = persist(state.db.as_ref(), chain, item, height) {
        error!(chain = %chain, %id, err = %e, "batch write failed, dropping item");
        return Err(ValidationError::BadDeps("storage unavailable"));
    }

    let outcome = match item {
        OrphanItem::Block(_, block) => flow.add_block(chain, block),
        OrphanItem::Header(_, header) => flow.add_header(chain, header),
    }
    .expect("flow: add after precheck");

    if let AddOutcome::Added(info) = &outcome {
        // The chain grew; refresh its cached target and cursor.
        state.target_cache.insert(info.chain, flow.next_target(info.chain));

        let best = flow.best_tip(info.chain);
        let best_height = flow.height_of(&best).unwrap_or(info.height);
        let cursor = ChainStateEntry {
            tip: best,
            height: best_height,
        };
        if let Err(e) = state.db.chain_store().set_chain_state(info.chain, cursor) {
            warn!(chain = %info.chain, err = %e, "failed to advance chain cursor");
        }

        state.events.publish(NodeEvent::BlockAdded {
            chain: info.chain,
            id: info.id,
            height: info.height,
            weight: info.weight,
        });

        if let (Some(tx_tx), OrphanItem::Block(_, block)) = (&state.tx_tx, item) {
            let txs: Vec<TxId> = block.transactions.iter().map(|tx| tx.id()).collect();
            if !txs.is_empty() {
                let _ = tx_tx.blocking_send(TxMessage::BlockCommitted { txs });
            }
        }
    }
    Ok(outcome)
}

fn persist<D: Database>(
    db: &D,
    chain: ChainIndex,
    item: &OrphanItem,
    height: u64,
) -> Result<(), DbError> {
    let ops = match item {
        OrphanItem::Block(_, block) => vec![
            WriteOp::PutBlock(BlockRecord {
                chain,
                block: block.clone(),
            }),
            WriteOp::PutHeightIndex(chain, height, block.hash()),
        ],
        OrphanItem::Header(_, header) => vec![
            WriteOp::PutHeader(HeaderRecord {
                chain,
                header: header.clone(),
            }),
            WriteOp::PutHeightIndex(chain, height, header.hash()),
        ],
    };

    let mut last_err = None;
    for attempt in 0..DB_RETRIES {
        match db.chain_store().batch(ops.clone()) {
            Ok(()) => return Ok(()),
            Err(DbError::Io(msg)) => {
                warn!(%attempt, %msg, "transient batch failure, retrying");
                last_err = Some(DbError::Io(msg));
                thread::sleep(DB_RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or(DbError::Other("batch retries exhausted".into())))
}
