//! Node event bus.

use tokio::sync::broadcast;
use tracing::trace;

use gridchain_primitives::group::ChainIndex;
use gridchain_state::id::{BlockId, TxId};

#[derive(Clone, Debug)]
pub enum NodeEvent {
    BlockAdded {
        chain: ChainIndex,
        id: BlockId,
        height: u64,
        weight: u64,
    },
    TxConfirmed {
        id: TxId,
    },
}

/// Broadcast fanout for node events.  Slow subscribers lag and lose the
/// oldest events rather than blocking publishers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NodeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: NodeEvent) {
        trace!(?event, "publishing node event");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.tx.subscribe()
    }
}
