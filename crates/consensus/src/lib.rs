//! The handler mesh: one handler per chain, one flow handler serializing
//! every DAG mutation, one tx handler, composed behind [`AllHandlers`].
//!
//! Handlers are threads draining tokio mailboxes.  Within one chain
//! handler items are strictly FIFO; across handlers only the flow handler
//! orders anything, and its `BlockAdded` events are the total order the
//! rest of the node sees.

pub mod all_handlers;
pub mod chain_handler;
pub mod errors;
pub mod events;
pub mod flow_handler;
pub mod message;
pub mod tx_handler;

pub use all_handlers::AllHandlers;
pub use errors::HandlerError;
pub use events::{EventBus, NodeEvent};
pub use message::{ChainMessage, CommitResult, FlowMessage, Origin, TxMessage};
