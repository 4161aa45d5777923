//! Inter-clique synchronization: locator/inventory exchange and the
//! per-peer session state machine.

pub mod messages;
pub mod session;
pub mod synchronizer;

pub use messages::{SyncRequest, SyncResponse};
pub use session::{PeerSession, PeerState};
pub use synchronizer::{SyncError, SyncPeer, SyncStatus, Synchronizer};
