//! Fair per-group miner.
//!
//! A coordinator owned by the node's main group drives one nonce worker
//! per target group.  Every worker scans bounded nonce slices, so no
//! target group can starve another regardless of their difficulty.

pub mod coordinator;
pub mod template;
pub mod worker;

pub use coordinator::{FairMiner, MinerMessage};
pub use template::BlockTemplate;
