// Reexports from elsewhere in the crate.

pub use crate::account::AccountState;
pub use crate::block::{compute_tx_merkle_root, genesis_block, genesis_blocks, Block};
pub use crate::deps::BlockDeps;
pub use crate::header::{BlockHeader, Nonce, Target};
pub use crate::id::{BlockId, TxId};
pub use crate::transaction::{Transaction, TxOutput, TxOutputPoint, UnsignedTx};
pub use crate::world::{WorldState, WorldStateError};
