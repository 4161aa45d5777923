use thiserror::Error;

use gridchain_primitives::group::ChainIndex;
use gridchain_state::id::BlockId;

/// Why a block or header was not admitted.  Reported to the source and
/// dropped; never retried by the flow itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("hash does not meet its target")]
    BadPoW,

    #[error("bad dependencies: {0}")]
    BadDeps(&'static str),

    #[error("timestamp not after parent")]
    BadTimestamp,

    /// The item can be parked until the named hash resolves.
    #[error("unknown parent {0}")]
    UnknownParent(BlockId),

    #[error("bad signature")]
    BadSignature,

    #[error("tx merkle root does not commit to body")]
    BadMerkleRoot,
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("chain {0} out of range")]
    UnknownChain(ChainIndex),

    #[error("block {0} not known to the flow")]
    UnknownBlock(BlockId),
}
