use thiserror::Error;

use gridchain_db::errors::DbError;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("peer channel closed")]
    ChannelClosed,

    #[error("db: {0}")]
    Db(#[from] DbError),
}

/// Why the tx handler refused a transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxRejection {
    #[error("already pooled")]
    Duplicate,

    #[error("missing signature")]
    MissingSignature,
}
