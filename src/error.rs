use thiserror::Error;

use crate::rpc::submitter::SubmitError;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Submission error: {0}")]
    SubmitError(#[from] SubmitError),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
