use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("block index {0} not found")]
    NotFound(u64),

    #[error("invalid block range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("unsupported export format `{0}`")]
    UnsupportedFormat(String),

    #[error("malformed export: {0}")]
    MalformedExport(String),

    #[error("chain error: {0}")]
    Chain(#[from] bicle_chain::ChainError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
