use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid item: {0}")]
    Item(#[from] bicle_item::ItemError),

    #[error("chain error: {0}")]
    Chain(#[from] bicle_chain::ChainError),

    #[error("audit error: {0}")]
    Audit(#[from] bicle_audit::AuditError),

    #[error("persisted chain failed validation:\n{0}")]
    CorruptChain(bicle_audit::ValidationReport),

    #[error("news already in pending queue: {0}")]
    AlreadyPending(String),

    #[error("news already mined: {0}")]
    AlreadyMined(String),

    #[error("feed error: {0}")]
    Feed(#[from] crate::feed::FeedError),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
