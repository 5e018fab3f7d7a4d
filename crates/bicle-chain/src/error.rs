use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid item: {0}")]
    Item(#[from] bicle_item::ItemError),

    #[error("cannot seal a block with no items")]
    EmptyBlockSeal,

    #[error("block is full ({capacity} items)")]
    BlockFull { capacity: usize },

    #[error("url already present in this block: {0}")]
    DuplicateUrl(String),

    #[error("chain corruption: {0}")]
    ChainCorruption(String),

    #[error("block index {0} not found")]
    NotFound(u64),

    #[error("invalid block range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("persisted chain is empty")]
    EmptyChain,

    #[error("timed out after {0:?} waiting for the append lock")]
    Busy(Duration),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
