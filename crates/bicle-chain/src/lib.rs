pub mod block;
pub mod builder;
pub mod chain;
pub mod error;
pub mod log;
pub mod store;

pub use block::{Block, BlockHash, GENESIS_HASH};
pub use builder::BlockBuilder;
pub use chain::Chain;
pub use error::ChainError;
pub use log::{BlockLog, JsonlBlockLog, MemoryBlockLog};
pub use store::{ChainStore, StoreOptions};

/// Maximum number of items sealed into a single block.
pub const MAX_ITEMS: usize = 5;
