use std::{sync::Arc, time::Duration};

use bicle_item::NewsItem;
use tokio::{
    sync::{Mutex, RwLock, RwLockReadGuard},
    task, time,
};
use tracing::{debug, info};

use crate::{
    block::Block,
    chain::Chain,
    error::ChainError,
    log::{BlockLog, MemoryBlockLog},
    MAX_ITEMS,
};

/// Tunables for a [`ChainStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Items per block, clamped to `1..=MAX_ITEMS`.
    pub block_capacity: usize,

    /// How long an append waits for the writer lock before giving up with
    /// [`ChainError::Busy`].
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            block_capacity: MAX_ITEMS,
            lock_timeout: Duration::from_secs(2),
        }
    }
}

/// Owner and sole writer of the chain.
///
/// Appends are serialised by a writer mutex so that "read head, build block,
/// append" never interleaves with another append.  Readers take the chain's
/// read lock and observe either the chain before or after an append, never a
/// half-written block.  A block is written to the [`BlockLog`] on the blocking
/// pool before it is made visible, and readers are not held up meanwhile; if
/// persistence fails the in-memory chain is left untouched.
pub struct ChainStore {
    chain: RwLock<Chain>,
    writer: Mutex<()>,
    log: Arc<dyn BlockLog>,
    options: StoreOptions,
}

impl ChainStore {
    /// Load the chain from `log`, writing the genesis block first if the log
    /// is empty.
    ///
    /// The loaded blocks are not validated here; callers run the validator
    /// over [`ChainStore::snapshot`] before serving appends.
    pub fn open(log: Arc<dyn BlockLog>, options: StoreOptions) -> Result<Self, ChainError> {
        let blocks = log.load()?;
        let chain = if blocks.is_empty() {
            let chain = Chain::new();
            log.append(chain.head())?;
            info!("Initialised new chain with genesis block");
            chain
        } else {
            Chain::from_blocks(blocks)?
        };

        info!(blocks = chain.len(), "Chain store opened");

        Ok(Self {
            chain: RwLock::new(chain),
            writer: Mutex::new(()),
            log,
            options,
        })
    }

    /// A store backed by a fresh [`MemoryBlockLog`].
    pub fn in_memory(options: StoreOptions) -> Result<Self, ChainError> {
        Self::open(Arc::new(MemoryBlockLog::new()), options)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Shared read access to the live chain.
    pub async fn read(&self) -> RwLockReadGuard<'_, Chain> {
        self.chain.read().await
    }

    /// A consistent copy of the chain, detached from the store.
    pub async fn snapshot(&self) -> Chain {
        self.chain.read().await.clone()
    }

    pub async fn head(&self) -> Block {
        self.chain.read().await.head().clone()
    }

    pub async fn get(&self, index: u64) -> Result<Block, ChainError> {
        self.chain.read().await.get(index).cloned()
    }

    pub async fn len(&self) -> usize {
        self.chain.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chain.read().await.is_empty()
    }

    /// Seal `items` into a new block on top of the current head.
    pub async fn append(&self, items: Vec<NewsItem>) -> Result<Block, ChainError> {
        if items.is_empty() {
            return Err(ChainError::EmptyBlockSeal);
        }
        self.append_with(move |_| items)
            .await?
            .ok_or(ChainError::EmptyBlockSeal)
    }

    /// Run `select` against the current chain while holding the writer lock
    /// and seal whatever it returns.
    ///
    /// Returns `Ok(None)` without touching the chain when `select` picks
    /// nothing.  Curation that depends on chain contents (deduplication
    /// against earlier blocks) belongs in `select` so it cannot race another
    /// append.
    pub async fn append_with<F>(&self, select: F) -> Result<Option<Block>, ChainError>
    where
        F: FnOnce(&Chain) -> Vec<NewsItem>,
    {
        let _writer = time::timeout(self.options.lock_timeout, self.writer.lock())
            .await
            .map_err(|_| ChainError::Busy(self.options.lock_timeout))?;

        let block = {
            let chain = self.chain.read().await;
            let items = select(&chain);
            if items.is_empty() {
                debug!("Nothing selected for the next block");
                return Ok(None);
            }
            let block = chain.build_next(items, self.options.block_capacity)?;
            chain.check_next(&block)?;
            block
        };

        // The writer lock keeps the head fixed until the push below, so
        // readers keep the old chain while the block is being persisted.
        let log = Arc::clone(&self.log);
        let record = block.clone();
        task::spawn_blocking(move || log.append(&record))
            .await
            .map_err(|e| ChainError::Storage(format!("block log task failed: {e}")))??;

        let mut chain = self.chain.write().await;
        let committed = chain.push(block)?.clone();

        info!(
            index = committed.index,
            items = committed.items.len(),
            hash = %committed.block_hash.short(16),
            "Appended block"
        );

        Ok(Some(committed))
    }
}
