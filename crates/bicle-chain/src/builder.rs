use bicle_item::NewsItem;
use chrono::Utc;

use crate::{
    block::{block_digest, Block, BlockHash},
    ChainError, MAX_ITEMS,
};

/// Accumulates items for the next block and seals them.
///
/// Items are validated as they are added and keep their insertion order.
/// Fingerprints are computed exactly once, in [`BlockBuilder::seal_at`], and
/// the block hash only after every fingerprint is final.  Sealing consumes
/// the builder.
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    capacity: usize,
    items: Vec<NewsItem>,
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new(MAX_ITEMS)
    }
}

impl BlockBuilder {
    /// A builder holding at most `capacity` items, clamped to `1..=MAX_ITEMS`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_ITEMS);
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Add an item.  Returns `true` once the builder is full.
    pub fn add(&mut self, item: NewsItem) -> Result<bool, ChainError> {
        if self.is_full() {
            return Err(ChainError::BlockFull {
                capacity: self.capacity,
            });
        }
        item.validate()?;
        if self.items.iter().any(|existing| existing.url == item.url) {
            return Err(ChainError::DuplicateUrl(item.url));
        }
        self.items.push(item);
        Ok(self.is_full())
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Seal the collected items into a block stamped with the current time.
    pub fn seal(self, previous_block_hash: BlockHash, index: u64) -> Result<Block, ChainError> {
        self.seal_at(previous_block_hash, index, Utc::now().timestamp())
    }

    /// Seal with an explicit timestamp.
    pub fn seal_at(
        self,
        previous_block_hash: BlockHash,
        index: u64,
        timestamp: i64,
    ) -> Result<Block, ChainError> {
        if self.items.is_empty() {
            return Err(ChainError::EmptyBlockSeal);
        }

        let item_fingerprints = self
            .items
            .iter()
            .map(|item| item.fingerprint())
            .collect::<Result<Vec<_>, _>>()?;
        let block_hash = block_digest(index, &item_fingerprints, &previous_block_hash, timestamp);

        Ok(Block {
            index,
            items: self.items,
            item_fingerprints,
            previous_block_hash,
            timestamp,
            block_hash,
        })
    }
}
