use bicle_item::NewsItem;
use serde::{Deserialize, Serialize};

use crate::{block::Block, builder::BlockBuilder, error::ChainError};

/// The append-only sequence of [`Block`]s.
///
/// Invariants maintained by [`Chain::push`]:
/// - Always contains at least the genesis block.
/// - Every block's `previous_block_hash` matches the hash of the preceding block.
/// - Block indices are contiguous starting from 0.
///
/// A chain loaded with [`Chain::from_blocks`] is taken as-is; checking a
/// loaded chain is the validator's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Initialise a new chain with only the genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Wrap previously persisted blocks without checking them.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        if blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        Ok(Self { blocks })
    }

    /// Number of blocks in the chain (including genesis).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The most recent block.
    pub fn head(&self) -> &Block {
        // Never empty: both constructors guarantee at least one block.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get(&self, index: u64) -> Result<&Block, ChainError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blocks.get(i))
            .ok_or(ChainError::NotFound(index))
    }

    /// Blocks `from..=to`.
    pub fn range(&self, from: u64, to: u64) -> Result<&[Block], ChainError> {
        if from > to {
            return Err(ChainError::InvalidRange { from, to });
        }
        self.get(to)?;
        Ok(&self.blocks[from as usize..=to as usize])
    }

    /// All blocks in the chain.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Items of every block sealed at or after `since` (unix seconds).
    pub fn items_since(&self, since: i64) -> impl Iterator<Item = &NewsItem> {
        self.blocks
            .iter()
            .filter(move |b| b.timestamp >= since)
            .flat_map(|b| b.items.iter())
    }

    /// Seal `items` into the block that would follow the current head.
    ///
    /// The chain itself is not modified; pass the result to [`Chain::push`].
    pub fn build_next(&self, items: Vec<NewsItem>, capacity: usize) -> Result<Block, ChainError> {
        let mut builder = BlockBuilder::new(capacity);
        for item in items {
            builder.add(item)?;
        }
        let head = self.head();
        builder.seal(head.block_hash, head.index + 1)
    }

    /// Check that `block` can be appended to the current head.
    pub fn check_next(&self, block: &Block) -> Result<(), ChainError> {
        let head = self.head();
        if block.previous_block_hash != head.block_hash {
            return Err(ChainError::ChainCorruption(format!(
                "block #{} links to {} but head #{} is {}",
                block.index,
                block.previous_block_hash.short(16),
                head.index,
                head.block_hash.short(16),
            )));
        }
        if block.index != head.index + 1 {
            return Err(ChainError::ChainCorruption(format!(
                "block index {} does not follow head index {}",
                block.index, head.index
            )));
        }
        if block.compute_hash() != block.block_hash {
            return Err(ChainError::ChainCorruption(format!(
                "block #{} carries a stale hash",
                block.index
            )));
        }
        Ok(())
    }

    /// Append a sealed block after re-checking its linkage.
    pub fn push(&mut self, block: Block) -> Result<&Block, ChainError> {
        self.check_next(&block)?;
        self.blocks.push(block);
        Ok(self.head())
    }
}

#[cfg(test)]
mod tests {
    use bicle_item::Category;

    use super::*;
    use crate::MAX_ITEMS;

    fn items(tag: &str, count: usize) -> Vec<NewsItem> {
        (0..count)
            .map(|n| {
                NewsItem::new(
                    format!("{tag} {n}"),
                    "Feed",
                    format!("https://{tag}.example/{n}"),
                    n as i64,
                    Category::tech(),
                )
                .unwrap()
            })
            .collect()
    }

    fn append(chain: &mut Chain, tag: &str, count: usize) {
        let block = chain.build_next(items(tag, count), MAX_ITEMS).unwrap();
        chain.push(block).unwrap();
    }

    #[test]
    fn new_chain_holds_genesis() {
        let chain = Chain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.head(), &Block::genesis());
    }

    #[test]
    fn appends_are_sequential() {
        let mut chain = Chain::new();
        for k in 1..=4u64 {
            append(&mut chain, &format!("round{k}"), 2);
            assert_eq!(chain.len() as u64, k + 1);
            assert_eq!(chain.get(k).unwrap().index, k);
        }
        for pair in chain.blocks().windows(2) {
            assert_eq!(pair[1].previous_block_hash, pair[0].block_hash);
        }
    }

    #[test]
    fn push_rejects_stale_link() {
        let mut chain = Chain::new();
        let stale = chain.build_next(items("a", 1), MAX_ITEMS).unwrap();
        append(&mut chain, "b", 1);

        let err = chain.push(stale).unwrap_err();
        assert!(matches!(err, ChainError::ChainCorruption(_)));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn get_out_of_range_is_not_found() {
        let chain = Chain::new();
        assert!(matches!(chain.get(3), Err(ChainError::NotFound(3))));
        assert!(matches!(chain.range(0, 3), Err(ChainError::NotFound(3))));
        assert!(matches!(chain.range(1, 0), Err(ChainError::InvalidRange { .. })));
    }

    #[test]
    fn items_since_filters_by_seal_time() {
        let mut chain = Chain::new();
        append(&mut chain, "fresh", 2);
        let head_ts = chain.head().timestamp;
        let urls: Vec<_> = chain.items_since(head_ts).map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://fresh.example/0", "https://fresh.example/1"]);
    }

    #[test]
    fn from_blocks_rejects_empty() {
        assert!(matches!(Chain::from_blocks(vec![]), Err(ChainError::EmptyChain)));
    }
}
