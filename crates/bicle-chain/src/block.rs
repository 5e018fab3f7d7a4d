use bicle_item::{content_digest, Category, Hash32, ItemFingerprint, NewsItem};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest identifying a sealed block.
pub type BlockHash = Hash32;

/// Domain tag prefixed to every block digest.
const BLOCK_DOMAIN: &[u8] = b"bicle:block:v1";

/// Known-good hash of [`Block::genesis`].  Any chain whose first block does
/// not hash to this value did not start from the published genesis.
pub const GENESIS_HASH: BlockHash = Hash32([
    0xa3, 0xb6, 0xe1, 0xdd, 0x68, 0x48, 0x18, 0xcd,
    0x27, 0x6b, 0x6c, 0x26, 0x9a, 0x62, 0x7e, 0x1a,
    0x05, 0x4b, 0xf5, 0x8e, 0x43, 0x9a, 0xa9, 0x59,
    0x2a, 0x62, 0xf8, 0x89, 0x22, 0xad, 0x8f, 0x3a,
]);

const GENESIS_TITLE: &str =
    "The Guardian 05/Nov/2025 - on the brink of a financial crisis for AIs in companies";
const GENESIS_URL: &str =
    "https://www.theguardian.com/business/2025/nov/05/global-stock-markets-fall-sharply-over-ai-bubble-fears";
const GENESIS_SOURCE: &str = "The Guardian";
/// 2025-11-05T00:00:00Z
const GENESIS_PUBLISHED: i64 = 1_762_300_800;
/// 2025-11-05T11:20:00Z
const GENESIS_SEALED: i64 = 1_762_341_600;

/// A sealed group of news items linked to its predecessor.
///
/// `block_hash` is stored alongside the fields it commits to so that a
/// persisted or exported block can be re-checked: recomputing
/// [`Block::compute_hash`] must reproduce it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (genesis = 0).
    pub index: u64,

    /// Items in insertion order.
    pub items: Vec<NewsItem>,

    /// Fingerprint of each entry in `items`, same order.
    pub item_fingerprints: Vec<ItemFingerprint>,

    /// `block_hash` of the previous block.  All-zero for the genesis block.
    pub previous_block_hash: BlockHash,

    /// Unix timestamp (seconds) when this block was sealed.
    pub timestamp: i64,

    pub block_hash: BlockHash,
}

impl Block {
    /// Recompute the block digest from the stored header fields.
    pub fn compute_hash(&self) -> BlockHash {
        block_digest(
            self.index,
            &self.item_fingerprints,
            &self.previous_block_hash,
            self.timestamp,
        )
    }

    /// The fixed first block of every chain.
    pub fn genesis() -> Self {
        let item = NewsItem {
            title: GENESIS_TITLE.to_string(),
            source: GENESIS_SOURCE.to_string(),
            url: GENESIS_URL.to_string(),
            timestamp: GENESIS_PUBLISHED,
            category: Category::tech(),
        };
        let item_fingerprints = vec![content_digest(&item)];
        let block_hash = block_digest(0, &item_fingerprints, &Hash32::ZERO, GENESIS_SEALED);

        Self {
            index: 0,
            items: vec![item],
            item_fingerprints,
            previous_block_hash: Hash32::ZERO,
            timestamp: GENESIS_SEALED,
            block_hash,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// True when `url` is carried by one of this block's items.
    pub fn contains_url(&self, url: &str) -> bool {
        self.items.iter().any(|item| item.url == url)
    }
}

/// Canonical block digest: domain tag, index, fingerprint count, each
/// fingerprint, previous hash, sealing timestamp.
pub fn block_digest(
    index: u64,
    item_fingerprints: &[ItemFingerprint],
    previous_block_hash: &BlockHash,
    timestamp: i64,
) -> BlockHash {
    let mut hasher = Sha256::new();
    hasher.update(BLOCK_DOMAIN);
    hasher.update(index.to_le_bytes());
    hasher.update((item_fingerprints.len() as u64).to_le_bytes());
    for fp in item_fingerprints {
        hasher.update(fp.as_bytes());
    }
    hasher.update(previous_block_hash.as_bytes());
    hasher.update(timestamp.to_le_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    digest.into()
}
