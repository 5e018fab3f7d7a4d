use sha2::{Digest, Sha256};

use crate::{ItemError, ItemFingerprint, NewsItem};

/// Domain tag prefixed to every item digest.
const ITEM_DOMAIN: &[u8] = b"bicle:item:v1";

/// Compute the fingerprint of a valid item.
///
/// Rejects items with an empty title or url before anything is hashed.
pub fn fingerprint(item: &NewsItem) -> Result<ItemFingerprint, ItemError> {
    item.validate()?;
    Ok(content_digest(item))
}

/// Digest of an item's canonical encoding, without validating it first.
///
/// Used when re-checking stored content: a tampered item may no longer pass
/// validation but still has to be hashed so the mismatch can be reported.
///
/// Canonical encoding: the domain tag, then title, source and url as
/// length-prefixed UTF-8 (u64 little-endian byte count), the timestamp as
/// i64 little-endian, and finally the length-prefixed category.  Because every
/// text field carries its own length, moving bytes from one field into a
/// neighbour always changes the encoding.
pub fn content_digest(item: &NewsItem) -> ItemFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(ITEM_DOMAIN);
    put_field(&mut hasher, &item.title);
    put_field(&mut hasher, &item.source);
    put_field(&mut hasher, &item.url);
    hasher.update(item.timestamp.to_le_bytes());
    put_field(&mut hasher, item.category.as_str());
    let digest: [u8; 32] = hasher.finalize().into();
    digest.into()
}

fn put_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
