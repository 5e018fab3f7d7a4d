use serde::{Deserialize, Serialize};

use crate::{fingerprint, Category, ItemError, ItemFingerprint};

/// Maximum title length kept for an item, in characters.
pub const MAX_TITLE_CHARS: usize = 280;

/// A single curated news record.
///
/// Items are plain data: once an item has been sealed into a block its
/// fingerprint commits to every field below, so any later edit of the stored
/// text is detectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Headline.  Must be non-empty.
    pub title: String,

    /// Where the item came from: a feed name or `"user-submission"`.
    pub source: String,

    /// Canonical link.  Must be non-empty; unique within a block.
    pub url: String,

    /// Unix timestamp (seconds) the item was published or submitted.
    pub timestamp: i64,

    pub category: Category,
}

impl NewsItem {
    /// Build an item, trimming surrounding whitespace from the text fields and
    /// capping the title at [`MAX_TITLE_CHARS`].
    ///
    /// The result is validated, so an empty title or url is rejected here
    /// rather than at fingerprint time.
    pub fn new(
        title: impl AsRef<str>,
        source: impl AsRef<str>,
        url: impl AsRef<str>,
        timestamp: i64,
        category: Category,
    ) -> Result<Self, ItemError> {
        let item = Self {
            title: title.as_ref().trim().chars().take(MAX_TITLE_CHARS).collect(),
            source: source.as_ref().trim().to_string(),
            url: url.as_ref().trim().to_string(),
            timestamp,
            category,
        };
        item.validate()?;
        Ok(item)
    }

    /// Check the required fields.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.title.trim().is_empty() {
            return Err(ItemError::EmptyTitle);
        }
        if self.url.trim().is_empty() {
            return Err(ItemError::EmptyUrl);
        }
        Ok(())
    }

    /// Validated content fingerprint of this item.
    pub fn fingerprint(&self) -> Result<ItemFingerprint, ItemError> {
        fingerprint::fingerprint(self)
    }
}
