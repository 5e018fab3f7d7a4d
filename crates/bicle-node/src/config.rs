use std::{collections::BTreeSet, path::PathBuf, str::FromStr, time::Duration};

use bicle_chain::{StoreOptions, MAX_ITEMS};
use bicle_item::Category;

use crate::mode::MiningMode;

/// Where a feed is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    /// RSS or Atom document fetched over HTTP(S).
    Url(String),

    /// Local JSON array of feed entries.
    Path(PathBuf),
}

impl FromStr for FeedLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty feed location".to_string());
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(FeedLocation::Url(s.to_string()))
        } else {
            Ok(FeedLocation::Path(PathBuf::from(s)))
        }
    }
}

/// One configured feed: a display name and where its entries come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSourceConfig {
    pub name: String,
    pub location: FeedLocation,
    /// Category given to entries that do not name one.
    pub category: Category,
}

impl FromStr for FeedSourceConfig {
    type Err = String;

    /// Parses `name=location` or `name=location#category`, where a location
    /// starting with `http://` or `https://` is a feed url and anything else
    /// a file path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=LOCATION, got `{s}`"))?;
        let (location, category) = match rest.rsplit_once('#') {
            Some((location, category)) => (location, Category::new(category)),
            None => (rest, Category::tech()),
        };
        if name.trim().is_empty() {
            return Err(format!("expected NAME=LOCATION, got `{s}`"));
        }
        Ok(Self {
            name: name.trim().to_string(),
            location: location.parse()?,
            category,
        })
    }
}

/// Full configuration for a [`crate::Node`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory holding `blocks.jsonl`, `pending.json` and large exports.
    pub data_dir: PathBuf,

    /// Categories accepted from feeds and submissions.  Defaults to `{tech}`.
    pub allowed_categories: BTreeSet<Category>,

    /// Feeds polled on every mining pass, in this order.
    pub feed_sources: Vec<FeedSourceConfig>,

    /// Items per block.  Defaults to [`MAX_ITEMS`].
    pub block_capacity: usize,

    /// Entries taken from each feed per pass.  Defaults to `3`.
    pub per_feed_limit: usize,

    /// How far back deduplication looks into the chain.  Defaults to 30 days.
    pub history_window: Duration,

    /// Bound on waiting for the append lock.  Defaults to 2 seconds.
    pub lock_timeout: Duration,

    /// Manual mining only, or a periodic trigger as well.
    pub mining_mode: MiningMode,

    /// Period of the auto-mining trigger.  Defaults to 5 minutes.
    pub auto_mine_interval: Duration,

    /// Exports larger than this many bytes are written to a file under
    /// `data_dir/exports` and returned by path.  Defaults to 32 KiB.
    pub inline_export_limit: usize,

    /// Bound on each HTTP feed request.  Defaults to 15 seconds.
    pub fetch_timeout: Duration,

    /// Read a submitted link as a feed to fill in a missing title and the
    /// source name.  Defaults to `false`.
    pub resolve_submitted_links: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("bicle-data"),
            allowed_categories: BTreeSet::from([Category::tech()]),
            feed_sources: Vec::new(),
            block_capacity: MAX_ITEMS,
            per_feed_limit: 3,
            history_window: Duration::from_secs(30 * 24 * 60 * 60),
            lock_timeout: Duration::from_secs(2),
            mining_mode: MiningMode::default(),
            auto_mine_interval: Duration::from_secs(300),
            inline_export_limit: 32 * 1024,
            fetch_timeout: Duration::from_secs(15),
            resolve_submitted_links: false,
        }
    }
}

impl NodeConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.data_dir.join("blocks.jsonl")
    }

    pub fn pending_path(&self) -> PathBuf {
        self.data_dir.join("pending.json")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    pub fn category_allowed(&self, category: &Category) -> bool {
        self.allowed_categories.contains(category)
    }

    /// Earliest block timestamp (unix seconds) considered for deduplication.
    pub fn history_cutoff(&self, now: i64) -> i64 {
        let window = i64::try_from(self.history_window.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(window)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            block_capacity: self.block_capacity,
            lock_timeout: self.lock_timeout,
        }
    }
}
