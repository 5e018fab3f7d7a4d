use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use bicle_item::{Category, NewsItem};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{FeedLocation, FeedSourceConfig, NodeConfig};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid feed document: {0}")]
    Syndication(#[from] feed_rs::parser::ParseFeedError),

    #[error("feed unavailable: {0}")]
    Unavailable(String),
}

/// A raw entry as delivered by a feed, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub published: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A produce-once source of candidate news.
///
/// Fetching and parsing live behind this trait; the miner only sees the
/// entries it returns.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn name(&self) -> &str;

    /// Category applied to entries that do not carry one.
    fn category(&self) -> Category {
        Category::tech()
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, FeedError>;
}

/// Reads a JSON array of [`FeedEntry`] from a local file on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileFeed {
    name: String,
    path: PathBuf,
    category: Category,
}

impl JsonFileFeed {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, category: Category) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            category,
        }
    }
}

#[async_trait]
impl FeedSource for JsonFileFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category.clone()
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, FeedError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// An RSS or Atom feed fetched over HTTP on every fetch.
#[derive(Debug, Clone)]
pub struct RssFeed {
    name: String,
    url: String,
    category: Category,
    client: reqwest::Client,
}

impl RssFeed {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        category: Category,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            category,
            client,
        }
    }
}

#[async_trait]
impl FeedSource for RssFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category.clone()
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, FeedError> {
        let body = fetch_document(&self.client, &self.url).await?;
        Ok(parse_feed(&body)?.entries)
    }
}

/// A parsed RSS or Atom document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// The channel title, if any.
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// Parse an RSS or Atom document into feed entries, in document order.
///
/// Feed-level categories are not carried over; entries take the category of
/// the source they were read from.  The publication time falls back to the
/// update time.
pub fn parse_feed(document: &[u8]) -> Result<ParsedFeed, FeedError> {
    let feed = feed_rs::parser::parse(document)?;
    let entries = feed
        .entries
        .into_iter()
        .map(|entry| FeedEntry {
            title: entry.title.map(|t| t.content.trim().to_string()),
            link: entry.links.into_iter().next().map(|l| l.href.trim().to_string()),
            published: entry.published.or(entry.updated).map(|t| t.timestamp()),
            category: None,
        })
        .collect();

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content.trim().to_string()),
        entries,
    })
}

async fn fetch_document(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FeedError> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// What a submitted link says about itself when it serves a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkMetadata {
    /// Title of the first entry.
    pub title: Option<String>,
    /// Channel title, used as the item source.
    pub source: Option<String>,
    /// Publication time of the first entry.
    pub published: Option<i64>,
}

/// Fetch `url` and read it as a feed.  A link that is not a feed, or whose
/// feed has no entries, yields an error.
pub async fn lookup_link(client: &reqwest::Client, url: &str) -> Result<LinkMetadata, FeedError> {
    let parsed = parse_feed(&fetch_document(client, url).await?)?;
    let first = parsed
        .entries
        .into_iter()
        .next()
        .ok_or_else(|| FeedError::Unavailable(format!("{url} has no feed entries")))?;
    Ok(LinkMetadata {
        title: first.title.filter(|t| !t.is_empty()),
        source: parsed.title.filter(|t| !t.is_empty()),
        published: first.published,
    })
}

/// HTTP client shared by every feed request of a node.
pub fn http_client(config: &NodeConfig) -> Result<reqwest::Client, FeedError> {
    Ok(reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .user_agent(concat!("bicle-node/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// A fixed list of entries, returned on every fetch.
#[derive(Debug, Clone)]
pub struct StaticFeed {
    name: String,
    entries: Vec<FeedEntry>,
}

impl StaticFeed {
    pub fn new(name: impl Into<String>, entries: Vec<FeedEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, FeedError> {
        Ok(self.entries.clone())
    }
}

/// Build the feed sources named in `config`, in configured order.
pub fn sources_from_config(
    config: &NodeConfig,
    client: &reqwest::Client,
) -> Vec<Arc<dyn FeedSource>> {
    config
        .feed_sources
        .iter()
        .map(|feed| source_from_config(feed, client))
        .collect()
}

fn source_from_config(feed: &FeedSourceConfig, client: &reqwest::Client) -> Arc<dyn FeedSource> {
    let category = feed.category.clone();
    match &feed.location {
        FeedLocation::Url(url) => Arc::new(RssFeed::new(&feed.name, url, category, client.clone())),
        FeedLocation::Path(path) => Arc::new(JsonFileFeed::new(&feed.name, path, category)),
    }
}

/// A source that failed during a harvest.
#[derive(Debug)]
pub struct FeedFailure {
    pub source: String,
    pub error: FeedError,
}

/// Everything collected from the feeds in one pass.
#[derive(Debug, Default)]
pub struct Harvest {
    /// Normalised items, in source order then entry order.
    pub items: Vec<NewsItem>,
    pub failures: Vec<FeedFailure>,
}

/// Fetch every source concurrently and normalise the results.
///
/// A failing source is recorded in [`Harvest::failures`] and does not affect
/// the others.  Per source, at most `per_feed_limit` entries are considered;
/// entries without a link, outside the allowed categories, or otherwise
/// invalid are dropped.
pub async fn harvest(sources: &[Arc<dyn FeedSource>], config: &NodeConfig) -> Harvest {
    let results = join_all(sources.iter().map(|source| source.fetch())).await;
    let now = Utc::now().timestamp();
    let mut harvest = Harvest::default();

    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(entries) => {
                let before = harvest.items.len();
                for entry in entries.into_iter().take(config.per_feed_limit) {
                    if let Some(item) = normalise(source.as_ref(), entry, config, now) {
                        harvest.items.push(item);
                    }
                }
                debug!(
                    source = source.name(),
                    items = harvest.items.len() - before,
                    "Harvested feed"
                );
            }
            Err(error) => {
                warn!(source = source.name(), "Failed to fetch feed: {error}");
                harvest.failures.push(FeedFailure {
                    source: source.name().to_string(),
                    error,
                });
            }
        }
    }

    harvest
}

fn normalise(
    source: &dyn FeedSource,
    entry: FeedEntry,
    config: &NodeConfig,
    now: i64,
) -> Option<NewsItem> {
    let link = entry.link.filter(|l| !l.trim().is_empty())?;
    let category = entry
        .category
        .map(Category::new)
        .unwrap_or_else(|| source.category());
    if !config.category_allowed(&category) {
        debug!(source = source.name(), %category, "Skipping entry outside allowed categories");
        return None;
    }
    let title = entry
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| link.clone());

    match NewsItem::new(title, source.name(), &link, entry.published.unwrap_or(now), category) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!(source = source.name(), link = %link, "Dropping invalid feed entry: {e}");
            None
        }
    }
}
