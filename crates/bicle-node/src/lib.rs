pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod miner;
pub mod mode;
pub mod node;
pub mod reply;
pub mod submissions;

pub use command::{BlockRange, Command};
pub use config::{FeedLocation, FeedSourceConfig, NodeConfig};
pub use error::NodeError;
pub use event::NodeEvent;
pub use feed::{
    lookup_link, parse_feed, FeedEntry, FeedError, FeedSource, JsonFileFeed, LinkMetadata,
    ParsedFeed, RssFeed, StaticFeed,
};
pub use miner::{MineOutcome, MineReport, Miner};
pub use mode::MiningMode;
pub use node::{Node, SUBMISSION_SOURCE};
pub use reply::{format_block, ExportPayload, NodeStatus, Reply, SourceStats};
pub use submissions::{PendingSubmission, SubmissionQueue};
