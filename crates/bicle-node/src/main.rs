use std::{collections::BTreeSet, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use bicle_item::Category;
use bicle_node::{BlockRange, Command, FeedSourceConfig, MiningMode, Node, NodeConfig, Reply};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Bicle verifiable news log node.
#[derive(Parser, Debug)]
#[command(
    name = "bicle-node",
    version,
    about = "Bicle verifiable news log",
    long_about = "Curates news from feeds and manual submissions into a hash-linked, \
                  tamper-evident chain of blocks that anyone can export and verify."
)]
struct Cli {
    /// Directory holding the block log, pending queue and exports.
    #[arg(short, long, default_value = "bicle-data", env = "BICLE_DATA_DIR")]
    data_dir: PathBuf,

    /// Feed source as NAME=LOCATION or NAME=LOCATION#CATEGORY, where LOCATION is
    /// an http(s) RSS/Atom url or a JSON file path.  Repeatable; polled in order.
    #[arg(short, long = "feed", env = "BICLE_FEEDS", value_delimiter = ',')]
    feeds: Vec<FeedSourceConfig>,

    /// Allowed category.  Repeatable; defaults to `tech`.
    #[arg(short, long = "category", env = "BICLE_CATEGORIES", value_delimiter = ',')]
    categories: Vec<String>,

    /// Items per block (1-5).
    #[arg(long, default_value_t = 5, env = "BICLE_BLOCK_CAPACITY")]
    capacity: usize,

    /// Entries taken from each feed per mining pass.
    #[arg(long, default_value_t = 3, env = "BICLE_PER_FEED_LIMIT")]
    per_feed_limit: usize,

    /// Days of chain history consulted for deduplication.
    #[arg(long, default_value_t = 30, env = "BICLE_HISTORY_DAYS")]
    history_days: u64,

    /// Seconds an append waits for the writer lock.
    #[arg(long, default_value_t = 2, env = "BICLE_LOCK_TIMEOUT")]
    lock_timeout: u64,

    /// Mine periodically while running.
    #[arg(long, default_value_t = false, env = "BICLE_AUTO_MINE")]
    auto_mine: bool,

    /// Seconds between auto-mining passes.
    #[arg(
        long,
        default_value_t = 300,
        env = "BICLE_AUTO_MINE_INTERVAL",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Seconds a feed or link request may take.
    #[arg(long, default_value_t = 15, env = "BICLE_FETCH_TIMEOUT")]
    fetch_timeout: u64,

    /// Look up the title of submitted links that serve a feed.
    #[arg(long, default_value_t = false, env = "BICLE_RESOLVE_LINKS")]
    resolve_links: bool,

    /// Exports above this many bytes are written to a file.
    #[arg(long, default_value_t = 32 * 1024, env = "BICLE_INLINE_EXPORT_LIMIT")]
    inline_export_limit: usize,

    /// Suppress log output to stderr (run silently).
    #[arg(short, long, default_value_t = false, env = "BICLE_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Run one mining pass.
    Mine,

    /// Validate a block range (`a..b`, inclusive) or the whole chain.
    Verify { range: Option<BlockRange> },

    /// Queue a news url for the next mining pass.
    Submit {
        url: String,
        /// Headline; defaults to the url.
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        submitter: Option<String>,
    },

    /// Export a block range for independent audit.
    Export {
        range: Option<BlockRange>,
        /// Write the export here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show one block.
    Block { index: u64 },

    /// Latest block number and hash.
    Hash,

    /// Summary of the latest blocks.
    Proof,

    /// Item counts per source.
    Stats,

    /// Node status.
    Status,

    /// Keep the node running: read commands such as `/mine` from stdin and
    /// auto-mine when enabled, until Ctrl-C or end of input.
    Run,
}

impl Cli {
    fn node_config(&self) -> NodeConfig {
        let allowed_categories: BTreeSet<Category> = if self.categories.is_empty() {
            BTreeSet::from([Category::tech()])
        } else {
            self.categories.iter().map(Category::new).collect()
        };

        NodeConfig {
            data_dir: self.data_dir.clone(),
            allowed_categories,
            feed_sources: self.feeds.clone(),
            block_capacity: self.capacity,
            per_feed_limit: self.per_feed_limit,
            history_window: Duration::from_secs(self.history_days * 24 * 60 * 60),
            lock_timeout: Duration::from_secs(self.lock_timeout),
            mining_mode: if self.auto_mine {
                MiningMode::Auto
            } else {
                MiningMode::Manual
            },
            auto_mine_interval: Duration::from_secs(self.interval),
            inline_export_limit: self.inline_export_limit,
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
            resolve_submitted_links: self.resolve_links,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env().add_directive("bicle_node=info".parse()?)
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.node_config();
    info!(
        data_dir = %config.data_dir.display(),
        feeds = config.feed_sources.len(),
        mode = ?config.mining_mode,
        "Starting Bicle node"
    );

    let (node, mut events) = Node::open(config)
        .await
        .context("failed to open the node")?;
    let node = Arc::new(node);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("NodeEvent: {event:?}");
        }
    });

    let command = match cli.command {
        CliCommand::Run => return run(node).await,
        CliCommand::Export {
            range,
            out: Some(out),
        } => {
            let json = node.export(range).await?.to_json()?;
            tokio::fs::write(&out, json)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Export written to {}", out.display());
            return Ok(());
        }
        CliCommand::Export { range, out: None } => Command::Export(range),
        CliCommand::Mine => Command::Mine,
        CliCommand::Verify { range } => Command::Verify(range),
        CliCommand::Submit {
            url,
            title,
            submitter,
        } => Command::Submit {
            url,
            title,
            submitter,
        },
        CliCommand::Block { index } => Command::Block(index),
        CliCommand::Hash => Command::Hash,
        CliCommand::Proof => Command::Proof,
        CliCommand::Stats => Command::Stats,
        CliCommand::Status => Command::Status,
    };

    let reply = node.handle(command).await;
    node.shutdown().await?;
    let reply = reply?;
    println!("{reply}");

    if let Reply::Verification(report) = &reply {
        if !report.is_valid() {
            std::process::exit(2);
        }
    }
    Ok(())
}

/// Serve commands from stdin, with the auto-mining loop alongside when
/// enabled, until Ctrl-C or end of input.
async fn run(node: Arc<Node>) -> anyhow::Result<()> {
    let auto_mine = node.config().mining_mode.is_auto().then(|| {
        let node = Arc::clone(&node);
        let interval = node.config().auto_mine_interval;
        tokio::spawn(async move { node.run_auto_mine(interval).await })
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let result = match line.parse::<Command>() {
                    Ok(command) => node.handle(command).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(reply) => println!("{reply}\n"),
                    Err(e) => {
                        warn!("Command failed: {e}");
                        println!("[ERROR] {e}\n");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if let Some(handle) = auto_mine {
        handle.abort();
    }
    node.shutdown().await?;
    Ok(())
}
