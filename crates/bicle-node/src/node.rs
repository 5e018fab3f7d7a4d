use std::{sync::Arc, time::Duration};

use bicle_audit::{SerializedChain, ValidationReport, Validator};
use bicle_chain::{Block, ChainError, ChainStore, JsonlBlockLog};
use bicle_item::{Category, ItemError, NewsItem};
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    command::{BlockRange, Command},
    config::NodeConfig,
    error::NodeError,
    event::NodeEvent,
    feed::{http_client, lookup_link, sources_from_config, FeedSource},
    miner::{MineOutcome, MineReport, Miner},
    reply::{ExportPayload, NodeStatus, Reply, SourceStats},
    submissions::{PendingSubmission, SubmissionQueue},
};

/// Source recorded on items that arrive through `submit`.
pub const SUBMISSION_SOURCE: &str = "user-submission";

/// Submitter recorded when none is given.
const ANONYMOUS: &str = "anonymous";

/// Number of blocks shown by [`Command::Proof`].
const PROOF_BLOCKS: usize = 5;

/// The Bicle mining node.
///
/// Owns the chain store, the pending submission queue and the configured
/// feeds, and exposes an async API for:
/// - Mining a new block from submissions and feeds
/// - Validating and exporting block ranges
/// - Accepting manual submissions
/// - Read-only queries (block, hash, proof, stats, status)
///
/// Every method takes `&self`; a node is shared across tasks behind an
/// [`Arc`].
pub struct Node {
    config: Arc<NodeConfig>,
    store: Arc<ChainStore>,
    submissions: Arc<Mutex<SubmissionQueue>>,
    miner: Miner,
    feed_count: usize,
    http: reqwest::Client,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
}

impl Node {
    /// Open the node rooted at `config.data_dir` with the feeds it names.
    ///
    /// Returns the node together with a receiver for [`NodeEvent`]s that the
    /// calling application can process independently.
    pub async fn open(
        config: NodeConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let feeds = sources_from_config(&config, &http_client(&config)?);
        Self::with_feeds(config, feeds).await
    }

    /// Like [`Node::open`] but with explicit feed sources.
    pub async fn with_feeds(
        config: NodeConfig,
        feeds: Vec<Arc<dyn FeedSource>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let log = Arc::new(JsonlBlockLog::new(config.blocks_path()));
        let store = ChainStore::open(log, config.store_options())?;
        let submissions = SubmissionQueue::load(config.pending_path())?;
        info!(
            data_dir = %config.data_dir.display(),
            pending = submissions.len(),
            "Opened node storage"
        );
        Self::with_store(config, store, submissions, feeds).await
    }

    /// Assemble a node around an already opened store.
    ///
    /// The whole chain is validated first.  Structural damage (broken links,
    /// rewritten headers, a foreign genesis block) refuses startup with
    /// [`NodeError::CorruptChain`]; edited item content is reported through
    /// a warning and a [`NodeEvent::IntegrityAlert`] but does not stop the
    /// node.
    pub async fn with_store(
        config: NodeConfig,
        store: ChainStore,
        submissions: SubmissionQueue,
        feeds: Vec<Arc<dyn FeedSource>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let http = http_client(&config)?;

        let report = {
            let chain = store.read().await;
            Validator::new(&chain).validate_all()
        };
        if report.has_structural_damage() {
            warn!(findings = report.findings.len(), "Refusing to start on a corrupt chain");
            return Err(NodeError::CorruptChain(report));
        }
        if !report.is_valid() {
            warn!(findings = report.findings.len(), "Persisted chain has tampered items");
            let _ = event_tx.send(NodeEvent::IntegrityAlert(report));
        }

        let config = Arc::new(config);
        let store = Arc::new(store);
        let submissions = Arc::new(Mutex::new(submissions));
        let feed_count = feeds.len();
        let miner = Miner::new(
            Arc::clone(&store),
            Arc::clone(&submissions),
            feeds,
            Arc::clone(&config),
        );

        info!(
            blocks = store.len().await,
            feeds = feed_count,
            mode = ?config.mining_mode,
            "Node ready"
        );

        let node = Self {
            config,
            store,
            submissions,
            miner,
            feed_count,
            http,
            event_tx,
        };
        Ok((node, event_rx))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Provide access to the underlying chain store.
    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    /// Dispatch one command and build its reply.
    pub async fn handle(&self, command: Command) -> Result<Reply, NodeError> {
        debug!(?command, "Handling command");
        match command {
            Command::Mine => match self.mine().await?.outcome {
                MineOutcome::Mined(block) => Ok(Reply::Mined(block)),
                MineOutcome::NoNewItems => Ok(Reply::NoNewItems),
            },
            Command::Verify(range) => Ok(Reply::Verification(self.verify(range).await?)),
            Command::Submit {
                url,
                title,
                submitter,
            } => {
                let pending = self.submit(url, title, submitter).await?;
                Ok(Reply::Submitted {
                    url: pending.item.url,
                    submitter: pending.submitter,
                    fingerprint: pending.fingerprint,
                })
            }
            Command::Export(range) => Ok(Reply::Export(self.export_payload(range).await?)),
            Command::Block(index) => Ok(Reply::Block(self.store.get(index).await?)),
            Command::Hash => {
                let head = self.store.head().await;
                Ok(Reply::Hash {
                    index: head.index,
                    hash: head.block_hash,
                })
            }
            Command::Proof => Ok(Reply::Proof(self.recent_blocks(PROOF_BLOCKS).await)),
            Command::Stats => Ok(Reply::Stats(self.stats().await)),
            Command::Status => Ok(Reply::Status(self.status().await)),
            Command::Help => Ok(Reply::Help),
        }
    }

    /// Run one mining pass and publish its events.
    pub async fn mine(&self) -> Result<MineReport, NodeError> {
        let report = self.miner.mine().await?;

        for failure in &report.feed_failures {
            let _ = self.event_tx.send(NodeEvent::FeedFailed {
                source: failure.source.clone(),
                error: failure.error.to_string(),
            });
        }
        let event = match &report.outcome {
            MineOutcome::Mined(block) => NodeEvent::BlockMined(block.clone()),
            MineOutcome::NoNewItems => NodeEvent::NoNewItems,
        };
        let _ = self.event_tx.send(event);

        Ok(report)
    }

    /// Validate `range`, or the whole chain when `None`.
    pub async fn verify(&self, range: Option<BlockRange>) -> Result<ValidationReport, NodeError> {
        let report = {
            let chain = self.store.read().await;
            let range = BlockRange::or_all(range, chain.head().index);
            let report = Validator::new(&chain).validate_range(range.from, range.to)?;
            report
        };

        if report.is_valid() {
            info!(from = report.from, to = report.to, "Chain verified");
        } else {
            warn!(
                from = report.from,
                to = report.to,
                findings = report.findings.len(),
                "Chain verification failed"
            );
            let _ = self.event_tx.send(NodeEvent::IntegrityAlert(report.clone()));
        }
        Ok(report)
    }

    /// Queue a manual submission for the next mining pass.
    ///
    /// Submissions are recorded as [`SUBMISSION_SOURCE`] items in the `tech`
    /// category, timestamped now.  A url that is already pending, or already
    /// mined inside the history window, is rejected.
    ///
    /// With `resolve_submitted_links` set and no title given, the url is
    /// fetched; when it serves a feed, its first entry supplies the title
    /// and the channel title replaces the source.
    pub async fn submit(
        &self,
        url: String,
        title: Option<String>,
        submitter: Option<String>,
    ) -> Result<PendingSubmission, NodeError> {
        let category = Category::tech();
        if !self.config.category_allowed(&category) {
            return Err(ItemError::CategoryNotAllowed(category.to_string()).into());
        }

        if url.trim().is_empty() {
            return Err(ItemError::EmptyUrl.into());
        }

        let now = Utc::now().timestamp();
        let mut title = title.filter(|t| !t.trim().is_empty());
        let mut source = SUBMISSION_SOURCE.to_string();
        if title.is_none() && self.config.resolve_submitted_links {
            match lookup_link(&self.http, url.trim()).await {
                Ok(found) => {
                    title = found.title;
                    if let Some(feed_title) = found.source {
                        source = feed_title;
                    }
                }
                Err(e) => debug!(%url, "Submitted link did not resolve as a feed: {e}"),
            }
        }
        let title = title.unwrap_or_else(|| url.clone());
        let item = NewsItem::new(title, source, url, now, category)?;
        let fingerprint = item.fingerprint()?;

        let cutoff = self.config.history_cutoff(now);
        let mined = {
            let chain = self.store.read().await;
            let mined = chain.items_since(cutoff).any(|i| i.url == item.url);
            mined
        };
        if mined {
            return Err(NodeError::AlreadyMined(item.url));
        }

        let submission = PendingSubmission {
            item,
            submitter: submitter.unwrap_or_else(|| ANONYMOUS.to_string()),
            added_at: now,
            fingerprint,
        };

        {
            let mut queue = self.submissions.lock().await;
            queue.enqueue(submission.clone())?;
            info!(
                url = %submission.item.url,
                submitter = %submission.submitter,
                pending = queue.len(),
                "Queued submission"
            );
        }

        let _ = self
            .event_tx
            .send(NodeEvent::SubmissionQueued(submission.item.url.clone()));
        Ok(submission)
    }

    /// Export `range`, or the whole chain when `None`.
    pub async fn export(&self, range: Option<BlockRange>) -> Result<SerializedChain, NodeError> {
        let chain = self.store.read().await;
        let range = BlockRange::or_all(range, chain.head().index);
        Ok(bicle_audit::export(&chain, range.from, range.to)?)
    }

    /// Export `range` as JSON, inline when it fits within
    /// `inline_export_limit` and written under `exports_dir` otherwise.
    pub async fn export_payload(
        &self,
        range: Option<BlockRange>,
    ) -> Result<ExportPayload, NodeError> {
        let export = self.export(range).await?;
        let blocks = export.blocks.len();
        let json = export.to_json()?;

        if json.len() <= self.config.inline_export_limit {
            return Ok(ExportPayload::Inline { json, blocks });
        }

        let dir = self.config.exports_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let name = format!(
            "bicle_chain_{}_{}-{}.json",
            Utc::now().format("%Y%m%d_%H%M%S"),
            export.from,
            export.to
        );
        let path = dir.join(name);
        tokio::fs::write(&path, &json).await?;
        info!(path = %path.display(), bytes = json.len(), blocks, "Wrote export file");

        Ok(ExportPayload::File {
            path,
            bytes: json.len(),
            blocks,
        })
    }

    /// The last `count` blocks, oldest first.
    pub async fn recent_blocks(&self, count: usize) -> Vec<Block> {
        let chain = self.store.read().await;
        let blocks = chain.blocks();
        blocks[blocks.len().saturating_sub(count)..].to_vec()
    }

    pub async fn stats(&self) -> SourceStats {
        let chain = self.store.read().await;
        SourceStats::from_blocks(chain.blocks())
    }

    pub async fn status(&self) -> NodeStatus {
        let cutoff = self.config.history_cutoff(Utc::now().timestamp());
        let (history, blocks, integrity_ok) = {
            let chain = self.store.read().await;
            (
                chain.items_since(cutoff).count(),
                chain.len(),
                Validator::new(&chain).validate_all().is_valid(),
            )
        };
        NodeStatus {
            history,
            pending: self.submissions.lock().await.len(),
            blocks,
            integrity_ok,
            mining_mode: self.config.mining_mode,
            feeds: self.feed_count,
        }
    }

    /// Mine every `interval` until the future is dropped.
    ///
    /// A pass that finds nothing new is normal.  Errors are logged and the
    /// loop continues with the next tick.
    pub async fn run_auto_mine(&self, interval: Duration) {
        use tokio::time;

        // A zero period would panic in `interval`.
        let interval = interval.max(Duration::from_secs(1));
        let mut ticker = time::interval(interval);
        // Skip ticks missed while a pass is still running.
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        // Consume the first (immediate) tick so the first pass fires after `interval`.
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "Auto-mining started");
        loop {
            ticker.tick().await;
            match self.mine().await {
                Ok(_) => {}
                Err(NodeError::Chain(ChainError::Busy(waited))) => {
                    debug!(?waited, "Skipping auto-mine tick while another append runs");
                }
                Err(e) => warn!("Auto-mine pass failed: {e}"),
            }
        }
    }

    /// Flush state that is not written eagerly.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        let queue = self.submissions.lock().await;
        queue.save()?;
        info!(pending = queue.len(), "Node shut down");
        Ok(())
    }
}
