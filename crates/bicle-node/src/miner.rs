use std::{collections::HashSet, sync::Arc};

use bicle_chain::{Block, Chain, ChainStore, MAX_ITEMS};
use bicle_item::{content_digest, NewsItem};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    error::NodeError,
    feed::{harvest, FeedFailure, FeedSource},
    submissions::SubmissionQueue,
};

/// Result of one mining pass.
#[derive(Debug)]
pub enum MineOutcome {
    /// A new block was sealed and appended.
    Mined(Block),

    /// Nothing new to mine.  Not an error: no block is produced.
    NoNewItems,
}

#[derive(Debug)]
pub struct MineReport {
    pub outcome: MineOutcome,
    /// Candidates gathered before deduplication.
    pub candidates: usize,
    pub feed_failures: Vec<FeedFailure>,
    /// Set when the pass succeeded but the pending queue could not be
    /// written afterwards.  The in-memory queue is already pruned and is
    /// written again on the next save.
    pub queue_error: Option<NodeError>,
}

/// Curates candidate items and drives the chain store to append them.
///
/// Candidate order is fixed: pending submissions oldest first, then feed
/// entries in configured source order.  When more candidates survive
/// deduplication than fit in a block, the earliest ones win and the rest
/// wait for a later pass.
pub struct Miner {
    store: Arc<ChainStore>,
    submissions: Arc<Mutex<SubmissionQueue>>,
    feeds: Vec<Arc<dyn FeedSource>>,
    config: Arc<NodeConfig>,
}

impl Miner {
    pub fn new(
        store: Arc<ChainStore>,
        submissions: Arc<Mutex<SubmissionQueue>>,
        feeds: Vec<Arc<dyn FeedSource>>,
        config: Arc<NodeConfig>,
    ) -> Self {
        Self {
            store,
            submissions,
            feeds,
            config,
        }
    }

    /// Run one mining pass.
    ///
    /// Feeds are fetched before the append lock is taken; deduplication
    /// against the chain runs under it.
    pub async fn mine(&self) -> Result<MineReport, NodeError> {
        let harvest = harvest(&self.feeds, &self.config).await;

        let mut candidates: Vec<NewsItem> = {
            let queue = self.submissions.lock().await;
            queue.pending().iter().map(|p| p.item.clone()).collect()
        };
        candidates.extend(harvest.items);
        let candidate_count = candidates.len();

        let cutoff = self.config.history_cutoff(Utc::now().timestamp());
        let capacity = self.config.block_capacity;
        let block = self
            .store
            .append_with(|chain| select_items(candidates, chain, capacity, cutoff))
            .await?;

        let queue_error = self.prune_submissions(cutoff).await.err();
        if let Some(e) = &queue_error {
            warn!("Failed to save pending queue after mining: {e}");
        }

        let outcome = match block {
            Some(block) => {
                info!(
                    index = block.index,
                    items = block.items.len(),
                    candidates = candidate_count,
                    "Mined block"
                );
                MineOutcome::Mined(block)
            }
            None => {
                info!(candidates = candidate_count, "No new items to mine");
                MineOutcome::NoNewItems
            }
        };

        Ok(MineReport {
            outcome,
            candidates: candidate_count,
            feed_failures: harvest.failures,
            queue_error,
        })
    }

    /// Drop pending submissions that are now on the chain.
    async fn prune_submissions(&self, cutoff: i64) -> Result<(), NodeError> {
        let mined: HashSet<String> = {
            let chain = self.store.read().await;
            chain.items_since(cutoff).map(|i| i.url.clone()).collect()
        };
        let mined: HashSet<&str> = mined.iter().map(String::as_str).collect();

        let mut queue = self.submissions.lock().await;
        let removed = queue.remove_urls(&mined);
        if removed > 0 {
            debug!(removed, "Removed mined submissions from pending queue");
            queue.save()?;
        }
        Ok(())
    }
}

/// Pick up to `capacity` candidates that are new to the chain.
///
/// Invalid candidates are skipped.  A candidate is a duplicate when its url
/// or its fingerprint matches an earlier candidate or an item in a block
/// sealed at or after `since`.
pub fn select_items(
    candidates: Vec<NewsItem>,
    chain: &Chain,
    capacity: usize,
    since: i64,
) -> Vec<NewsItem> {
    let capacity = capacity.clamp(1, MAX_ITEMS);
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_fingerprints = HashSet::new();
    for item in chain.items_since(since) {
        seen_urls.insert(item.url.clone());
        seen_fingerprints.insert(content_digest(item));
    }

    let mut selected = Vec::new();
    for item in candidates {
        if selected.len() >= capacity {
            break;
        }
        let fingerprint = match item.fingerprint() {
            Ok(fp) => fp,
            Err(e) => {
                warn!(url = %item.url, "Skipping invalid candidate: {e}");
                continue;
            }
        };
        if seen_urls.contains(&item.url) || !seen_fingerprints.insert(fingerprint) {
            debug!(url = %item.url, "Skipping duplicate candidate");
            continue;
        }
        seen_urls.insert(item.url.clone());
        selected.push(item);
    }
    selected
}

#[cfg(test)]
mod tests {
    use bicle_chain::StoreOptions;
    use bicle_item::Category;

    use super::*;
    use crate::submissions::PendingSubmission;

    fn item(title: &str, url: &str) -> NewsItem {
        NewsItem::new(title, "Feed", url, 1_700_000_000, Category::tech()).unwrap()
    }

    #[test]
    fn batch_duplicates_are_dropped() {
        let chain = Chain::new();
        let picked = select_items(
            vec![
                item("A", "https://a.example"),
                item("A again", "https://a.example"),
                item("B", "https://b.example"),
            ],
            &chain,
            5,
            0,
        );
        let urls: Vec<_> = picked.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn chain_history_is_respected() {
        let mut chain = Chain::new();
        let block = chain.build_next(vec![item("Old", "https://old.example")], 5).unwrap();
        chain.push(block).unwrap();

        let picked = select_items(
            vec![item("Old", "https://old.example"), item("New", "https://new.example")],
            &chain,
            5,
            0,
        );
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].url, "https://new.example");

        // Outside the history window the old url may be mined again.
        let later = chain.head().timestamp + 1;
        let picked = select_items(vec![item("Old", "https://old.example")], &chain, 5, later);
        assert_eq!(picked.len(), 1);
    }

    #[test]
    fn earliest_candidates_win_when_over_capacity() {
        let chain = Chain::new();
        let candidates = (0..8)
            .map(|n| item(&format!("Story {n}"), &format!("https://s.example/{n}")))
            .collect();
        let picked = select_items(candidates, &chain, 5, 0);
        let titles: Vec<_> = picked.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Story 0", "Story 1", "Story 2", "Story 3", "Story 4"]);
    }

    #[test]
    fn invalid_candidates_are_skipped() {
        let chain = Chain::new();
        let mut broken = item("Fine", "https://fine.example");
        broken.title.clear();
        let picked = select_items(vec![broken, item("Ok", "https://ok.example")], &chain, 5, 0);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].url, "https://ok.example");
    }

    #[tokio::test]
    async fn queue_save_failure_does_not_hide_a_mined_block() {
        let dir = tempfile::tempdir().unwrap();
        let pending_path = dir.path().join("pending.json");
        let mut queue = SubmissionQueue::load(&pending_path).unwrap();
        let item = item("Queued", "https://queued.example");
        queue
            .push(PendingSubmission {
                fingerprint: item.fingerprint().unwrap(),
                item,
                submitter: "alice".into(),
                added_at: 0,
            })
            .unwrap();
        // A directory in place of the queue file makes every save fail.
        std::fs::create_dir(&pending_path).unwrap();

        let store = Arc::new(ChainStore::in_memory(StoreOptions::default()).unwrap());
        let submissions = Arc::new(Mutex::new(queue));
        let miner = Miner::new(
            Arc::clone(&store),
            Arc::clone(&submissions),
            Vec::new(),
            Arc::new(NodeConfig::default()),
        );

        let report = miner.mine().await.unwrap();
        assert!(matches!(report.outcome, MineOutcome::Mined(ref b) if b.index == 1));
        assert!(matches!(report.queue_error, Some(NodeError::Io(_))));
        assert_eq!(store.len().await, 2);
        assert!(submissions.lock().await.is_empty());
    }
}
