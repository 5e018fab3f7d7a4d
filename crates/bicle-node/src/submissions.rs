use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use bicle_item::{ItemFingerprint, NewsItem};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NodeError;

/// A manually submitted item waiting for the next mining pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub item: NewsItem,
    pub submitter: String,
    /// Unix timestamp (seconds) the submission was accepted.
    pub added_at: i64,
    pub fingerprint: ItemFingerprint,
}

/// Manually submitted items, oldest first, optionally persisted as a JSON
/// file so they survive a restart.
#[derive(Debug, Default)]
pub struct SubmissionQueue {
    path: Option<PathBuf>,
    pending: Vec<PendingSubmission>,
}

impl SubmissionQueue {
    /// A queue that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the queue persisted at `path`; a missing file is an empty queue.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, NodeError> {
        let path = path.into();
        let pending = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: Some(path),
            pending,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.pending.iter().any(|p| p.item.url == url)
    }

    /// Pending submissions in submission order.
    pub fn pending(&self) -> &[PendingSubmission] {
        &self.pending
    }

    /// Queue a submission.  A url may only be pending once.
    pub fn push(&mut self, submission: PendingSubmission) -> Result<(), NodeError> {
        if self.contains_url(&submission.item.url) {
            return Err(NodeError::AlreadyPending(submission.item.url));
        }
        self.pending.push(submission);
        Ok(())
    }

    /// Queue a submission and write the queue.  When the write fails the
    /// submission is taken back out, leaving the queue as it was.
    pub fn enqueue(&mut self, submission: PendingSubmission) -> Result<(), NodeError> {
        self.push(submission)?;
        if let Err(e) = self.save() {
            self.pending.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Drop every submission whose url is in `urls`.  Returns how many were
    /// removed.
    pub fn remove_urls(&mut self, urls: &HashSet<&str>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| !urls.contains(p.item.url.as_str()));
        before - self.pending.len()
    }

    /// Write the queue to its file, if it has one.
    pub fn save(&self) -> Result<(), NodeError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.pending)?)?;
        debug!(pending = self.pending.len(), path = %path.display(), "Saved pending queue");
        Ok(())
    }
}
