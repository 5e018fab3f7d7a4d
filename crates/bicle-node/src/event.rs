use bicle_audit::ValidationReport;
use bicle_chain::Block;

/// High-level events emitted by a running [`crate::Node`] that callers (a
/// chat bot, a log sink) can subscribe to via a channel.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A new block was sealed and persisted.
    BlockMined(Block),

    /// A mining pass found nothing new.
    NoNewItems,

    /// A feed could not be fetched during a mining pass.
    FeedFailed { source: String, error: String },

    /// Validation found tampered items in the persisted chain.
    IntegrityAlert(ValidationReport),

    /// A manual submission was queued for the next mining pass.
    SubmissionQueued(String),
}
