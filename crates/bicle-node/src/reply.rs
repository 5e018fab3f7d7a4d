use std::{collections::HashMap, fmt, path::PathBuf};

use bicle_audit::ValidationReport;
use bicle_chain::{Block, BlockHash};
use bicle_item::ItemFingerprint;

use crate::mode::MiningMode;

/// Success payloads returned to the command surface.  Rendering them for a
/// chat or terminal is up to the caller; `Display` gives a plain-text form.
#[derive(Debug, Clone)]
pub enum Reply {
    Mined(Block),
    NoNewItems,
    Verification(ValidationReport),
    Submitted {
        url: String,
        submitter: String,
        fingerprint: ItemFingerprint,
    },
    Export(ExportPayload),
    Block(Block),
    Hash { index: u64, hash: BlockHash },
    Proof(Vec<Block>),
    Stats(SourceStats),
    Status(NodeStatus),
    Help,
}

/// An export, inline or written to a file when too large to send inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPayload {
    Inline { json: String, blocks: usize },
    File { path: PathBuf, bytes: usize, blocks: usize },
}

/// Item counts per source, highest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub sources: Vec<(String, usize)>,
    pub total_items: usize,
    pub blocks: usize,
}

impl SourceStats {
    /// Shown sources are capped at ten; totals cover every source.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for item in blocks.iter().flat_map(|b| &b.items) {
            *counts.entry(item.source.as_str()).or_default() += 1;
        }
        let total_items = counts.values().sum();
        let mut sources: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(source, n)| (source.to_string(), n))
            .collect();
        sources.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sources.truncate(10);

        Self {
            sources,
            total_items,
            blocks: blocks.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// Urls inside the deduplication window.
    pub history: usize,
    pub pending: usize,
    pub blocks: usize,
    pub integrity_ok: bool,
    pub mining_mode: MiningMode,
    pub feeds: usize,
}

/// Multi-line block summary: header, then one entry per item.
pub fn format_block(block: &Block) -> String {
    let mut lines = vec![
        format!("[BLOCK #{}]", block.index),
        format!("TIME: {} UTC", format_timestamp(block.timestamp)),
        format!("NEWS: {}", block.items.len()),
        format!("HASH: {}...", block.block_hash.short(16)),
    ];
    if !block.is_genesis() {
        lines.push(format!("PREV: {}...", block.previous_block_hash.short(16)));
    }
    lines.push(String::new());

    for (n, (item, fp)) in block.items.iter().zip(&block.item_fingerprints).enumerate() {
        let title: String = item.title.chars().take(100).collect();
        lines.push(format!("{}. {} - {}", n + 1, item.source, title));
        lines.push(format!("   > {}", item.url));
        lines.push(format!("   iHash: {}...", fp.short(16)));
    }
    lines.join("\n")
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Mined(block) => {
                write!(f, "[SUCCESS] Block successfully mined\n\n{}", format_block(block))
            }
            Reply::NoNewItems => f.write_str("[INFO] No new items to mine."),
            Reply::Verification(report) => write!(f, "{report}"),
            Reply::Submitted {
                url,
                submitter,
                fingerprint,
            } => write!(
                f,
                "[SUCCESS] News submitted by {submitter}\nStatus: added to pending queue\nURL: {url}\niHash: {}...",
                fingerprint.short(16)
            ),
            Reply::Export(ExportPayload::Inline { json, .. }) => f.write_str(json),
            Reply::Export(ExportPayload::File { path, bytes, blocks }) => write!(
                f,
                "[EXPORT] {blocks} blocks exported ({bytes} bytes): {}",
                path.display()
            ),
            Reply::Block(block) => f.write_str(&format_block(block)),
            Reply::Hash { index, hash } => {
                write!(f, "[BLOCK INFO]\n\nNumber: #{index}\nHash: {hash}")
            }
            Reply::Proof(blocks) => {
                writeln!(f, "[PROOF]\n\nLast blocks:")?;
                for block in blocks {
                    write!(
                        f,
                        "\n[#{}] {}\n   NEWS: {} | HASH: {}...\n",
                        block.index,
                        format_timestamp(block.timestamp),
                        block.items.len(),
                        block.block_hash.short(16)
                    )?;
                }
                Ok(())
            }
            Reply::Stats(stats) => {
                writeln!(f, "[STATISTICS] Source distribution\n")?;
                for (source, count) in &stats.sources {
                    writeln!(f, "| {source}: {count} entries")?;
                }
                write!(
                    f,
                    "\n[TOTAL] {} entries across {} blocks",
                    stats.total_items, stats.blocks
                )
            }
            Reply::Status(status) => write!(
                f,
                "[NODE STATUS]\n\nHISTORY: {} entries\nPENDING: {} submissions\nBLOCKS: {}\nINTEGRITY: {}\nFEEDS: {}\nAUTO-MINE: {}",
                status.history,
                status.pending,
                status.blocks,
                if status.integrity_ok { "VERIFIED" } else { "COMPROMISED" },
                status.feeds,
                if status.mining_mode.is_auto() { "ACTIVE" } else { "MANUAL" },
            ),
            Reply::Help => f.write_str(
                "Commands:\n\
                 /submit <url> [title] - submit news\n\
                 /mine - mine a new block\n\
                 /block <n> - view a block\n\
                 /hash - latest block hash\n\
                 /proof - latest blocks\n\
                 /verify [a..b] - verify the chain\n\
                 /export [a..b] - export the chain for audit\n\
                 /stats - source statistics\n\
                 /status - node status",
            ),
        }
    }
}
