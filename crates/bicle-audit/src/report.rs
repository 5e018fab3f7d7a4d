use std::fmt;

use serde::{Deserialize, Serialize};

/// A single integrity violation found while validating a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Stored item content no longer hashes to its stored fingerprint.
    ItemTampered { block_index: u64, item_index: usize },

    /// Stored header fields no longer hash to the stored block hash.
    BlockTampered { block_index: u64 },

    /// `previous_block_hash` does not match the predecessor's hash.
    LinkBroken { block_index: u64 },

    /// The block at `position` claims a different index.
    IndexMismatch { position: u64, found: u64 },

    /// The number of fingerprints differs from the number of items.
    FingerprintCountMismatch {
        block_index: u64,
        items: usize,
        fingerprints: usize,
    },

    /// Two items in one block share a url.
    DuplicateUrl { block_index: u64, item_index: usize },

    /// Empty or over-capacity block.
    MalformedBlock { block_index: u64, items: usize },

    /// The first block is not the published genesis block.
    GenesisMismatch,
}

impl Finding {
    /// Damage that breaks the chain's structure, as opposed to edited item
    /// content.  A node refuses to mine on top of a chain with structural
    /// findings.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Finding::ItemTampered { .. } | Finding::DuplicateUrl { .. })
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::ItemTampered {
                block_index,
                item_index,
            } => write!(f, "block #{block_index}: item {item_index} tampered"),
            Finding::BlockTampered { block_index } => {
                write!(f, "block #{block_index}: block hash mismatch")
            }
            Finding::LinkBroken { block_index } => {
                write!(f, "block #{block_index}: previous hash mismatch")
            }
            Finding::IndexMismatch { position, found } => {
                write!(f, "position {position}: block claims index {found}")
            }
            Finding::FingerprintCountMismatch {
                block_index,
                items,
                fingerprints,
            } => write!(
                f,
                "block #{block_index}: {items} items but {fingerprints} fingerprints"
            ),
            Finding::DuplicateUrl {
                block_index,
                item_index,
            } => write!(f, "block #{block_index}: item {item_index} repeats a url"),
            Finding::MalformedBlock { block_index, items } => {
                write!(f, "block #{block_index}: invalid item count {items}")
            }
            Finding::GenesisMismatch => f.write_str("genesis block differs from the reference"),
        }
    }
}

/// Outcome of validating a block range.
///
/// Validation never stops at the first problem; `findings` lists every
/// violation in the range in block order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub from: u64,
    pub to: u64,
    pub blocks_checked: usize,
    pub findings: Vec<Finding>,
    pub valid: bool,
}

impl ValidationReport {
    pub(crate) fn new(from: u64, to: u64, blocks_checked: usize, findings: Vec<Finding>) -> Self {
        Self {
            from,
            to,
            blocks_checked,
            valid: findings.is_empty(),
            findings,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn has_structural_damage(&self) -> bool {
        self.findings.iter().any(Finding::is_structural)
    }

    pub(crate) fn push(&mut self, finding: Finding) {
        if !self.findings.contains(&finding) {
            self.findings.push(finding);
        }
        self.valid = self.findings.is_empty();
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return write!(
                f,
                "[VERIFIED] blocks {}..={} ({} checked): integrity confirmed",
                self.from, self.to, self.blocks_checked
            );
        }
        writeln!(
            f,
            "[CRITICAL] blocks {}..={} ({} checked): {} finding(s)",
            self.from,
            self.to,
            self.blocks_checked,
            self.findings.len()
        )?;
        for finding in &self.findings {
            writeln!(f, "  - {finding}")?;
        }
        Ok(())
    }
}
