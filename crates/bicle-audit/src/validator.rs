use std::collections::HashSet;

use bicle_chain::{Block, BlockHash, Chain, GENESIS_HASH, MAX_ITEMS};
use bicle_item::content_digest;

use crate::{
    report::{Finding, ValidationReport},
    AuditError,
};

/// Re-derives every fingerprint and hash in a run of blocks and compares
/// them with what is stored.
///
/// Works on borrowed blocks only, so it can check the live chain snapshot
/// and an exported segment with the same code.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    blocks: &'a [Block],
    /// Chain position of `blocks[0]`.
    first_index: u64,
    /// Hash the first block must link to when it is not the genesis block.
    anchor: BlockHash,
}

impl<'a> Validator<'a> {
    /// Validator over a whole chain.
    pub fn new(chain: &'a Chain) -> Self {
        Self {
            blocks: chain.blocks(),
            first_index: 0,
            anchor: BlockHash::ZERO,
        }
    }

    /// Validator over a detached run of blocks starting at chain position
    /// `first_index`.  `anchor` is the hash of the block preceding the run
    /// and is ignored when the run starts at genesis.
    pub fn for_segment(blocks: &'a [Block], first_index: u64, anchor: BlockHash) -> Self {
        Self {
            blocks,
            first_index,
            anchor,
        }
    }

    /// Last chain position covered, if any blocks are present.
    pub fn last_index(&self) -> Option<u64> {
        (self.blocks.len() as u64)
            .checked_sub(1)
            .map(|n| self.first_index + n)
    }

    pub fn validate_all(&self) -> ValidationReport {
        match self.last_index() {
            Some(last) => self.check(self.first_index, last),
            None => ValidationReport::new(self.first_index, self.first_index, 0, Vec::new()),
        }
    }

    /// Validate chain positions `from..=to`.
    pub fn validate_range(&self, from: u64, to: u64) -> Result<ValidationReport, AuditError> {
        if from > to {
            return Err(AuditError::InvalidRange { from, to });
        }
        if from < self.first_index {
            return Err(AuditError::NotFound(from));
        }
        match self.last_index() {
            Some(last) if to <= last => Ok(self.check(from, to)),
            _ => Err(AuditError::NotFound(to)),
        }
    }

    fn check(&self, from: u64, to: u64) -> ValidationReport {
        let mut findings = Vec::new();
        for position in from..=to {
            let offset = (position - self.first_index) as usize;
            let block = &self.blocks[offset];
            let predecessor = if offset == 0 {
                self.anchor
            } else {
                self.blocks[offset - 1].block_hash
            };
            check_block(position, block, predecessor, &mut findings);
        }
        ValidationReport::new(from, to, (to - from + 1) as usize, findings)
    }
}

fn check_block(position: u64, block: &Block, predecessor: BlockHash, findings: &mut Vec<Finding>) {
    if block.index != position {
        findings.push(Finding::IndexMismatch {
            position,
            found: block.index,
        });
    }

    if block.items.is_empty() || block.items.len() > MAX_ITEMS {
        findings.push(Finding::MalformedBlock {
            block_index: position,
            items: block.items.len(),
        });
    }

    if block.item_fingerprints.len() != block.items.len() {
        findings.push(Finding::FingerprintCountMismatch {
            block_index: position,
            items: block.items.len(),
            fingerprints: block.item_fingerprints.len(),
        });
    }

    let mut urls = HashSet::new();
    for (item_index, item) in block.items.iter().enumerate() {
        let matches = block
            .item_fingerprints
            .get(item_index)
            .is_some_and(|stored| *stored == content_digest(item));
        if !matches {
            findings.push(Finding::ItemTampered {
                block_index: position,
                item_index,
            });
        }
        if !urls.insert(item.url.as_str()) {
            findings.push(Finding::DuplicateUrl {
                block_index: position,
                item_index,
            });
        }
    }

    if block.compute_hash() != block.block_hash {
        findings.push(Finding::BlockTampered {
            block_index: position,
        });
    }

    if position == 0 {
        if *block != Block::genesis() || block.block_hash != GENESIS_HASH {
            findings.push(Finding::GenesisMismatch);
        }
    } else if block.previous_block_hash != predecessor {
        findings.push(Finding::LinkBroken {
            block_index: position,
        });
    }
}

#[cfg(test)]
mod tests {
    use bicle_item::{Category, NewsItem};

    use super::*;

    fn chain_with(blocks: usize) -> Chain {
        let mut chain = Chain::new();
        for b in 0..blocks {
            let items = (0..3)
                .map(|n| {
                    NewsItem::new(
                        format!("Story {b}-{n}"),
                        "Feed",
                        format!("https://news.example/{b}/{n}"),
                        1_700_000_000,
                        Category::tech(),
                    )
                    .unwrap()
                })
                .collect();
            let block = chain.build_next(items, MAX_ITEMS).unwrap();
            chain.push(block).unwrap();
        }
        chain
    }

    fn tampered(chain: &Chain, edit: impl FnOnce(&mut Vec<Block>)) -> Chain {
        let mut blocks = chain.blocks().to_vec();
        edit(&mut blocks);
        Chain::from_blocks(blocks).unwrap()
    }

    #[test]
    fn fresh_chain_is_valid_after_each_append() {
        let mut chain = Chain::new();
        assert!(Validator::new(&chain).validate_all().is_valid());
        for b in 0..4 {
            let item = NewsItem::new(
                "Headline",
                "Feed",
                format!("https://n.example/{b}"),
                0,
                Category::tech(),
            )
            .unwrap();
            let block = chain.build_next(vec![item], MAX_ITEMS).unwrap();
            chain.push(block).unwrap();

            let report = Validator::new(&chain).validate_all();
            assert!(report.is_valid(), "{report}");
            assert_eq!(report.blocks_checked, chain.len());
        }
    }

    #[test]
    fn edited_title_yields_exactly_one_item_finding() {
        let chain = chain_with(3);
        let broken = tampered(&chain, |blocks| blocks[2].items[1].title.push_str(" (edited)"));

        let report = Validator::new(&broken).validate_all();
        assert!(!report.is_valid());
        assert_eq!(
            report.findings,
            vec![Finding::ItemTampered {
                block_index: 2,
                item_index: 1
            }]
        );
        assert!(!report.has_structural_damage());
    }

    #[test]
    fn edited_fingerprint_breaks_block_hash() {
        let chain = chain_with(2);
        let broken = tampered(&chain, |blocks| {
            let item = blocks[1].items[0].clone();
            blocks[1].items[0].title = "Rewritten".into();
            blocks[1].item_fingerprints[0] = NewsItem { title: "Rewritten".into(), ..item }
                .fingerprint()
                .unwrap();
        });

        let report = Validator::new(&broken).validate_all();
        assert_eq!(report.findings, vec![Finding::BlockTampered { block_index: 1 }]);
    }

    #[test]
    fn rehashed_block_breaks_next_link() {
        let chain = chain_with(3);
        let broken = tampered(&chain, |blocks| {
            blocks[1].timestamp += 60;
            blocks[1].block_hash = blocks[1].compute_hash();
        });

        let report = Validator::new(&broken).validate_all();
        assert_eq!(report.findings, vec![Finding::LinkBroken { block_index: 2 }]);
        assert!(report.has_structural_damage());
    }

    #[test]
    fn all_findings_are_collected() {
        let chain = chain_with(3);
        let broken = tampered(&chain, |blocks| {
            blocks[1].items[0].url = "https://elsewhere.example".into();
            blocks[3].previous_block_hash = BlockHash::ZERO;
        });

        let report = Validator::new(&broken).validate_all();
        assert!(report.findings.contains(&Finding::ItemTampered {
            block_index: 1,
            item_index: 0
        }));
        assert!(report.findings.contains(&Finding::LinkBroken { block_index: 3 }));
        assert!(report.findings.contains(&Finding::BlockTampered { block_index: 3 }));
    }

    #[test]
    fn genesis_is_checked_against_reference() {
        let chain = chain_with(1);
        let broken = tampered(&chain, |blocks| {
            blocks[0].timestamp = 0;
            blocks[0].block_hash = blocks[0].compute_hash();
            blocks[1].previous_block_hash = blocks[0].block_hash;
            blocks[1].block_hash = blocks[1].compute_hash();
        });

        let report = Validator::new(&broken).validate_all();
        assert_eq!(report.findings, vec![Finding::GenesisMismatch]);
    }

    #[test]
    fn index_gap_is_reported() {
        let chain = chain_with(2);
        let broken = tampered(&chain, |blocks| {
            blocks.remove(1);
        });

        let report = Validator::new(&broken).validate_all();
        assert!(report.findings.contains(&Finding::IndexMismatch { position: 1, found: 2 }));
        assert!(report.findings.contains(&Finding::LinkBroken { block_index: 1 }));
    }

    #[test]
    fn range_checks_link_into_earlier_block() {
        let chain = chain_with(4);
        let broken = tampered(&chain, |blocks| blocks[2].previous_block_hash = BlockHash::ZERO);
        let validator = Validator::new(&broken);

        let report = validator.validate_range(3, 4).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.blocks_checked, 2);

        let report = validator.validate_range(2, 2).unwrap();
        assert!(report.findings.contains(&Finding::LinkBroken { block_index: 2 }));
    }

    #[test]
    fn segment_uses_anchor() {
        let chain = chain_with(3);
        let segment = &chain.blocks()[2..];
        let anchor = chain.blocks()[1].block_hash;

        assert!(Validator::for_segment(segment, 2, anchor).validate_all().is_valid());
        let report = Validator::for_segment(segment, 2, BlockHash::ZERO).validate_all();
        assert_eq!(report.findings, vec![Finding::LinkBroken { block_index: 2 }]);
    }

    #[test]
    fn bad_ranges_are_rejected() {
        let chain = chain_with(1);
        let validator = Validator::new(&chain);
        assert!(matches!(validator.validate_range(0, 5), Err(AuditError::NotFound(5))));
        assert!(matches!(
            validator.validate_range(1, 0),
            Err(AuditError::InvalidRange { .. })
        ));
    }
}
