/// Controls what triggers a mining pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningMode {
    /// Blocks are mined only on an explicit `mine` command.
    #[default]
    Manual,

    /// An external scheduler additionally calls `mine` every
    /// `auto_mine_interval`.  Ticks that find no new items are normal and
    /// produce no block.
    Auto,
}

impl MiningMode {
    pub fn is_auto(&self) -> bool {
        matches!(self, MiningMode::Auto)
    }
}
