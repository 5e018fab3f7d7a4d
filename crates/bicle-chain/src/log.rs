use std::{
    fs::{self, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::warn;

use crate::{block::Block, error::ChainError};

/// Durable, append-only storage for sealed blocks.
///
/// Implementations must make `append` all-or-nothing from the caller's point
/// of view: when it returns an error the block is not considered persisted.
pub trait BlockLog: Send + Sync {
    /// Every persisted block, in append order.
    fn load(&self) -> Result<Vec<Block>, ChainError>;

    fn append(&self, block: &Block) -> Result<(), ChainError>;
}

/// One JSON record per line, one line per block.
#[derive(Debug, Clone)]
pub struct JsonlBlockLog {
    path: PathBuf,
}

impl JsonlBlockLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockLog for JsonlBlockLog {
    fn load(&self) -> Result<Vec<Block>, ChainError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut blocks = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let block = serde_json::from_str(&line).map_err(|e| {
                ChainError::Storage(format!(
                    "{} line {}: {e}",
                    self.path.display(),
                    line_no + 1
                ))
            })?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn append(&self, block: &Block) -> Result<(), ChainError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut record = serde_json::to_string(block)?;
        record.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let committed = file.metadata()?.len();
        write_or_rollback(&mut file, committed, |file| {
            file.write_all(record.as_bytes())?;
            file.sync_data()
        })
    }
}

/// Run `write` against `file`; on failure truncate it back to `committed`
/// bytes so that neither a torn line nor an unsynced record survives.
fn write_or_rollback(
    file: &mut fs::File,
    committed: u64,
    write: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> Result<(), ChainError> {
    let Err(error) = write(&mut *file) else {
        return Ok(());
    };
    if let Err(rollback) = file.set_len(committed).and_then(|_| file.sync_data()) {
        warn!(committed, "Failed to roll back block log after a failed append: {rollback}");
        return Err(ChainError::Storage(format!(
            "append failed ({error}) and rollback failed ({rollback})"
        )));
    }
    Err(error.into())
}

/// Volatile block log, for tests and throwaway nodes.
#[derive(Debug, Default)]
pub struct MemoryBlockLog {
    blocks: Mutex<Vec<Block>>,
}

impl MemoryBlockLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the log as if `blocks` had been persisted earlier.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(blocks),
        }
    }
}

impl BlockLog for MemoryBlockLog {
    fn load(&self) -> Result<Vec<Block>, ChainError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::Storage("block log mutex poisoned".to_string()))?;
        Ok(blocks.clone())
    }

    fn append(&self, block: &Block) -> Result<(), ChainError> {
        self.blocks
            .lock()
            .map_err(|_| ChainError::Storage("block log mutex poisoned".to_string()))?
            .push(block.clone());
        Ok(())
    }
}
