//! Cursor stores: where the last accepted update id survives restarts.

use async_trait::async_trait;
use chatrelay_core::error::MemoryError;
use chatrelay_core::memory::CursorStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tracing::debug;

use crate::file_backend::write_atomic;

/// Keeps the cursor as a plain decimal integer in a single file.
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<i64, MemoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(MemoryError::Storage(format!(
                    "Failed to read cursor file {}: {e}",
                    self.path.display()
                )));
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed.parse::<i64>().map_err(|e| MemoryError::Corrupted {
            location: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn save(&self, cursor: i64) -> Result<(), MemoryError> {
        write_atomic(&self.path, cursor.to_string().as_bytes())?;
        debug!(cursor, "Cursor persisted");
        Ok(())
    }
}

/// Process-local cursor, for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryCursorStore {
    cursor: AtomicI64,
    saves: AtomicUsize,
}

impl InMemoryCursorStore {
    pub fn new(initial: i64) -> Self {
        Self {
            cursor: AtomicI64::new(initial),
            saves: AtomicUsize::new(0),
        }
    }

    /// Current value without going through the trait.
    pub fn get(&self) -> i64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// How many times `save` was called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn load(&self) -> Result<i64, MemoryError> {
        Ok(self.get())
    }

    async fn save(&self, cursor: i64) -> Result<(), MemoryError> {
        self.cursor.store(cursor, Ordering::SeqCst);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
