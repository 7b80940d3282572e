//! File-based conversation store: one JSON file per conversation.
//!
//! Each conversation lives in `{dir}/history_{id}.json` as a pretty-printed
//! JSON array of `{role, content}` objects, human-inspectable and easy to
//! reset by hand.
//!
//! Writes replace the whole file atomically (temp file in the same
//! directory, then rename), so a crash mid-write never leaves a torn record.

use async_trait::async_trait;
use chatrelay_core::error::MemoryError;
use chatrelay_core::memory::ConversationStore;
use chatrelay_core::message::{ConversationId, Turn};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILE_PREFIX: &str = "history_";
const FILE_SUFFIX: &str = ".json";

/// A directory of per-conversation JSON files.
pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the store and make sure its directory exists.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let store = Self::new(dir);
        std::fs::create_dir_all(&store.dir).map_err(|e| {
            MemoryError::Storage(format!(
                "Failed to create history directory {}: {e}",
                store.dir.display()
            ))
        })?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for a conversation.
    pub fn path_for(&self, id: &ConversationId) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", encode_id(id.as_str())))
    }

    /// Parse a record leniently: entries that are not valid turns are skipped.
    fn parse_turns(path: &Path, content: &str) -> Vec<Turn> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let values: Vec<serde_json::Value> = match serde_json::from_str(content) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupted history file, starting empty");
                return Vec::new();
            }
        };

        values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Turn>(value) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupted history entry");
                    None
                }
            })
            .collect()
    }
}

/// Map an id to a safe, reversible file-name fragment.
///
/// ASCII letters, digits and `-` pass through; every other byte becomes
/// `_XX` (upper-case hex). Telegram chat ids are decimal integers, negative
/// for groups, so they come out unchanged.
pub fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_id`]. `None` for fragments it cannot have produced.
pub fn decode_id(fragment: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(fragment.len());
    let mut rest = fragment.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        if first == b'_' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else if first.is_ascii_alphanumeric() || first == b'-' {
            bytes.push(first);
            rest = tail;
        } else {
            return None;
        }
    }
    String::from_utf8(bytes).ok()
}

/// Replace `path` with `bytes` atomically.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MemoryError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| MemoryError::Storage(format!("Failed to create {}: {e}", parent.display())))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| MemoryError::Storage(format!("Failed to create temp file: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| MemoryError::Storage(format!("Failed to write temp file: {e}")))?;
    tmp.persist(path).map_err(|e| {
        MemoryError::Storage(format!("Failed to replace {}: {}", path.display(), e.error))
    })?;
    Ok(())
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &ConversationId) -> Result<Vec<Turn>, MemoryError> {
        let path = self.path_for(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MemoryError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let turns = Self::parse_turns(&path, &content);
        debug!(conversation = %id, turns = turns.len(), "History loaded");
        Ok(turns)
    }

    async fn save(&self, id: &ConversationId, turns: &[Turn]) -> Result<(), MemoryError> {
        let json = serde_json::to_string_pretty(turns)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize history: {e}")))?;
        write_atomic(&self.path_for(id), json.as_bytes())?;
        debug!(conversation = %id, turns = turns.len(), "History saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConversationId>, MemoryError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::Storage(e.to_string())),
        };

        let mut ids: Vec<ConversationId> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_prefix(FILE_PREFIX)
                    .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
                    .and_then(decode_id)
                    .map(ConversationId::new)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}
