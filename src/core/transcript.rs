//! Transcript persistence: one JSON document per session.
//!
//! The store keeps the full session record in memory and rewrites the
//! whole document after every appended turn. Each rewrite goes through a
//! temp file in the target directory followed by an atomic rename, so a
//! crash mid-write can never truncate turns that were already persisted.
//! A failed rewrite leaves the in-memory record intact; the next
//! successful rewrite persists everything again.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;

use crate::core::session::{SessionRecord, SessionTotals, Turn};

/// File name derived from the session start time; one session maps to
/// exactly one document.
const TRANSCRIPT_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Errors that can occur while persisting or loading a transcript.
#[derive(Debug)]
pub enum StorageError {
    /// Failed to create, write, or rename the transcript file.
    Io {
        /// Path the store was operating on.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize the session document.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io { path, source } => {
                write!(f, "Transcript I/O failed at {}: {}", path.display(), source)
            }
            StorageError::Json { path, source } => {
                write!(
                    f,
                    "Invalid transcript document at {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Io { source, .. } => Some(source),
            StorageError::Json { source, .. } => Some(source),
        }
    }
}

/// Append-only writer for one session's transcript document.
pub struct TranscriptStore {
    path: PathBuf,
    record: SessionRecord,
}

impl TranscriptStore {
    /// Create the transcript document for a new session. The document is
    /// written immediately, so even a session that quits on its first
    /// input leaves a record with an empty turn list and zero totals.
    pub fn create(dir: &Path, record: SessionRecord) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let filename = format!(
            "{}.json",
            record.started_at.format(TRANSCRIPT_TIME_FORMAT)
        );
        let store = Self {
            path: dir.join(filename),
            record,
        };
        store.rewrite()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Append a completed turn and persist the updated document.
    ///
    /// The turn is kept in memory even when the write fails, so a later
    /// append or close retries the whole document.
    pub fn append_turn(&mut self, turn: Turn, totals: SessionTotals) -> Result<(), StorageError> {
        self.record.turns.push(turn);
        self.record.totals = totals;
        self.rewrite()
    }

    /// Stamp the session end time, store final totals, and persist.
    pub fn close(&mut self, totals: SessionTotals) -> Result<(), StorageError> {
        self.record.ended_at = Some(Local::now());
        self.record.totals = totals;
        self.rewrite()
    }

    fn rewrite(&self) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));

        // Temp file in the same directory so the rename below is atomic
        let mut temp_file = NamedTempFile::new_in(parent).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut temp_file, &self.record).map_err(|source| {
            StorageError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        temp_file.write_all(b"\n").map_err(io_err)?;

        temp_file.flush().map_err(io_err)?;
        temp_file.as_file().sync_all().map_err(io_err)?;

        // Original document only replaced after a complete write
        temp_file
            .persist(&self.path)
            .map_err(|err| io_err(err.error))?;
        Ok(())
    }

    /// Read a session document back from disk.
    pub fn load(path: &Path) -> Result<SessionRecord, StorageError> {
        let contents = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record_at_fixed_time() -> SessionRecord {
        let started_at = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        SessionRecord::new(started_at, "anthropic/claude-sonnet-4")
    }

    fn completed_turn(user: &str, assistant: &str, cost: u64) -> Turn {
        Turn {
            timestamp: Local::now(),
            user: user.to_string(),
            assistant: assistant.to_string(),
            prompt_tokens: 1200,
            completion_tokens: 200,
            cost_picousd: Some(cost),
            interrupted: false,
        }
    }

    #[test]
    fn create_derives_the_file_name_from_the_start_time() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = TranscriptStore::create(dir.path(), record_at_fixed_time()).unwrap();

        assert_eq!(
            store.path().file_name().unwrap().to_str().unwrap(),
            "2025-03-14_09-26-53.json"
        );
        assert!(store.path().exists());
    }

    #[test]
    fn quit_first_session_still_leaves_an_empty_document() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = TranscriptStore::create(dir.path(), record_at_fixed_time()).unwrap();
        store.close(SessionTotals::default()).unwrap();

        let loaded = TranscriptStore::load(store.path()).unwrap();
        assert!(loaded.turns.is_empty());
        assert_eq!(loaded.totals, SessionTotals::default());
        assert!(loaded.ended_at.is_some());
    }

    #[test]
    fn round_trip_preserves_turn_order_and_totals() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = TranscriptStore::create(dir.path(), record_at_fixed_time()).unwrap();

        let mut totals = SessionTotals::default();
        for i in 0..3 {
            totals.total_prompt_tokens += 1200;
            totals.total_completion_tokens += 200;
            totals.total_cost_picousd += 6_600_000_000;
            totals.request_count += 1;
            let turn = completed_turn(&format!("question {i}"), &format!("answer {i}"), 6_600_000_000);
            store.append_turn(turn, totals).unwrap();
        }
        store.close(totals).unwrap();

        let loaded = TranscriptStore::load(store.path()).unwrap();
        assert_eq!(loaded, *store.record());
        assert_eq!(loaded.turns.len(), 3);
        assert_eq!(loaded.turns[0].user, "question 0");
        assert_eq!(loaded.turns[2].assistant, "answer 2");
        assert_eq!(loaded.totals, totals);
    }

    #[test]
    fn document_is_complete_after_every_append() {
        // The crash-safety contract: at no point between turns does the
        // on-disk document hold fewer turns than have been appended
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = TranscriptStore::create(dir.path(), record_at_fixed_time()).unwrap();

        let mut totals = SessionTotals::default();
        for i in 0..5 {
            totals.request_count += 1;
            store
                .append_turn(completed_turn("q", "a", 0), totals)
                .unwrap();

            let loaded = TranscriptStore::load(store.path()).unwrap();
            assert_eq!(loaded.turns.len(), i + 1);
        }
    }

    #[test]
    fn interrupted_turns_round_trip_with_their_flag() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = TranscriptStore::create(dir.path(), record_at_fixed_time()).unwrap();

        let turn = Turn {
            timestamp: Local::now(),
            user: "hello".to_string(),
            assistant: "partial resp".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_picousd: None,
            interrupted: true,
        };
        let totals = SessionTotals {
            request_count: 1,
            unknown_cost_requests: 1,
            ..SessionTotals::default()
        };
        store.append_turn(turn, totals).unwrap();

        let loaded = TranscriptStore::load(store.path()).unwrap();
        assert!(loaded.turns[0].interrupted);
        assert_eq!(loaded.turns[0].cost_picousd, None);
        assert_eq!(loaded.turns[0].assistant, "partial resp");
    }

    #[test]
    fn load_rejects_a_corrupt_document() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"started_at\": tru").unwrap();

        let err = TranscriptStore::load(&path).unwrap_err();
        assert!(matches!(err, StorageError::Json { .. }));
    }
}
