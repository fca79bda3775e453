//! JSON file store for the published snapshot, its history and the
//! last accepted baseline.
//!
//! Every write goes to a temporary file in the same directory and is
//! renamed into place, so readers see either the old or the new file.

pub mod history;

pub use history::{CompanyHistory, HistoryBook, HistoryEntry, RETENTION_DAYS};

use crate::domain::Snapshot;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

pub const CURRENT_FILE: &str = "short_positions_current.json";
pub const META_FILE: &str = "short_positions_meta.json";
pub const HISTORICAL_FILE: &str = "short_positions_historical.json";
pub const BASELINE_FILE: &str = "last_valid_data.json";

/// Files a publisher exposes to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishedFile {
    Current,
    Meta,
    Historical,
}

impl PublishedFile {
    pub const ALL: [PublishedFile; 3] = [
        PublishedFile::Current,
        PublishedFile::Meta,
        PublishedFile::Historical,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            PublishedFile::Current => CURRENT_FILE,
            PublishedFile::Meta => META_FILE,
            PublishedFile::Historical => HISTORICAL_FILE,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.file_name() == name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: PublishedFile) -> PathBuf {
        self.dir.join(file.file_name())
    }

    fn baseline_path(&self) -> PathBuf {
        self.dir.join(BASELINE_FILE)
    }

    /// Persist an accepted snapshot.
    ///
    /// History and the new baseline are read, encoded and staged before
    /// anything is renamed into place. The current file is renamed last, so
    /// it is never ahead of history or the baseline. Call only after
    /// validation accepted `snapshot`.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.ensure_dir()?;

        let mut book = self.load_history_book()?;
        book.record(snapshot.generated_at.date_naive(), &snapshot.positions);

        let historical = StagedWrite::new(&self.path(PublishedFile::Historical), &book)?;
        let baseline = StagedWrite::new(&self.baseline_path(), snapshot)?;
        let current = StagedWrite::new(&self.path(PublishedFile::Current), snapshot)?;

        historical.commit()?;
        baseline.commit()?;
        current.commit()?;

        info!(
            "Saved snapshot with {} positions; history tracks {} companies",
            snapshot.positions.len(),
            book.len()
        );
        Ok(())
    }

    pub fn load_current(&self) -> Result<Snapshot, StoreError> {
        read_json(&self.path(PublishedFile::Current))
    }

    /// Last accepted snapshot, if any was ever accepted.
    pub fn load_baseline(&self) -> Result<Option<Snapshot>, StoreError> {
        optional(read_json(&self.baseline_path()))
    }

    /// Full history; empty when nothing has been recorded yet.
    pub fn load_history_book(&self) -> Result<HistoryBook, StoreError> {
        Ok(optional(read_json(&self.path(PublishedFile::Historical)))?.unwrap_or_default())
    }

    /// Trailing `days` of one company's history, ending today.
    pub fn load_history(
        &self,
        company: &str,
        days: i64,
    ) -> Result<Option<CompanyHistory>, StoreError> {
        self.load_history_at(company, days, Utc::now().date_naive())
    }

    pub fn load_history_at(
        &self,
        company: &str,
        days: i64,
        today: NaiveDate,
    ) -> Result<Option<CompanyHistory>, StoreError> {
        Ok(self.load_history_book()?.window(company, days, today))
    }

    pub fn write_meta<T: Serialize>(&self, meta: &T) -> Result<(), StoreError> {
        self.ensure_dir()?;
        write_json_atomic(&self.path(PublishedFile::Meta), meta)
    }

    pub fn load_meta<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        optional(read_json(&self.path(PublishedFile::Meta)))
    }

    /// Raw bytes of a published file.
    pub fn read_raw(&self, file: PublishedFile) -> Result<Vec<u8>, StoreError> {
        let path = self.path(file);
        std::fs::read(&path).map_err(|e| io_error(&path, e))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(path.to_path_buf())
    } else {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn optional<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Encoded JSON already written and synced to a sibling temp file.
///
/// Dropping it without [`StagedWrite::commit`] removes the temp file and
/// leaves the target untouched.
struct StagedWrite {
    path: PathBuf,
    len: usize,
    tmp: NamedTempFile,
}

impl StagedWrite {
    fn new<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Self, StoreError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
        tmp.write_all(&bytes).map_err(|e| io_error(path, e))?;
        tmp.as_file().sync_all().map_err(|e| io_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            len: bytes.len(),
            tmp,
        })
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tmp
            .persist(&self.path)
            .map_err(|e| io_error(&self.path, e.error))?;
        debug!("Wrote {} ({} bytes)", self.path.display(), self.len);
        Ok(())
    }
}

/// Write `value` as pretty JSON to a sibling temp file and rename it over `path`.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    StagedWrite::new(path, value)?.commit()
}
