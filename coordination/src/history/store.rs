//! JSONL-backed history store.
//!
//! Two files in one directory:
//!
//! ```text
//! <dir>/routing_history.jsonl    {"record":"route",...} / {"record":"feedback",...}
//! <dir>/override_patterns.jsonl  one OverrideRecord per line
//! ```
//!
//! Every append writes one complete line through the mutex-guarded handles.
//! Append handles open on first write, so a store opened only for reading
//! never creates or modifies files. An existing file whose last line was
//! torn by a crash gets a newline before the first append. Readers open
//! their own handles and skip lines that fail to parse.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::{HistoryError, HistoryResult};
use super::types::{FeedbackRecord, HistoryLine, OverrideRecord, RouteRecord};
use super::{fold_lines, HistoryStore};

pub const ROUTING_FILE: &str = "routing_history.jsonl";
pub const OVERRIDE_FILE: &str = "override_patterns.jsonl";

/// Append handles, opened lazily.
#[derive(Default)]
struct Writers {
    routing: Option<File>,
    overrides: Option<File>,
}

/// Append-only JSONL history store.
pub struct JsonlHistoryStore {
    dir: PathBuf,
    routing_path: PathBuf,
    override_path: PathBuf,
    writers: Mutex<Writers>,
}

impl std::fmt::Debug for JsonlHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlHistoryStore")
            .field("dir", &self.dir)
            .finish()
    }
}

/// Open `path` for appending. A non-empty file that does not end in a
/// newline is terminated first, so the next row starts on its own line.
fn open_append(path: &Path) -> HistoryResult<File> {
    let write_err = |source: std::io::Error| HistoryError::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;

    if file.metadata().map_err(write_err)?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(write_err)?;
        if last[0] != b'\n' {
            warn!(path = %path.display(), "Terminating torn final history row");
            file.write_all(b"\n")
                .and_then(|_| file.flush())
                .map_err(write_err)?;
        }
    }
    Ok(file)
}

impl JsonlHistoryStore {
    /// Open the store, creating the directory if needed. Files are created
    /// on first append.
    pub fn open(dir: impl AsRef<Path>) -> HistoryResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| HistoryError::FileWrite {
            path: dir.clone(),
            source,
        })?;
        Self::open_in(dir)
    }

    /// Open an existing store. Fails fast when the directory is missing.
    pub fn open_existing(dir: impl AsRef<Path>) -> HistoryResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(HistoryError::StoreNotFound { path: dir });
        }
        Self::open_in(dir)
    }

    fn open_in(dir: PathBuf) -> HistoryResult<Self> {
        debug!(dir = %dir.display(), "Opened history store");
        Ok(Self {
            routing_path: dir.join(ROUTING_FILE),
            override_path: dir.join(OVERRIDE_FILE),
            dir,
            writers: Mutex::new(Writers::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> HistoryResult<std::sync::MutexGuard<'_, Writers>> {
        self.writers.lock().map_err(|_| HistoryError::LockPoisoned)
    }

    fn write_line<T: Serialize>(
        slot: &mut Option<File>,
        path: &Path,
        value: &T,
    ) -> HistoryResult<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        let mut file = match slot.take() {
            Some(file) => file,
            None => open_append(path)?,
        };
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| HistoryError::FileWrite {
                path: path.to_path_buf(),
                source,
            })?;
        // Kept only after a full write; a failed write reopens and repairs.
        *slot = Some(file);
        Ok(())
    }

    fn read_lines<T: DeserializeOwned>(path: &Path) -> HistoryResult<Vec<T>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryError::FileRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut rows = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| HistoryError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(row) => rows.push(row),
                Err(e) => warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    error = %e,
                    "Skipping malformed history row"
                ),
            }
        }
        Ok(rows)
    }
}

impl HistoryStore for JsonlHistoryStore {
    fn append_route(&self, record: &RouteRecord) -> HistoryResult<()> {
        let mut writers = self.lock()?;
        Self::write_line(
            &mut writers.routing,
            &self.routing_path,
            &HistoryLine::Route(record.clone()),
        )
    }

    fn append_feedback(&self, feedback: &FeedbackRecord) -> HistoryResult<()> {
        // Checked under the writer lock so two feedbacks cannot both pass.
        let mut writers = self.lock()?;
        let routes = fold_lines(Self::read_lines::<HistoryLine>(&self.routing_path)?);
        match routes.iter().find(|r| r.id == feedback.route_id) {
            None => return Err(HistoryError::UnknownRoute(feedback.route_id)),
            Some(r) if r.accepted.is_some() => {
                return Err(HistoryError::DuplicateFeedback(feedback.route_id))
            }
            Some(_) => {}
        }
        Self::write_line(
            &mut writers.routing,
            &self.routing_path,
            &HistoryLine::Feedback(feedback.clone()),
        )
    }

    fn append_override(&self, record: &OverrideRecord) -> HistoryResult<()> {
        let mut writers = self.lock()?;
        Self::write_line(&mut writers.overrides, &self.override_path, record)
    }

    fn load_routes(&self, since: Option<DateTime<Utc>>) -> HistoryResult<Vec<RouteRecord>> {
        let routes = fold_lines(Self::read_lines::<HistoryLine>(&self.routing_path)?);
        Ok(routes
            .into_iter()
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .collect())
    }

    fn load_overrides(&self, since: Option<DateTime<Utc>>) -> HistoryResult<Vec<OverrideRecord>> {
        let rows = Self::read_lines::<OverrideRecord>(&self.override_path)?;
        Ok(rows
            .into_iter()
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .collect())
    }
}
