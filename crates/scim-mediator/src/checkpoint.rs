//! Batch job queue persistence.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use crate::error::{MediatorError, MediatorResult};
use crate::records::{JobTask, SourceTask};
use crate::store::write_atomic;

/// File name of the checkpoint inside the data directory.
pub const CHECKPOINT_FILE: &str = "job_queue.json";

const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// The persisted, authoritative task queue of an in-progress batch.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint at its default location inside `data_dir`.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CHECKPOINT_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the queue verbatim, statuses included.
    pub fn load(&self) -> MediatorResult<Vec<JobTask>> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| MediatorError::persistence("read checkpoint", &self.path, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| MediatorError::persistence("parse checkpoint", &self.path, e))
    }

    /// Write the full queue, replacing the previous checkpoint atomically.
    pub fn save(&self, tasks: &[JobTask]) -> MediatorResult<()> {
        write_atomic(&self.path, tasks)
    }

    /// Rename the checkpoint to `job_queue.json.completed_<YYYYMMDD-HHMMSS>`.
    pub fn archive<Tz>(&self, now: DateTime<Tz>) -> MediatorResult<PathBuf>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let archived = self.archive_path(&now);
        fs::rename(&self.path, &archived)
            .map_err(|e| MediatorError::persistence("archive checkpoint", &self.path, e))?;
        Ok(archived)
    }

    fn archive_path<Tz>(&self, now: &DateTime<Tz>) -> PathBuf
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".completed_{}", now.format(ARCHIVE_TIMESTAMP_FORMAT)));
        self.path.with_file_name(name)
    }
}

/// Read a fresh task file and stamp every task "pending".
pub fn load_source(path: &Path) -> MediatorResult<Vec<JobTask>> {
    let contents = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediatorError::precondition(format!("task file {} does not exist", path.display()))
        } else {
            MediatorError::persistence("read task file", path, e)
        }
    })?;
    let source: Vec<SourceTask> = serde_json::from_str(&contents).map_err(|e| {
        MediatorError::precondition(format!("task file {} is not a task list: {e}", path.display()))
    })?;
    Ok(source.into_iter().map(JobTask::from).collect())
}
