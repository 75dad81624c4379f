//! File-backed local mirror of the remote directory.
//!
//! The store owns `users.json`, `groups.json` and `audit.log` inside the data
//! directory. Every public call takes the store lock for exactly one critical
//! section. Callers receive detached copies of the maps and must write their
//! changes back explicitly; a load followed by a save is not atomic.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{MediatorError, MediatorResult};
use crate::records::{AuditEvent, GroupRecord, UserRecord};

pub const USERS_FILE: &str = "users.json";
pub const GROUPS_FILE: &str = "groups.json";
pub const AUDIT_FILE: &str = "audit.log";

/// Users keyed by username.
pub type UserMap = BTreeMap<String, UserRecord>;

/// Groups keyed by display name.
pub type GroupMap = BTreeMap<String, GroupRecord>;

/// Persistent mirror store guarded by a single lock.
#[derive(Debug)]
pub struct MirrorStore {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl MirrorStore {
    /// Open the store, creating the data directory if needed.
    pub fn open(data_dir: impl Into<PathBuf>) -> MediatorResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .map_err(|e| MediatorError::persistence("create data directory", &data_dir, e))?;
        Ok(Self {
            data_dir,
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    #[must_use]
    pub fn groups_path(&self) -> PathBuf {
        self.data_dir.join(GROUPS_FILE)
    }

    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join(AUDIT_FILE)
    }

    pub fn load_users(&self) -> MediatorResult<UserMap> {
        let _guard = self.guard();
        read_map(&self.users_path())
    }

    pub fn save_users(&self, users: &UserMap) -> MediatorResult<()> {
        let _guard = self.guard();
        write_atomic(&self.users_path(), users)
    }

    pub fn load_groups(&self) -> MediatorResult<GroupMap> {
        let _guard = self.guard();
        read_map(&self.groups_path())
    }

    pub fn save_groups(&self, groups: &GroupMap) -> MediatorResult<()> {
        let _guard = self.guard();
        write_atomic(&self.groups_path(), groups)
    }

    /// Append one event as a single JSON line. Existing lines are never touched.
    pub fn append_audit(&self, event: &AuditEvent) -> MediatorResult<()> {
        let _guard = self.guard();
        let path = self.audit_path();
        let mut line = serde_json::to_vec(event)
            .map_err(|e| MediatorError::persistence("encode audit event for", &path, e))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| MediatorError::persistence("open", &path, e))?;
        file.write_all(&line)
            .map_err(|e| MediatorError::persistence("append to", &path, e))
    }

    /// Read every audit line. Lines that fail to parse are skipped.
    pub fn read_audit(&self) -> MediatorResult<Vec<AuditEvent>> {
        let _guard = self.guard();
        let path = self.audit_path();
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MediatorError::persistence("read", &path, e)),
        };
        Ok(contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    // A panic while holding the guard cannot leave the files half-written
    // (writes go through a rename), so a poisoned lock is safe to reuse.
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read a JSON map; a missing file is an empty map.
pub(crate) fn read_map<V: DeserializeOwned>(path: &Path) -> MediatorResult<BTreeMap<String, V>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(MediatorError::persistence("read", path, e)),
    };
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&contents).map_err(|e| MediatorError::persistence("parse", path, e))
}

/// Pretty-print `value` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> MediatorResult<()> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| MediatorError::persistence("encode", path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, contents)
        .map_err(|e| MediatorError::persistence("write", &tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        MediatorError::persistence("replace", path, e)
    })
}
