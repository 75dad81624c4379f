//! Audit side channel shared by every use case.

use tracing::{error, info, warn};

use crate::records::{AuditEvent, AuditStatus};
use crate::store::MirrorStore;

/// Use-case names recorded in `audit.log`.
pub mod use_case {
    pub const POPULATE: &str = "Populate";
    pub const REFRESH: &str = "Refresh";
    pub const PROCESS_BATCH: &str = "ProcessBatch";
    pub const CREATE_USER: &str = "CreateUser";
    pub const CREATE_GROUP: &str = "CreateGroup";
    pub const MANAGE_GROUP_MEMBERS: &str = "ManageGroupMembers";
    pub const CLEANUP_USERS: &str = "CleanupUsers";
}

/// Log an event and append it to the audit log.
///
/// A failed append is logged and swallowed: losing an audit line must never
/// change the outcome of the operation being audited.
pub fn record(
    store: &MirrorStore,
    use_case: &str,
    target: &str,
    status: AuditStatus,
    details: impl Into<String>,
) {
    let event = AuditEvent::new(use_case, target, status, details);
    match status {
        AuditStatus::Info => info!(use_case, key = target, details = %event.details, "audit"),
        AuditStatus::Warn => warn!(use_case, key = target, details = %event.details, "audit"),
        AuditStatus::Error => error!(use_case, key = target, details = %event.details, "audit"),
    }
    if let Err(e) = store.append_audit(&event) {
        warn!(error = %e, use_case, key = target, "Failed to append audit event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends() {
        let temp_dir = TempDir::new().unwrap();
        let store = MirrorStore::open(temp_dir.path()).unwrap();
        record(&store, use_case::REFRESH, "jdoe", AuditStatus::Info, "created externally");

        let events = store.read_audit().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].use_case, "Refresh");
        assert_eq!(events[0].details, "created externally");
    }

    #[test]
    fn test_record_swallows_append_failure() {
        let temp_dir = TempDir::new().unwrap();
        let store = MirrorStore::open(temp_dir.path()).unwrap();
        // A directory where the log file should be makes the append fail.
        std::fs::create_dir(store.audit_path()).unwrap();
        record(&store, use_case::REFRESH, "jdoe", AuditStatus::Error, "boom");
    }
}
