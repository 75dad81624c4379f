//! Reconciliation engine.
//!
//! Pulls the full remote state of each entity kind, diffs it against the
//! local mirror to detect out-of-band drift, audits every difference and then
//! overwrites the mirror with the remote snapshot. Detection is observational
//! only: the remote directory is always authoritative.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audit::{self, use_case};
use crate::client::DirectoryClient;
use crate::error::{MediatorError, MediatorResult};
use crate::models::{ScimGroup, ScimUser};
use crate::records::{AuditStatus, GroupRecord, UserRecord, UserStatus};
use crate::store::{GroupMap, MirrorStore, UserMap};

/// Classification of a detected difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftKind {
    /// Present remotely, absent from the mirror.
    CreatedExternally,
    /// Present in the mirror, absent remotely.
    DeletedExternally,
    /// Present on both sides with a differing field.
    ChangedExternally {
        field: String,
        old: String,
        new: String,
    },
}

/// A single drift observation keyed by mirror key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEvent {
    pub key: String,
    #[serde(flatten)]
    pub kind: DriftKind,
}

impl DriftEvent {
    fn new(key: &str, kind: DriftKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
        }
    }

    fn changed(key: &str, field: &str, old: String, new: String) -> Self {
        Self::new(
            key,
            DriftKind::ChangedExternally {
                field: field.to_string(),
                old,
                new,
            },
        )
    }

    /// Human-readable description recorded in the audit log.
    #[must_use]
    pub fn describe(&self, entity: &str) -> String {
        match &self.kind {
            DriftKind::CreatedExternally => format!("{entity} created outside of the mediator"),
            DriftKind::DeletedExternally => format!("{entity} deleted outside of the mediator"),
            DriftKind::ChangedExternally { field, old, new } => {
                format!("{entity} {field} changed outside of the mediator: '{old}' -> '{new}'")
            }
        }
    }
}

/// Counters for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationStats {
    /// Records in the mirror before the run.
    pub local_count: usize,
    /// Records in the remote snapshot.
    pub remote_count: usize,
    pub created: usize,
    pub deleted: usize,
    pub changed: usize,
}

impl ReconciliationStats {
    fn from_events(local_count: usize, remote_count: usize, events: &[DriftEvent]) -> Self {
        let mut stats = Self {
            local_count,
            remote_count,
            ..Default::default()
        };
        for event in events {
            match event.kind {
                DriftKind::CreatedExternally => stats.created += 1,
                DriftKind::DeletedExternally => stats.deleted += 1,
                DriftKind::ChangedExternally { .. } => stats.changed += 1,
            }
        }
        stats
    }

    #[must_use]
    pub fn drift_count(&self) -> usize {
        self.created + self.deleted + self.changed
    }
}

/// Outcome of a full reconciliation. Each kind succeeds or fails on its own.
#[derive(Debug)]
pub struct ReconciliationReport {
    pub users: MediatorResult<ReconciliationStats>,
    pub groups: MediatorResult<ReconciliationStats>,
}

impl ReconciliationReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.users.is_ok() && self.groups.is_ok()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        [&self.users, &self.groups]
            .iter()
            .any(|r| matches!(r, Err(MediatorError::Cancelled)))
    }

    /// First failure, users before groups.
    #[must_use]
    pub fn first_error(&self) -> Option<&MediatorError> {
        self.users.as_ref().err().or(self.groups.as_ref().err())
    }
}

/// Record counts written by [`Reconciler::populate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulateSummary {
    pub users: usize,
    pub groups: usize,
}

/// Pull-based reconciler over a shared client and mirror store.
pub struct Reconciler<'a> {
    client: &'a DirectoryClient,
    store: &'a MirrorStore,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(client: &'a DirectoryClient, store: &'a MirrorStore) -> Self {
        Self { client, store }
    }

    /// Reconcile users, then groups.
    ///
    /// A failure in one kind does not prevent the other, except cancellation:
    /// once the users pass is cancelled the groups pass is not attempted.
    pub async fn run(&self, cancel: &CancellationToken) -> ReconciliationReport {
        info!("Starting reconciliation");

        let users = self.reconcile_users(cancel).await;
        if let Err(e) = &users {
            log_failure("users", e);
        }

        let groups = if matches!(users, Err(MediatorError::Cancelled)) {
            Err(MediatorError::Cancelled)
        } else {
            let groups = self.reconcile_groups(cancel).await;
            if let Err(e) = &groups {
                log_failure("groups", e);
            }
            groups
        };

        ReconciliationReport { users, groups }
    }

    /// Diff users against the remote directory and overwrite the user mirror.
    ///
    /// A remote fetch failure leaves the mirror untouched.
    pub async fn reconcile_users(
        &self,
        cancel: &CancellationToken,
    ) -> MediatorResult<ReconciliationStats> {
        let old = self.store.load_users()?;
        let remote = self.client.list_users(cancel).await?;
        let mut new = user_snapshot(&remote);
        carry_deactivation_stamps(&old, &mut new);

        let events = diff_users(&old, &new);
        for event in &events {
            self.audit_drift(event, "user");
        }

        self.store.save_users(&new)?;
        let stats = ReconciliationStats::from_events(old.len(), new.len(), &events);
        info!(
            total_users = stats.remote_count,
            drift = stats.drift_count(),
            "User reconciliation complete"
        );
        Ok(stats)
    }

    /// Diff groups against the remote directory and overwrite the group mirror.
    pub async fn reconcile_groups(
        &self,
        cancel: &CancellationToken,
    ) -> MediatorResult<ReconciliationStats> {
        let old = self.store.load_groups()?;
        let remote = self.client.list_groups(cancel).await?;
        let new = group_snapshot(&remote);

        let events = diff_groups(&old, &new);
        for event in &events {
            self.audit_drift(event, "group");
        }

        self.store.save_groups(&new)?;
        let stats = ReconciliationStats::from_events(old.len(), new.len(), &events);
        info!(
            total_groups = stats.remote_count,
            drift = stats.drift_count(),
            "Group reconciliation complete"
        );
        Ok(stats)
    }

    /// Overwrite both mirrors from the remote directory without diffing.
    ///
    /// Intended for initial setup. Users are saved before groups are fetched.
    pub async fn populate(&self, cancel: &CancellationToken) -> MediatorResult<PopulateSummary> {
        info!("Fetching users from the directory");
        let users = user_snapshot(&self.client.list_users(cancel).await?);
        self.store.save_users(&users)?;
        info!(count = users.len(), "Populated users");

        if cancel.is_cancelled() {
            return Err(MediatorError::Cancelled);
        }

        info!("Fetching groups from the directory");
        let groups = group_snapshot(&self.client.list_groups(cancel).await?);
        self.store.save_groups(&groups)?;
        info!(count = groups.len(), "Populated groups");

        let summary = PopulateSummary {
            users: users.len(),
            groups: groups.len(),
        };
        audit::record(
            self.store,
            use_case::POPULATE,
            "mirror",
            AuditStatus::Info,
            format!("populated {} users and {} groups", summary.users, summary.groups),
        );
        Ok(summary)
    }

    fn audit_drift(&self, event: &DriftEvent, entity: &str) {
        audit::record(
            self.store,
            use_case::REFRESH,
            &event.key,
            AuditStatus::Info,
            event.describe(entity),
        );
    }
}

fn log_failure(entity: &str, err: &MediatorError) {
    if err.is_cancelled() {
        warn!(entity, "Reconciliation interrupted, mirror left unchanged");
    } else if err.is_transport() {
        error!(entity, error = %err, "Could not fetch from the directory, mirror left unchanged");
    } else {
        error!(entity, error = %err, "Reconciliation failed");
    }
}

/// Build the user mirror from a remote listing. Unkeyed entries are skipped.
#[must_use]
pub fn user_snapshot(remote: &[ScimUser]) -> UserMap {
    let mut snapshot = UserMap::new();
    for user in remote {
        match UserRecord::from_scim(user) {
            Some((key, record)) => {
                snapshot.insert(key, record);
            }
            None => warn!(id = ?user.id, "Skipping remote user without userName or id"),
        }
    }
    snapshot
}

/// Build the group mirror from a remote listing. Unkeyed entries are skipped.
#[must_use]
pub fn group_snapshot(remote: &[ScimGroup]) -> GroupMap {
    let mut snapshot = GroupMap::new();
    for group in remote {
        match GroupRecord::from_scim(group) {
            Some((key, record)) => {
                snapshot.insert(key, record);
            }
            None => warn!(id = ?group.id, "Skipping remote group without displayName or id"),
        }
    }
    snapshot
}

/// The remote side knows nothing of deactivation times; keep the local stamp
/// for users that are still inactive.
fn carry_deactivation_stamps(old: &UserMap, new: &mut UserMap) {
    for (key, record) in new.iter_mut() {
        if record.status != UserStatus::Inactive {
            continue;
        }
        if let Some(previous) = old.get(key) {
            if previous.status == UserStatus::Inactive {
                record.deactivated_at = previous.deactivated_at;
            }
        }
    }
}

/// Symmetric diff of two user snapshots.
///
/// Compares `status`, `title` and `name`, one event per differing field.
#[must_use]
pub fn diff_users(old: &UserMap, new: &UserMap) -> Vec<DriftEvent> {
    let mut events = Vec::new();
    for (key, current) in new {
        let Some(previous) = old.get(key) else {
            events.push(DriftEvent::new(key, DriftKind::CreatedExternally));
            continue;
        };
        if previous.status != current.status {
            events.push(DriftEvent::changed(
                key,
                "status",
                previous.status.to_string(),
                current.status.to_string(),
            ));
        }
        if previous.title != current.title {
            events.push(DriftEvent::changed(
                key,
                "title",
                previous.title.clone().unwrap_or_default(),
                current.title.clone().unwrap_or_default(),
            ));
        }
        if previous.name != current.name {
            events.push(DriftEvent::changed(
                key,
                "name",
                previous.name.to_string(),
                current.name.to_string(),
            ));
        }
    }
    events.extend(
        old.keys()
            .filter(|key| !new.contains_key(*key))
            .map(|key| DriftEvent::new(key, DriftKind::DeletedExternally)),
    );
    events
}

/// Symmetric diff of two group snapshots. A changed external id means the
/// group was recreated remotely under the same name.
#[must_use]
pub fn diff_groups(old: &GroupMap, new: &GroupMap) -> Vec<DriftEvent> {
    let mut events = Vec::new();
    for (key, current) in new {
        match old.get(key) {
            None => events.push(DriftEvent::new(key, DriftKind::CreatedExternally)),
            Some(previous) if previous.external_id != current.external_id => {
                events.push(DriftEvent::changed(
                    key,
                    "scim_id",
                    previous.external_id.clone(),
                    current.external_id.clone(),
                ));
            }
            Some(_) => {}
        }
    }
    events.extend(
        old.keys()
            .filter(|key| !new.contains_key(*key))
            .map(|key| DriftEvent::new(key, DriftKind::DeletedExternally)),
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScimName;
    use chrono::Utc;

    fn make_user(id: &str) -> UserRecord {
        UserRecord {
            external_id: id.to_string(),
            email: format!("{id}@example.edu"),
            ..Default::default()
        }
    }

    fn users(entries: &[(&str, UserRecord)]) -> UserMap {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_diff_created_and_deleted() {
        let old = users(&[("a", make_user("1")), ("b", make_user("2"))]);
        let new = users(&[("b", make_user("2")), ("c", make_user("3"))]);

        let events = diff_users(&old, &new);
        assert_eq!(
            events,
            vec![
                DriftEvent::new("c", DriftKind::CreatedExternally),
                DriftEvent::new("a", DriftKind::DeletedExternally),
            ]
        );
    }

    #[test]
    fn test_no_events_when_synced() {
        let old = users(&[("a", make_user("1"))]);
        assert!(diff_users(&old, &old.clone()).is_empty());
    }

    #[test]
    fn test_one_event_per_changed_field() {
        let old = users(&[("a", make_user("1"))]);
        let mut changed = make_user("1");
        changed.status = UserStatus::Inactive;
        changed.title = Some("Director".into());
        changed.name = ScimName {
            given_name: Some("Jane".into()),
            ..Default::default()
        };
        // Email differences are not drift.
        changed.email = "other@example.edu".into();
        let new = users(&[("a", changed)]);

        let events = diff_users(&old, &new);
        let fields: Vec<&str> = events
            .iter()
            .map(|e| match &e.kind {
                DriftKind::ChangedExternally { field, .. } => field.as_str(),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(fields, vec!["status", "title", "name"]);
        assert_eq!(
            events[0].kind,
            DriftKind::ChangedExternally {
                field: "status".into(),
                old: "active".into(),
                new: "inactive".into()
            }
        );
    }

    #[test]
    fn test_group_id_change_is_drift() {
        let old: GroupMap = [("Staff".to_string(), GroupRecord { external_id: "g1".into() })].into();
        let new: GroupMap = [("Staff".to_string(), GroupRecord { external_id: "g2".into() })].into();
        let events = diff_groups(&old, &new);
        assert_eq!(events.len(), 1);
        assert!(events[0].describe("group").contains("'g1' -> 'g2'"));
    }

    #[test]
    fn test_carry_deactivation_stamps() {
        let stamp = Utc::now();
        let mut inactive = make_user("1");
        inactive.status = UserStatus::Inactive;
        inactive.deactivated_at = Some(stamp);
        let old = users(&[("a", inactive.clone()), ("b", inactive)]);

        let mut still_inactive = make_user("1");
        still_inactive.status = UserStatus::Inactive;
        let mut new = users(&[("a", still_inactive), ("b", make_user("1"))]);
        carry_deactivation_stamps(&old, &mut new);

        assert_eq!(new["a"].deactivated_at, Some(stamp));
        assert_eq!(new["b"].deactivated_at, None);
    }

    #[test]
    fn test_snapshot_skips_unkeyed_entries() {
        let mut keyed = ScimUser::new("jdoe");
        keyed.id = Some("1".into());
        let mut unnamed = ScimUser::new("");
        unnamed.id = Some("2".into());
        let snapshot = user_snapshot(&[keyed, unnamed]);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("jdoe"));
    }

    #[test]
    fn test_drift_event_serializes_flat() {
        let event = DriftEvent::changed("a", "title", "x".into(), "y".into());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["key"], "a");
        assert_eq!(value["kind"], "changed_externally");
        assert_eq!(value["field"], "title");
    }
}
