//! Permanent deletion of users past their deactivation grace period.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::{self, use_case};
use crate::client::DirectoryClient;
use crate::error::{MediatorError, MediatorResult};
use crate::records::AuditStatus;
use crate::store::{MirrorStore, UserMap};

/// Outcome of a cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    /// Users past the grace period at the start of the run.
    pub eligible: usize,
    pub deleted: Vec<String>,
    /// Users whose deletion failed; retried on the next run.
    pub failed: Vec<String>,
    pub interrupted: bool,
}

/// Usernames (sorted) whose deactivation time is strictly before `now - grace_period`.
///
/// Fails with a precondition error when the cutoff is not a representable time.
pub fn eligible_users(
    users: &UserMap,
    now: DateTime<Utc>,
    grace_period: Duration,
) -> MediatorResult<Vec<String>> {
    let cutoff = now.checked_sub_signed(grace_period).ok_or_else(|| {
        MediatorError::precondition(format!(
            "grace period of {} days is out of range",
            grace_period.num_days()
        ))
    })?;
    Ok(users
        .iter()
        .filter(|(_, record)| record.deactivated_at.is_some_and(|at| at < cutoff))
        .map(|(key, _)| key.clone())
        .collect())
}

/// Delete every user past the grace period and drop them from the mirror.
///
/// Cancellation is checked between deletions. The mirror is saved once at
/// the end with whatever was deleted so far.
pub async fn cleanup_deactivated_users(
    client: &DirectoryClient,
    store: &MirrorStore,
    now: DateTime<Utc>,
    grace_period: Duration,
    cancel: &CancellationToken,
) -> MediatorResult<CleanupSummary> {
    let mut users = store.load_users()?;
    let candidates = eligible_users(&users, now, grace_period)?;
    let mut summary = CleanupSummary {
        eligible: candidates.len(),
        ..Default::default()
    };

    if candidates.is_empty() {
        info!("No users found past their deactivation grace period");
        return Ok(summary);
    }
    info!(count = candidates.len(), "Found users to be permanently deleted");

    for user_name in candidates {
        if cancel.is_cancelled() {
            warn!("Cancellation requested during cleanup, halting");
            summary.interrupted = true;
            break;
        }
        let Some(external_id) = users.get(&user_name).map(|r| r.external_id.clone()) else {
            continue;
        };

        match client.delete_user(&external_id, cancel).await {
            Ok(()) => {
                users.remove(&user_name);
                audit::record(
                    store,
                    use_case::CLEANUP_USERS,
                    &user_name,
                    AuditStatus::Info,
                    format!("deleted user (id {external_id})"),
                );
                summary.deleted.push(user_name);
            }
            Err(MediatorError::Cancelled) => {
                summary.interrupted = true;
                break;
            }
            Err(e) => {
                audit::record(
                    store,
                    use_case::CLEANUP_USERS,
                    &user_name,
                    AuditStatus::Error,
                    format!("failed to delete user (id {external_id}): {e}"),
                );
                summary.failed.push(user_name);
            }
        }
    }

    if !summary.deleted.is_empty() {
        store.save_users(&users).map_err(|e| {
            MediatorError::Persistence(format!(
                "deleted {} user(s) remotely but the local mirror could not be saved; \
                 the mirror is out of sync: {e}",
                summary.deleted.len()
            ))
        })?;
    }

    if !summary.failed.is_empty() {
        warn!(
            count = summary.failed.len(),
            failed = ?summary.failed,
            "Some users could not be deleted and will be retried on the next run"
        );
    }
    info!(deleted = summary.deleted.len(), "Cleanup finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{UserRecord, UserStatus};

    fn deactivated(at: Option<DateTime<Utc>>) -> UserRecord {
        UserRecord {
            external_id: "x".into(),
            status: UserStatus::Inactive,
            deactivated_at: at,
            ..Default::default()
        }
    }

    #[test]
    fn test_eligible_users_respects_grace_period() {
        let now = Utc::now();
        let grace = Duration::days(7);
        let users: UserMap = [
            ("old".to_string(), deactivated(Some(now - Duration::days(8)))),
            ("recent".to_string(), deactivated(Some(now - Duration::days(6)))),
            ("exact".to_string(), deactivated(Some(now - grace))),
            ("unstamped".to_string(), deactivated(None)),
        ]
        .into();

        assert_eq!(
            eligible_users(&users, now, grace).unwrap(),
            vec!["old".to_string()]
        );
    }

    #[test]
    fn test_zero_grace_period() {
        let now = Utc::now();
        let users: UserMap =
            [("a".to_string(), deactivated(Some(now - Duration::seconds(1))))].into();
        assert_eq!(eligible_users(&users, now, Duration::zero()).unwrap().len(), 1);
    }

    #[test]
    fn test_unrepresentable_cutoff_is_precondition() {
        let err = eligible_users(&UserMap::new(), Utc::now(), Duration::days(100_000_000))
            .unwrap_err();
        assert!(err.is_local());
    }
}
