//! Resumable batch task processor.
//!
//! Applies a queue of mutating tasks against the directory one at a time.
//! Progress is persisted to a [`Checkpoint`] so an interrupted or partially
//! failed run can be resumed: completed and failed tasks are skipped, only
//! pending ones run. When every task ends completed the checkpoint is archived.

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::{self, use_case};
use crate::checkpoint::{load_source, Checkpoint};
use crate::client::DirectoryClient;
use crate::error::{MediatorError, MediatorResult};
use crate::models::{ScimName, ScimPatchOp};
use crate::records::{AuditStatus, JobTask, TaskAction, TaskStatus, UserRecord, UserStatus};
use crate::store::{GroupMap, MirrorStore, UserMap};

/// Number of attempted tasks between two checkpoint writes.
pub const CHECKPOINT_INTERVAL: usize = 5;

const ENTERPRISE_ORGANIZATION_PATH: &str =
    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:organization";

/// Outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Tasks in the queue.
    pub total: usize,
    /// Pending tasks this run dispatched.
    pub attempted: usize,
    /// Tasks completed during this run.
    pub completed: usize,
    /// Tasks failed during this run.
    pub failed: usize,
    /// Tasks skipped because an earlier run already settled them.
    pub skipped: usize,
    /// The run stopped early on cancellation.
    pub interrupted: bool,
    /// Where the checkpoint was archived, if every task is completed.
    pub archived_to: Option<PathBuf>,
}

/// Sequential batch processor over a shared client and mirror store.
pub struct BatchProcessor<'a> {
    client: &'a DirectoryClient,
    store: &'a MirrorStore,
    checkpoint: Checkpoint,
    checkpoint_interval: usize,
}

impl<'a> BatchProcessor<'a> {
    #[must_use]
    pub fn new(client: &'a DirectoryClient, store: &'a MirrorStore, checkpoint: Checkpoint) -> Self {
        Self {
            client,
            store,
            checkpoint,
            checkpoint_interval: CHECKPOINT_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    #[must_use]
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Run the batch.
    ///
    /// An existing checkpoint is authoritative and `source` is ignored.
    /// Otherwise `source` is ingested with every task pending. Per-task
    /// failures are recorded on the task and never abort the run; only a
    /// persistence failure does.
    pub async fn run(
        &self,
        source: Option<&Path>,
        cancel: &CancellationToken,
    ) -> MediatorResult<BatchSummary> {
        let mut tasks = self.load_queue(source)?;
        let mut users = self.store.load_users()?;
        let groups = self.store.load_groups()?;

        let mut summary = BatchSummary {
            total: tasks.len(),
            ..Default::default()
        };
        let mut changed = false;
        let mut since_checkpoint = 0;

        for index in 0..tasks.len() {
            if !tasks[index].is_pending() {
                summary.skipped += 1;
                continue;
            }
            if cancel.is_cancelled() {
                info!(index, "Cancellation requested, stopping before next task");
                summary.interrupted = true;
                break;
            }

            let result = self
                .execute(&tasks[index], &mut users, &groups, cancel)
                .await;
            let task = &mut tasks[index];
            let label = format!("task {}/{} ({})", index + 1, summary.total, task.kind);

            match result {
                Ok(()) => {
                    task.status = TaskStatus::Completed;
                    summary.completed += 1;
                    audit::record(
                        self.store,
                        use_case::PROCESS_BATCH,
                        &task.target,
                        AuditStatus::Info,
                        format!("{label} completed"),
                    );
                }
                Err(MediatorError::Cancelled) => {
                    // Left pending; the next run picks it up again.
                    info!(user = %task.target, "{label} interrupted by cancellation");
                    summary.interrupted = true;
                    break;
                }
                Err(err) => {
                    task.status = TaskStatus::Failed;
                    summary.failed += 1;
                    audit::record(
                        self.store,
                        use_case::PROCESS_BATCH,
                        &task.target,
                        AuditStatus::Error,
                        format!("{label} failed: {err}"),
                    );
                    if err.is_fatal() {
                        summary.attempted += 1;
                        self.checkpoint.save(&tasks)?;
                        return Err(err);
                    }
                }
            }

            summary.attempted += 1;
            changed = true;
            since_checkpoint += 1;
            if since_checkpoint >= self.checkpoint_interval {
                debug!(index, "Writing periodic checkpoint");
                self.checkpoint.save(&tasks)?;
                since_checkpoint = 0;
            }
        }

        if changed {
            self.checkpoint.save(&tasks)?;
        }

        let all_completed = tasks.iter().all(|t| t.status == TaskStatus::Completed);
        if all_completed && !summary.interrupted {
            let archived = self.checkpoint.archive(Local::now())?;
            info!(path = %archived.display(), "All tasks completed, checkpoint archived");
            summary.archived_to = Some(archived);
        } else {
            let remaining = tasks.iter().filter(|t| t.status != TaskStatus::Completed).count();
            info!(
                remaining,
                path = %self.checkpoint.path().display(),
                "Checkpoint kept for a later run"
            );
        }

        info!(
            total = summary.total,
            attempted = summary.attempted,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            interrupted = summary.interrupted,
            "Batch run finished"
        );
        Ok(summary)
    }

    fn load_queue(&self, source: Option<&Path>) -> MediatorResult<Vec<JobTask>> {
        if self.checkpoint.exists() {
            let tasks = self.checkpoint.load()?;
            info!(
                path = %self.checkpoint.path().display(),
                tasks = tasks.len(),
                "Resuming from checkpoint"
            );
            return Ok(tasks);
        }

        let source = source.ok_or_else(|| {
            MediatorError::precondition("no checkpoint found and no task file was given")
        })?;
        let tasks = load_source(source)?;
        info!(path = %source.display(), tasks = tasks.len(), "Loaded new task file");
        // The checkpoint becomes authoritative from the first moment.
        self.checkpoint.save(&tasks)?;
        Ok(tasks)
    }

    async fn execute(
        &self,
        task: &JobTask,
        users: &mut UserMap,
        groups: &GroupMap,
        cancel: &CancellationToken,
    ) -> MediatorResult<()> {
        match task.action()? {
            TaskAction::Update { attributes } => {
                self.update(&task.target, &attributes, users, cancel).await
            }
            TaskAction::Deactivate => self.deactivate(&task.target, users, cancel).await,
            TaskAction::GroupMembership { group, add } => {
                self.membership(&task.target, &group, add, users, groups, cancel)
                    .await
            }
        }
    }

    async fn update(
        &self,
        target: &str,
        attributes: &Map<String, Value>,
        users: &mut UserMap,
        cancel: &CancellationToken,
    ) -> MediatorResult<()> {
        let record = lookup_user(users, target)?.clone();
        if attributes.is_empty() {
            return Err(MediatorError::precondition(format!(
                "update for '{target}' has no attributes"
            )));
        }
        if attributes.contains_key("active") {
            return Err(MediatorError::precondition(format!(
                "update for '{target}' may not change 'active'; use a deactivate task"
            )));
        }
        if let Some(new_name) = attributes.get("userName").and_then(Value::as_str) {
            if new_name != target && users.contains_key(new_name) {
                return Err(MediatorError::precondition(format!(
                    "cannot rename '{target}' to '{new_name}': key already in local mirror"
                )));
            }
        }

        let operations = attributes
            .iter()
            .map(|(path, value)| ScimPatchOp::replace(path.clone(), value.clone()))
            .collect();
        self.client
            .patch_user(&record.external_id, operations, cancel)
            .await?;

        let mut updated = record;
        let new_key = apply_attributes(&mut updated, attributes);
        match new_key {
            Some(new_key) if new_key != target => {
                debug!(old = target, new = %new_key, "Re-keying mirror entry");
                users.remove(target);
                users.insert(new_key, updated);
            }
            _ => {
                users.insert(target.to_string(), updated);
            }
        }
        self.store.save_users(users)
    }

    async fn deactivate(
        &self,
        target: &str,
        users: &mut UserMap,
        cancel: &CancellationToken,
    ) -> MediatorResult<()> {
        let external_id = lookup_user(users, target)?.external_id.clone();
        self.client
            .patch_user(
                &external_id,
                vec![ScimPatchOp::replace("active", Value::Bool(false))],
                cancel,
            )
            .await?;

        if let Some(record) = users.get_mut(target) {
            if record.status == UserStatus::Active {
                record.status = UserStatus::Inactive;
                record.deactivated_at = Some(Utc::now());
            } else {
                warn!(user = target, "User was already inactive; deactivation time unchanged");
            }
        }
        self.store.save_users(users)
    }

    async fn membership(
        &self,
        target: &str,
        group: &str,
        add: bool,
        users: &UserMap,
        groups: &GroupMap,
        cancel: &CancellationToken,
    ) -> MediatorResult<()> {
        let member_id = &lookup_user(users, target)?.external_id;
        let group_id = &groups
            .get(group)
            .ok_or_else(|| {
                MediatorError::precondition(format!("group '{group}' not found in local mirror"))
            })?
            .external_id;

        let operation = if add {
            ScimPatchOp::add_member(member_id)
        } else {
            ScimPatchOp::remove_member(member_id)
        };
        self.client
            .patch_group(group_id, vec![operation], cancel)
            .await
    }
}

fn lookup_user<'m>(users: &'m UserMap, target: &str) -> MediatorResult<&'m UserRecord> {
    users.get(target).ok_or_else(|| {
        MediatorError::precondition(format!("user '{target}' not found in local mirror"))
    })
}

/// Mirror the attributes the local record tracks. Returns the new mirror key
/// when `userName` was updated.
fn apply_attributes(record: &mut UserRecord, attributes: &Map<String, Value>) -> Option<String> {
    let mut new_key = None;
    for (path, value) in attributes {
        match path.as_str() {
            "userName" => new_key = value.as_str().map(str::to_string),
            "title" => record.title = optional_string(value),
            "displayName" | "name.formatted" => record.name.formatted = optional_string(value),
            "name.givenName" => record.name.given_name = optional_string(value),
            "name.familyName" => record.name.family_name = optional_string(value),
            "name" => {
                if let Ok(name) = serde_json::from_value::<ScimName>(value.clone()) {
                    record.name = name;
                }
            }
            "email" => {
                if let Some(email) = value.as_str() {
                    record.email = email.to_string();
                }
            }
            "emails" => {
                if let Some(email) = primary_email(value) {
                    record.email = email;
                }
            }
            "organization" | ENTERPRISE_ORGANIZATION_PATH => {
                record.organization = optional_string(value);
            }
            _ => {}
        }
    }
    new_key.filter(|k| !k.is_empty())
}

fn optional_string(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn primary_email(value: &Value) -> Option<String> {
    let emails = value.as_array()?;
    emails
        .iter()
        .find(|e| e.get("primary").and_then(Value::as_bool).unwrap_or(false))
        .or_else(|| emails.first())
        .and_then(|e| e.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_apply_attributes_tracks_known_fields() {
        let mut record = UserRecord::default();
        let key = apply_attributes(
            &mut record,
            &attrs(json!({
                "title": "Director",
                "name.givenName": "Jane",
                "name.familyName": "Doe",
                "emails": [
                    { "value": "home@example.edu", "primary": false },
                    { "value": "work@example.edu", "primary": true }
                ],
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:organization": "Research",
                "phoneNumbers": [{ "value": "555" }]
            })),
        );
        assert_eq!(key, None);
        assert_eq!(record.title.as_deref(), Some("Director"));
        assert_eq!(record.name.display().as_deref(), Some("Jane Doe"));
        assert_eq!(record.email, "work@example.edu");
        assert_eq!(record.organization.as_deref(), Some("Research"));
    }

    #[test]
    fn test_apply_attributes_returns_new_key() {
        let mut record = UserRecord::default();
        let key = apply_attributes(&mut record, &attrs(json!({ "userName": "new@example.edu" })));
        assert_eq!(key.as_deref(), Some("new@example.edu"));

        let blank = apply_attributes(&mut record, &attrs(json!({ "userName": "" })));
        assert_eq!(blank, None);
    }

    #[test]
    fn test_apply_attributes_null_clears_title() {
        let mut record = UserRecord {
            title: Some("Old".into()),
            ..Default::default()
        };
        apply_attributes(&mut record, &attrs(json!({ "title": null })));
        assert_eq!(record.title, None);
    }

    #[test]
    fn test_primary_email_falls_back_to_first() {
        let value = json!([{ "value": "a@example.edu" }, { "value": "b@example.edu" }]);
        assert_eq!(primary_email(&value).as_deref(), Some("a@example.edu"));
        assert_eq!(primary_email(&json!("nope")), None);
    }
}
