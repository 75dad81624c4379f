//! Single-entity provisioning: create users and groups, manage group members.
//!
//! Every operation validates against the local mirror (and, for users, the
//! remote directory) before touching the network, then writes the result
//! back to the mirror. Creation is not idempotent under the transport's
//! at-least-once retry contract; the search-before-insert check narrows
//! the duplicate window but cannot close it.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::{self, use_case};
use crate::client::DirectoryClient;
use crate::error::{MediatorError, MediatorResult};
use crate::models::{ScimGroup, ScimPatchOp, ScimUser};
use crate::records::{AuditStatus, GroupRecord, UserRecord};
use crate::store::MirrorStore;

/// Outcome of a membership change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipSummary {
    pub added: usize,
    pub removed: usize,
    /// Usernames ignored because they are not in the mirror.
    pub skipped: Vec<String>,
    /// Whether a PATCH was sent at all.
    pub patched: bool,
}

/// Orchestrates provisioning operations against the directory and mirror.
pub struct Provisioner<'a> {
    client: &'a DirectoryClient,
    store: &'a MirrorStore,
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub fn new(client: &'a DirectoryClient, store: &'a MirrorStore) -> Self {
        Self { client, store }
    }

    /// Create a user and add it to the mirror.
    ///
    /// Fails with a precondition error if the username is empty, already
    /// exists remotely, or already exists in the mirror.
    pub async fn create_user(
        &self,
        user: &ScimUser,
        cancel: &CancellationToken,
    ) -> MediatorResult<ScimUser> {
        let user_name = user.user_name.trim();
        if user_name.is_empty() {
            return Err(MediatorError::precondition(
                "user data must contain a 'userName'",
            ));
        }

        info!(user = user_name, "Validating user does not exist before creation");
        if let Some(existing) = self.client.find_user_by_username(user_name, cancel).await? {
            return Err(MediatorError::precondition(format!(
                "user '{user_name}' already exists in the directory (id {})",
                existing.id.unwrap_or_default()
            )));
        }

        let mut users = self.store.load_users()?;
        if users.contains_key(user_name) {
            return Err(MediatorError::precondition(format!(
                "user '{user_name}' already exists in the local mirror; run a refresh to sync state"
            )));
        }

        audit::record(
            self.store,
            use_case::CREATE_USER,
            user_name,
            AuditStatus::Info,
            "attempting to create user",
        );
        let mut created = match self.client.create_user(user, cancel).await {
            Ok(created) => created,
            Err(e) => {
                audit::record(
                    self.store,
                    use_case::CREATE_USER,
                    user_name,
                    AuditStatus::Error,
                    format!("failed to create user: {e}"),
                );
                return Err(e);
            }
        };
        if created.user_name.is_empty() {
            created.user_name = user_name.to_string();
        }

        let (key, record) = UserRecord::from_scim(&created).ok_or_else(|| {
            MediatorError::MalformedResponse("created user has no id".to_string())
        })?;
        let external_id = record.external_id.clone();
        users.insert(key, record);

        if let Err(e) = self.store.save_users(&users) {
            audit::record(
                self.store,
                use_case::CREATE_USER,
                user_name,
                AuditStatus::Error,
                format!("user created (id {external_id}) but the mirror could not be saved: {e}"),
            );
            return Err(MediatorError::Persistence(format!(
                "user '{user_name}' was created remotely (id {external_id}) but the local mirror \
                 could not be saved; manual intervention required: {e}"
            )));
        }

        audit::record(
            self.store,
            use_case::CREATE_USER,
            user_name,
            AuditStatus::Info,
            format!("created user (id {external_id})"),
        );
        Ok(created)
    }

    /// Create a group and add it to the mirror.
    pub async fn create_group(
        &self,
        group: &ScimGroup,
        cancel: &CancellationToken,
    ) -> MediatorResult<ScimGroup> {
        let name = group.display_name.trim();
        if name.is_empty() {
            return Err(MediatorError::precondition(
                "group data must contain a 'displayName'",
            ));
        }

        let mut groups = self.store.load_groups()?;
        if groups.contains_key(name) {
            return Err(MediatorError::precondition(format!(
                "group '{name}' already exists in the local mirror"
            )));
        }

        let mut created = match self.client.create_group(group, cancel).await {
            Ok(created) => created,
            Err(e) => {
                audit::record(
                    self.store,
                    use_case::CREATE_GROUP,
                    name,
                    AuditStatus::Error,
                    format!("failed to create group: {e}"),
                );
                return Err(e);
            }
        };
        if created.display_name.is_empty() {
            created.display_name = name.to_string();
        }

        let (key, record) = GroupRecord::from_scim(&created).ok_or_else(|| {
            MediatorError::MalformedResponse("created group has no id".to_string())
        })?;
        let external_id = record.external_id.clone();
        groups.insert(key, record);
        self.store.save_groups(&groups).map_err(|e| {
            MediatorError::Persistence(format!(
                "group '{name}' was created remotely (id {external_id}) but the local mirror \
                 could not be saved; manual intervention required: {e}"
            ))
        })?;

        audit::record(
            self.store,
            use_case::CREATE_GROUP,
            name,
            AuditStatus::Info,
            format!("created group (id {external_id})"),
        );
        Ok(created)
    }

    /// Add and remove members of a group in a single PATCH.
    ///
    /// Usernames missing from the mirror are skipped with a warning. When no
    /// valid operation remains, nothing is sent.
    pub async fn manage_group_members(
        &self,
        group: &str,
        add: &[String],
        remove: &[String],
        cancel: &CancellationToken,
    ) -> MediatorResult<MembershipSummary> {
        let users = self.store.load_users()?;
        let groups = self.store.load_groups()?;
        let group_id = groups
            .get(group)
            .ok_or_else(|| {
                MediatorError::precondition(format!("group '{group}' not found in local mirror"))
            })?
            .external_id
            .clone();

        let mut summary = MembershipSummary::default();
        let mut operations = Vec::new();
        for user_name in add {
            match users.get(user_name) {
                Some(user) => {
                    operations.push(ScimPatchOp::add_member(&user.external_id));
                    summary.added += 1;
                }
                None => {
                    warn!(user = %user_name, group, "User not found, cannot add to group; skipping");
                    summary.skipped.push(user_name.clone());
                }
            }
        }
        for user_name in remove {
            match users.get(user_name) {
                Some(user) => {
                    operations.push(ScimPatchOp::remove_member(&user.external_id));
                    summary.removed += 1;
                }
                None => {
                    warn!(user = %user_name, group, "User not found, cannot remove from group; skipping");
                    summary.skipped.push(user_name.clone());
                }
            }
        }

        if operations.is_empty() {
            info!(group, "No valid members to add or remove");
            return Ok(summary);
        }

        if let Err(e) = self.client.patch_group(&group_id, operations, cancel).await {
            audit::record(
                self.store,
                use_case::MANAGE_GROUP_MEMBERS,
                group,
                AuditStatus::Error,
                format!("failed to modify group: {e}"),
            );
            return Err(e);
        }
        summary.patched = true;

        audit::record(
            self.store,
            use_case::MANAGE_GROUP_MEMBERS,
            group,
            AuditStatus::Info,
            format!(
                "added {} and removed {} member(s)",
                summary.added, summary.removed
            ),
        );
        Ok(summary)
    }
}
