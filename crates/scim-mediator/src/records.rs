//! Local data model: mirror records, audit events and batch job tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MediatorError, MediatorResult};
use crate::models::{ScimGroup, ScimName, ScimUser};

/// Lifecycle status of a mirrored user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    #[must_use]
    pub fn from_active(active: bool) -> Self {
        if active {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user as recorded in `users.json`, keyed by username (ePPN).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Opaque id assigned by the remote directory.
    #[serde(rename = "scim_id")]
    pub external_id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub status: UserStatus,

    #[serde(default)]
    pub name: ScimName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Set once, on the active -> inactive transition. Local bookkeeping only.
    #[serde(
        rename = "deactivation_timestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Convert a directory user into its mirror key and record.
    ///
    /// Returns `None` for users without a username or id; those cannot be
    /// keyed or addressed.
    #[must_use]
    pub fn from_scim(user: &ScimUser) -> Option<(String, Self)> {
        if user.user_name.is_empty() {
            return None;
        }
        let external_id = user.id.clone().filter(|id| !id.is_empty())?;
        let record = Self {
            external_id,
            email: user.primary_email().unwrap_or_default().to_string(),
            status: UserStatus::from_active(user.active),
            name: user.name.clone(),
            title: user.title.clone().filter(|t| !t.is_empty()),
            organization: user.organization().map(str::to_string),
            deactivated_at: None,
        };
        Some((user.user_name.clone(), record))
    }
}

/// A group as recorded in `groups.json`, keyed by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(rename = "scim_id")]
    pub external_id: String,
}

impl GroupRecord {
    #[must_use]
    pub fn from_scim(group: &ScimGroup) -> Option<(String, Self)> {
        if group.display_name.is_empty() {
            return None;
        }
        let external_id = group.id.clone().filter(|id| !id.is_empty())?;
        Some((group.display_name.clone(), Self { external_id }))
    }
}

/// Severity recorded on an audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Info,
    Warn,
    Error,
}

/// One line of `audit.log`. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub use_case: String,
    pub target: String,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl AuditEvent {
    pub fn new(
        use_case: impl Into<String>,
        target: impl Into<String>,
        status: AuditStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            use_case: use_case.into(),
            target: target.into(),
            status,
            details: details.into(),
        }
    }
}

/// Processing status of a batch task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Wire kinds accepted in a task file.
pub const KIND_UPDATE: &str = "update";
pub const KIND_DEACTIVATE: &str = "deactivate";
pub const KIND_ADD_TO_GROUP: &str = "add-to-group";
pub const KIND_REMOVE_FROM_GROUP: &str = "remove-from-group";

/// A batch task exactly as stored in the source and checkpoint files.
///
/// `kind` and `data` stay in their raw form so the checkpoint is written back
/// verbatim and an unknown kind or malformed payload fails only its own task.
/// [`JobTask::action`] decodes the typed variant at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTask {
    #[serde(rename = "type")]
    pub kind: String,

    /// Mirror key of the user the task applies to.
    pub target: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default)]
    pub status: TaskStatus,
}

/// Typed payload of a task, selected by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    Update {
        attributes: serde_json::Map<String, serde_json::Value>,
    },
    Deactivate,
    GroupMembership {
        group: String,
        add: bool,
    },
}

impl JobTask {
    pub fn new(kind: impl Into<String>, target: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            data,
            status: TaskStatus::Pending,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Decode the kind-dependent payload.
    pub fn action(&self) -> MediatorResult<TaskAction> {
        match self.kind.as_str() {
            KIND_UPDATE => match &self.data {
                serde_json::Value::Object(map) => Ok(TaskAction::Update {
                    attributes: map.clone(),
                }),
                _ => Err(MediatorError::precondition(
                    "task data for update must be a map of attributes",
                )),
            },
            KIND_DEACTIVATE => Ok(TaskAction::Deactivate),
            KIND_ADD_TO_GROUP | KIND_REMOVE_FROM_GROUP => match &self.data {
                serde_json::Value::String(group) if !group.is_empty() => {
                    Ok(TaskAction::GroupMembership {
                        group: group.clone(),
                        add: self.kind == KIND_ADD_TO_GROUP,
                    })
                }
                _ => Err(MediatorError::precondition(
                    "task data for group membership must be the group name (string)",
                )),
            },
            other => Err(MediatorError::precondition(format!(
                "unknown task type: '{other}'"
            ))),
        }
    }
}

/// A task as read from a fresh source file; any `status` there is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceTask {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl From<SourceTask> for JobTask {
    fn from(source: SourceTask) -> Self {
        Self::new(source.kind, source.target, source.data)
    }
}
