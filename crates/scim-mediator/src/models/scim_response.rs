//! SCIM list and patch envelopes (RFC 7644).

use serde::{Deserialize, Serialize};

/// SCIM List Response (RFC 7644 Section 3.4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    /// Total number of results matching the query.
    #[serde(default)]
    pub total_results: i64,

    /// Number of items in this page.
    #[serde(default)]
    pub items_per_page: i64,

    /// 1-based index of the first result in this page.
    #[serde(default)]
    pub start_index: i64,

    /// The resources in this page.
    #[serde(rename = "Resources", default = "Vec::new")]
    pub resources: Vec<T>,
}

/// PATCH operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOperation {
    Add,
    Remove,
    Replace,
}

/// SCIM PATCH operation (RFC 7644 Section 3.5.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimPatchOp {
    pub op: PatchOperation,

    /// Attribute path (e.g., "title", `members[value eq "123"]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Value to set (for add/replace operations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ScimPatchOp {
    /// `replace` the attribute at `path`.
    pub fn replace(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op: PatchOperation::Replace,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// Add a member by external id to a group.
    #[must_use]
    pub fn add_member(member_id: &str) -> Self {
        Self {
            op: PatchOperation::Add,
            path: Some("members".to_string()),
            value: Some(serde_json::json!([{ "value": member_id }])),
        }
    }

    /// Remove a member by external id. The directory parses the path as a
    /// filter, so the expression must match `members[value eq "<id>"]`
    /// byte for byte.
    #[must_use]
    pub fn remove_member(member_id: &str) -> Self {
        Self {
            op: PatchOperation::Remove,
            path: Some(format!("members[value eq \"{member_id}\"]")),
            value: None,
        }
    }
}

/// SCIM PATCH request (RFC 7644 Section 3.5.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimPatchRequest {
    pub schemas: Vec<String>,

    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOp>,
}

impl ScimPatchRequest {
    /// SCIM Patch Operation schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

    #[must_use]
    pub fn new(operations: Vec<ScimPatchOp>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            operations,
        }
    }
}
