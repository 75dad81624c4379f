//! SCIM Group resource schema (RFC 7643).

use serde::{Deserialize, Serialize};

/// SCIM Group resource (RFC 7643 Section 4.2). Membership is not cached
/// locally, so members are never decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    /// SCIM schemas.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Opaque resource id assigned by the directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Group display name; the mirror key.
    #[serde(default)]
    pub display_name: String,
}

impl ScimGroup {
    /// SCIM Core Group schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:Group";

    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            id: None,
            display_name: display_name.into(),
        }
    }
}
