//! SCIM User resource schema (RFC 7643).

use serde::{Deserialize, Serialize};

/// SCIM User name component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    /// Formatted full name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,

    /// Family name (last name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Given name (first name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
}

impl ScimName {
    /// Human-readable name: `formatted` if present, else "given family".
    #[must_use]
    pub fn display(&self) -> Option<String> {
        if let Some(formatted) = self.formatted.as_deref().filter(|f| !f.is_empty()) {
            return Some(formatted.to_string());
        }
        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl std::fmt::Display for ScimName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display().unwrap_or_default())
    }
}

/// SCIM Email value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimEmail {
    /// Email address.
    pub value: String,

    /// Email type (e.g., "work", "home").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,

    /// Whether this is the primary email.
    #[serde(default)]
    pub primary: bool,
}

/// Enterprise User extension (RFC 7643 Section 4.3), only the attributes
/// the mirror tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterpriseUserExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// SCIM User resource (RFC 7643 Section 4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    /// SCIM schemas.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Opaque resource id assigned by the directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Unique username (ePPN); the mirror key.
    #[serde(default)]
    pub user_name: String,

    /// User's name components.
    #[serde(default)]
    pub name: ScimName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub emails: Vec<ScimEmail>,

    /// Whether the user is active.
    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        rename = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enterprise: Option<EnterpriseUserExtension>,
}

fn default_active() -> bool {
    true
}

impl ScimUser {
    /// SCIM Core User schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:User";

    /// Enterprise User extension schema URI.
    pub const ENTERPRISE_SCHEMA: &'static str =
        "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

    /// Create a new SCIM User with required fields.
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            id: None,
            user_name: user_name.into(),
            name: ScimName::default(),
            display_name: None,
            emails: vec![],
            active: true,
            title: None,
            enterprise: None,
        }
    }

    /// Get the primary email address, falling back to the first one.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.primary)
            .or(self.emails.first())
            .map(|e| e.value.as_str())
    }

    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.enterprise
            .as_ref()
            .and_then(|e| e.organization.as_deref())
    }
}
