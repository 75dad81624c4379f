//! SCIM 2.0 directory client.
//!
//! Domain operations against the remote directory built on [`Transport`].
//! The client owns pagination and response decoding and adds no retry logic
//! of its own: every failure the transport reports is surfaced unchanged.

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MediatorError, MediatorResult};
use crate::models::{ScimGroup, ScimListResponse, ScimPatchOp, ScimPatchRequest, ScimUser};
use crate::transport::{Transport, TransportRequest};

/// Page size requested from list endpoints.
pub const PAGE_SIZE: usize = 100;

/// Client for the remote SCIM directory.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    transport: Transport,
}

impl DirectoryClient {
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    // ── User Operations ───────────────────────────────────────────────

    /// Look up a user by `userName` with a single filtered query.
    ///
    /// Zero matches is `Ok(None)`, not an error.
    pub async fn find_user_by_username(
        &self,
        user_name: &str,
        cancel: &CancellationToken,
    ) -> MediatorResult<Option<ScimUser>> {
        let filter = format!("userName eq \"{}\"", escape_filter_value(user_name));
        let request = TransportRequest::get("/Users")
            .query("filter", filter)
            .query("count", 1);
        let body = self.transport.execute(&request, cancel).await?;
        let response: ScimListResponse<ScimUser> = decode(&body, "user search")?;
        Ok(response.resources.into_iter().next())
    }

    /// Fetch every user in the directory.
    pub async fn list_users(&self, cancel: &CancellationToken) -> MediatorResult<Vec<ScimUser>> {
        self.list_all("/Users", cancel).await
    }

    /// Create a user (POST /Users) and return it with its assigned id.
    pub async fn create_user(
        &self,
        user: &ScimUser,
        cancel: &CancellationToken,
    ) -> MediatorResult<ScimUser> {
        let mut user = user.clone();
        user.schemas = vec![
            ScimUser::SCHEMA.to_string(),
            ScimUser::ENTERPRISE_SCHEMA.to_string(),
        ];
        let request = TransportRequest::new(reqwest::Method::POST, "/Users").json(&user)?;
        let body = self.transport.execute(&request, cancel).await?;
        let created: ScimUser = decode(&body, "created user")?;
        require_id(created.id.as_deref(), "created user")?;
        Ok(created)
    }

    /// Apply ordered patch operations to a user (PATCH /Users/:id).
    pub async fn patch_user(
        &self,
        id: &str,
        operations: Vec<ScimPatchOp>,
        cancel: &CancellationToken,
    ) -> MediatorResult<()> {
        self.patch(&format!("/Users/{id}"), operations, cancel).await
    }

    /// Permanently delete a user (DELETE /Users/:id).
    pub async fn delete_user(&self, id: &str, cancel: &CancellationToken) -> MediatorResult<()> {
        let request = TransportRequest::delete(format!("/Users/{id}"));
        self.transport.execute(&request, cancel).await?;
        Ok(())
    }

    // ── Group Operations ──────────────────────────────────────────────

    /// Fetch every group in the directory.
    pub async fn list_groups(&self, cancel: &CancellationToken) -> MediatorResult<Vec<ScimGroup>> {
        self.list_all("/Groups", cancel).await
    }

    /// Create a group (POST /Groups).
    pub async fn create_group(
        &self,
        group: &ScimGroup,
        cancel: &CancellationToken,
    ) -> MediatorResult<ScimGroup> {
        let request = TransportRequest::new(reqwest::Method::POST, "/Groups").json(group)?;
        let body = self.transport.execute(&request, cancel).await?;
        let created: ScimGroup = decode(&body, "created group")?;
        require_id(created.id.as_deref(), "created group")?;
        Ok(created)
    }

    /// Apply ordered patch operations to a group (PATCH /Groups/:id).
    pub async fn patch_group(
        &self,
        id: &str,
        operations: Vec<ScimPatchOp>,
        cancel: &CancellationToken,
    ) -> MediatorResult<()> {
        self.patch(&format!("/Groups/{id}"), operations, cancel).await
    }

    // ── Internal ──────────────────────────────────────────────────────

    async fn patch(
        &self,
        path: &str,
        operations: Vec<ScimPatchOp>,
        cancel: &CancellationToken,
    ) -> MediatorResult<()> {
        let patch = ScimPatchRequest::new(operations);
        let request = TransportRequest::new(reqwest::Method::PATCH, path).json(&patch)?;
        // The response body (resource representation or empty) is not needed.
        self.transport.execute(&request, cancel).await?;
        Ok(())
    }

    /// Page through a list endpoint until the reported total is reached or a
    /// page comes back empty.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> MediatorResult<Vec<T>> {
        let mut items = Vec::new();
        let mut start_index: usize = 1;
        let mut fetched: usize = 0;

        loop {
            let request = TransportRequest::get(path)
                .query("startIndex", start_index)
                .query("count", PAGE_SIZE);
            let body = self.transport.execute(&request, cancel).await?;
            let page: ScimListResponse<serde_json::Value> = decode(&body, "list page")?;

            let page_len = page.resources.len();
            debug!(
                path,
                start_index,
                page_len,
                total_results = page.total_results,
                "Fetched list page"
            );
            if page_len == 0 {
                break;
            }

            for resource in page.resources {
                match serde_json::from_value::<T>(resource) {
                    Ok(item) => items.push(item),
                    Err(e) => warn!(path, error = %e, "Skipping resource that failed to decode"),
                }
            }

            fetched += page_len;
            start_index += page_len;
            let total = usize::try_from(page.total_results).unwrap_or(0);
            if fetched >= total {
                break;
            }
        }

        Ok(items)
    }
}

/// Escape a value embedded in a double-quoted SCIM filter literal.
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> MediatorResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| MediatorError::MalformedResponse(format!("failed to parse {what}: {e}")))
}

fn require_id(id: Option<&str>, what: &str) -> MediatorResult<()> {
    match id {
        Some(id) if !id.is_empty() => Ok(()),
        _ => Err(MediatorError::MalformedResponse(format!(
            "{what} has no id"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("jdoe@example.edu"), "jdoe@example.edu");
        assert_eq!(escape_filter_value(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_filter_value(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_decode_reports_malformed_response() {
        let err = decode::<ScimUser>(b"<html>", "created user").unwrap_err();
        assert!(matches!(err, MediatorError::MalformedResponse(ref m) if m.contains("created user")));
    }

    #[test]
    fn test_require_id() {
        assert!(require_id(Some("1"), "user").is_ok());
        assert!(require_id(Some(""), "user").is_err());
        assert!(require_id(None, "user").is_err());
    }
}
