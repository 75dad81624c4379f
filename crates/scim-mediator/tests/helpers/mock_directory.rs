//! Mock SCIM directory using wiremock for integration testing.
//!
//! Wraps a [`MockServer`] and hands out transports and clients wired to it
//! with a millisecond retry policy so retry paths run fast.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use scim_mediator::auth::ApiKey;
use scim_mediator::checkpoint::Checkpoint;
use scim_mediator::client::DirectoryClient;
use scim_mediator::records::TaskStatus;
use scim_mediator::retry::RetryPolicy;
use scim_mediator::transport::Transport;

pub const TEST_TOKEN: &str = "test-token-123";

/// Backoff base used by [`fast_policy`]: 10ms, 20ms, 40ms.
pub const FAST_BASE_DELAY: Duration = Duration::from_millis(10);
pub const FAST_TRANSPORT_DELAY: Duration = Duration::from_millis(5);

/// Four attempts, no jitter, millisecond delays.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::fixed(4, FAST_BASE_DELAY, FAST_TRANSPORT_DELAY)
}

/// A mock SCIM directory.
pub struct MockDirectory {
    server: MockServer,
}

impl MockDirectory {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Transport with the fast retry policy.
    pub fn transport(&self) -> Transport {
        self.transport_with_policy(fast_policy())
    }

    pub fn transport_with_policy(&self, policy: RetryPolicy) -> Transport {
        Transport::with_http_client(
            self.uri(),
            ApiKey::new(TEST_TOKEN),
            policy,
            reqwest::Client::new(),
        )
    }

    pub fn client(&self) -> DirectoryClient {
        DirectoryClient::new(self.transport())
    }

    /// All requests received so far.
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    pub async fn request_count(&self) -> usize {
        self.requests().await.len()
    }

    /// Requests received for a given method.
    pub async fn requests_with_method(&self, verb: &str) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.as_str() == verb)
            .collect()
    }

    // =========================================================================
    // List mocks
    // =========================================================================

    /// Serve every user on a single page.
    pub async fn mock_list_users(&self, users: Vec<Value>) {
        self.mock_single_page("/Users", users).await;
    }

    /// Serve every group on a single page.
    pub async fn mock_list_groups(&self, groups: Vec<Value>) {
        self.mock_single_page("/Groups", groups).await;
    }

    /// Mount one page starting at `start_index`.
    pub async fn mock_page(&self, resource: &str, start_index: usize, total: usize, page: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(resource))
            .and(query_param("startIndex", start_index.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_response(
                total,
                start_index,
                page,
            )))
            .mount(&self.server)
            .await;
    }

    async fn mock_single_page(&self, resource: &str, items: Vec<Value>) {
        let total = items.len();
        self.mock_page(resource, 1, total, items).await;
    }

    /// Always answer `status` for the given method and path.
    pub async fn mock_status(&self, verb: &str, resource: &str, status: u16) {
        Mock::given(method(verb))
            .and(path(resource))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Mutation mocks
    // =========================================================================

    /// Accept PATCH on `/Users/{id}` with 200 and a minimal body.
    pub async fn mock_patch_user(&self, id: &str) {
        Mock::given(method("PATCH"))
            .and(path(format!("/Users/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
            .mount(&self.server)
            .await;
    }

    /// Accept PATCH on `/Users/{id}` and cancel `token` while answering, as a
    /// shutdown signal arriving mid-request would.
    pub async fn mock_patch_user_cancelling(&self, id: &str, token: CancellationToken) {
        Mock::given(method("PATCH"))
            .and(path(format!("/Users/{id}")))
            .respond_with(CancelWhileResponding {
                id: id.to_string(),
                token,
            })
            .mount(&self.server)
            .await;
    }

    /// Accept PATCH on `/Users/{id}` and capture the task statuses persisted
    /// in `checkpoint` at the moment the request arrives.
    pub async fn mock_patch_user_capturing(
        &self,
        id: &str,
        checkpoint: PathBuf,
    ) -> Arc<Mutex<Option<Vec<TaskStatus>>>> {
        let captured = Arc::new(Mutex::new(None));
        Mock::given(method("PATCH"))
            .and(path(format!("/Users/{id}")))
            .respond_with(CaptureCheckpoint {
                id: id.to_string(),
                checkpoint,
                captured: Arc::clone(&captured),
            })
            .mount(&self.server)
            .await;
        captured
    }

    /// Accept PATCH on `/Groups/{id}` with 204.
    pub async fn mock_patch_group(&self, id: &str) {
        Mock::given(method("PATCH"))
            .and(path(format!("/Groups/{id}")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_delete_user(&self, id: &str, status: u16) {
        Mock::given(method("DELETE"))
            .and(path(format!("/Users/{id}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer user searches with no match.
    pub async fn mock_find_user_none(&self) {
        Mock::given(method("GET"))
            .and(path("/Users"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_response(0, 1, vec![])))
            .mount(&self.server)
            .await;
    }

    /// Answer user searches with one match.
    pub async fn mock_find_user(&self, user: Value) {
        Mock::given(method("GET"))
            .and(path("/Users"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_response(1, 1, vec![user])))
            .mount(&self.server)
            .await;
    }

    /// Answer user creation with `created`.
    pub async fn mock_create_user(&self, created: Value) {
        Mock::given(method("POST"))
            .and(path("/Users"))
            .respond_with(ResponseTemplate::new(201).set_body_json(created))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_create_group(&self, created: Value) {
        Mock::given(method("POST"))
            .and(path("/Groups"))
            .respond_with(ResponseTemplate::new(201).set_body_json(created))
            .mount(&self.server)
            .await;
    }
}

struct CancelWhileResponding {
    id: String,
    token: CancellationToken,
}

impl Respond for CancelWhileResponding {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.token.cancel();
        ResponseTemplate::new(200).set_body_json(json!({ "id": self.id }))
    }
}

struct CaptureCheckpoint {
    id: String,
    checkpoint: PathBuf,
    captured: Arc<Mutex<Option<Vec<TaskStatus>>>>,
}

impl Respond for CaptureCheckpoint {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let statuses = Checkpoint::new(self.checkpoint.clone())
            .load()
            .map(|tasks| tasks.iter().map(|t| t.status).collect())
            .ok();
        *self.captured.lock().unwrap() = statuses;
        ResponseTemplate::new(200).set_body_json(json!({ "id": self.id }))
    }
}

/// SCIM list envelope.
pub fn list_response(total: usize, start_index: usize, resources: Vec<Value>) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
        "totalResults": total,
        "itemsPerPage": resources.len(),
        "startIndex": start_index,
        "Resources": resources
    })
}

/// Decode a received request body as JSON.
pub fn body_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}
