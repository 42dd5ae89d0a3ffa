//! A catalog client serving canned responses.
//!
//! Used by unit tests throughout the workspace,
//! and by the CLI when [VERGE_CATALOG_MOCK_DATA_VAR] points at a response file.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::client::ClientTrait;
use crate::error::{ItemError, RemoteFailure};
use crate::types::{Item, ItemId, ResultSet, SearchRequest};

/// Path to a JSON file of [Response]s the CLI should replay instead of
/// contacting the catalog.
pub const VERGE_CATALOG_MOCK_DATA_VAR: &str = "_VERGE_USE_CATALOG_MOCK";

type MockField<T> = Arc<Mutex<T>>;

/// A canned catalog response.
///
/// A non-zero `delay_ms` holds the response back,
/// which lets tests complete requests out of order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Search {
        items: ResultSet,
        #[serde(default)]
        delay_ms: u64,
    },
    Item {
        item: Option<Item>,
        #[serde(default)]
        delay_ms: u64,
    },
    Error {
        status: u16,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl Response {
    fn delay(&self) -> Duration {
        let (Response::Search { delay_ms, .. }
        | Response::Item { delay_ms, .. }
        | Response::Error { delay_ms, .. }) = self;
        Duration::from_millis(*delay_ms)
    }
}

/// A request the mock client has served, in the order they were issued.
#[derive(Debug, Clone, PartialEq)]
pub enum MockRequest {
    Search(SearchRequest),
    GetItem(ItemId),
}

#[derive(Debug, Error)]
pub enum MockDataError {
    /// Failed to read the JSON file pointed at by the _VERGE_USE_CATALOG_MOCK var
    #[error("failed to read mock response file")]
    ReadMockFile(#[source] std::io::Error),
    /// Failed to parse the contents of the mock data file as JSON
    #[error("failed to parse mock data as JSON")]
    ParseJson(#[source] serde_json::Error),
    /// The data was parsed as JSON but it wasn't semantically valid
    #[error("invalid mocked data: {0}")]
    InvalidData(String),
}

/// Reads a list of mock responses from disk.
fn read_mock_responses(path: impl AsRef<Path>) -> Result<VecDeque<Response>, MockDataError> {
    let contents = std::fs::read_to_string(path).map_err(MockDataError::ReadMockFile)?;
    let responses: Vec<Response> =
        serde_json::from_str(&contents).map_err(MockDataError::ParseJson)?;

    for response in &responses {
        if let Response::Error { status, .. } = response {
            StatusCode::from_u16(*status)
                .map_err(|_| MockDataError::InvalidData(format!("invalid status code {status}")))?;
        }
    }

    Ok(responses.into())
}

/// A catalog client that can be seeded with mock responses
///
/// Clones share their response queue and request log,
/// so a test can keep a handle after moving the client elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MockClient {
    pub mock_responses: MockField<VecDeque<Response>>,
    issued_requests: MockField<Vec<MockRequest>>,
}

/// Whole milliseconds of `delay`, saturating at `u64::MAX`
fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn lock<T>(field: &MockField<T>) -> MutexGuard<'_, T> {
    field.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockClient {
    /// Create a new mock client, potentially reading mock responses from disk
    pub fn new(mock_data_path: Option<impl AsRef<Path>>) -> Result<Self, MockDataError> {
        let mock_responses = match mock_data_path {
            Some(path) => read_mock_responses(path)?,
            None => VecDeque::new(),
        };
        Ok(Self {
            mock_responses: Arc::new(Mutex::new(mock_responses)),
            issued_requests: Default::default(),
        })
    }

    /// Push a new response into the list of mock responses
    pub fn push_search_response(&self, items: impl Into<ResultSet>) {
        self.push_search_response_after(items, Duration::ZERO);
    }

    /// Push a search response that completes only after `delay`
    pub fn push_search_response_after(&self, items: impl Into<ResultSet>, delay: Duration) {
        lock(&self.mock_responses).push_back(Response::Search {
            items: items.into(),
            delay_ms: delay_millis(delay),
        });
    }

    /// Push a new response into the list of mock responses
    pub fn push_item_response(&self, item: Option<Item>) {
        lock(&self.mock_responses).push_back(Response::Item { item, delay_ms: 0 });
    }

    /// Push an error status into the list of mock responses
    pub fn push_error_response(&self, status: u16) {
        self.push_error_response_after(status, Duration::ZERO);
    }

    pub fn push_error_response_after(&self, status: u16, delay: Duration) {
        lock(&self.mock_responses).push_back(Response::Error {
            status,
            delay_ms: delay_millis(delay),
        });
    }

    /// Requests served so far, oldest first
    pub fn issued_requests(&self) -> Vec<MockRequest> {
        lock(&self.issued_requests).clone()
    }

    /// Record the request and take the next canned response.
    ///
    /// The lock is released before the caller waits out any delay.
    fn next_response(&self, request: MockRequest) -> Option<Response> {
        lock(&self.issued_requests).push(request);
        lock(&self.mock_responses).pop_front()
    }
}

fn status_failure(status: u16) -> RemoteFailure {
    RemoteFailure::Status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
}

impl ClientTrait for MockClient {
    async fn search_catalog(&self, request: &SearchRequest) -> Result<ResultSet, RemoteFailure> {
        let mock_resp = self.next_response(MockRequest::Search(request.clone()));
        if let Some(resp) = &mock_resp {
            tokio::time::sleep(resp.delay()).await;
        }

        match mock_resp {
            Some(Response::Search { items, .. }) => Ok(items),
            Some(Response::Error { status, .. }) => Err(status_failure(status)),
            other => {
                debug!(response = ?other, "no search response queued");
                Err(RemoteFailure::Other(format!(
                    "expected mock search response, found {other:?}"
                )))
            },
        }
    }

    async fn get_item_by_id(&self, id: &ItemId) -> Result<Item, ItemError> {
        let mock_resp = self.next_response(MockRequest::GetItem(id.clone()));
        if let Some(resp) = &mock_resp {
            tokio::time::sleep(resp.delay()).await;
        }

        match mock_resp {
            Some(Response::Item {
                item: Some(item), ..
            }) => Ok(item),
            Some(Response::Item { item: None, .. }) | Some(Response::Error { status: 404, .. }) => {
                Err(ItemError::NotFound(id.clone()))
            },
            Some(Response::Error { status, .. }) => Err(status_failure(status).into()),
            other => {
                debug!(response = ?other, "no item response queued");
                Err(RemoteFailure::Other(format!(
                    "expected mock item response, found {other:?}"
                ))
                .into())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::types::test_helpers::item;
    use crate::types::DEFAULT_SEARCH_LIMIT;

    #[tokio::test]
    async fn mock_client_uses_seeded_responses_in_order() {
        let client = MockClient::default();
        client.push_search_response(vec![item("1", "One")]);
        client.push_error_response(500);

        let request = SearchRequest::unconstrained(DEFAULT_SEARCH_LIMIT);
        let first = client.search_catalog(&request).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = client.search_catalog(&request).await.unwrap_err();
        assert!(matches!(second, RemoteFailure::Status(StatusCode::INTERNAL_SERVER_ERROR)));

        assert_eq!(client.issued_requests(), vec![
            MockRequest::Search(request.clone()),
            MockRequest::Search(request)
        ]);
    }

    #[tokio::test]
    async fn clones_share_queue_and_log() {
        let client = MockClient::default();
        let handle = client.clone();
        handle.push_item_response(Some(item("7", "Seven")));

        let found = client.get_item_by_id(&ItemId::from("7")).await.unwrap();
        assert_eq!(found.name, "Seven");
        assert_eq!(handle.issued_requests(), vec![MockRequest::GetItem(
            ItemId::from("7")
        )]);
    }

    #[tokio::test]
    async fn missing_item_responses_are_not_found() {
        let client = MockClient::default();
        client.push_item_response(None);
        client.push_error_response(404);
        client.push_error_response(502);

        let id = ItemId::from("x");
        assert!(matches!(
            client.get_item_by_id(&id).await,
            Err(ItemError::NotFound(_))
        ));
        assert!(matches!(
            client.get_item_by_id(&id).await,
            Err(ItemError::NotFound(_))
        ));
        assert!(matches!(
            client.get_item_by_id(&id).await,
            Err(ItemError::Remote(RemoteFailure::Status(StatusCode::BAD_GATEWAY)))
        ));
    }

    #[tokio::test]
    async fn empty_queue_is_a_failure_not_a_panic() {
        let client = MockClient::default();
        let err = client
            .search_catalog(&SearchRequest::unconstrained(DEFAULT_SEARCH_LIMIT))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteFailure::Other(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_response_waits() {
        let client = MockClient::default();
        client.push_search_response_after(vec![item("1", "One")], Duration::from_millis(200));

        let start = tokio::time::Instant::now();
        let request = SearchRequest::unconstrained(DEFAULT_SEARCH_LIMIT);
        client.search_catalog(&request).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn huge_delays_saturate() {
        assert_eq!(delay_millis(Duration::from_millis(250)), 250);
        assert_eq!(delay_millis(Duration::MAX), u64::MAX);

        let client = MockClient::default();
        client.push_error_response_after(500, Duration::MAX);
        assert!(matches!(
            lock(&client.mock_responses).front(),
            Some(Response::Error { delay_ms: u64::MAX, .. })
        ));
    }

    #[test]
    fn error_when_invalid_json() {
        let tmp = NamedTempFile::new().unwrap();
        // There's nothing in the mock data file yet, so it can't be parsed as JSON.
        let err = MockClient::new(Some(tmp.path())).unwrap_err();
        assert!(matches!(err, MockDataError::ParseJson(_)));
    }

    #[test]
    fn error_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = MockClient::new(Some(dir.path().join("missing.json"))).unwrap_err();
        assert!(matches!(err, MockDataError::ReadMockFile(_)));
    }

    #[test]
    fn error_when_invalid_status() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(br#"[{"kind": "error", "status": 42}]"#).unwrap();
        let err = MockClient::new(Some(tmp.path())).unwrap_err();
        assert!(matches!(err, MockDataError::InvalidData(_)));
    }

    #[tokio::test]
    async fn parses_response_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(
            br#"[
                {"kind": "search", "items": [{
                    "id": 9999,
                    "name": "Black Ribbed Ankle Length Socks",
                    "image": "https://img.example/9999.jpg",
                    "region": "SAUDI",
                    "shop_name": "6thstreet",
                    "current_price": 100,
                    "off_percent": 3
                }]},
                {"kind": "item", "item": null}
            ]"#,
        )
        .unwrap();

        let client = MockClient::new(Some(tmp.path())).unwrap();
        let results = client
            .search_catalog(&SearchRequest::unconstrained(DEFAULT_SEARCH_LIMIT))
            .await
            .unwrap();
        assert_eq!(results[0].id.as_str(), "9999");
        assert!(matches!(
            client.get_item_by_id(&ItemId::from("9999")).await,
            Err(ItemError::NotFound(_))
        ));
    }
}
