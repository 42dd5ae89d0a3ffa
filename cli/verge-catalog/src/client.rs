//! Catalog client and the [ClientTrait] seam used by search orchestration.

use std::fmt::Debug;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use reqwest::header::{self, HeaderMap};
use reqwest::StatusCode;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogClientConfig;
use crate::error::{CatalogClientError, ItemError, RemoteFailure};
use crate::mock::MockClient;
use crate::types::*;

pub const SEARCH_PATH: &str = "search";
pub const ITEMS_PATH: &str = "items";

/// Either a client for the actual catalog service,
/// or a mock client for testing.
#[derive(Debug)]
#[enum_dispatch(ClientTrait)]
pub enum Client {
    Catalog(CatalogClient),
    Mock(MockClient),
}

/// Remote operations the catalog offers.
///
/// Both operations may be called concurrently;
/// responses can complete in any order.
#[enum_dispatch]
#[allow(async_fn_in_trait)]
pub trait ClientTrait {
    /// Run a search and return the matching items in catalog order.
    ///
    /// An empty or `null` response body is an empty [ResultSet].
    async fn search_catalog(&self, request: &SearchRequest) -> Result<ResultSet, RemoteFailure>;

    /// Fetch a single item for the detail view.
    ///
    /// A `404`, an empty body or an unparsable body all mean
    /// there is no such item.
    async fn get_item_by_id(&self, id: &ItemId) -> Result<Item, ItemError>;
}

/// A client for the catalog service.
///
/// Wraps a configured [reqwest::Client] and the base URL
/// that endpoint paths are resolved against.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    config: CatalogClientConfig,
}

impl Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("catalog_url", &self.config.catalog_url)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a new catalog client from configuration.
    pub fn new(config: CatalogClientConfig) -> Result<Self, CatalogClientError> {
        let base_url = parse_base_url(&config.catalog_url)?;
        let http = build_http_client(&config)?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Get the configured catalog URL.
    pub fn catalog_url(&self) -> &str {
        &self.config.catalog_url
    }

    /// Resolve an endpoint below the base URL.
    ///
    /// Each segment is percent-encoded,
    /// so identifiers containing `/` or `?` stay a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `parse_base_url` rejects URLs that cannot be a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl ClientTrait for CatalogClient {
    #[instrument(skip_all, fields(
        text_query = %request.text_query,
        limit = %request.limit,
    ))]
    async fn search_catalog(&self, request: &SearchRequest) -> Result<ResultSet, RemoteFailure> {
        let url = self.endpoint(&[SEARCH_PATH]);
        debug!(%url, "sending search request");

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(RemoteFailure::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "search request failed");
            return Err(RemoteFailure::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(RemoteFailure::from_transport)?;
        let results = parse_result_set(&body)?;

        debug!(n_results = results.len(), "received search results");
        Ok(results)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get_item_by_id(&self, id: &ItemId) -> Result<Item, ItemError> {
        let url = self.endpoint(&[ITEMS_PATH, id.as_str()]);
        debug!(%url, "requesting item");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(RemoteFailure::from_transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ItemError::NotFound(id.clone())),
            status if !status.is_success() => {
                return Err(RemoteFailure::Status(status).into());
            },
            _ => {},
        }

        let body = response
            .bytes()
            .await
            .map_err(RemoteFailure::from_transport)?;

        parse_item(id, &body)
    }
}

/// Parse a search response body.
///
/// An empty body and a literal `null` both mean "no results".
pub(crate) fn parse_result_set(body: &[u8]) -> Result<ResultSet, RemoteFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResultSet::default());
    }

    serde_json::from_slice::<Option<ResultSet>>(body)
        .map(Option::unwrap_or_default)
        .map_err(RemoteFailure::MalformedBody)
}

/// Parse an item response body, treating anything unusable as absent.
fn parse_item(id: &ItemId, body: &[u8]) -> Result<Item, ItemError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ItemError::NotFound(id.clone()));
    }

    match serde_json::from_slice::<Option<Item>>(body) {
        Ok(Some(item)) => Ok(item),
        Ok(None) => Err(ItemError::NotFound(id.clone())),
        Err(e) => {
            debug!(error = %e, "item response could not be parsed");
            Err(ItemError::NotFound(id.clone()))
        },
    }
}

fn parse_base_url(catalog_url: &str) -> Result<Url, CatalogClientError> {
    let url = Url::parse(catalog_url).map_err(|source| CatalogClientError::InvalidUrl {
        url: catalog_url.to_string(),
        source,
    })?;

    if url.cannot_be_a_base() {
        return Err(CatalogClientError::NotABaseUrl(catalog_url.to_string()));
    }

    Ok(url)
}

fn build_http_client(config: &CatalogClientConfig) -> Result<reqwest::Client, CatalogClientError> {
    let mut headers = HeaderMap::new();

    if let Some(token) = &config.token {
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("bearer {token}"))
                .map_err(|e| CatalogClientError::InvalidHeader(e.to_string()))?,
        );
    }

    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key).map_err(
                |e: reqwest::header::InvalidHeaderName| {
                    CatalogClientError::InvalidHeader(format!("{key}: {e}"))
                },
            )?,
            header::HeaderValue::from_str(value).map_err(
                |e: reqwest::header::InvalidHeaderValue| {
                    CatalogClientError::InvalidHeader(format!("{key}: {e}"))
                },
            )?,
        );
    }

    debug!(
        catalog_url = %config.catalog_url,
        has_token = config.token.is_some(),
        extra_headers = config.extra_headers.len(),
        "building catalog HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout);

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder
        .build()
        .map_err(CatalogClientError::HttpClient)
}

#[cfg(test)]
pub mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::types::test_helpers::item;

    fn client_config(url: &str) -> CatalogClientConfig {
        CatalogClientConfig::new(url)
    }

    fn sample_request() -> SearchRequest {
        let mut request = SearchRequest::unconstrained(DEFAULT_SEARCH_LIMIT);
        request.text_query = "socks".to_string();
        request.filters.region.insert("QATAR".to_string());
        request
    }

    #[tokio::test]
    async fn search_posts_canonical_request_and_keeps_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/search").json_body(json!({
                    "text_query": "socks",
                    "filters": {
                        "region": ["QATAR"],
                        "sizes": [],
                        "color_names": [],
                        "gender_name": [],
                        "category_name": [],
                        "brand_name": [],
                        "price": { "min_price": 0.0, "max_price": 1000.0, "currency": "USD" }
                    },
                    "limit": 10
                }));
                then.status(200)
                    .json_body_obj(&vec![item("2", "Second"), item("1", "First")]);
            })
            .await;

        let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
        let results = client.search_catalog(&sample_request()).await.unwrap();

        mock.assert_async().await;
        let ids: Vec<_> = results.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn search_resolves_below_base_path() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/search");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = CatalogClient::new(client_config(&server.url("/api/"))).unwrap();
        let results = client.search_catalog(&sample_request()).await.unwrap();

        mock.assert_async().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_and_null_search_bodies_are_empty_results() {
        for body in ["", "  \n", "null"] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path("/search");
                    then.status(200).body(body);
                })
                .await;

            let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
            let results = client.search_catalog(&sample_request()).await.unwrap();
            assert!(results.is_empty(), "body {body:?} should be empty results");
        }
    }

    #[tokio::test]
    async fn search_error_status_is_a_remote_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(500).body("boom");
            })
            .await;

        let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
        let err = client.search_catalog(&sample_request()).await.unwrap_err();
        assert!(
            matches!(err, RemoteFailure::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn malformed_search_body_is_a_remote_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(200).json_body(json!({ "items": [] }));
            })
            .await;

        let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
        let err = client.search_catalog(&sample_request()).await.unwrap_err();
        assert!(matches!(err, RemoteFailure::MalformedBody(_)), "{err:?}");
    }

    #[tokio::test]
    async fn invalid_item_in_results_is_a_remote_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(200).json_body(json!([{
                    "id": "1",
                    "name": "n",
                    "image": "i",
                    "region": "r",
                    "shop_name": "s",
                    "current_price": 10,
                    "off_percent": 101
                }]));
            })
            .await;

        let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
        let err = client.search_catalog(&sample_request()).await.unwrap_err();
        assert!(matches!(err, RemoteFailure::MalformedBody(_)), "{err:?}");
    }

    #[tokio::test]
    async fn semantic_backend_results_without_store_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(200).json_body(json!([{
                    "product_id": 9999,
                    "name": "Black Ribbed Ankle Length Socks",
                    "description": "Ribbed cotton socks",
                    "image_url": "https://img.example/9999.jpg",
                    "link": "https://shop.example/9999",
                    "score": 0.8
                }]));
            })
            .await;

        let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
        let results = client.search_catalog(&sample_request()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, ItemId::from("9999"));
        assert_eq!(results[0].link.as_deref(), Some("https://shop.example/9999"));
        assert_eq!(results[0].shop_name, "");
        assert_eq!(results[0].current_price, 0.0);
    }

    #[tokio::test]
    async fn unreachable_catalog_is_a_remote_failure() {
        // Nothing listens on port 1
        let client = CatalogClient::new(client_config("http://127.0.0.1:1")).unwrap();
        let err = client.search_catalog(&sample_request()).await.unwrap_err();
        assert!(
            matches!(err, RemoteFailure::Unreachable(_) | RemoteFailure::Timeout(_)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn slow_catalog_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(200)
                    .json_body(json!([]))
                    .delay(Duration::from_millis(500));
            })
            .await;

        let config = CatalogClientConfig {
            request_timeout: Duration::from_millis(50),
            ..client_config(&server.base_url())
        };
        let client = CatalogClient::new(config).unwrap();
        let err = client.search_catalog(&sample_request()).await.unwrap_err();
        assert!(matches!(err, RemoteFailure::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn get_item_returns_item() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/items/2089163");
                then.status(200).json_body_obj(&item("2089163", "Socks"));
            })
            .await;

        let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
        let found = client
            .get_item_by_id(&ItemId::from("2089163"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(found, item("2089163", "Socks"));
    }

    /// A missing item is reported as [ItemError::NotFound]
    /// whether the catalog says so with a status or an unusable body.
    #[tokio::test]
    async fn get_item_not_found_variants() {
        let cases: [(u16, &str); 4] = [
            (404, ""),
            (200, ""),
            (200, "null"),
            (200, "{\"unexpected\": true}"),
        ];

        for (status, body) in cases {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/items/missing");
                    then.status(status).body(body);
                })
                .await;

            let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
            let err = client
                .get_item_by_id(&ItemId::from("missing"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, ItemError::NotFound(ref id) if id.as_str() == "missing"),
                "status {status} body {body:?}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn get_item_server_error_is_remote() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/items/1");
                then.status(503);
            })
            .await;

        let client = CatalogClient::new(client_config(&server.base_url())).unwrap();
        let err = client.get_item_by_id(&ItemId::from("1")).await.unwrap_err();
        assert!(
            matches!(
                err,
                ItemError::Remote(RemoteFailure::Status(StatusCode::SERVICE_UNAVAILABLE))
            ),
            "{err:?}"
        );
    }

    #[test]
    fn item_ids_are_encoded_as_a_single_segment() {
        let client = CatalogClient::new(client_config("http://catalog.example/api")).unwrap();
        let url = client.endpoint(&[ITEMS_PATH, "a/b c"]);
        assert_eq!(url.as_str(), "http://catalog.example/api/items/a%2Fb%20c");
    }

    #[test]
    fn invalid_catalog_url_is_rejected() {
        let err = CatalogClient::new(client_config("not a url")).unwrap_err();
        assert!(matches!(err, CatalogClientError::InvalidUrl { .. }), "{err:?}");

        let err = CatalogClient::new(client_config("mailto:someone@example.com")).unwrap_err();
        assert!(matches!(err, CatalogClientError::NotABaseUrl(_)), "{err:?}");
    }

    #[tokio::test]
    async fn token_and_extra_headers_set_on_all_requests() {
        let mut extra_headers: BTreeMap<String, String> = BTreeMap::new();
        extra_headers.insert("verge-test".to_string(), "test-value".to_string());

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.header("authorization", "bearer secret")
                    .header("verge-test", "test-value");
                then.status(200).json_body(json!([]));
            })
            .await;

        let config = CatalogClientConfig {
            token: Some("secret".to_string()),
            extra_headers,
            ..client_config(&server.base_url())
        };

        let client = CatalogClient::new(config).unwrap();
        let _ = client.search_catalog(&sample_request()).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn user_agent_set_on_all_requests() {
        let expected_agent = "my-custom-user-agent";

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.header("user-agent", expected_agent);
                then.status(200).json_body(json!([]));
            })
            .await;

        let config = CatalogClientConfig {
            user_agent: Some(expected_agent.to_owned()),
            ..client_config(&server.base_url())
        };

        let client = CatalogClient::new(config).unwrap();
        let _ = client.search_catalog(&sample_request()).await;
        mock.assert_async().await;
    }

    #[test]
    fn invalid_extra_header_is_rejected() {
        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("bad header".to_string(), "x".to_string());
        let config = CatalogClientConfig {
            extra_headers,
            ..client_config("http://localhost:8000")
        };
        let err = CatalogClient::new(config).unwrap_err();
        assert!(matches!(err, CatalogClientError::InvalidHeader(_)), "{err:?}");
    }
}
