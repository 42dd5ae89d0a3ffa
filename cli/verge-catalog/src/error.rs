//! Error handling for catalog operations.

use reqwest::StatusCode;
use thiserror::Error;

use crate::mock::MockDataError;
use crate::types::ItemId;

/// Errors raised while constructing a catalog client.
#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("invalid catalog url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("catalog url '{0}' cannot have endpoint paths appended")]
    NotABaseUrl(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("could not build http client")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    MockData(#[from] MockDataError),
}

/// A remote operation did not produce a usable result.
///
/// Callers recover from this locally,
/// e.g. by keeping the previously displayed results.
#[derive(Debug, Error)]
pub enum RemoteFailure {
    #[error("could not reach the catalog")]
    Unreachable(#[source] reqwest::Error),
    #[error("catalog request timed out")]
    Timeout(#[source] reqwest::Error),
    #[error("catalog responded with status {0}")]
    Status(StatusCode),
    #[error("catalog response could not be parsed")]
    MalformedBody(#[source] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl RemoteFailure {
    /// Classify a transport error, separating timeouts from other failures.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteFailure::Timeout(err)
        } else {
            RemoteFailure::Unreachable(err)
        }
    }
}

/// Outcome of a lookup by identifier that did not yield an item.
///
/// [ItemError::NotFound] is kept apart from [ItemError::Remote]
/// so the detail view can tell "no such item" from "could not load".
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("item '{0}' not found")]
    NotFound(ItemId),
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}
