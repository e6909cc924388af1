use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const MAX_ERROR_BODY: usize = 512;

/// Why a panel call did not produce its expected result.
///
/// Command handlers show the same message for every variant; the variants
/// exist for logs and tests.
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("{operation} returned {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned an unreadable body: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("invalid panel credential: {0}")]
    InvalidCredential(String),
}

impl PanelError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Authenticated HTTP session against one panel API scope.
///
/// The underlying `reqwest::Client` pools connections and is shared by every
/// command for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct PanelClient {
    http: reqwest::Client,
    base_url: String,
}

impl PanelClient {
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> Result<Self, PanelError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| PanelError::InvalidCredential(e.to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|source| PanelError::Transport {
                operation: "build client",
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<Response, PanelError> {
        let response = request
            .send()
            .await
            .map_err(|source| PanelError::Transport { operation, source })?;

        let status = response.status();
        if expected.contains(&status) {
            debug!(operation, %status, "panel request succeeded");
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(operation, %status, "panel rejected request");
        Err(PanelError::Status {
            operation,
            status,
            body,
        })
    }

    pub async fn json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<T, PanelError> {
        let bytes = self
            .send(operation, request, expected)
            .await?
            .bytes()
            .await
            .map_err(|source| PanelError::Transport { operation, source })?;

        serde_json::from_slice(&bytes).map_err(|source| PanelError::Decode { operation, source })
    }

    pub async fn text(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<String, PanelError> {
        self.send(operation, request, expected)
            .await?
            .text()
            .await
            .map_err(|source| PanelError::Transport { operation, source })
    }

    pub async fn empty(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<(), PanelError> {
        self.send(operation, request, expected).await.map(|_| ())
    }
}

/// Rejects identifiers that would change the shape of a request path.
pub fn path_segment(id: &str) -> Result<&str, PanelError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(PanelError::InvalidIdentifier(id.to_string()))
    }
}
