//! HTTP execution abstraction.
//!
//! The device runtime only talks to an [`HttpExecutor`], so tests can swap
//! the real transport for [`mock::MockExecutor`].

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::types::{HttpRequest, HttpResponse};

/// Trait for executing HTTP requests.
pub trait HttpExecutor: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// Returns `Err` with a message if the request fails.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Blocking transport over `reqwest`. Device threads are plain OS threads,
/// so requests block the calling script until the response arrives.
pub struct ReqwestExecutor {
    client: Client,
}

const USER_AGENT: &str = concat!("vdev/", env!("CARGO_PKG_VERSION"));

impl ReqwestExecutor {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map(|client| Self { client })
            .map_err(|e| e.to_string())
    }

    /// 30 second timeout.
    pub fn with_default_timeout() -> Result<Self, String> {
        Self::new(Duration::from_secs(30))
    }
}

fn outgoing_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| format!("invalid header name '{name}': {e}"))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| format!("invalid value for header '{name}': {e}"))?;
            Ok((name, value))
        })
        .collect()
}

/// Headers whose values are not visible ASCII are dropped.
fn incoming_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(outgoing_headers(&request.headers)?);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status();
        let headers = incoming_headers(response.headers());
        let body = response.bytes().map_err(|e| e.to_string())?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            headers,
            body: body.to_vec(),
        })
    }
}

/// Mock HTTP executor for testing.
///
/// Returns predefined responses keyed by URL and records every request it
/// sees.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Responses keyed by request URL.
        responses: Arc<Mutex<HashMap<String, HttpResponse>>>,
        default_response: Arc<Mutex<Option<HttpResponse>>>,
        recorded_requests: Arc<Mutex<Vec<HttpRequest>>>,
        /// When set, every request fails with this message.
        failure: Arc<Mutex<Option<String>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a response for a specific URL.
        pub fn with_response(self, url: impl Into<String>, response: HttpResponse) -> Self {
            self.responses.lock().insert(url.into(), response);
            self
        }

        /// Set a default response when no URL matches.
        pub fn with_default_response(self, response: HttpResponse) -> Self {
            *self.default_response.lock() = Some(response);
            self
        }

        /// Configure to fail all requests with an error.
        pub fn fail_with(self, message: impl Into<String>) -> Self {
            *self.failure.lock() = Some(message.into());
            self
        }

        /// Get all recorded requests.
        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.recorded_requests.lock().clone()
        }

        pub fn not_found() -> HttpResponse {
            HttpResponse::new(404, "Not Found")
        }
    }

    impl HttpExecutor for MockExecutor {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
            self.recorded_requests.lock().push(request.clone());

            if let Some(message) = self.failure.lock().clone() {
                return Err(message);
            }

            if let Some(response) = self.responses.lock().get(&request.url) {
                return Ok(response.clone());
            }

            if let Some(response) = self.default_response.lock().clone() {
                return Ok(response);
            }

            Ok(Self::not_found())
        }
    }
}
