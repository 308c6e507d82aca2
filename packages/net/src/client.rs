//! Policy-enforcing HTTP client.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::{Error, HttpExecutor, HttpRequest, HttpResponse, NetworkPolicy, Result};

/// Checks every request against a [`NetworkPolicy`] before handing it to
/// the executor. A disallowed request never reaches the transport.
#[derive(Clone)]
pub struct PolicyClient {
    policy: NetworkPolicy,
    executor: Arc<dyn HttpExecutor>,
}

impl PolicyClient {
    pub fn new(policy: NetworkPolicy, executor: Arc<dyn HttpExecutor>) -> Self {
        Self { policy, executor }
    }

    pub fn policy(&self) -> &NetworkPolicy {
        &self.policy
    }

    /// Parse `url` and verify the policy allows its host.
    pub fn check(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if !self.policy.allows_url(&parsed) {
            let host = parsed.host_str().unwrap_or_default().to_string();
            warn!(%host, "request blocked by network policy");
            return Err(Error::Blocked { host });
        }
        Ok(parsed)
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        self.check(url).is_ok()
    }

    pub fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.check(&request.url)?;
        debug!(method = request.method.as_str(), url = %request.url, "http request");
        self.executor.execute(request).map_err(Error::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockExecutor;
    use crate::PolicyMode;

    fn client(policy: NetworkPolicy) -> (PolicyClient, MockExecutor) {
        let mock = MockExecutor::new();
        (PolicyClient::new(policy, Arc::new(mock.clone())), mock)
    }

    #[test]
    fn allowed_host_reaches_transport() {
        let (client, mock) = client(NetworkPolicy::new(PolicyMode::AllowSome, ["example.com"]));
        let response = client.execute(&HttpRequest::get("http://example.com/x")).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(mock.recorded_requests().len(), 1);
    }

    #[test]
    fn blocked_host_never_reaches_transport() {
        let (client, mock) = client(NetworkPolicy::new(PolicyMode::AllowSome, ["example.com"]));
        let err = client
            .execute(&HttpRequest::get("http://other.test/x"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Blocked {
                host: "other.test".to_string()
            }
        );
        assert!(mock.recorded_requests().is_empty());
    }

    #[test]
    fn invalid_urls() {
        let (client, mock) = client(NetworkPolicy::allow_all());
        assert!(matches!(
            client.check("not a url"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            client.check("file:///etc/passwd"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(mock.recorded_requests().is_empty());
    }

    #[test]
    fn transport_failures_are_wrapped() {
        let mock = MockExecutor::new().fail_with("connection refused");
        let client = PolicyClient::new(NetworkPolicy::allow_all(), Arc::new(mock));
        let err = client.execute(&HttpRequest::get("http://a.test/")).unwrap_err();
        assert_eq!(err, Error::Transport("connection refused".to_string()));
    }
}
