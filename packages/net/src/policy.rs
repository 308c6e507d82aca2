//! Allow/block policy for outgoing requests.

use serde::{Deserialize, Serialize};
use url::Url;

/// How the address list of a [`NetworkPolicy`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyMode {
    /// Every host is reachable; the address list is ignored.
    #[default]
    AllowAll,
    /// No host is reachable; the address list is ignored.
    BlockAll,
    /// Only listed hosts are reachable.
    AllowSome,
    /// Every host except the listed ones is reachable.
    BlockSome,
}

/// Which hosts a device may contact.
///
/// Hosts are compared case-insensitively against the URL's host; ports and
/// paths play no part.
///
/// ```rust
/// use vdev_net::{NetworkPolicy, PolicyMode};
///
/// let policy = NetworkPolicy::new(PolicyMode::AllowSome, ["example.com"]);
/// assert!(policy.allows_host("Example.COM"));
/// assert!(!policy.allows_host("other.test"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicy {
    pub mode: PolicyMode,
    pub addresses: Vec<String>,
}

impl NetworkPolicy {
    pub fn new<I, S>(mode: PolicyMode, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn block_all() -> Self {
        Self::new(PolicyMode::BlockAll, Vec::<String>::new())
    }

    fn listed(&self, host: &str) -> bool {
        self.addresses.iter().any(|a| a.eq_ignore_ascii_case(host))
    }

    pub fn allows_host(&self, host: &str) -> bool {
        match self.mode {
            PolicyMode::AllowAll => true,
            PolicyMode::BlockAll => false,
            PolicyMode::AllowSome => self.listed(host),
            PolicyMode::BlockSome => !self.listed(host),
        }
    }

    /// URLs without a host are only allowed under `AllowAll`.
    pub fn allows_url(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.allows_host(host),
            None => self.mode == PolicyMode::AllowAll,
        }
    }
}
