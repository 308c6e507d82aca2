//! Hierarchical device identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifies one device, e.g. `vdev/3f2a9c1e`.
///
/// Components are split on `/` or `.`; empty components are dropped, so
/// `vdev.console` and `/vdev/console/` name the same device. Ordering and
/// equality follow the component sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    components: Vec<String>,
}

impl DeviceId {
    pub fn parse(s: &str) -> Self {
        Self {
            components: s
                .split(['/', '.'])
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// A fresh id under `base`, suffixed with 8 random hex digits.
    ///
    /// ```rust
    /// use vdev_runtime::DeviceId;
    ///
    /// let base = DeviceId::parse("vdev");
    /// let id = DeviceId::derive(&base);
    /// assert_eq!(id.components().len(), 2);
    /// assert_eq!(id.components()[1].len(), 8);
    /// assert_ne!(id, DeviceId::derive(&base));
    /// ```
    pub fn derive(base: &DeviceId) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_string();
        let mut components = base.components.clone();
        components.push(suffix);
        Self { components }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| Self::parse(&s))
    }
}
