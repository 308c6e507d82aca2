//! HTTP access for vdev devices
//!
//! Scripts reach the network only through a [`PolicyClient`], which checks
//! the target host against the device's [`NetworkPolicy`] before anything is
//! sent. The transport sits behind the [`HttpExecutor`] trait: production
//! code uses [`ReqwestExecutor`], tests use `executor::mock::MockExecutor`
//! (enable the `test-utils` feature to use it from other crates).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vdev_net::{HttpRequest, NetworkPolicy, PolicyClient, PolicyMode, ReqwestExecutor};
//!
//! let executor = ReqwestExecutor::with_default_timeout().unwrap();
//! let policy = NetworkPolicy::new(PolicyMode::AllowSome, ["example.com"]);
//! let client = PolicyClient::new(policy, Arc::new(executor));
//!
//! let response = client.execute(&HttpRequest::get("https://example.com/")).unwrap();
//! println!("{}", response.status);
//! ```

mod client;
mod error;
pub mod executor;
mod policy;
mod types;

pub use client::PolicyClient;
pub use error::{Error, Result};
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use policy::{NetworkPolicy, PolicyMode};
pub use types::{HttpRequest, HttpResponse, Method};
