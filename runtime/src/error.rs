//! Error types for the device runtime.

use thiserror::Error;

use crate::DeviceId;

/// Errors that can occur while building, loading or managing devices.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The entry module could not be loaded or compiled.
    #[error("failed to load entry module '{module}': {message}")]
    EntryModule { module: String, message: String },

    /// No loader could provide the requested module.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Two capability modules with the same name were given to one device.
    #[error("duplicate capability module: {0}")]
    DuplicateModule(String),

    /// The device's layers do not form a valid composite storage.
    #[error("storage error: {0}")]
    Storage(#[from] vdev_storage::CompositeError),

    /// A configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A script error raised outside the device thread.
    #[error("script error: {0}")]
    Script(String),

    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("unknown device factory: {0}")]
    UnknownFactory(String),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
