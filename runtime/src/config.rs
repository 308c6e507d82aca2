use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vdev_net::NetworkPolicy;

use crate::error::{Result, RuntimeError};

/// Immutable per-device configuration, shared as `Arc<DeviceConfig>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub network: NetworkPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(default = "default_canvas_size")]
    pub width: u32,
    #[serde(default = "default_canvas_size")]
    pub height: u32,
    #[serde(default = "default_scale")]
    pub scale: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_size(),
            height: default_canvas_size(),
            scale: default_scale(),
        }
    }
}

fn default_canvas_size() -> u32 {
    256
}
fn default_scale() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Module imported on every reload, e.g. `/main` (the `.rhai` extension
    /// is optional).
    #[serde(default = "default_entry_module")]
    pub entry_module: String,
    #[serde(default = "default_entry_function")]
    pub entry_function: String,
    /// Script standard library folder.
    pub stdlib_root: Option<PathBuf>,
    /// Per-device asset folders live under `asset_root/<device id>`.
    pub asset_root: Option<PathBuf>,
    /// Package folder shared by every device.
    pub script_root: Option<PathBuf>,
    #[serde(default = "default_id_namespace")]
    pub id_namespace: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            entry_module: default_entry_module(),
            entry_function: default_entry_function(),
            stdlib_root: None,
            asset_root: None,
            script_root: None,
            id_namespace: default_id_namespace(),
        }
    }
}

fn default_entry_module() -> String {
    "/main".into()
}
fn default_entry_function() -> String {
    "main".into()
}
fn default_id_namespace() -> String {
    "vdev".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Restart the script after a script fault instead of ending the thread.
    #[serde(default)]
    pub reset_script_on_fatal_error: bool,
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reset_script_on_fatal_error: false,
            max_call_levels: default_max_call_levels(),
        }
    }
}

fn default_max_call_levels() -> usize {
    64
}

impl DeviceConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RuntimeError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
