//! Station configuration
//!
//! Configuration is resolved in priority order: command-line argument,
//! environment variable (both handled by the binary's clap layer), TOML
//! config file, compiled default.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 5780;
const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;
/// Deployments run 10 MB or 50 MB ceilings; default to the larger one.
const DEFAULT_UPLOAD_CEILING_BYTES: usize = 50 * 1024 * 1024;

/// Inference backend contract configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the inference service (POST {base_url}/predict/{model})
    pub base_url: String,
    /// Transport timeout; expiry surfaces as a network error
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            timeout_secs: DEFAULT_INFERENCE_TIMEOUT_SECS,
        }
    }
}

/// Upload validation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum accepted upload size in bytes
    pub max_bytes: usize,
    /// Accepted MIME types; entries ending in "/*" match by prefix
    pub accepted_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_UPLOAD_CEILING_BYTES,
            accepted_types: vec!["image/*".to_string()],
        }
    }
}

/// Station configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// HTTP listen port
    pub port: u16,
    /// Root folder for the database and stored attachments
    pub data_dir: PathBuf,
    /// Externally visible base URL for attachment links; defaults to the
    /// local listen address
    pub public_base_url: Option<String>,
    pub inference: InferenceConfig,
    pub upload: UploadConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            public_base_url: None,
            inference: InferenceConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl StationConfig {
    /// Load configuration from a TOML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))
    }

    /// Resolve configuration: explicit file if given (must exist), else the
    /// per-user config location if present, else compiled defaults.
    pub fn resolve(explicit_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_file {
            info!("Loading configuration from {}", path.display());
            return Self::load_file(path);
        }

        if let Some(path) = default_config_file() {
            if path.exists() {
                info!("Loading configuration from {}", path.display());
                return Self::load_file(&path);
            }
        }

        debug!("No config file found, using compiled defaults");
        Ok(Self::default())
    }

    /// SQLite database path under the data dir
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("medscan.db")
    }

    /// Attachment object-store directory under the data dir
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    /// Base URL under which stored objects are publicly addressable
    pub fn public_base(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://127.0.0.1:{}", self.port),
        }
    }
}

/// Per-user config file location (~/.config/medscan/config.toml or the
/// platform equivalent)
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("medscan").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("medscan"))
        .unwrap_or_else(|| PathBuf::from("./medscan_data"))
}
