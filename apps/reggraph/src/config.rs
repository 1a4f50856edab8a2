//! # Configuration
//!
//! Optional TOML configuration for the CLI and the HTTP service.
//!
//! The file is taken from `--config`, else from `REGGRAPH_CONFIG`; with
//! neither, built-in defaults apply. Every key is optional:
//!
//! ```toml
//! [pipeline]
//! output_path = "artifacts/graph.json"
//!
//! [resolver]
//! citable_types = ["document", "document_section", "document_field"]
//! min_token_len = 3
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```

use reggraph_core::{GraphError, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "REGGRAPH_CONFIG";

/// Configuration files larger than this are rejected.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// `[pipeline]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where `run` writes the artifact when `--output-path` is absent.
    pub output_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("artifacts/graph.json"),
        }
    }
}

/// `[server]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Whole application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub resolver: ResolverConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Parse a configuration document.
    pub fn from_toml(text: &str) -> Result<Self, GraphError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| GraphError::InvalidInput(format!("invalid configuration: {}", e)))?;
        if config.resolver.min_token_len == 0 {
            return Err(GraphError::InvalidInput(
                "resolver.min_token_len must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Read a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, GraphError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| GraphError::Io(format!("{}: {}", path.display(), e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(GraphError::InvalidInput(format!(
                "configuration file {} exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Resolve the configuration: explicit path, then `REGGRAPH_CONFIG`,
    /// then defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, GraphError> {
        let from_env = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::from_path(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
