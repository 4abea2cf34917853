//! Gateway configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields a working in-memory setup. Command-line flags are
//! applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiscript::ExecutionBudget;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deepest call nesting a script may be configured for. The script thread's
/// stack is sized against it.
pub const MAX_CALL_DEPTH_CEILING: usize = 2_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub execution: ExecutionConfig,
    pub catalog: CatalogConfig,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CALL_DEPTH_CEILING).contains(&self.execution.max_call_depth) {
            return Err(ConfigError::Invalid(format!(
                "execution.max_call_depth must be between 1 and {MAX_CALL_DEPTH_CEILING}"
            )));
        }
        if self.session.backend == BackendKind::Bridge && self.session.bridge_url.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "session.bridge_url is required for the bridge backend".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "kicad-code-executor".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Bridge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: BackendKind,
    /// Board loaded by the memory backend. Absent means the demo board.
    pub board_file: Option<PathBuf>,
    /// Write the board back to `board_file` after each pushed commit.
    pub persist_on_push: bool,
    pub bridge_url: String,
    pub request_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            board_file: None,
            persist_on_push: false,
            bridge_url: "http://127.0.0.1:9780/rpc".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// `0` disables the deadline.
    pub timeout_ms: u64,
    pub max_call_depth: usize,
    pub max_return_chars: usize,
    pub max_output_chars: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_call_depth: kiscript::runtime::DEFAULT_MAX_CALL_DEPTH,
            max_return_chars: 10_000,
            max_output_chars: 1_000_000,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Interpreter limits for one request.
    pub fn budget(&self) -> ExecutionBudget {
        let mut budget = ExecutionBudget::default()
            .with_max_call_depth(self.max_call_depth.min(MAX_CALL_DEPTH_CEILING))
            // UTF-8 upper bound, so the reporter's character ceiling applies first.
            .with_max_output_bytes(self.max_output_chars.saturating_mul(4));
        if let Some(timeout) = self.timeout() {
            budget = budget.with_timeout(timeout);
        }
        budget
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Extra `*.kis` examples read once at startup.
    pub examples_dir: Option<PathBuf>,
}
