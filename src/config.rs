//! Application configuration, read from a TOML file.
//!
//! ```toml
//! start_fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
//!
//! [engine]
//! path = "/opt/homebrew/bin/stockfish"
//! multipv = 3
//! movetime_ms = 100
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AppConfig {
    /// Starting position; the standard start when absent
    pub start_fen: Option<String>,
    pub engine: EngineConfig,
}

/// Analysis engine process settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable, looked up on PATH when not absolute
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Number of principal variations to request
    pub multipv: u32,
    /// Time limit per analysis, used when `depth` is unset
    pub movetime_ms: u64,
    pub depth: Option<u32>,
    /// How long to wait for `uciok`/`readyok`, and the slack added to `movetime_ms`
    pub ready_timeout_ms: u64,
    /// Upper bound on a search limited by `depth`
    pub depth_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stockfish"),
            args: Vec::new(),
            multipv: 3,
            movetime_ms: 100,
            depth: None,
            ready_timeout_ms: 5_000,
            depth_timeout_ms: 120_000,
        }
    }
}

impl EngineConfig {
    /// How long one analysis may run before the engine is given up on
    pub fn search_timeout(&self) -> Duration {
        match self.depth {
            Some(_) => Duration::from_millis(self.depth_timeout_ms),
            None => Duration::from_millis(self.movetime_ms + self.ready_timeout_ms),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// JSON schema of the configuration file
    pub fn schema_json() -> Result<String, ConfigError> {
        let schema = schemars::schema_for!(AppConfig);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}
