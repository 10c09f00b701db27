//! Error types for the game layer.

use thiserror::Error;

/// Failures reported by the game session and its parsers.
///
/// Tree navigation itself never fails; running off either end of a line
/// yields `None` instead.
#[derive(Debug, Error)]
pub enum GameError {
    /// Move text that is neither coordinate notation nor SAN
    #[error("invalid move notation: {0}")]
    InvalidMove(String),
    /// A well-formed move that is not legal in the current position
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("PGN error: {0}")]
    Pgn(String),
}

/// Failures while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render config schema: {0}")]
    Schema(#[from] serde_json::Error),
}
