//! Application models: the navigator façade over the move tree, the game
//! session that keeps a board in step with it, and the analysis engine.

pub mod engine;
pub mod game;
pub mod navigator;

pub use engine::{AnalysisLine, EngineSession};
pub use game::{GameSession, GameStatus};
pub use navigator::{BoardUpdate, GameNavigator, MoveOutcome};
