//! Chess game recording with nested variations.
//!
//! Moves are kept in a [`domain::MoveTree`]; [`models::GameNavigator`]
//! decides where each played move belongs and how navigation changes the
//! board, and [`models::GameSession`] ties both to a live position.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod models;
