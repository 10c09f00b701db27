//! Pure chess domain: moves, the variation tree, notation and protocol text.
//! Nothing here performs I/O.

pub mod chess;
pub mod move_tree;
pub mod notation;
pub mod pgn;
pub mod uci;

pub use chess::{ChessMove, Piece, PieceColor, PieceKind, position_from_fen, shakmaty_to_piece};
pub use move_tree::{BranchPoint, MoveNode, MoveNodeId, MoveTree};
