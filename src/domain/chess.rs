//! Pure chess domain types and utilities.
//! Legality and move application are delegated to shakmaty.

use std::fmt;
use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color as SColor, File, Move, Position, Rank, Role, Square};

use crate::error::GameError;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceKind {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceColor {
    White,
    Black,
}

#[derive(Clone, Copy, Debug)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: PieceColor,
}

impl Piece {
    /// FEN-style letter: uppercase for white, lowercase for black
    pub fn symbol(&self) -> char {
        let c = match self.kind {
            PieceKind::Pawn => 'p',
            PieceKind::Rook => 'r',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match self.color {
            PieceColor::White => c.to_ascii_uppercase(),
            PieceColor::Black => c,
        }
    }
}

/// Convert shakmaty piece to our domain Piece
pub fn shakmaty_to_piece(piece: shakmaty::Piece) -> Piece {
    let kind = match piece.role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    };
    let color = match piece.color {
        SColor::White => PieceColor::White,
        SColor::Black => PieceColor::Black,
    };
    Piece { kind, color }
}

pub fn side_to_move(position: &Chess) -> PieceColor {
    match position.turn() {
        SColor::White => PieceColor::White,
        SColor::Black => PieceColor::Black,
    }
}

/// A move as the player expressed it: origin, destination and an optional
/// promotion piece. Two moves are equal when all three parts match.
///
/// Castling is written as the king's own step (`e1g1`), the way a player
/// drags the king on the board.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChessMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl ChessMove {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(from: Square, to: Square, promotion: Role) -> Self {
        Self {
            from,
            to,
            promotion: Some(promotion),
        }
    }

    /// Describe a shakmaty move. Drops (`Move::Put`) have no origin square
    /// and are not representable.
    pub fn from_move(m: &Move) -> Option<Self> {
        match m {
            Move::Normal {
                from,
                to,
                promotion,
                ..
            } => Some(Self {
                from: *from,
                to: *to,
                promotion: *promotion,
            }),
            Move::EnPassant { from, to } => Some(Self::new(*from, *to)),
            Move::Castle { king, rook } => {
                let king_dest = if rook.file() == File::H {
                    Square::from_coords(File::G, rook.rank())
                } else {
                    Square::from_coords(File::C, rook.rank())
                };
                Some(Self::new(*king, king_dest))
            }
            Move::Put { .. } => None,
        }
    }

    /// Find the legal move in `position` this describes.
    ///
    /// An unspecified promotion matches the queen promotion only.
    pub fn to_legal(&self, position: &Chess) -> Option<Move> {
        position.legal_moves().into_iter().find(|m| {
            let Some(candidate) = ChessMove::from_move(m) else {
                return false;
            };
            if candidate.from != self.from || candidate.to != self.to {
                return false;
            }
            match (candidate.promotion, self.promotion) {
                (None, None) => true,
                (Some(role), None) => role == Role::Queen,
                (Some(role), Some(wanted)) => role == wanted,
                (None, Some(_)) => false,
            }
        })
    }
}

fn role_char(role: Role) -> char {
    match role {
        Role::Pawn => 'p',
        Role::Knight => 'n',
        Role::Bishop => 'b',
        Role::Rook => 'r',
        Role::Queen => 'q',
        Role::King => 'k',
    }
}

fn char_role(c: char) -> Option<Role> {
    match c.to_ascii_lowercase() {
        'n' => Some(Role::Knight),
        'b' => Some(Role::Bishop),
        'r' => Some(Role::Rook),
        'q' => Some(Role::Queen),
        _ => None,
    }
}

impl fmt::Display for ChessMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role_char(role))?;
        }
        Ok(())
    }
}

impl FromStr for ChessMove {
    type Err = GameError;

    /// Parse coordinate notation: `e2e4`, `e7e8q`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GameError::InvalidMove(s.to_string());
        let s = s.trim();
        if !s.is_ascii() || !(s.len() == 4 || s.len() == 5) {
            return Err(invalid());
        }
        let from: Square = s[0..2].parse().map_err(|_| invalid())?;
        let to: Square = s[2..4].parse().map_err(|_| invalid())?;
        let promotion = match s[4..].chars().next() {
            Some(c) => Some(char_role(c).ok_or_else(invalid)?),
            None => None,
        };
        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

/// Build a position from FEN text
pub fn position_from_fen(fen: &str) -> Result<Chess, GameError> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| GameError::InvalidFen(format!("{fen}: {e}")))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| GameError::InvalidFen(format!("{fen}: {e}")))
}

/// Render the board as an 8x8 grid, rank 8 at the top
pub fn board_diagram(position: &Chess) -> String {
    let mut out = String::new();
    for row in 0..8u32 {
        let rank = Rank::new(7 - row);
        out.push_str(&format!("{} ", 8 - row));
        for col in 0..8u32 {
            let sq = Square::from_coords(File::new(col), rank);
            let c = position
                .board()
                .piece_at(sq)
                .map(|p| shakmaty_to_piece(p).symbol())
                .unwrap_or('.');
            out.push(c);
            if col < 7 {
                out.push(' ');
            }
        }
        out.push('\n');
    }
    out.push_str("  a b c d e f g h");
    out
}
