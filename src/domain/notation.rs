//! Standard algebraic notation for recorded lines.

use shakmaty::san::San;
use shakmaty::{Chess, Color as SColor, Move, Position};

use crate::domain::chess::ChessMove;
use crate::domain::move_tree::{MoveNode, MoveNodeId, MoveTree};

/// SAN for `m` played in `position`, with `+` or `#` appended
pub fn san_plus(position: &Chess, m: &Move) -> String {
    let mut san = San::from_move(position, m.clone()).to_string();
    if let Ok(after) = position.clone().play(m.clone()) {
        if after.is_checkmate() {
            san.push('#');
        } else if after.is_check() {
            san.push('+');
        }
    }
    san
}

/// Move-number token for the move about to be played, if one is due.
/// White moves always get `N.`; a line opening on Black's move gets `N...`.
fn move_number_token(position: &Chess, first_in_line: bool) -> Option<String> {
    let number = position.fullmoves().get();
    match position.turn() {
        SColor::White => Some(format!("{number}.")),
        SColor::Black if first_in_line => Some(format!("{number}...")),
        SColor::Black => None,
    }
}

/// Push a move with its number: `1. e4` as two tokens, `1...e5` as one.
fn push_numbered(tokens: &mut Vec<String>, number: Option<String>, san: String) {
    match number {
        Some(number) if number.ends_with("...") => tokens.push(format!("{number}{san}")),
        Some(number) => {
            tokens.push(number);
            tokens.push(san);
        }
        None => tokens.push(san),
    }
}

/// Play `mv` on `position`, returning its SAN. Moves that no longer fit the
/// position fall back to coordinate notation and leave the board unchanged.
fn play_and_name(position: &mut Chess, mv: ChessMove) -> String {
    let Some(m) = mv.to_legal(position) else {
        log::warn!("recorded move {mv} is not legal in its line, rendering as coordinates");
        return mv.to_string();
    };
    let san = san_plus(position, &m);
    match position.clone().play(m) {
        Ok(next) => *position = next,
        Err(_) => log::warn!("failed to replay {mv}"),
    }
    san
}

impl MoveTree {
    /// Linear notation for the line `id` and every variation below it,
    /// e.g. `1. e4 (1. d4 d5) e5 2. Nf3`.
    ///
    /// Each variation is written in parentheses right after the move at
    /// which it branches. A variation branching before the first move is
    /// written right after the opening move number.
    pub fn render(&self, id: MoveNodeId) -> String {
        match self.get(id) {
            Some(node) => self.render_node(node).join(" "),
            None => String::new(),
        }
    }

    fn render_node(&self, node: &MoveNode) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut position = node.anchor().clone();

        for (i, &mv) in node.main_line().iter().enumerate() {
            let number = move_number_token(&position, i == 0);
            let opening = match i {
                0 => self.render_variation(node.variation_at(None)),
                _ => None,
            };
            let san = play_and_name(&mut position, mv);
            match opening {
                Some(text) => {
                    tokens.extend(number);
                    tokens.push(text);
                    tokens.push(san);
                }
                None => push_numbered(&mut tokens, number, san),
            }
            if let Some(text) = self.render_variation(node.variation_at(Some(i))) {
                tokens.push(text);
            }
        }
        tokens
    }

    fn render_variation(&self, id: Option<MoveNodeId>) -> Option<String> {
        let child = self.get(id?)?;
        Some(format!("({})", self.render_node(child).join(" ")))
    }

    /// Movetext for a PGN export of line `id`.
    ///
    /// Unlike [`MoveTree::render`], each variation follows the main-line
    /// move it replaces, and the move number is repeated after it:
    /// `1. e4 e5 2. Nf3 (2. f4) 2...Nc6`.
    pub fn pgn_movetext(&self, id: MoveNodeId) -> String {
        match self.get(id) {
            Some(node) => self.pgn_node(node).join(" "),
            None => String::new(),
        }
    }

    fn pgn_node(&self, node: &MoveNode) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut position = node.anchor().clone();
        let mut needs_number = true;

        for (i, &mv) in node.main_line().iter().enumerate() {
            let number = move_number_token(&position, needs_number);
            let san = play_and_name(&mut position, mv);
            push_numbered(&mut tokens, number, san);
            needs_number = false;
            // the alternative to move i sits in the slot of the move before it
            if let Some(text) = self.pgn_variation(node.variation_at(i.checked_sub(1))) {
                tokens.push(text);
                needs_number = true;
            }
        }
        // a branch after the last move has nothing to follow
        if let Some(text) = self.pgn_variation(node.variation_at(node.len().checked_sub(1))) {
            tokens.push(text);
        }
        tokens
    }

    fn pgn_variation(&self, id: Option<MoveNodeId>) -> Option<String> {
        let child = self.get(id?)?;
        Some(format!("({})", self.pgn_node(child).join(" ")))
    }
}

/// SAN rendering of an engine principal variation given in coordinate
/// notation. Stops at the first move that does not parse or is illegal.
pub fn pv_to_san(position: &Chess, pv: &[String]) -> String {
    let mut tokens = Vec::new();
    let mut board = position.clone();
    for (i, text) in pv.iter().enumerate() {
        let Ok(mv) = text.parse::<ChessMove>() else {
            break;
        };
        let Some(m) = mv.to_legal(&board) else {
            break;
        };
        let number = move_number_token(&board, i == 0);
        push_numbered(&mut tokens, number, san_plus(&board, &m));
        board = match board.play(m) {
            Ok(next) => next,
            Err(_) => break,
        };
    }
    tokens.join(" ")
}
