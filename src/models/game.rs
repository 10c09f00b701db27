//! Game state model - the application layer for chess game state.
//!
//! `GameSession` keeps a live board in step with a [`GameNavigator`]: moves
//! are validated and applied here (through shakmaty) before the navigator
//! records them, and navigation results are turned back into board changes.

use std::collections::BTreeMap;

use shakmaty::san::SanPlus;
use shakmaty::{Chess, Position, Square};

use crate::domain::pgn::{PgnGame, parse_pgn, write_pgn};
use crate::domain::uci::UciCommand;
use crate::domain::{ChessMove, MoveNodeId, MoveTree, PieceColor, position_from_fen};
use crate::domain::chess::side_to_move;
use crate::error::GameError;
use crate::models::navigator::{BoardUpdate, GameNavigator, MoveOutcome};

/// Check/mate state of the live board
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate,
    Stalemate,
    InsufficientMaterial,
}

/// The main game model: navigator plus the live board it describes
pub struct GameSession {
    navigator: GameNavigator,
    /// Position shown to the player
    board: Chess,
    /// Starting position as FEN, `None` for the standard start
    start_fen: Option<String>,
    headers: BTreeMap<String, String>,
}

impl GameSession {
    pub fn new() -> Self {
        Self::with_start(Chess::default(), None)
    }

    /// Start a session from a FEN position
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let start = position_from_fen(fen)?;
        Ok(Self::with_start(start, Some(fen.trim().to_string())))
    }

    fn with_start(start: Chess, start_fen: Option<String>) -> Self {
        Self {
            navigator: GameNavigator::new(start.clone()),
            board: start,
            start_fen,
            headers: BTreeMap::new(),
        }
    }

    /// Replace this session with a game read from PGN text. The moves are
    /// fed through the same path as moves played by hand.
    pub fn from_pgn(text: &str) -> Result<Self, GameError> {
        let game = parse_pgn(text)?;
        let mut session = match game.start_fen() {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        session.replay_pgn(&game)?;
        Ok(session)
    }

    fn replay_pgn(&mut self, game: &PgnGame) -> Result<(), GameError> {
        for (ply, san) in game.moves.iter().enumerate() {
            self.play_san(san)
                .map_err(|e| GameError::Pgn(format!("ply {}: {e}", ply + 1)))?;
        }
        self.headers = game.headers.clone();
        log::info!("imported {} plies", game.moves.len());
        Ok(())
    }

    pub fn navigator(&self) -> &GameNavigator {
        &self.navigator
    }

    pub fn tree(&self) -> &MoveTree {
        self.navigator.tree()
    }

    /// Get the currently viewed position
    pub fn position(&self) -> &Chess {
        &self.board
    }

    pub fn current_line(&self) -> MoveNodeId {
        self.navigator.current_id()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        self.headers.insert(key.to_string(), value.to_string());
    }

    pub fn current_turn(&self) -> PieceColor {
        side_to_move(&self.board)
    }

    pub fn status(&self) -> GameStatus {
        if self.board.is_checkmate() {
            GameStatus::Checkmate
        } else if self.board.is_stalemate() {
            GameStatus::Stalemate
        } else if self.board.is_check() {
            GameStatus::Check
        } else if self.board.is_insufficient_material() {
            GameStatus::InsufficientMaterial
        } else {
            GameStatus::Ongoing
        }
    }

    /// Target squares for the piece standing on `from`
    pub fn legal_destinations(&self, from: Square) -> Vec<Square> {
        let mut targets: Vec<Square> = self
            .board
            .legal_moves()
            .iter()
            .filter_map(ChessMove::from_move)
            .filter(|m| m.from == from)
            .map(|m| m.to)
            .collect();
        targets.sort_by_key(|sq| u32::from(*sq));
        targets.dedup();
        targets
    }

    /// Try to play a move on the live board and record it
    pub fn try_move(&mut self, mv: ChessMove) -> Result<MoveOutcome, GameError> {
        let legal = mv
            .to_legal(&self.board)
            .ok_or_else(|| GameError::IllegalMove(mv.to_string()))?;
        // record the promotion actually chosen
        let played = ChessMove::from_move(&legal).unwrap_or(mv);

        let pre_move = self.board.clone();
        self.board = pre_move
            .clone()
            .play(legal)
            .map_err(|_| GameError::IllegalMove(mv.to_string()))?;

        let outcome = self.navigator.move_played(played, &pre_move);
        log::debug!("played {played}: {outcome:?}");
        Ok(outcome)
    }

    /// Play a move given in coordinate notation (`e2e4`) or SAN (`Nf3`)
    pub fn play_text(&mut self, text: &str) -> Result<MoveOutcome, GameError> {
        match text.parse::<ChessMove>() {
            Ok(mv) => self.try_move(mv),
            Err(_) => self.play_san(text),
        }
    }

    pub fn play_san(&mut self, san: &str) -> Result<MoveOutcome, GameError> {
        let parsed: SanPlus = san
            .parse()
            .map_err(|_| GameError::InvalidMove(san.to_string()))?;
        let legal = parsed
            .san
            .to_move(&self.board)
            .map_err(|_| GameError::IllegalMove(san.to_string()))?;
        let mv = ChessMove::from_move(&legal)
            .ok_or_else(|| GameError::IllegalMove(san.to_string()))?;
        self.try_move(mv)
    }

    pub fn go_back(&mut self) -> Result<BoardUpdate, GameError> {
        let update = self.navigator.step_backward();
        self.apply_update(update)
    }

    pub fn go_forward(&mut self) -> Result<BoardUpdate, GameError> {
        let update = self.navigator.step_forward();
        self.apply_update(update)
    }

    pub fn enter_variation(&mut self) -> Result<BoardUpdate, GameError> {
        let update = self.navigator.enter_variation();
        self.apply_update(update)
    }

    pub fn exit_variation(&mut self) -> Result<BoardUpdate, GameError> {
        let update = self.navigator.exit_variation();
        self.apply_update(update)
    }

    pub fn go_to_line_start(&mut self) -> Result<BoardUpdate, GameError> {
        let update = self.navigator.jump_to_line_start();
        self.apply_update(update)
    }

    pub fn go_to_line_end(&mut self) -> Result<BoardUpdate, GameError> {
        let update = self.navigator.jump_to_line_end();
        self.apply_update(update)
    }

    /// Bring the live board in line with a navigation result. Shakmaty has
    /// no undo, so retractions rebuild the position from the line's anchor.
    fn apply_update(&mut self, update: BoardUpdate) -> Result<BoardUpdate, GameError> {
        match update {
            BoardUpdate::Apply(mv) => {
                let legal = mv
                    .to_legal(&self.board)
                    .ok_or_else(|| GameError::IllegalMove(mv.to_string()))?;
                self.board = self
                    .board
                    .clone()
                    .play(legal)
                    .map_err(|_| GameError::IllegalMove(mv.to_string()))?;
            }
            BoardUpdate::Retract(_) | BoardUpdate::Resync => {
                self.board = self.navigator.position()?;
            }
            BoardUpdate::Unchanged => {}
        }
        Ok(update)
    }

    /// Notation for the whole game, variations included
    pub fn notation(&self) -> String {
        self.navigator.notation()
    }

    /// `position` command for an analysis engine at the viewed position
    pub fn uci_position(&self) -> UciCommand {
        UciCommand::Position {
            fen: self.start_fen.clone(),
            moves: self
                .navigator
                .path_moves()
                .iter()
                .map(ChessMove::to_string)
                .collect(),
        }
    }

    /// Result decided by the end of the main line
    fn result_token(&self) -> &'static str {
        let root = self.navigator.tree().root();
        match root.position_after(root.len()) {
            Ok(pos) if pos.is_checkmate() => match side_to_move(&pos) {
                PieceColor::White => "0-1",
                PieceColor::Black => "1-0",
            },
            Ok(pos) if pos.is_stalemate() || pos.is_insufficient_material() => "1/2-1/2",
            _ => "*",
        }
    }

    /// Export the game, variations included, as PGN
    pub fn to_pgn(&self) -> String {
        let result = self.result_token();
        let mut headers = self.headers.clone();
        for (key, value) in [
            ("Event", "?"),
            ("Site", "?"),
            ("Date", "????.??.??"),
            ("Round", "?"),
            ("White", "?"),
            ("Black", "?"),
        ] {
            headers.entry(key.to_string()).or_insert_with(|| value.to_string());
        }
        headers.insert("Result".to_string(), result.to_string());
        if let Some(fen) = &self.start_fen {
            headers.insert("SetUp".to_string(), "1".to_string());
            headers.insert("FEN".to_string(), fen.clone());
        }
        let movetext = self.navigator.tree().pgn_movetext(MoveTree::ROOT);
        write_pgn(&headers, &movetext, result)
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> ChessMove {
        s.parse().unwrap()
    }

    fn session_with(moves: &[&str]) -> GameSession {
        let mut session = GameSession::new();
        for m in moves {
            session.play_text(m).unwrap();
        }
        session
    }

    #[test]
    fn test_try_move_updates_board() {
        let mut session = GameSession::new();
        assert_eq!(session.try_move(mv("e2e4")).unwrap(), MoveOutcome::Appended);
        assert!(session.position().board().piece_at(Square::E4).is_some());
        assert_eq!(session.current_turn(), PieceColor::Black);
    }

    #[test]
    fn test_illegal_move_is_rejected() {
        let mut session = GameSession::new();
        assert!(matches!(
            session.try_move(mv("e2e5")),
            Err(GameError::IllegalMove(_))
        ));
        assert!(matches!(
            session.play_text("Qxh7"),
            Err(GameError::IllegalMove(_))
        ));
        assert!(matches!(
            session.play_text("xyz"),
            Err(GameError::InvalidMove(_))
        ));
        assert!(session.tree().is_empty());
    }

    #[test]
    fn test_san_and_coordinates_mix() {
        let session = session_with(&["e4", "e7e5", "Nf3", "Nc6"]);
        assert_eq!(session.notation(), "1. e4 e5 2. Nf3 Nc6");
    }

    #[test]
    fn test_navigation_keeps_board_in_step() {
        let mut session = session_with(&["e4", "e5", "Nf3"]);

        assert_eq!(session.go_back().unwrap(), BoardUpdate::Retract(mv("g1f3")));
        assert!(session.position().board().piece_at(Square::G1).is_some());
        assert_eq!(session.go_forward().unwrap(), BoardUpdate::Apply(mv("g1f3")));
        assert!(session.position().board().piece_at(Square::F3).is_some());

        session.go_to_line_start().unwrap();
        assert_eq!(session.position().board(), Chess::default().board());
        session.go_to_line_end().unwrap();
        assert_eq!(session.position().fullmoves().get(), 2);
    }

    #[test]
    fn test_variation_round_trip() {
        let mut session = session_with(&["e4", "e5", "Nf3"]);
        session.go_back().unwrap();
        session.go_back().unwrap();
        assert!(matches!(
            session.play_text("c5").unwrap(),
            MoveOutcome::Branched(_)
        ));
        session.play_text("Nf3").unwrap();
        assert_eq!(session.notation(), "1. e4 (1...c5 2. Nf3) e5 2. Nf3");

        session.go_back().unwrap();
        session.go_back().unwrap();
        assert_eq!(session.go_back().unwrap(), BoardUpdate::Resync);
        assert_eq!(session.current_line(), MoveTree::ROOT);
        assert!(session.position().board().piece_at(Square::C7).is_some());
        assert!(session.position().board().piece_at(Square::E4).is_some());

        assert_eq!(session.go_forward().unwrap(), BoardUpdate::Apply(mv("e7e5")));
        assert!(session.position().board().piece_at(Square::E5).is_some());
    }

    #[test]
    fn test_status() {
        let mut session = session_with(&["f3", "e5", "g4"]);
        assert_eq!(session.status(), GameStatus::Ongoing);
        session.play_text("Qh4#").unwrap();
        assert_eq!(session.status(), GameStatus::Checkmate);

        let check = GameSession::from_fen("4k3/8/8/8/8/8/8/R3K3 b - - 0 1");
        assert_eq!(check.unwrap().status(), GameStatus::Ongoing);
        let bare = GameSession::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(bare.status(), GameStatus::InsufficientMaterial);
        let stalemate = GameSession::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(stalemate.status(), GameStatus::Stalemate);
    }

    #[test]
    fn test_legal_destinations() {
        let session = GameSession::new();
        assert_eq!(session.legal_destinations(Square::E2), vec![Square::E3, Square::E4]);
        assert_eq!(session.legal_destinations(Square::G1), vec![Square::F3, Square::H3]);
        assert!(session.legal_destinations(Square::E4).is_empty());
    }

    #[test]
    fn test_promotion_recorded_as_queen() {
        let mut session = GameSession::from_fen("7k/P7/8/8/8/8/8/K7 w - - 0 1").unwrap();
        session.try_move(mv("a7a8")).unwrap();
        assert_eq!(session.tree().root().main_line(), &[mv("a7a8q")]);
        assert_eq!(session.notation(), "1. a8=Q+");
    }

    #[test]
    fn test_uci_position_follows_variation_path() {
        let mut session = session_with(&["e4", "e5", "Nf3"]);
        session.go_back().unwrap();
        session.play_text("f4").unwrap();
        assert_eq!(
            session.uci_position(),
            UciCommand::Position {
                fen: None,
                moves: vec!["e2e4".to_string(), "e7e5".to_string(), "f2f4".to_string()],
            }
        );

        let fen = "4k3/8/8/8/8/8/8/4K2R w K - 0 1";
        let mut from_fen = GameSession::from_fen(fen).unwrap();
        from_fen.play_text("O-O").unwrap();
        assert_eq!(
            from_fen.uci_position().to_string(),
            format!("position fen {fen} moves e1g1")
        );
    }

    #[test]
    fn test_pgn_import() {
        let pgn = "[White \"Alice\"]\n[Black \"Bob\"]\n\n1. e4 e5 2. Nf3 (2. f4) Nc6 3. Bb5 *\n";
        let session = GameSession::from_pgn(pgn).unwrap();
        assert_eq!(session.notation(), "1. e4 e5 2. Nf3 Nc6 3. Bb5");
        assert_eq!(session.headers().get("White").map(String::as_str), Some("Alice"));
        assert_eq!(session.tree().len(), 1);

        let bad = GameSession::from_pgn("1. e4 e4 *");
        assert!(matches!(bad, Err(GameError::Pgn(_))));
    }

    #[test]
    fn test_pgn_export_with_variations() {
        let mut session = session_with(&["f3", "e5", "g4"]);
        session.go_back().unwrap();
        session.play_text("d4").unwrap();
        session.go_back().unwrap();
        session.go_back().unwrap();
        session.go_forward().unwrap();
        session.play_text("Qh4#").unwrap();
        session.set_header("Event", "Blunders");

        let pgn = session.to_pgn();
        assert!(pgn.contains("[Event \"Blunders\"]\n"));
        assert!(pgn.contains("[Result \"0-1\"]\n"));
        assert!(pgn.ends_with("\n1. f3 e5 2. g4 (2. d4) 2...Qh4# 0-1\n"));

        let reimported = GameSession::from_pgn(&pgn).unwrap();
        assert_eq!(reimported.status(), GameStatus::Checkmate);
    }
}
