//! UCI (Universal Chess Interface) protocol types and utilities.
//!
//! Commands we send to an analysis engine, classification of the lines it
//! answers with, and parsing of `info` lines. Process handling lives in
//! `models::engine`.

use std::fmt;
use std::str::{FromStr, SplitWhitespace};

/// UCI commands that can be sent to an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    SetOption { name: String, value: String },
    /// Set position (startpos or FEN, with optional moves)
    Position { fen: Option<String>, moves: Vec<String> },
    GoMoveTime(u64),
    GoDepth(u32),
    Quit,
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::UciNewGame => f.write_str("ucinewgame"),
            UciCommand::SetOption { name, value } => {
                write!(f, "setoption name {name} value {value}")
            }
            UciCommand::Position { fen, moves } => {
                match fen {
                    Some(fen) => write!(f, "position fen {fen}")?,
                    None => f.write_str("position startpos")?,
                }
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            UciCommand::GoMoveTime(ms) => write!(f, "go movetime {ms}"),
            UciCommand::GoDepth(depth) => write!(f, "go depth {depth}"),
            UciCommand::Quit => f.write_str("quit"),
        }
    }
}

/// A line received from the engine, by its leading keyword
#[derive(Debug, Clone, PartialEq)]
pub enum UciOutput {
    UciOk,
    ReadyOk,
    /// Engine identification, e.g. `name Stockfish 16`
    Id(String),
    Option(String),
    Info(UciInfo),
    BestMove {
        best: String,
        ponder: Option<String>,
    },
    Other(String),
}

impl UciOutput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
        match keyword {
            "uciok" => UciOutput::UciOk,
            "readyok" => UciOutput::ReadyOk,
            "id" => UciOutput::Id(rest.to_string()),
            "option" => UciOutput::Option(rest.to_string()),
            "info" => UciOutput::Info(rest.parse().unwrap_or_default()),
            "bestmove" => {
                let mut words = rest.split_whitespace();
                let best = words.next().unwrap_or("(none)").to_string();
                let ponder = match words.next() {
                    Some("ponder") => words.next().map(str::to_string),
                    _ => None,
                };
                UciOutput::BestMove { best, ponder }
            }
            _ => UciOutput::Other(line.to_string()),
        }
    }
}

/// Engine evaluation from White's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves (positive = white mates)
    Mate(i32),
}

impl Score {
    /// Engines report scores for the side to move; flip for Black
    pub fn for_white(self, black_to_move: bool) -> Self {
        if !black_to_move {
            return self;
        }
        match self {
            Score::Centipawns(cp) => Score::Centipawns(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }

    pub fn is_mate(&self) -> bool {
        matches!(self, Score::Mate(_))
    }
}

impl fmt::Display for Score {
    /// `+0.35`, `-1.20`, `M3`, `-M2`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", cp as f64 / 100.0),
            Score::Mate(n) if n >= 0 => write!(f, "M{n}"),
            Score::Mate(n) => write!(f, "-M{}", n.unsigned_abs()),
        }
    }
}

/// Parsed `info` line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UciInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    /// Multi-PV line number (1-indexed)
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time: Option<u64>,
    /// Principal variation in coordinate notation
    pub pv: Vec<String>,
    pub string: Option<String>,
}

const INFO_KEYWORDS: [&str; 14] = [
    "depth",
    "seldepth",
    "multipv",
    "score",
    "nodes",
    "nps",
    "time",
    "hashfull",
    "tbhits",
    "currmove",
    "currmovenumber",
    "string",
    "refutation",
    "currline",
];

fn next_number<T: FromStr>(words: &mut SplitWhitespace<'_>) -> Option<T> {
    words.next().and_then(|w| w.parse().ok())
}

impl FromStr for UciInfo {
    type Err = std::convert::Infallible;

    /// Parse the part after `info `. Unknown or malformed fields are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut info = UciInfo::default();
        let mut words = s.split_whitespace();
        let mut pending = words.next();

        while let Some(word) = pending.take() {
            match word {
                "depth" => info.depth = next_number(&mut words),
                "seldepth" => info.seldepth = next_number(&mut words),
                "multipv" => info.multipv = next_number(&mut words),
                "nodes" => info.nodes = next_number(&mut words),
                "nps" => info.nps = next_number(&mut words),
                "time" => info.time = next_number(&mut words),
                "score" => {
                    let kind = words.next();
                    let value = next_number(&mut words);
                    info.score = match (kind, value) {
                        (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                        (Some("mate"), Some(n)) => Some(Score::Mate(n)),
                        _ => info.score,
                    };
                }
                "string" => {
                    let rest: Vec<&str> = words.by_ref().collect();
                    info.string = Some(rest.join(" "));
                }
                "pv" => {
                    for mv in words.by_ref() {
                        if INFO_KEYWORDS.contains(&mv) {
                            pending = Some(mv);
                            break;
                        }
                        info.pv.push(mv.to_string());
                    }
                    continue;
                }
                _ => {}
            }
            pending = words.next();
        }
        Ok(info)
    }
}

impl UciInfo {
    /// Whether this line carries a usable evaluation (depth + score + pv)
    pub fn has_analysis(&self) -> bool {
        self.depth.is_some() && self.score.is_some() && !self.pv.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_commands() {
        let start = UciCommand::Position {
            fen: None,
            moves: vec![],
        };
        assert_eq!(start.to_string(), "position startpos");

        let with_moves = UciCommand::Position {
            fen: None,
            moves: vec!["e2e4".to_string(), "e7e5".to_string()],
        };
        assert_eq!(with_moves.to_string(), "position startpos moves e2e4 e7e5");

        let fen = UciCommand::Position {
            fen: Some("4k3/8/8/8/8/8/8/4K3 w - - 0 1".to_string()),
            moves: vec!["e1e2".to_string()],
        };
        assert_eq!(
            fen.to_string(),
            "position fen 4k3/8/8/8/8/8/8/4K3 w - - 0 1 moves e1e2"
        );
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(UciCommand::GoMoveTime(100).to_string(), "go movetime 100");
        assert_eq!(UciCommand::GoDepth(12).to_string(), "go depth 12");
        assert_eq!(UciCommand::UciNewGame.to_string(), "ucinewgame");
        assert_eq!(
            UciCommand::SetOption {
                name: "MultiPV".to_string(),
                value: "3".to_string()
            }
            .to_string(),
            "setoption name MultiPV value 3"
        );
    }

    #[test]
    fn test_classify_output() {
        assert_eq!(UciOutput::parse("uciok"), UciOutput::UciOk);
        assert_eq!(UciOutput::parse("readyok\r"), UciOutput::ReadyOk);
        assert_eq!(
            UciOutput::parse("id name Fakefish"),
            UciOutput::Id("name Fakefish".to_string())
        );
        assert_eq!(
            UciOutput::parse("bestmove e2e4 ponder e7e5"),
            UciOutput::BestMove {
                best: "e2e4".to_string(),
                ponder: Some("e7e5".to_string())
            }
        );
        assert!(matches!(
            UciOutput::parse("Stockfish 16 by the Stockfish developers"),
            UciOutput::Other(_)
        ));
    }

    #[test]
    fn test_parse_real_info_line() {
        let info: UciInfo = "depth 24 seldepth 31 multipv 1 score cp 28 nodes 2847613 nps 2431482 hashfull 457 time 1171 pv e2e4 e7e5 g1f3 b8c6"
            .parse()
            .unwrap();
        assert_eq!(info.depth, Some(24));
        assert_eq!(info.seldepth, Some(31));
        assert_eq!(info.multipv, Some(1));
        assert_eq!(info.score, Some(Score::Centipawns(28)));
        assert_eq!(info.nodes, Some(2847613));
        assert_eq!(info.nps, Some(2431482));
        assert_eq!(info.time, Some(1171));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3", "b8c6"]);
        assert!(info.has_analysis());
    }

    #[test]
    fn test_parse_pv_followed_by_fields() {
        let info: UciInfo = "multipv 2 pv d2d4 d7d5 score mate -3 depth 9".parse().unwrap();
        assert_eq!(info.pv, vec!["d2d4", "d7d5"]);
        assert_eq!(info.score, Some(Score::Mate(-3)));
        assert_eq!(info.depth, Some(9));
    }

    #[test]
    fn test_parse_info_without_analysis() {
        let info: UciInfo = "depth 15 currmove g1f3 currmovenumber 5".parse().unwrap();
        assert!(info.pv.is_empty());
        assert!(!info.has_analysis());

        let info: UciInfo = "string NNUE evaluation enabled".parse().unwrap();
        assert_eq!(info.string.as_deref(), Some("NNUE evaluation enabled"));
    }

    #[test]
    fn test_score_display() {
        assert_eq!(Score::Centipawns(35).to_string(), "+0.35");
        assert_eq!(Score::Centipawns(-125).to_string(), "-1.25");
        assert_eq!(Score::Centipawns(0).to_string(), "+0.00");
        assert_eq!(Score::Mate(3).to_string(), "M3");
        assert_eq!(Score::Mate(-2).to_string(), "-M2");
    }

    #[test]
    fn test_score_perspective() {
        assert_eq!(Score::Centipawns(40).for_white(true), Score::Centipawns(-40));
        assert_eq!(Score::Mate(2).for_white(false), Score::Mate(2));
        assert_eq!(Score::Mate(2).for_white(true), Score::Mate(-2));
        assert!(Score::Mate(-1).is_mate());
        assert!(!Score::Centipawns(900).is_mate());
    }
}
