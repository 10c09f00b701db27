//! Line-oriented front end: reads commands, drives the game session and
//! prints what changed.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use shakmaty::Square;

use crate::config::AppConfig;
use crate::domain::PieceColor;
use crate::domain::chess::board_diagram;
use crate::error::GameError;
use crate::models::engine::EngineSession;
use crate::models::game::{GameSession, GameStatus};
use crate::models::navigator::{BoardUpdate, MoveOutcome};

const HELP: &str = "\
commands:
  <move>        play a move, e.g. e2e4, e7e8q, Nf3, O-O
  back          step back one move
  forward       step forward along the current line
  down          enter the variation branching here
  up            leave the current variation
  start | end   jump to the start or end of the current line
  board         show the board
  moves         show the game notation
  legal <sq>    list moves for the piece on a square
  analyse       ask the engine about the current position
  load <file>   read a PGN file
  save <file>   write the game as PGN
  new           start a new game
  quit";

/// A single front-end command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A move in coordinate notation or SAN
    Move(String),
    Back,
    Forward,
    Down,
    Up,
    Start,
    End,
    Board,
    Moves,
    Legal(Square),
    Analyse,
    Load(PathBuf),
    Save(PathBuf),
    New,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (word, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
        let rest = rest.trim();

        let needs_no_argument = |cmd: Command| {
            if rest.is_empty() {
                Ok(cmd)
            } else {
                Err(anyhow!("`{word}` takes no argument"))
            }
        };

        match word {
            "" => bail!("empty command"),
            "back" | "b" => needs_no_argument(Command::Back),
            "forward" | "f" => needs_no_argument(Command::Forward),
            "down" => needs_no_argument(Command::Down),
            "up" => needs_no_argument(Command::Up),
            "start" => needs_no_argument(Command::Start),
            "end" => needs_no_argument(Command::End),
            "board" => needs_no_argument(Command::Board),
            "moves" => needs_no_argument(Command::Moves),
            "analyse" | "analyze" => needs_no_argument(Command::Analyse),
            "new" => needs_no_argument(Command::New),
            "help" | "?" => needs_no_argument(Command::Help),
            "quit" | "exit" => needs_no_argument(Command::Quit),
            "legal" => {
                let square = rest
                    .parse::<Square>()
                    .map_err(|_| anyhow!("`legal` needs a square such as e2, got `{rest}`"))?;
                Ok(Command::Legal(square))
            }
            "load" | "save" if rest.is_empty() => bail!("`{word}` needs a file name"),
            "load" => Ok(Command::Load(PathBuf::from(rest))),
            "save" => Ok(Command::Save(PathBuf::from(rest))),
            mv if rest.is_empty() => Ok(Command::Move(mv.to_string())),
            _ => bail!("unknown command `{s}`, try `help`"),
        }
    }
}

/// Front-end state: the game plus an engine started on first use
pub struct App {
    config: AppConfig,
    session: GameSession,
    engine: Option<EngineSession>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let session = fresh_session(&config)?;
        Ok(Self::with_session(config, session))
    }

    pub fn with_session(config: AppConfig, session: GameSession) -> Self {
        Self {
            config,
            session,
            engine: None,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// The engine, once an analysis has started it
    pub fn engine(&self) -> Option<&EngineSession> {
        self.engine.as_ref()
    }

    /// Run one command. Returns `false` once the user asks to quit.
    /// Rejected moves and unreadable files are reported, not returned.
    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<bool> {
        match command {
            Command::Move(text) => match self.session.play_text(&text) {
                Ok(outcome) => {
                    match outcome {
                        MoveOutcome::Appended | MoveOutcome::Replayed => {}
                        MoveOutcome::EnteredVariation(_) => writeln!(out, "(following variation)")?,
                        MoveOutcome::Branched(_) => writeln!(out, "(new variation)")?,
                    }
                    self.print_status(out)?;
                }
                Err(e) => writeln!(out, "error: {e}")?,
            },
            Command::Back => {
                let update = self.session.go_back();
                self.report_navigation(update, "already at the start", out)?;
            }
            Command::Forward => {
                let update = self.session.go_forward();
                self.report_navigation(update, "no further moves in this line", out)?;
            }
            Command::Down => {
                let update = self.session.enter_variation();
                self.report_navigation(update, "no variation here", out)?;
            }
            Command::Up => {
                let update = self.session.exit_variation();
                self.report_navigation(update, "already on the main line", out)?;
            }
            Command::Start => {
                let update = self.session.go_to_line_start();
                self.report_navigation(update, "already at the start", out)?;
            }
            Command::End => {
                let update = self.session.go_to_line_end();
                self.report_navigation(update, "already at the end", out)?;
            }
            Command::Board => writeln!(out, "{}", board_diagram(self.session.position()))?,
            Command::Moves => writeln!(out, "{}", self.session.notation())?,
            Command::Legal(square) => {
                let targets: Vec<String> = self
                    .session
                    .legal_destinations(square)
                    .iter()
                    .map(Square::to_string)
                    .collect();
                if targets.is_empty() {
                    writeln!(out, "no legal moves from {square}")?;
                } else {
                    writeln!(out, "{square}: {}", targets.join(" "))?;
                }
            }
            Command::Analyse => self.analyse(out)?,
            Command::Load(path) => match load_pgn(&path) {
                Ok(session) => {
                    self.replace_session(session);
                    writeln!(out, "loaded {}", path.display())?;
                    self.print_status(out)?;
                }
                Err(e) => writeln!(out, "error: {e:#}")?,
            },
            Command::Save(path) => match std::fs::write(&path, self.session.to_pgn()) {
                Ok(()) => writeln!(out, "saved {}", path.display())?,
                Err(e) => writeln!(out, "error: cannot write {}: {e}", path.display())?,
            },
            Command::New => {
                let session = fresh_session(&self.config)?;
                self.replace_session(session);
                self.print_status(out)?;
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Swap in another game; a running engine is told to forget the old one
    fn replace_session(&mut self, session: GameSession) {
        self.session = session;
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.new_game() {
                log::warn!("engine did not accept a new game: {e:#}");
                self.engine = None;
            }
        }
    }

    fn report_navigation(
        &mut self,
        update: Result<BoardUpdate, GameError>,
        nothing_to_do: &str,
        out: &mut impl Write,
    ) -> Result<()> {
        match update {
            Ok(BoardUpdate::Unchanged) => writeln!(out, "{nothing_to_do}")?,
            Ok(_) => self.print_status(out)?,
            Err(e) => writeln!(out, "error: {e}")?,
        }
        Ok(())
    }

    fn print_status(&self, out: &mut impl Write) -> Result<()> {
        let side = match self.session.current_turn() {
            PieceColor::White => "White",
            PieceColor::Black => "Black",
        };
        let status = match self.session.status() {
            GameStatus::Ongoing => format!("{side} to move"),
            GameStatus::Check => format!("{side} to move, check"),
            GameStatus::Checkmate => format!("checkmate, {side} is mated"),
            GameStatus::Stalemate => "stalemate".to_string(),
            GameStatus::InsufficientMaterial => "draw by insufficient material".to_string(),
        };
        let depth = self.session.navigator().depth();
        if depth > 0 {
            writeln!(out, "{status} (variation depth {depth})")?;
        } else {
            writeln!(out, "{status}")?;
        }
        Ok(())
    }

    fn analyse(&mut self, out: &mut impl Write) -> Result<()> {
        if self.session.status() == GameStatus::Checkmate {
            writeln!(out, "the game is over")?;
            return Ok(());
        }
        if self.engine.is_none() {
            match EngineSession::start(&self.config.engine) {
                Ok(engine) => self.engine = Some(engine),
                Err(e) => {
                    writeln!(out, "error: {e:#}")?;
                    return Ok(());
                }
            }
        }
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };

        match engine.analyse(self.session.uci_position(), self.session.position()) {
            Ok(lines) => {
                let shown: Vec<_> = lines
                    .iter()
                    .filter(|line| line.is_worth_showing())
                    .take(self.config.engine.multipv as usize)
                    .collect();
                if shown.is_empty() {
                    writeln!(out, "no lines to show")?;
                }
                for line in shown {
                    writeln!(out, "{line}")?;
                }
            }
            Err(e) => {
                log::warn!("analysis failed: {e:#}");
                writeln!(out, "error: {e:#}")?;
                self.engine = None;
            }
        }
        Ok(())
    }
}

fn fresh_session(config: &AppConfig) -> Result<GameSession, GameError> {
    match &config.start_fen {
        Some(fen) => GameSession::from_fen(fen),
        None => Ok(GameSession::new()),
    }
}

fn load_pgn(path: &std::path::Path) -> Result<GameSession> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(GameSession::from_pgn(&text)?)
}

/// Read commands from `input` until it ends or the user quits
pub fn run(app: &mut App, input: impl BufRead, mut out: impl Write) -> Result<()> {
    writeln!(out, "type `help` for commands")?;
    for line in input.lines() {
        let line = line.context("failed to read command")?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };
        log::debug!("command {command:?}");
        if !app.execute(command, &mut out)? {
            break;
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_script(script: &str) -> (App, String) {
        let mut app = App::new(AppConfig::default()).unwrap();
        let mut out = Vec::new();
        run(&mut app, script.as_bytes(), &mut out).unwrap();
        (app, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("back".parse::<Command>().unwrap(), Command::Back);
        assert_eq!(" down ".parse::<Command>().unwrap(), Command::Down);
        assert_eq!("e2e4".parse::<Command>().unwrap(), Command::Move("e2e4".to_string()));
        assert_eq!("Nf3".parse::<Command>().unwrap(), Command::Move("Nf3".to_string()));
        assert_eq!(
            "legal g1".parse::<Command>().unwrap(),
            Command::Legal(Square::G1)
        );
        assert_eq!(
            "save games/my game.pgn".parse::<Command>().unwrap(),
            Command::Save(PathBuf::from("games/my game.pgn"))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("legal z9".parse::<Command>().is_err());
        assert!("load".parse::<Command>().is_err());
        assert!("back twice".parse::<Command>().is_err());
        assert!("e2 e4".parse::<Command>().is_err());
    }

    #[test]
    fn test_script_builds_variation() {
        let (app, out) = run_script("e4\ne5\nback\nc5\nmoves\nquit\nNf3\n");
        assert!(out.contains("(new variation)"));
        assert!(out.contains("1. e4 (1...c5) e5"));
        assert_eq!(app.session().notation(), "1. e4 (1...c5) e5");
    }

    #[test]
    fn test_script_reports_errors_and_keeps_going() {
        let (app, out) = run_script("e2e5\nlegal e2\nfly\nback\n");
        assert!(out.contains("error:"));
        assert!(out.contains("e2: e3 e4"));
        assert!(out.contains("already at the start"));
        assert_eq!(app.session().notation(), "");
    }

    #[test]
    fn test_script_mate_status() {
        let (_, out) = run_script("f3\ne5\ng4\nQh4\nanalyse\n");
        assert!(out.contains("checkmate, White is mated"));
        assert!(out.contains("the game is over"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!("chess-variations-{}.pgn", std::process::id()));
        let script = format!(
            "d4\nd5\nback\nNf6\nsave {0}\nnew\nload {0}\nmoves\n",
            path.display()
        );
        let (app, out) = run_script(&script);
        let _ = std::fs::remove_file(&path);
        assert!(out.contains("saved"));
        assert!(out.contains("loaded"));
        // only the main line survives import
        assert_eq!(app.session().notation(), "1. d4 d5");
    }

    #[cfg(unix)]
    #[test]
    fn test_new_game_resets_running_engine() {
        let script = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    ucinewgame) echo "info string new game" ;;
    go*)
      echo "info depth 4 score cp 20 pv e7e5 g1f3 b8c6"
      echo "bestmove e7e5" ;;
    quit) exit 0 ;;
  esac
done
"#;
        let mut config = AppConfig::default();
        config.engine.path = PathBuf::from("sh");
        config.engine.args = vec!["-c".to_string(), script.to_string()];
        let mut app = App::new(config).unwrap();
        let mut out = Vec::new();
        run(&mut app, "e4\nanalyse\nnew\n".as_bytes(), &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("-0.20  1...e5 2. Nf3 Nc6"));
        let engine = app.engine().unwrap();
        assert!(engine.output_lines().iter().any(|l| l == "info string new game"));
        assert_eq!(app.session().notation(), "");
    }
}
