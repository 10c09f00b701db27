//! Engine session - manages a UCI engine process and runs analyses.
//!
//! Architecture:
//! - The engine's stdout is read on an OS thread and forwarded over a channel
//! - Commands are written straight to the engine's stdin
//! - Every wait on the channel is bounded by the configured timeout

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use shakmaty::{Chess, Color, Position};

use crate::config::EngineConfig;
use crate::domain::notation::pv_to_san;
use crate::domain::uci::{Score, UciCommand, UciInfo, UciOutput};

/// Maximum number of output lines to keep in history
const MAX_OUTPUT_LINES: usize = 100;

/// Messages sent from the engine reader thread to the session
#[derive(Debug)]
pub enum EngineEvent {
    /// A line of output from the engine
    Output(String),
    /// Engine process closed its stdout
    Exited,
    Error(String),
}

/// One principal variation of a finished analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisLine {
    pub multipv: u32,
    pub depth: u32,
    /// Evaluation from White's point of view
    pub score: Score,
    /// Principal variation in SAN with move numbers
    pub moves: String,
    /// Number of plies the engine reported
    pub plies: usize,
}

impl AnalysisLine {
    /// Build a line from an `info` report about `position`
    pub fn from_info(info: &UciInfo, position: &Chess) -> Option<Self> {
        if !info.has_analysis() {
            return None;
        }
        let black_to_move = position.turn() == Color::Black;
        Some(Self {
            multipv: info.multipv.unwrap_or(1),
            depth: info.depth?,
            score: info.score?.for_white(black_to_move),
            moves: pv_to_san(position, &info.pv),
            plies: info.pv.len(),
        })
    }

    /// Short lines are noise unless they end in mate
    pub fn is_worth_showing(&self) -> bool {
        self.plies > 2 || self.score.is_mate()
    }
}

impl fmt::Display for AnalysisLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}  {}", self.score.to_string(), self.moves)
    }
}

/// A running UCI engine
pub struct EngineSession {
    config: EngineConfig,
    /// Engine name from `id name`
    name: Option<String>,
    /// Recent raw output lines from the engine
    output_lines: Vec<String>,
    events: Receiver<EngineEvent>,
    stdin: ChildStdin,
    process: Child,
    running: bool,
}

impl EngineSession {
    /// Spawn the engine and complete the UCI handshake
    pub fn start(config: &EngineConfig) -> Result<Self> {
        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start engine {}", config.path.display()))?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("failed to open engine stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to open engine stdout"))?;

        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(text) => {
                        if event_tx.send(EngineEvent::Output(text)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            let _ = event_tx.send(EngineEvent::Exited);
        });

        let mut session = Self {
            config: config.clone(),
            name: None,
            output_lines: Vec::new(),
            events: event_rx,
            stdin,
            process: child,
            running: true,
        };

        session.send_command(UciCommand::Uci)?;
        session.wait_for("uciok", |output| matches!(output, UciOutput::UciOk))?;
        session.send_command(UciCommand::SetOption {
            name: "MultiPV".to_string(),
            value: config.multipv.to_string(),
        })?;
        session.send_command(UciCommand::IsReady)?;
        session.wait_for("readyok", |output| matches!(output, UciOutput::ReadyOk))?;

        log::info!(
            "engine {} ready",
            session.name.as_deref().unwrap_or("(unnamed)")
        );
        Ok(session)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Recent raw output, oldest first
    pub fn output_lines(&self) -> &[String] {
        &self.output_lines
    }

    /// Analyse `position`, which `setup` (a `position` command) describes,
    /// and return the reported lines ordered by multipv number.
    pub fn analyse(&mut self, setup: UciCommand, position: &Chess) -> Result<Vec<AnalysisLine>> {
        if !self.running {
            bail!("engine is not running");
        }
        self.send_command(setup)?;
        let go = match self.config.depth {
            Some(depth) => UciCommand::GoDepth(depth),
            None => UciCommand::GoMoveTime(self.config.movetime_ms),
        };
        self.send_command(go)?;

        let budget = self.config.search_timeout();
        let deadline = Instant::now() + budget;
        let mut latest: BTreeMap<u32, UciInfo> = BTreeMap::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                bail!("search did not finish in {}ms", budget.as_millis());
            }
            match self.next_output(remaining.as_millis() as u64)? {
                UciOutput::Info(info) if info.has_analysis() => {
                    latest.insert(info.multipv.unwrap_or(1), info);
                }
                UciOutput::BestMove { best, .. } => {
                    log::debug!("bestmove {best}");
                    break;
                }
                _ => {}
            }
        }

        Ok(latest
            .values()
            .filter_map(|info| AnalysisLine::from_info(info, position))
            .collect())
    }

    /// Tell the engine the next positions belong to a different game
    pub fn new_game(&mut self) -> Result<()> {
        if !self.running {
            bail!("engine is not running");
        }
        self.send_command(UciCommand::UciNewGame)?;
        self.send_command(UciCommand::IsReady)?;
        self.wait_for("readyok", |output| matches!(output, UciOutput::ReadyOk))
    }

    /// Send `quit` and make sure the process is gone
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        let _ = self.send_command(UciCommand::Quit);
        let _ = self.process.kill();
        let _ = self.process.wait();
        self.running = false;
        log::info!("engine stopped");
    }

    fn send_command(&mut self, cmd: UciCommand) -> Result<()> {
        log::trace!("> {cmd}");
        writeln!(self.stdin, "{cmd}").context("failed to write to engine")?;
        self.stdin.flush().context("failed to flush engine stdin")?;
        Ok(())
    }

    /// Block until the next engine line, or fail after `timeout_ms`
    fn next_output(&mut self, timeout_ms: u64) -> Result<UciOutput> {
        match self.events.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(EngineEvent::Output(line)) => {
                let output = UciOutput::parse(&line);
                if let UciOutput::Id(id) = &output {
                    if let Some(name) = id.strip_prefix("name ") {
                        self.name = Some(name.to_string());
                    }
                }
                self.add_output(line);
                Ok(output)
            }
            Ok(EngineEvent::Exited) | Err(RecvTimeoutError::Disconnected) => {
                self.running = false;
                bail!("engine exited")
            }
            Ok(EngineEvent::Error(e)) => {
                self.running = false;
                bail!("engine output error: {e}")
            }
            Err(RecvTimeoutError::Timeout) => bail!("engine did not answer in {timeout_ms}ms"),
        }
    }

    fn wait_for(&mut self, what: &str, done: impl Fn(&UciOutput) -> bool) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.config.ready_timeout_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                bail!("timed out waiting for {what}");
            }
            let output = self
                .next_output(remaining.as_millis() as u64)
                .with_context(|| format!("waiting for {what}"))?;
            if done(&output) {
                return Ok(());
            }
        }
    }

    fn add_output(&mut self, line: String) {
        log::trace!("< {line}");
        self.output_lines.push(line);
        if self.output_lines.len() > MAX_OUTPUT_LINES {
            let excess = self.output_lines.len() - MAX_OUTPUT_LINES;
            self.output_lines.drain(0..excess);
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::domain::position_from_fen;

    #[test]
    fn test_missing_engine_fails_to_start() {
        let config = EngineConfig {
            path: PathBuf::from("/nonexistent/engine"),
            ..EngineConfig::default()
        };
        assert!(EngineSession::start(&config).is_err());
    }

    #[test]
    fn test_line_from_info_flips_score_for_black() {
        let position = position_from_fen(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
        )
        .unwrap();
        let info: UciInfo = "depth 10 score cp 25 pv e7e5 g1f3 b8c6".parse().unwrap();
        let line = AnalysisLine::from_info(&info, &position).unwrap();
        assert_eq!(line.multipv, 1);
        assert_eq!(line.score, Score::Centipawns(-25));
        assert_eq!(line.moves, "1...e5 2. Nf3 Nc6");
        assert!(line.is_worth_showing());
    }

    #[test]
    fn test_short_lines_shown_only_for_mate() {
        let position = Chess::default();
        let info: UciInfo = "depth 3 score cp 10 pv e2e4 e7e5".parse().unwrap();
        assert!(!AnalysisLine::from_info(&info, &position).unwrap().is_worth_showing());

        let info: UciInfo = "depth 3 score mate 1 pv e2e4".parse().unwrap();
        assert!(AnalysisLine::from_info(&info, &position).unwrap().is_worth_showing());

        let info: UciInfo = "depth 3 currmove e2e4".parse().unwrap();
        assert!(AnalysisLine::from_info(&info, &position).is_none());
    }

    #[cfg(unix)]
    fn fake_engine(script: &str) -> EngineConfig {
        EngineConfig {
            path: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            ready_timeout_ms: 2_000,
            ..EngineConfig::default()
        }
    }

    #[cfg(unix)]
    const FAKEFISH: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "id name Fakefish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      echo "info depth 5 multipv 1 score cp 30 pv e2e4 e7e5 g1f3"
      echo "info depth 5 multipv 2 score mate 2 pv d2d4"
      echo "info depth 5 multipv 3 score cp -10 pv g1f3 g8f6"
      echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#;

    #[cfg(unix)]
    #[test]
    fn test_handshake_and_analysis() {
        let mut engine = EngineSession::start(&fake_engine(FAKEFISH)).unwrap();
        assert_eq!(engine.name(), Some("Fakefish"));
        assert!(engine.is_running());

        let setup = UciCommand::Position {
            fen: None,
            moves: vec![],
        };
        let lines = engine.analyse(setup, &Chess::default()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].moves, "1. e4 e5 2. Nf3");
        assert_eq!(lines[0].to_string(), " +0.30  1. e4 e5 2. Nf3");
        assert_eq!(lines[1].score, Score::Mate(2));

        let shown: Vec<u32> = lines
            .iter()
            .filter(|line| line.is_worth_showing())
            .map(|line| line.multipv)
            .collect();
        assert_eq!(shown, vec![1, 2]);
        assert!(engine.output_lines().iter().any(|l| l == "bestmove e2e4"));

        engine.stop();
        assert!(!engine.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn test_new_game_waits_for_ready() {
        let script = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    ucinewgame) echo "info string cleared" ;;
    quit) exit 0 ;;
  esac
done
"#;
        let mut engine = EngineSession::start(&fake_engine(script)).unwrap();
        engine.new_game().unwrap();
        assert!(engine.output_lines().iter().any(|l| l == "info string cleared"));
        assert_eq!(engine.output_lines().last().map(String::as_str), Some("readyok"));

        engine.stop();
        assert!(engine.new_game().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_depth_search_outlasts_handshake_timeout() {
        let script = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    "go depth"*)
      sleep 1
      echo "info depth 20 multipv 1 score cp 15 pv d2d4 d7d5 c2c4"
      echo "bestmove d2d4" ;;
    quit) exit 0 ;;
  esac
done
"#;
        let mut config = fake_engine(script);
        config.ready_timeout_ms = 500;
        config.depth = Some(20);
        let mut engine = EngineSession::start(&config).unwrap();

        let setup = UciCommand::Position {
            fen: None,
            moves: vec![],
        };
        let lines = engine.analyse(setup, &Chess::default()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].depth, 20);
        assert_eq!(lines[0].moves, "1. d4 d5 2. c4");
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_engine_times_out() {
        let mut config = fake_engine("cat > /dev/null");
        config.ready_timeout_ms = 200;
        let err = EngineSession::start(&config).err().unwrap();
        assert!(format!("{err:#}").contains("uciok"));
    }
}
