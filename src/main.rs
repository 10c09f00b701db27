use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use chess_variations::app::{self, App};
use chess_variations::config::AppConfig;
use chess_variations::models::GameSession;

/// Record a chess game with nested variations and analyse it with a UCI engine
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start from this position instead of the configured one
    #[arg(long)]
    fen: Option<String>,

    /// Load a game from a PGN file
    #[arg(long, conflicts_with = "fen")]
    pgn: Option<PathBuf>,

    /// UCI engine executable
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Print the configuration file JSON schema and exit
    #[arg(long)]
    print_schema: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.print_schema {
        println!("{}", AppConfig::schema_json()?);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(fen) = args.fen {
        config.start_fen = Some(fen);
    }
    if let Some(engine) = args.engine {
        config.engine.path = engine;
    }

    let mut app = match &args.pgn {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let session = GameSession::from_pgn(&text)?;
            App::with_session(config, session)
        }
        None => App::new(config)?,
    };

    let stdin = io::stdin();
    app::run(&mut app, stdin.lock(), io::stdout().lock())
}
