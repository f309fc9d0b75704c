// SPDX-License-Identifier: MIT OR Apache-2.0

//! pichess CLI - play against the engine or watch engine games
//!
//! Connects to the chess backend bridge, renders the board in the terminal
//! and reads commands from stdin. Chess rules stay on the backend.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, Naming};
use pichess_cli::commands::{self, Command};
use pichess_cli::render;
use pichess_core::logging::{CorrelationId, JsonLogger, SessionLogger};
use pichess_core::{
    scheduler, EngineSettings, GameMode, GameSpeed, SessionConfig, SessionController,
    SessionError, SessionEvent,
};
use pichess_network::{config, ClientConfig, HttpGateway};
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tokio::signal;
use tokio::sync::broadcast;

// Initialize file logging first thing in the program
fn init_logging() -> Result<()> {
    let log_dir = match std::env::consts::OS {
        "macos" => {
            let mut path = PathBuf::from(std::env::var("HOME")?);
            path.push("Library");
            path.push("Logs");
            path.push("pichess-cli");
            path
        }
        _ => {
            let mut path = PathBuf::from(".");
            path.push("logs");
            path
        }
    };

    std::fs::create_dir_all(&log_dir)?;

    Logger::try_with_str("info")?
        .log_to_file(
            FileSpec::default()
                .directory(&log_dir)
                .basename("pichess-cli")
                .suffix("log"),
        )
        .rotate(
            Criterion::Size(64 * 1024 * 1024),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(5),
        )
        .start()?;

    Ok(())
}

static LOGGER_INIT: std::sync::Once = std::sync::Once::new();

fn ensure_logging_initialized() -> Result<()> {
    let mut result = Ok(());
    LOGGER_INIT.call_once(|| {
        if let Err(e) = init_logging() {
            result = Err(e);
        }
    });
    result
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(
    name = "pichess-cli",
    about = "Play chess against a backend engine from the terminal",
    version
)]
struct Args {
    /// Backend bridge URL (overrides the config file)
    #[clap(long)]
    backend: Option<String>,

    /// Game mode to start with
    #[clap(short, long, value_enum, default_value = "hve")]
    mode: ModeArg,

    /// White engine ELO (engine-vs-engine only)
    #[clap(long, default_value_t = EngineSettings::DEFAULT_ELO)]
    white_elo: u16,

    /// Black engine ELO
    #[clap(long, default_value_t = EngineSettings::DEFAULT_ELO)]
    black_elo: u16,

    /// Use NNUE evaluation for White
    #[clap(long)]
    white_nnue: bool,

    /// Use NNUE evaluation for Black
    #[clap(long)]
    black_nnue: bool,

    /// Engine-vs-engine speed, 1-20
    #[clap(short, long)]
    speed: Option<u8>,

    /// Do not start a new engine-vs-engine game after one ends
    #[clap(long)]
    no_auto_restart: bool,

    /// Config file to use instead of the platform default
    #[clap(long)]
    config: Option<PathBuf>,

    /// Enable debug logging to stderr (honours RUST_LOG)
    #[clap(long)]
    debug: bool,

    /// Print every session event as a JSON line
    #[clap(long)]
    json_events: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Human (White) against the engine
    Hve,
    /// Engine against engine
    Eve,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hve => GameMode::HumanVsEngine,
            ModeArg::Eve => GameMode::EngineVsEngine,
        }
    }
}

impl Args {
    fn session_config(&self, mode: GameMode) -> SessionConfig {
        let white = EngineSettings::new(self.white_elo).with_nnue(self.white_nnue);
        let black = EngineSettings::new(self.black_elo).with_nnue(self.black_nnue);
        match mode {
            GameMode::HumanVsEngine => SessionConfig::human_vs_engine(black),
            GameMode::EngineVsEngine => SessionConfig::engine_vs_engine(white, black),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = ensure_logging_initialized() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let args = Args::parse();

    if args.debug {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut client_config = match &args.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
    .context("Failed to load client configuration")?;
    if let Some(backend) = &args.backend {
        client_config.backend_url = backend.clone();
    }
    if args.no_auto_restart {
        client_config.auto_restart = false;
    }

    run(args, client_config).await
}

struct Cli {
    controller: SessionController<HttpGateway>,
    events: broadcast::Receiver<SessionEvent>,
    logger: Option<SessionLogger>,
    args: Args,
    mode: GameMode,
}

async fn run(args: Args, client_config: ClientConfig) -> Result<()> {
    let gateway = HttpGateway::from_config(&client_config)
        .with_context(|| format!("Failed to create client for {}", client_config.backend_url))?;
    let options = pichess_core::ControllerOptions {
        scheduler: client_config.scheduler.clone(),
        speed: GameSpeed::new(args.speed.unwrap_or(client_config.default_speed)),
        auto_restart: client_config.auto_restart,
    };
    let controller = SessionController::new(gateway, options);
    let events = controller.subscribe();
    let logger = args.json_events.then(|| {
        SessionLogger::new(
            Box::new(JsonLogger::stdout()),
            CorrelationId::new_session(),
            "pichess-cli",
        )
    });

    println!("pichess - backend {}", client_config.backend_url);
    let mut cli = Cli {
        controller,
        events,
        logger,
        mode: args.mode.into(),
        args,
    };

    cli.controller.poll_connectivity().await;
    cli.start(None).await;
    cli.flush_events();
    cli.print_position();

    let mut poll = tokio::time::interval(client_config.connectivity_poll);
    let mut stdin_lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                println!("\nReceived Ctrl+C, shutting down...");
                break;
            }

            turn = scheduler::wait_for(cli.controller.next_due()) => {
                cli.controller.run_turn(turn).await;
            }

            _ = poll.tick() => {
                cli.controller.poll_connectivity().await;
            }

            result = stdin_lines.next_line() => {
                let line = match result {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("Error reading input: {}", e);
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match commands::parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = cli.execute(command).await {
                            eprintln!("{}", e);
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
        }

        if cli.flush_events() {
            cli.print_position();
        }
    }

    Ok(())
}

impl Cli {
    async fn start(&mut self, mode: Option<GameMode>) {
        if let Some(mode) = mode {
            self.mode = mode;
        }
        let config = self.args.session_config(self.mode);
        let (white, black) = config.player_names();
        match self.controller.start(self.mode, config).await {
            Ok(()) => println!("{} vs {} ({})", white, black, self.mode),
            Err(e) => eprintln!("Could not start game: {}", e),
        }
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Move { from, to } => {
                let piece = self
                    .controller
                    .session()
                    .snapshots()
                    .latest()
                    .and_then(|board| board.piece_at(from))
                    .ok_or_else(|| anyhow!("No piece on {}", from))?;
                match self.controller.submit_move(from, to, piece).await {
                    Ok(record) => tracing::debug!("Played {}", record),
                    Err(SessionError::GatewayRejected(reason)) => {
                        println!("Move rejected: {}. Type 'reset' if the board looks out of sync.", reason);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Command::Previous => {
                if self.controller.view_previous() {
                    self.print_position();
                }
            }
            Command::Next => {
                if self.controller.view_next() {
                    self.print_position();
                }
            }
            Command::Latest => {
                self.controller.view_latest();
                self.print_position();
            }
            Command::Pause => self.controller.pause()?,
            Command::Resume => self.controller.resume()?,
            Command::Speed(speed) => {
                let speed = GameSpeed::new(speed);
                self.controller.set_speed(speed);
                if let Some(advice) = speed.advice(self.mode) {
                    println!("Speed {}: {:?}", speed.value(), advice);
                }
            }
            Command::Reset => {
                let result = self.controller.reset().await;
                self.start(None).await;
                result?;
            }
            Command::Interrupt => self.controller.interrupt(),
            Command::Start(mode) => self.start(mode).await,
            Command::Status => {
                println!("{}", render::render_status(self.controller.session(), self.controller.speed()));
            }
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => {}
        }
        Ok(())
    }

    /// Print and log pending events. Returns true when the board changed.
    fn flush_events(&mut self) -> bool {
        let mut redraw = false;
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dropped session events");
                    redraw = true;
                    continue;
                }
                Err(_) => break,
            };
            if let Some(logger) = self.logger.as_mut() {
                logger.event(&event);
            }
            match &event {
                SessionEvent::MoveApplied { record } => {
                    println!("{}", render::render_move_line(record));
                    redraw = true;
                }
                SessionEvent::GameEnded { winner, tally } => {
                    println!("Game over: {} | score {}", winner, tally);
                }
                SessionEvent::Restarted { game } => {
                    println!("Starting game {}", game);
                    redraw = true;
                }
                SessionEvent::Reset { tally } => println!("Reset | score {}", tally),
                SessionEvent::Interrupted => println!("Session interrupted; score cleared"),
                SessionEvent::Paused => println!("Paused. Use prev/next to review moves."),
                SessionEvent::Resumed => println!("Resumed"),
                SessionEvent::ConnectivityChanged { connected } => {
                    println!("Backend {}", if *connected { "connected" } else { "disconnected" });
                }
                SessionEvent::SchedulerHalted { reason } => {
                    println!("Engine stopped: {}. Type 'reset' to try again.", reason);
                }
                SessionEvent::Error { message } => eprintln!("Backend error: {}", message),
                SessionEvent::Started { .. }
                | SessionEvent::MoveRejected { .. }
                | SessionEvent::SpeedChanged { .. } => {}
            }
        }
        redraw
    }

    fn print_position(&self) {
        let session = self.controller.session();
        let speed = self.controller.speed();
        if let Some(snapshot) = session.viewed_snapshot() {
            if render::board_visible(session, speed) {
                println!("\n{}", render::render_board(snapshot));
            }
        }
        let moves = render::render_moves(session.ledger());
        if !moves.is_empty() {
            println!("{}", moves);
        }
        println!("{}", render::render_status(session, speed));
    }
}
