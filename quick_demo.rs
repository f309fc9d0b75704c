//! Quick pichess demo - watch engine-vs-engine games headless
//! Prints each move and the running score; no board rendering.

use anyhow::{Context, Result};
use clap::Parser;
use pichess_core::{
    scheduler, ControllerOptions, EngineSettings, GameMode, GameSpeed, SessionConfig,
    SessionController, SessionEvent,
};
use pichess_network::{ClientConfig, HttpGateway};

#[derive(Parser, Debug)]
#[clap(name = "quick_demo", about = "Watch engine-vs-engine games")]
struct Args {
    /// Backend bridge URL
    #[clap(long, default_value = "http://127.0.0.1:5001")]
    backend: String,

    /// Number of games to watch
    #[clap(long, default_value_t = 3)]
    games: u32,

    #[clap(long, default_value_t = 1600)]
    white_elo: u16,

    #[clap(long, default_value_t = 2200)]
    black_elo: u16,

    /// Engine speed, 1-20
    #[clap(long, default_value_t = 15)]
    speed: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        backend_url: args.backend.clone(),
        ..ClientConfig::default()
    };
    let gateway = HttpGateway::from_config(&config)?;
    let mut controller = SessionController::new(
        gateway,
        ControllerOptions {
            scheduler: config.scheduler.clone(),
            speed: GameSpeed::new(args.speed),
            auto_restart: true,
        },
    );
    let mut events = controller.subscribe();

    let session_config = SessionConfig::engine_vs_engine(
        EngineSettings::new(args.white_elo),
        EngineSettings::new(args.black_elo),
    );
    let (white, black) = session_config.player_names();
    println!("{} vs {} at {}", white, black, args.backend);

    controller
        .start(GameMode::EngineVsEngine, session_config)
        .await
        .context("Failed to start engine game")?;

    let mut finished = 0;
    while finished < args.games {
        let turn = scheduler::wait_for(controller.next_due());
        tokio::select! {
            turn = turn => controller.run_turn(turn).await,
            _ = tokio::signal::ctrl_c() => break,
        }

        while let Ok(event) = events.try_recv() {
            match event {
                SessionEvent::MoveApplied { record } => println!("{:>3}. {}", record.ply, record),
                SessionEvent::GameEnded { winner, tally } => {
                    finished += 1;
                    println!("Game {} over: {} | score {}", finished, winner, tally);
                }
                SessionEvent::SchedulerHalted { reason } => {
                    anyhow::bail!("Engine loop halted: {}", reason);
                }
                _ => {}
            }
        }

        if controller.next_due().is_none() {
            break;
        }
    }

    println!("Final score {}", controller.session().tally());
    Ok(())
}
