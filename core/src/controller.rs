// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session controller
//!
//! Owns the [`Session`], the backend gateway and the single pending turn.
//! The controller is driven by one task: it awaits [`SessionController::next_due`]
//! alongside user input and passes the fired turn to
//! [`SessionController::run_turn`]. Gateway calls complete before any state
//! changes, so a turn is never half applied.

use crate::gateway::{BackendGateway, EngineMove, EngineReply, GameStatus, GatewayError, MoveReply, MoveSubmission};
use crate::ledger::MoveRecord;
use crate::scheduler::{self, GameSpeed, PendingTurn, SchedulerConfig, TurnKind, TurnTimer};
use crate::session::{GameMode, Phase, ScoreTally, Session, SessionConfig};
use crate::snapshot::Snapshot;
use crate::{Piece, SessionError, Side, Square, Winner};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Capacity of the event channel
const EVENT_CHANNEL_SIZE: usize = 256;

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        mode: GameMode,
        side_to_move: Side,
        game: u32,
    },
    MoveApplied {
        record: MoveRecord,
    },
    MoveRejected {
        from: Square,
        to: Square,
        reason: String,
    },
    Paused,
    Resumed,
    GameEnded {
        winner: Winner,
        tally: ScoreTally,
    },
    /// A new engine-vs-engine game began automatically
    Restarted {
        game: u32,
    },
    Reset {
        tally: ScoreTally,
    },
    Interrupted,
    ConnectivityChanged {
        connected: bool,
    },
    SpeedChanged {
        speed: GameSpeed,
    },
    /// The engine loop stopped for this session
    SchedulerHalted {
        reason: String,
    },
    Error {
        message: String,
    },
}

impl SessionEvent {
    /// One-line description for logs
    pub fn summary(&self) -> &'static str {
        match self {
            SessionEvent::Started { .. } => "Game started",
            SessionEvent::MoveApplied { .. } => "Move applied",
            SessionEvent::MoveRejected { .. } => "Move rejected",
            SessionEvent::Paused => "Paused",
            SessionEvent::Resumed => "Resumed",
            SessionEvent::GameEnded { .. } => "Game ended",
            SessionEvent::Restarted { .. } => "Game restarted",
            SessionEvent::Reset { .. } => "Session reset",
            SessionEvent::Interrupted => "Session interrupted",
            SessionEvent::ConnectivityChanged { .. } => "Connectivity changed",
            SessionEvent::SpeedChanged { .. } => "Speed changed",
            SessionEvent::SchedulerHalted { .. } => "Engine loop halted",
            SessionEvent::Error { .. } => "Error",
        }
    }
}

/// Controller settings
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub scheduler: SchedulerConfig,
    pub speed: GameSpeed,
    /// Start the next engine-vs-engine game automatically
    pub auto_restart: bool,
}

/// Drives a [`Session`] against a backend
pub struct SessionController<G> {
    gateway: G,
    session: Session,
    config: SchedulerConfig,
    speed: GameSpeed,
    timer: TurnTimer,
    events: broadcast::Sender<SessionEvent>,
    /// Set when the engine loop gave up; cleared by a new game
    halted: bool,
    /// Consecutive failed engine requests
    failures: u32,
}

impl<G: BackendGateway> SessionController<G> {
    pub fn new(gateway: G, options: ControllerOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let mut session = Session::new();
        session.set_auto_restart(options.auto_restart);
        Self {
            gateway,
            session,
            config: options.scheduler,
            speed: options.speed,
            timer: TurnTimer::new(),
            events,
            halted: false,
            failures: 0,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn speed(&self) -> GameSpeed {
        self.speed
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Change the engine speed; applies from the next scheduled turn
    pub fn set_speed(&mut self, speed: GameSpeed) {
        if speed != self.speed {
            self.speed = speed;
            self.emit(SessionEvent::SpeedChanged { speed });
        }
    }

    pub fn set_auto_restart(&mut self, enabled: bool) {
        self.session.set_auto_restart(enabled);
    }

    /// The pending turn, if any
    pub fn next_due(&self) -> Option<PendingTurn> {
        self.timer.pending()
    }

    // --- user actions --------------------------------------------------

    /// Configure the backend and begin a game
    #[tracing::instrument(skip(self, config))]
    pub async fn start(&mut self, mode: GameMode, config: SessionConfig) -> Result<(), SessionError> {
        self.session.check_can_start(mode, &config)?;

        let ready = match self.gateway.configure_session(mode, &config).await {
            Ok(ready) => ready,
            Err(e) => return Err(self.report(e)),
        };
        let initial = ready.snapshot.unwrap_or_else(Snapshot::starting_position);
        self.session.start(mode, config, initial)?;
        self.halted = false;
        self.failures = 0;

        info!(%mode, game = self.session.games_started(), "Game started");
        self.emit(SessionEvent::Started {
            mode,
            side_to_move: self.session.side_to_move(),
            game: self.session.games_started(),
        });

        if mode == GameMode::EngineVsEngine {
            self.timer.schedule(TurnKind::EngineTurn, self.config.engine_warmup);
        }
        Ok(())
    }

    /// Submit a user move. The backend decides legality; nothing changes
    /// locally unless it accepts.
    #[tracing::instrument(skip(self))]
    pub async fn submit_move(
        &mut self,
        from: Square,
        to: Square,
        piece: Piece,
    ) -> Result<MoveRecord, SessionError> {
        self.session.check_can_submit()?;

        let submission = MoveSubmission {
            from,
            to,
            piece,
            ply: self.session.ledger().next_ply(),
        };
        let reply = match self.gateway.submit_move(&submission).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.report(e)),
        };

        match reply {
            MoveReply::Rejected { reason } => {
                info!(%from, %to, %reason, "Move rejected by backend");
                self.emit(SessionEvent::MoveRejected {
                    from,
                    to,
                    reason: reason.clone(),
                });
                Err(SessionError::GatewayRejected(reason))
            }
            MoveReply::Accepted {
                snapshot,
                side_to_move,
                game_over,
            } => {
                let record = self.record_move(piece, from, to, snapshot, side_to_move);
                if let Some(winner) = game_over {
                    self.end_game(winner);
                } else if self.session.mode() == Some(GameMode::HumanVsEngine)
                    && self.session.phase() == Phase::WaitingOnEngine
                {
                    self.timer.schedule(TurnKind::EngineReply, self.config.engine_reply_delay);
                }
                Ok(record)
            }
        }
    }

    /// Suspend play and drop any pending engine turn
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.session.is_paused() {
            return Ok(());
        }
        self.session.pause()?;
        if let Some(turn) = self.timer.cancel() {
            debug!(kind = ?turn.kind, "Cancelled pending turn on pause");
        }
        self.emit(SessionEvent::Paused);
        Ok(())
    }

    /// Resume play. An engine side to move gets exactly one fresh turn.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if !self.session.is_paused() {
            return self.session.resume();
        }
        self.session.resume()?;
        self.emit(SessionEvent::Resumed);

        match (self.session.mode(), self.session.phase()) {
            (Some(GameMode::EngineVsEngine), Phase::WaitingOnEngine) if !self.halted => {
                self.timer.schedule(TurnKind::EngineTurn, Duration::ZERO);
            }
            (Some(GameMode::HumanVsEngine), Phase::WaitingOnEngine) if !self.halted => {
                self.timer.schedule(TurnKind::EngineReply, Duration::ZERO);
            }
            _ => {}
        }
        Ok(())
    }

    /// Reset the backend and the local session. The score is kept.
    ///
    /// The local session is reset even when the backend cannot be reached.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.timer.cancel();
        let result = self.gateway.reset_session().await;

        self.session.reset();
        self.halted = false;
        self.failures = 0;
        self.emit(SessionEvent::Reset {
            tally: self.session.tally(),
        });

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self.report(e)),
        }
    }

    /// Abandon the session: history, score and setup are all cleared
    pub fn interrupt(&mut self) {
        self.timer.cancel();
        self.session.interrupt();
        self.halted = false;
        self.failures = 0;
        info!("Session interrupted");
        self.emit(SessionEvent::Interrupted);
    }

    pub fn view_previous(&mut self) -> bool {
        self.session.view_previous()
    }

    pub fn view_next(&mut self) -> bool {
        self.session.view_next()
    }

    pub fn view_latest(&mut self) {
        self.session.view_latest()
    }

    /// Ask the backend whether it is fully connected. Failures count as
    /// disconnected.
    pub async fn poll_connectivity(&mut self) -> bool {
        let connected = match self.gateway.query_connectivity().await {
            Ok(status) => status.is_connected(),
            Err(e) => {
                debug!("Connectivity query failed: {}", e);
                false
            }
        };
        if self.session.set_connected(connected) {
            info!(connected, "Backend connectivity changed");
            self.emit(SessionEvent::ConnectivityChanged { connected });
        }
        connected
    }

    // --- scheduled turns -----------------------------------------------

    /// Run a turn handed out by [`next_due`](Self::next_due). Turns that were
    /// cancelled or replaced in the meantime are ignored.
    pub async fn run_turn(&mut self, turn: PendingTurn) {
        if !self.timer.take(turn) {
            debug!(kind = ?turn.kind, "Ignoring stale turn");
            return;
        }
        match turn.kind {
            TurnKind::EngineTurn => self.engine_turn().await,
            TurnKind::EngineReply => self.engine_reply().await,
            TurnKind::Restart => self.auto_restart().await,
        }
    }

    /// Wait for the pending turn and run it. Returns false when nothing is
    /// pending.
    pub async fn step(&mut self) -> bool {
        let Some(turn) = self.next_due() else {
            return false;
        };
        let turn = scheduler::wait_for(Some(turn)).await;
        self.run_turn(turn).await;
        true
    }

    /// One engine-vs-engine iteration
    async fn engine_turn(&mut self) {
        if !self.session.is_running()
            || self.session.mode() != Some(GameMode::EngineVsEngine)
            || self.halted
        {
            debug!(phase = ?self.session.phase(), "Engine loop stopped");
            return;
        }

        match self.gateway.query_game_over().await {
            Ok(GameStatus::Over { winner }) => {
                self.end_game(winner);
                return;
            }
            Ok(GameStatus::InProgress) => {}
            Err(e) => {
                let backoff = match e {
                    GatewayError::Unreachable(_) => self.config.status_retry,
                    _ => self.config.status_error_retry,
                };
                self.retry_or_halt(e, TurnKind::EngineTurn, backoff);
                return;
            }
        }

        match self.gateway.request_engine_move(self.speed).await {
            Ok(EngineReply::Moved {
                mv,
                snapshot,
                side_to_move,
                game_over,
            }) => {
                self.failures = 0;
                self.record_engine_move(mv, snapshot, side_to_move);
                match game_over {
                    Some(winner) => self.end_game(winner),
                    None if self.session.is_running() => {
                        self.timer
                            .schedule(TurnKind::EngineTurn, self.config.turn_delay(self.speed));
                    }
                    None => {}
                }
            }
            Ok(EngineReply::GameOver { winner }) => {
                self.failures = 0;
                self.end_game(winner);
            }
            Err(e) => self.retry_or_halt(e, TurnKind::EngineTurn, self.config.move_retry),
        }
    }

    /// The engine's answer to a user move
    async fn engine_reply(&mut self) {
        if self.session.phase() != Phase::WaitingOnEngine
            || self.session.mode() != Some(GameMode::HumanVsEngine)
            || self.halted
        {
            return;
        }

        match self.gateway.request_engine_move(self.speed).await {
            Ok(EngineReply::Moved {
                mv,
                snapshot,
                side_to_move,
                game_over,
            }) => {
                self.failures = 0;
                self.record_engine_move(mv, snapshot, side_to_move);
                if let Some(winner) = game_over {
                    self.end_game(winner);
                } else if self.session.phase() == Phase::WaitingOnEngine {
                    // Backend still reports the engine to move
                    self.timer.schedule(TurnKind::EngineReply, self.config.engine_reply_delay);
                }
            }
            Ok(EngineReply::GameOver { winner }) => {
                self.failures = 0;
                self.end_game(winner);
            }
            Err(e) => self.retry_or_halt(e, TurnKind::EngineReply, self.config.move_retry),
        }
    }

    /// Start the next engine-vs-engine game after a finished one
    async fn auto_restart(&mut self) {
        if self.session.phase() != Phase::Ended {
            return;
        }

        match self.gateway.reset_session().await {
            Ok(ready) => {
                let initial = ready.snapshot.unwrap_or_else(Snapshot::starting_position);
                if let Err(e) = self.session.restart(initial) {
                    warn!("Auto-restart refused: {}", e);
                    return;
                }
                self.halted = false;
                self.failures = 0;
                let game = self.session.games_started();
                info!(game, "Auto-restarted engine game");
                self.emit(SessionEvent::Restarted { game });
                self.timer.schedule(TurnKind::EngineTurn, self.config.restart_settle);
            }
            Err(e) => {
                warn!("Backend reset for auto-restart failed: {}", e);
                self.session.reset();
                self.emit(SessionEvent::Error {
                    message: format!("Auto-restart failed: {}", e),
                });
            }
        }
    }

    // --- helpers -------------------------------------------------------

    fn record_move(
        &mut self,
        piece: Piece,
        from: Square,
        to: Square,
        snapshot: Snapshot,
        side_to_move: Option<Side>,
    ) -> MoveRecord {
        let record = self
            .session
            .apply_confirmed_move(piece, from, to, snapshot, side_to_move)
            .clone();
        debug!(ply = record.ply, "{}", record);
        self.emit(SessionEvent::MoveApplied {
            record: record.clone(),
        });
        record
    }

    fn record_engine_move(&mut self, mv: EngineMove, snapshot: Option<Snapshot>, side_to_move: Option<Side>) {
        let snapshot = snapshot.unwrap_or_else(|| {
            self.session
                .snapshots()
                .latest()
                .map(|latest| latest.with_move(mv.from, mv.to))
                .unwrap_or_default()
        });
        self.record_move(mv.piece, mv.from, mv.to, snapshot, side_to_move);
    }

    fn end_game(&mut self, winner: Winner) {
        self.timer.cancel();
        let restart = self.session.declare_ended(winner);
        if self.session.phase() != Phase::Ended {
            return;
        }
        info!(%winner, tally = %self.session.tally(), "Game over");
        self.emit(SessionEvent::GameEnded {
            winner,
            tally: self.session.tally(),
        });
        if restart {
            self.timer.schedule(TurnKind::Restart, self.config.game_over_display);
        }
    }

    /// Back off and retry `kind`, or halt the loop for fatal errors and
    /// once the retry budget is spent.
    fn retry_or_halt(&mut self, err: GatewayError, kind: TurnKind, backoff: Duration) {
        if let GatewayError::Fatal(reason) = &err {
            self.halt(reason.clone());
            return;
        }

        self.failures += 1;
        if self.failures > self.config.max_retries {
            self.halt(format!("{} (after {} attempts)", err, self.failures));
            return;
        }

        warn!(attempt = self.failures, ?backoff, "Engine request failed: {}", err);
        self.emit(SessionEvent::Error {
            message: err.to_string(),
        });
        self.timer.schedule(kind, backoff);
    }

    fn halt(&mut self, reason: String) {
        error!(%reason, "Halting engine loop");
        self.halted = true;
        self.timer.cancel();
        self.emit(SessionEvent::SchedulerHalted { reason });
    }

    /// Log a one-shot gateway failure and convert it
    fn report(&mut self, err: GatewayError) -> SessionError {
        warn!("Backend request failed: {}", err);
        self.emit(SessionEvent::Error {
            message: err.to_string(),
        });
        err.into()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
