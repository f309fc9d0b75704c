// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session state machine
//!
//! `NotStarted → Running(AwaitingMove | WaitingOnEngine) ⇄ Paused → Ended → NotStarted`
//!
//! All session state (phase, side to move, history, view cursor, score) is
//! owned by [`Session`] and changes only through its transition methods.
//! The session never talks to the backend; [`crate::controller`] does that
//! and feeds confirmed results back in.

use crate::ledger::{MoveLedger, MoveRecord};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::{NotReady, Piece, SessionError, Side, Square, Winner};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produces the moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    /// The user plays White against the engine
    #[serde(rename = "user_vs_cpu")]
    HumanVsEngine,
    /// Both sides are played by engines
    #[serde(rename = "cpu_vs_cpu")]
    EngineVsEngine,
}

impl GameMode {
    /// Wire name used by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::HumanVsEngine => "user_vs_cpu",
            GameMode::EngineVsEngine => "cpu_vs_cpu",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::HumanVsEngine => write!(f, "Human vs Engine"),
            GameMode::EngineVsEngine => write!(f, "Engine vs Engine"),
        }
    }
}

/// Strength settings for one engine side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Target playing strength
    pub elo: u16,
    /// Use the NNUE evaluation
    #[serde(default)]
    pub nnue: bool,
}

impl EngineSettings {
    pub const DEFAULT_ELO: u16 = 1350;

    pub fn new(elo: u16) -> Self {
        Self { elo, nnue: false }
    }

    pub fn with_nnue(mut self, nnue: bool) -> Self {
        self.nnue = nnue;
        self
    }

    /// Engine skill level in `0..=20` derived from the ELO
    pub fn skill_level(&self) -> u8 {
        match self.elo {
            elo if elo < 1350 => 0,
            elo if elo >= 2850 => 20,
            elo => ((elo - 1350) / 75) as u8,
        }
    }

    /// Player label shown next to the board
    pub fn display_name(&self) -> String {
        if self.nnue {
            return "NNUE Bot".to_string();
        }
        let rank = match self.elo {
            1350 => "Club Player",
            1600 => "Club Player+",
            1900 => "Intermediate",
            2200 => "Advanced",
            2600 => "Master",
            3000 => "Grandmaster",
            _ => "CPU",
        };
        format!("{} ({} ELO)", rank, self.elo)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ELO)
    }
}

/// Engine settings for each side. The human side is left empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub white: Option<EngineSettings>,
    pub black: Option<EngineSettings>,
}

impl SessionConfig {
    /// Human plays White against an engine playing Black
    pub fn human_vs_engine(black: EngineSettings) -> Self {
        Self {
            white: None,
            black: Some(black),
        }
    }

    pub fn engine_vs_engine(white: EngineSettings, black: EngineSettings) -> Self {
        Self {
            white: Some(white),
            black: Some(black),
        }
    }

    /// Check the settings required by `mode` are present
    pub fn validate(&self, mode: GameMode) -> Result<(), SessionError> {
        match mode {
            GameMode::HumanVsEngine if self.black.is_none() => Err(SessionError::InvalidConfig(
                "human-vs-engine needs the engine (Black) configured".to_string(),
            )),
            GameMode::EngineVsEngine if self.white.is_none() || self.black.is_none() => {
                Err(SessionError::InvalidConfig(
                    "engine-vs-engine needs both White and Black configured".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Labels for the White and Black players
    pub fn player_names(&self) -> (String, String) {
        let name = |side: Option<EngineSettings>| {
            side.map(|s| s.display_name()).unwrap_or_else(|| "You".to_string())
        };
        (name(self.white), name(self.black))
    }
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// No game configured
    NotStarted,
    /// Waiting for the user's move
    AwaitingMove,
    /// The engine is due to move
    WaitingOnEngine,
    /// Play suspended; history can be browsed
    Paused,
    /// The game reached a result
    Ended,
}

impl Phase {
    /// True for the two running sub-states
    pub fn is_running(&self) -> bool {
        matches!(self, Phase::AwaitingMove | Phase::WaitingOnEngine)
    }
}

/// Which snapshot is on display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewCursor {
    /// Follow the current position
    #[default]
    Latest,
    /// A fixed history index
    At(usize),
}

/// Results across sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTally {
    pub white: u32,
    pub black: u32,
    pub draws: u32,
}

impl ScoreTally {
    pub fn record(&mut self, winner: Winner) {
        match winner {
            Winner::White => self.white += 1,
            Winner::Black => self.black += 1,
            Winner::Draw => self.draws += 1,
        }
    }

    pub fn games(&self) -> u32 {
        self.white + self.black + self.draws
    }
}

impl fmt::Display for ScoreTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W:{} B:{} D:{}", self.white, self.black, self.draws)
    }
}

/// The game session: phase, history and score
#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    /// Running sub-state to return to on resume
    resume_to: Phase,
    /// Mode and settings of the current (or last) game
    setup: Option<(GameMode, SessionConfig)>,
    side_to_move: Side,
    snapshots: SnapshotStore,
    ledger: MoveLedger,
    cursor: ViewCursor,
    tally: ScoreTally,
    last_result: Option<Winner>,
    auto_restart: bool,
    connected: bool,
    /// Games started since the last interrupt
    games_started: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session: not started, empty history, zero score
    pub fn new() -> Self {
        Self {
            phase: Phase::NotStarted,
            resume_to: Phase::AwaitingMove,
            setup: None,
            side_to_move: Side::White,
            snapshots: SnapshotStore::new(),
            ledger: MoveLedger::new(),
            cursor: ViewCursor::Latest,
            tally: ScoreTally::default(),
            last_result: None,
            auto_restart: true,
            connected: true,
            games_started: 0,
        }
    }

    // --- transitions ---------------------------------------------------

    /// Begin a game. Clears the history down to `initial`; White moves first.
    pub fn start(
        &mut self,
        mode: GameMode,
        config: SessionConfig,
        initial: Snapshot,
    ) -> Result<(), SessionError> {
        self.check_can_start(mode, &config)?;
        self.setup = Some((mode, config));
        self.begin(initial);
        Ok(())
    }

    /// Whether `start` would succeed, without changing anything
    pub fn check_can_start(&self, mode: GameMode, config: &SessionConfig) -> Result<(), SessionError> {
        config.validate(mode)?;
        if self.phase.is_running() || self.phase == Phase::Paused {
            return Err(NotReady::InProgress.into());
        }
        Ok(())
    }

    /// Start another game with the settings of the previous one
    pub fn restart(&mut self, initial: Snapshot) -> Result<(), SessionError> {
        let (mode, config) = self.setup.ok_or(NotReady::NotStarted)?;
        self.phase = Phase::NotStarted;
        self.start(mode, config, initial)
    }

    fn begin(&mut self, initial: Snapshot) {
        let mode = self.mode();
        self.ledger.clear();
        self.snapshots.clear();
        self.snapshots.append(initial);
        self.cursor = ViewCursor::Latest;
        self.side_to_move = Side::White;
        self.last_result = None;
        self.games_started += 1;
        self.phase = match mode {
            Some(GameMode::HumanVsEngine) => Phase::AwaitingMove,
            _ => Phase::WaitingOnEngine,
        };
        self.resume_to = self.phase;
        tracing::debug!(?mode, game = self.games_started, "Session started");
    }

    /// Local preconditions for a user move
    pub fn check_can_submit(&self) -> Result<(), SessionError> {
        let refusal = match self.phase {
            Phase::AwaitingMove if !self.connected => NotReady::Disconnected,
            Phase::AwaitingMove => return Ok(()),
            Phase::NotStarted => NotReady::NotStarted,
            Phase::Paused => NotReady::Paused,
            Phase::Ended => NotReady::Ended,
            Phase::WaitingOnEngine if self.mode() == Some(GameMode::EngineVsEngine) => {
                NotReady::EngineMode
            }
            Phase::WaitingOnEngine => NotReady::WaitingOnEngine,
        };
        Err(refusal.into())
    }

    /// Record a move the backend confirmed, together with the board it produced.
    ///
    /// `side_to_move` is the backend's view of who moves next; when absent
    /// the side simply flips.
    pub fn apply_confirmed_move(
        &mut self,
        piece: Piece,
        from: Square,
        to: Square,
        snapshot: Snapshot,
        side_to_move: Option<Side>,
    ) -> &MoveRecord {
        let mover = self.side_to_move;
        self.snapshots.append(snapshot);
        self.cursor = ViewCursor::Latest;
        self.side_to_move = side_to_move.unwrap_or_else(|| mover.opposite());

        let next = match self.mode() {
            Some(GameMode::HumanVsEngine) if self.side_to_move == Side::White => {
                Phase::AwaitingMove
            }
            _ => Phase::WaitingOnEngine,
        };
        // A reply that lands while paused updates where resume returns to
        if self.phase == Phase::Paused {
            self.resume_to = next;
        } else if self.phase.is_running() {
            self.phase = next;
        }

        self.ledger.record(piece, from, to, mover)
    }

    /// Suspend play. Pausing twice is a no-op.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::AwaitingMove | Phase::WaitingOnEngine => {
                self.resume_to = self.phase;
                self.phase = Phase::Paused;
                Ok(())
            }
            Phase::Paused => Ok(()),
            Phase::NotStarted => Err(NotReady::NotStarted.into()),
            Phase::Ended => Err(NotReady::Ended.into()),
        }
    }

    /// Return to the running sub-state held before the pause, viewing the
    /// current position again.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Paused => {
                self.phase = self.resume_to;
                self.cursor = ViewCursor::Latest;
                Ok(())
            }
            phase if phase.is_running() => Ok(()),
            Phase::Ended => Err(NotReady::Ended.into()),
            _ => Err(NotReady::NotStarted.into()),
        }
    }

    /// Record the result and end the game.
    ///
    /// Returns true when the caller should schedule an automatic restart
    /// (engine-vs-engine with auto-restart enabled).
    pub fn declare_ended(&mut self, winner: Winner) -> bool {
        if matches!(self.phase, Phase::NotStarted | Phase::Ended) {
            tracing::warn!(?winner, phase = ?self.phase, "Ignoring result outside a game");
            return false;
        }
        self.tally.record(winner);
        self.last_result = Some(winner);
        self.phase = Phase::Ended;
        self.auto_restart && self.mode() == Some(GameMode::EngineVsEngine)
    }

    /// Back to `NotStarted`, clearing history. The score is kept.
    pub fn reset(&mut self) {
        self.ledger.clear();
        self.snapshots.clear();
        self.cursor = ViewCursor::Latest;
        self.side_to_move = Side::White;
        self.phase = Phase::NotStarted;
        self.resume_to = Phase::AwaitingMove;
        self.last_result = None;
    }

    /// Abandon everything: history, score and the game setup.
    pub fn interrupt(&mut self) {
        self.reset();
        self.tally = ScoreTally::default();
        self.setup = None;
        self.games_started = 0;
    }

    pub fn set_auto_restart(&mut self, enabled: bool) {
        self.auto_restart = enabled;
    }

    /// Update backend connectivity; returns true when it changed
    pub fn set_connected(&mut self, connected: bool) -> bool {
        let changed = self.connected != connected;
        self.connected = connected;
        changed
    }

    // --- navigation ----------------------------------------------------

    /// Resolved index of the snapshot on display
    pub fn view_index(&self) -> Option<usize> {
        let latest = self.snapshots.latest_index()?;
        Some(match self.cursor {
            ViewCursor::Latest => latest,
            ViewCursor::At(idx) => idx.min(latest),
        })
    }

    /// Step one snapshot back. No-op at the first snapshot.
    pub fn view_previous(&mut self) -> bool {
        match self.view_index() {
            Some(idx) if idx > 0 => {
                self.cursor = ViewCursor::At(idx - 1);
                true
            }
            _ => false,
        }
    }

    /// Step one snapshot forward. No-op at the latest snapshot.
    pub fn view_next(&mut self) -> bool {
        match (self.view_index(), self.snapshots.latest_index()) {
            (Some(idx), Some(latest)) if idx < latest => {
                self.cursor = if idx + 1 == latest {
                    ViewCursor::Latest
                } else {
                    ViewCursor::At(idx + 1)
                };
                true
            }
            _ => false,
        }
    }

    /// Jump back to the current position
    pub fn view_latest(&mut self) {
        self.cursor = ViewCursor::Latest;
    }

    /// The snapshot on display
    pub fn viewed_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.view_index()?).ok()
    }

    // --- accessors -----------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    pub fn mode(&self) -> Option<GameMode> {
        self.setup.map(|(mode, _)| mode)
    }

    pub fn config(&self) -> Option<SessionConfig> {
        self.setup.map(|(_, config)| config)
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn cursor(&self) -> ViewCursor {
        self.cursor
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn ledger(&self) -> &MoveLedger {
        &self.ledger
    }

    pub fn tally(&self) -> ScoreTally {
        self.tally
    }

    pub fn last_result(&self) -> Option<Winner> {
        self.last_result
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn games_started(&self) -> u32 {
        self.games_started
    }
}
