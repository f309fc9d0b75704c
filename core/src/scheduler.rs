// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine-turn scheduling
//!
//! The scheduler keeps at most one pending turn. A pending turn is plain
//! data (kind + deadline); whoever owns the controller awaits it with
//! [`wait_for`] and hands it back to the controller when it fires.
//! Cancelling is dropping the value, so a cancelled turn can never run.

use crate::session::GameMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Delays driving the engine loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Floor for the speed-derived delay between engine moves
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
    /// Delay at speed 1; divided by the speed
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Wait before the first engine move of an engine-vs-engine game
    #[serde(with = "humantime_serde")]
    pub engine_warmup: Duration,
    /// Wait before asking for the engine's answer to a user move
    #[serde(with = "humantime_serde")]
    pub engine_reply_delay: Duration,
    /// How long a finished game stays on screen before auto-restart
    #[serde(with = "humantime_serde")]
    pub game_over_display: Duration,
    /// Settle time after the backend was reset for a new game
    #[serde(with = "humantime_serde")]
    pub restart_settle: Duration,
    /// Backoff after a game-over query that got no answer
    #[serde(with = "humantime_serde")]
    pub status_retry: Duration,
    /// Backoff after the backend answered a game-over query with an error
    #[serde(with = "humantime_serde")]
    pub status_error_retry: Duration,
    /// Backoff after a failed engine move request
    #[serde(with = "humantime_serde")]
    pub move_retry: Duration,
    /// Consecutive transient failures tolerated before the loop halts
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(25),
            base_delay: Duration::from_millis(500),
            engine_warmup: Duration::from_millis(500),
            engine_reply_delay: Duration::from_millis(1000),
            game_over_display: Duration::from_millis(2000),
            restart_settle: Duration::from_millis(2000),
            status_retry: Duration::from_millis(1000),
            status_error_retry: Duration::from_millis(2000),
            move_retry: Duration::from_millis(3000),
            max_retries: 5,
        }
    }
}

impl SchedulerConfig {
    /// Delay between engine moves at `speed`. Higher speed, shorter delay,
    /// never below `min_delay`.
    pub fn turn_delay(&self, speed: GameSpeed) -> Duration {
        (self.base_delay / u32::from(speed.value())).max(self.min_delay)
    }
}

/// Engine-vs-engine playback speed, `1..=20`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct GameSpeed(u8);

impl GameSpeed {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;
    pub const DEFAULT: u8 = 10;

    /// Clamp into range; 0 means "unset" and gives the default speed
    pub fn new(speed: u8) -> Self {
        if speed == 0 {
            return Self(Self::DEFAULT);
        }
        Self(speed.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Display advice for this speed
    pub fn advice(&self, mode: GameMode) -> Option<SpeedAdvice> {
        match self.0 {
            s if s >= 15 && mode == GameMode::EngineVsEngine => Some(SpeedAdvice::TooFastToDisplay),
            s if s >= 10 => Some(SpeedAdvice::HardToFollow),
            _ => None,
        }
    }
}

impl Default for GameSpeed {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<u8> for GameSpeed {
    fn from(speed: u8) -> Self {
        Self::new(speed)
    }
}

impl From<GameSpeed> for u8 {
    fn from(speed: GameSpeed) -> Self {
        speed.0
    }
}

/// How watchable a given speed is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedAdvice {
    /// Moves go by faster than most people can follow
    HardToFollow,
    /// The board should be hidden; only results are meaningful
    TooFastToDisplay,
}

/// What a pending turn does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnKind {
    /// One engine-vs-engine iteration
    EngineTurn,
    /// The engine's answer to a user move
    EngineReply,
    /// Start the next engine-vs-engine game
    Restart,
}

/// A scheduled turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTurn {
    pub kind: TurnKind,
    pub deadline: Instant,
}

/// Holder of the single pending turn
#[derive(Debug, Default)]
pub struct TurnTimer {
    pending: Option<PendingTurn>,
}

impl TurnTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` after `delay`, replacing anything already pending
    pub fn schedule(&mut self, kind: TurnKind, delay: Duration) -> PendingTurn {
        let turn = PendingTurn {
            kind,
            deadline: Instant::now() + delay,
        };
        if let Some(previous) = self.pending.replace(turn) {
            tracing::trace!(?previous, ?turn, "Replaced pending turn");
        }
        turn
    }

    /// Drop the pending turn, returning it
    pub fn cancel(&mut self) -> Option<PendingTurn> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<PendingTurn> {
        self.pending
    }

    /// Claim `turn` for execution. False when it was cancelled or
    /// superseded since it was handed out.
    pub fn take(&mut self, turn: PendingTurn) -> bool {
        if self.pending == Some(turn) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

/// Resolve when `turn` is due. Never resolves for `None`.
///
/// Cancel-safe: dropping the future loses nothing, the turn stays pending
/// in the controller.
pub async fn wait_for(turn: Option<PendingTurn>) -> PendingTurn {
    match turn {
        Some(turn) => {
            tokio::time::sleep_until(turn.deadline).await;
            turn
        }
        None => std::future::pending().await,
    }
}
