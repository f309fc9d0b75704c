// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend gateway interface
//!
//! The backend is the rules authority. Every reply it gives is turned into
//! one of the tagged types below at this boundary, so the session never has
//! to inspect loosely shaped responses.

use crate::scheduler::GameSpeed;
use crate::session::{GameMode, SessionConfig};
use crate::snapshot::Snapshot;
use crate::{Piece, Side, Square, Winner};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gateway failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The backend refused the request
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// Transport failure or timeout
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend cannot serve this session (e.g. not initialized)
    #[error("backend failure: {0}")]
    Fatal(String),

    /// A reply arrived but could not be understood
    #[error("unexpected backend reply: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Worth retrying after a backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unreachable(_) | GatewayError::Protocol(_))
    }
}

/// Result of configuring or resetting the backend session. A fresh game
/// always has White to move, so only the board is carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReady {
    /// Board the backend starts from, when reported
    pub snapshot: Option<Snapshot>,
}

/// A user move sent for validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSubmission {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    /// Ply number the move will take if accepted
    pub ply: u32,
}

/// Reply to a submitted user move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveReply {
    Accepted {
        snapshot: Snapshot,
        side_to_move: Option<Side>,
        /// Set when this move ended the game
        game_over: Option<Winner>,
    },
    Rejected {
        reason: String,
    },
}

/// A move chosen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMove {
    pub piece: Piece,
    pub from: Square,
    pub to: Square,
}

/// Reply to an engine move request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    Moved {
        mv: EngineMove,
        /// Board after the move; derived locally when absent
        snapshot: Option<Snapshot>,
        side_to_move: Option<Side>,
        game_over: Option<Winner>,
    },
    /// The game was already over; no move was made
    GameOver { winner: Winner },
}

/// Authoritative game status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress,
    Over { winner: Winner },
}

/// Backend connectivity as reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Connected,
    /// Only some of the backend's devices answer
    Partial,
    Disconnected,
}

impl Connectivity {
    /// Only full connectivity allows moves
    pub fn is_connected(&self) -> bool {
        matches!(self, Connectivity::Connected)
    }
}

/// The rules/engine backend
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Set up a new game on the backend
    async fn configure_session(
        &self,
        mode: GameMode,
        config: &SessionConfig,
    ) -> Result<SessionReady, GatewayError>;

    /// Ask the backend to validate and apply a user move
    async fn submit_move(&self, submission: &MoveSubmission) -> Result<MoveReply, GatewayError>;

    /// Ask the engine for its next move
    async fn request_engine_move(&self, speed: GameSpeed) -> Result<EngineReply, GatewayError>;

    /// Whether the current game is over
    async fn query_game_over(&self) -> Result<GameStatus, GatewayError>;

    /// Reset the backend game to the starting position
    async fn reset_session(&self) -> Result<SessionReady, GatewayError>;

    async fn query_connectivity(&self) -> Result<Connectivity, GatewayError>;
}
