// SPDX-License-Identifier: MIT OR Apache-2.0

//! pichess Core - Game session model
//!
//! This crate provides the client-side game functionality including:
//! - Immutable board snapshots and the append-only snapshot history
//! - The move ledger and its move-pair display grouping
//! - The session state machine (phases, pause/resume, score tally)
//! - The engine-turn scheduler driving engine-vs-engine play
//! - The backend gateway interface the session delegates chess rules to
//!
//! No chess rules live here. Legality, move generation and game-over
//! detection all belong to the backend reached through [`gateway::BackendGateway`].

#![deny(unsafe_code)]
#![deny(clippy::all)]

pub mod controller;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Side in a chess game (White or Black)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// White player (always moves first)
    White,
    /// Black player
    Black,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Parse the backend's `current_player` / `winner` spelling
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Some(Side::White),
            "black" | "b" => Some(Side::Black),
            _ => None,
        }
    }

    fn code(&self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "White"),
            Side::Black => write!(f, "Black"),
        }
    }
}

/// Board coordinate, file `a..=h` and rank `1..=8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Create a square from zero-based file and rank, `None` when off the board
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then_some(Self { file, rank })
    }

    /// Zero-based file (0 = a)
    pub fn file(&self) -> u8 {
        self.file
    }

    /// Zero-based rank (0 = rank 1)
    pub fn rank(&self) -> u8 {
        self.rank
    }

    /// Index into a 64-entry board, a1 = 0, h8 = 63
    pub fn index(&self) -> usize {
        (self.rank as usize) * 8 + (self.file as usize)
    }

    /// Inverse of [`Square::index`]
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= 64 {
            return None;
        }
        Self::new((index % 8) as u8, (index / 8) as u8)
    }

    /// All 64 squares, a1 first
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).filter_map(Square::from_index)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl FromStr for Square {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 2 {
            return Err(ParseError::Square(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| ParseError::Square(s.to_string()))
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

impl TryFrom<String> for Square {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kind of chess piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

impl PieceKind {
    fn letter(&self) -> char {
        match self {
            PieceKind::King => 'K',
            PieceKind::Queen => 'Q',
            PieceKind::Rook => 'R',
            PieceKind::Bishop => 'B',
            PieceKind::Knight => 'N',
            PieceKind::Pawn => 'P',
        }
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'K' => Some(PieceKind::King),
            'Q' => Some(PieceKind::Queen),
            'R' => Some(PieceKind::Rook),
            'B' => Some(PieceKind::Bishop),
            'N' => Some(PieceKind::Knight),
            'P' => Some(PieceKind::Pawn),
            _ => None,
        }
    }
}

/// A piece identifier: side plus kind, written `wP`, `bK`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Piece {
    /// Owning side
    pub side: Side,
    /// Piece kind
    pub kind: PieceKind,
}

impl Piece {
    /// Create a new piece
    pub fn new(side: Side, kind: PieceKind) -> Self {
        Self { side, kind }
    }

    /// Parse either a two-letter code (`wP`, `bq`) or a FEN letter (`P`, `q`).
    pub fn from_code(code: &str) -> Option<Self> {
        let mut chars = code.trim().chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(letter), None, None) => {
                let kind = PieceKind::from_letter(letter)?;
                let side = if letter.is_ascii_uppercase() {
                    Side::White
                } else {
                    Side::Black
                };
                Some(Self::new(side, kind))
            }
            (Some(side), Some(letter), None) => {
                let side = match side {
                    'w' | 'W' => Side::White,
                    'b' | 'B' => Side::Black,
                    _ => return None,
                };
                Some(Self::new(side, PieceKind::from_letter(letter)?))
            }
            _ => None,
        }
    }

    /// Two-letter code, e.g. `wP`
    pub fn code(&self) -> String {
        format!("{}{}", self.side.code(), self.kind.letter())
    }

    /// FEN letter, uppercase for White
    pub fn fen_letter(&self) -> char {
        match self.side {
            Side::White => self.kind.letter(),
            Side::Black => self.kind.letter().to_ascii_lowercase(),
        }
    }

    /// Unicode chess glyph
    pub fn glyph(&self) -> char {
        match (self.side, self.kind) {
            (Side::White, PieceKind::King) => '♔',
            (Side::White, PieceKind::Queen) => '♕',
            (Side::White, PieceKind::Rook) => '♖',
            (Side::White, PieceKind::Bishop) => '♗',
            (Side::White, PieceKind::Knight) => '♘',
            (Side::White, PieceKind::Pawn) => '♙',
            (Side::Black, PieceKind::King) => '♚',
            (Side::Black, PieceKind::Queen) => '♛',
            (Side::Black, PieceKind::Rook) => '♜',
            (Side::Black, PieceKind::Bishop) => '♝',
            (Side::Black, PieceKind::Knight) => '♞',
            (Side::Black, PieceKind::Pawn) => '♟',
        }
    }

    /// Long name, e.g. "White Pawn"
    pub fn name(&self) -> String {
        let kind = match self.kind {
            PieceKind::King => "King",
            PieceKind::Queen => "Queen",
            PieceKind::Rook => "Rook",
            PieceKind::Bishop => "Bishop",
            PieceKind::Knight => "Knight",
            PieceKind::Pawn => "Pawn",
        };
        format!("{} {}", self.side, kind)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for Piece {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Piece::from_code(s).ok_or_else(|| ParseError::Piece(s.to_string()))
    }
}

impl From<Piece> for String {
    fn from(piece: Piece) -> Self {
        piece.code()
    }
}

impl TryFrom<String> for Piece {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Result of a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl Winner {
    /// Parse the backend's winner field. Anything that is not a side counts
    /// as a draw, including a missing winner.
    pub fn from_backend(winner: Option<&str>) -> Self {
        match winner.and_then(Side::from_name) {
            Some(Side::White) => Winner::White,
            Some(Side::Black) => Winner::Black,
            None => Winner::Draw,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::White => write!(f, "White"),
            Winner::Black => write!(f, "Black"),
            Winner::Draw => write!(f, "Draw"),
        }
    }
}

/// Errors parsing squares and pieces
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid square: {0:?}")]
    Square(String),

    #[error("Invalid piece code: {0:?}")]
    Piece(String),
}

/// Why an action was refused locally
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    #[error("no game has been started")]
    NotStarted,

    #[error("the game is paused")]
    Paused,

    #[error("waiting for the engine to move")]
    WaitingOnEngine,

    #[error("the game has ended")]
    Ended,

    #[error("moves are automatic in engine-vs-engine mode")]
    EngineMode,

    #[error("the backend is not connected")]
    Disconnected,

    #[error("a game is already in progress")]
    InProgress,
}

/// Errors that can occur while driving a session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Required mode parameters are missing
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Action attempted outside the phase that allows it
    #[error("Not ready: {0}")]
    NotReady(#[from] NotReady),

    /// The backend declared the move illegal
    #[error("Move rejected: {0}")]
    GatewayRejected(String),

    /// Network failure, timeout or unusable reply
    #[error("Backend unreachable: {0}")]
    GatewayUnreachable(String),

    /// The backend reported an unrecoverable condition
    #[error("Backend failure: {0}")]
    GatewayFatal(String),

    /// Snapshot lookup outside the stored history
    #[error("Snapshot {index} out of range ({len} stored)")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of stored snapshots
        len: usize,
    },
}

impl From<gateway::GatewayError> for SessionError {
    fn from(err: gateway::GatewayError) -> Self {
        use gateway::GatewayError;
        match err {
            GatewayError::Rejected(reason) => SessionError::GatewayRejected(reason),
            GatewayError::Unreachable(msg) | GatewayError::Protocol(msg) => {
                SessionError::GatewayUnreachable(msg)
            }
            GatewayError::Fatal(msg) => SessionError::GatewayFatal(msg),
        }
    }
}

// Re-exports for convenience
pub use controller::{ControllerOptions, SessionController, SessionEvent};
pub use gateway::{BackendGateway, Connectivity, EngineReply, GameStatus, GatewayError, MoveReply};
pub use ledger::{MoveLedger, MovePair, MoveRecord};
pub use scheduler::{GameSpeed, SchedulerConfig};
pub use session::{EngineSettings, GameMode, Phase, ScoreTally, Session, SessionConfig, ViewCursor};
pub use snapshot::{Snapshot, SnapshotStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_round_trips_through_names() {
        let e4: Square = "e4".parse().unwrap();
        assert_eq!(e4.file(), 4);
        assert_eq!(e4.rank(), 3);
        assert_eq!(e4.to_string(), "e4");
        assert_eq!(Square::from_index(e4.index()), Some(e4));
        assert!("i1".parse::<Square>().is_err());
        assert!("a9".parse::<Square>().is_err());
        assert!("e".parse::<Square>().is_err());
        assert_eq!(Square::all().count(), 64);
    }

    #[test]
    fn piece_codes_and_fen_letters() {
        let wp = Piece::from_code("wP").unwrap();
        assert_eq!(wp, Piece::new(Side::White, PieceKind::Pawn));
        assert_eq!(Piece::from_code("P"), Some(wp));
        assert_eq!(Piece::from_code("q"), Some(Piece::new(Side::Black, PieceKind::Queen)));
        assert_eq!(Piece::from_code("bN").unwrap().fen_letter(), 'n');
        assert_eq!(Piece::from_code("xK"), None);
        assert_eq!(Piece::from_code("wKK"), None);
        assert_eq!(wp.glyph(), '♙');
        assert_eq!(wp.name(), "White Pawn");
    }

    #[test]
    fn winner_defaults_to_draw() {
        assert_eq!(Winner::from_backend(Some("white")), Winner::White);
        assert_eq!(Winner::from_backend(Some("Black")), Winner::Black);
        assert_eq!(Winner::from_backend(Some("draw")), Winner::Draw);
        assert_eq!(Winner::from_backend(None), Winner::Draw);
    }

    #[test]
    fn piece_serializes_as_code() {
        let json = serde_json::to_string(&Piece::from_code("bK").unwrap()).unwrap();
        assert_eq!(json, "\"bK\"");
        let square: Square = serde_json::from_str("\"h8\"").unwrap();
        assert_eq!(square.index(), 63);
    }
}
