// SPDX-License-Identifier: MIT OR Apache-2.0

//! Board snapshots and the append-only snapshot history

use crate::{Piece, PieceKind, SessionError, Side, Square};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// Full board position at one ply. Cheap to clone, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    squares: Arc<[Option<Piece>; 64]>,
}

impl Snapshot {
    /// An empty board
    pub fn empty() -> Self {
        Self {
            squares: Arc::new([None; 64]),
        }
    }

    /// The standard starting position
    pub fn starting_position() -> Self {
        const BACK_RANK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];

        let mut squares = [None; 64];
        for (file, kind) in BACK_RANK.iter().enumerate() {
            squares[file] = Some(Piece::new(Side::White, *kind));
            squares[8 + file] = Some(Piece::new(Side::White, PieceKind::Pawn));
            squares[48 + file] = Some(Piece::new(Side::Black, PieceKind::Pawn));
            squares[56 + file] = Some(Piece::new(Side::Black, *kind));
        }
        Self {
            squares: Arc::new(squares),
        }
    }

    /// Build a snapshot from explicit placements
    pub fn from_pieces<I>(pieces: I) -> Self
    where
        I: IntoIterator<Item = (Square, Piece)>,
    {
        let mut squares = [None; 64];
        for (square, piece) in pieces {
            squares[square.index()] = Some(piece);
        }
        Self {
            squares: Arc::new(squares),
        }
    }

    /// Build a snapshot from a square-name to piece-code mapping, the shape
    /// the backend reports board state in. Entries that do not name a real
    /// square or piece are skipped.
    pub fn from_square_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pieces = entries.into_iter().filter_map(|(square, code)| {
            let parsed = square
                .as_ref()
                .parse::<Square>()
                .ok()
                .zip(Piece::from_code(code.as_ref()));
            if parsed.is_none() {
                tracing::debug!(
                    square = square.as_ref(),
                    code = code.as_ref(),
                    "Skipping unrecognised board entry"
                );
            }
            parsed
        });
        Self::from_pieces(pieces)
    }

    /// Piece on a square, if any
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    /// Occupied squares in a1..h8 order
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter_map(|(idx, piece)| Some((Square::from_index(idx)?, (*piece)?)))
    }

    /// Number of pieces on the board
    pub fn piece_count(&self) -> usize {
        self.squares.iter().filter(|p| p.is_some()).count()
    }

    /// A new snapshot with whatever stands on `from` relocated to `to`.
    ///
    /// Used only when the backend reports an engine move without a board;
    /// no legality is implied.
    pub fn with_move(&self, from: Square, to: Square) -> Self {
        let mut squares = *self.squares;
        let moving = squares[from.index()].take();
        if moving.is_some() {
            squares[to.index()] = moving;
        }
        Self {
            squares: Arc::new(squares),
        }
    }

    /// Piece placement field of a FEN string
    pub fn placement(&self) -> String {
        let mut out = String::with_capacity(72);
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                let piece = Square::new(file, rank).and_then(|sq| self.piece_at(sq));
                match piece {
                    Some(piece) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.fen_letter());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::starting_position()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Snapshot").field(&self.placement()).finish()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.piece_count()))?;
        for (square, piece) in self.pieces() {
            map.serialize_entry(&square.to_string(), &piece.code())?;
        }
        map.end()
    }
}

/// Append-only history of snapshots, one per ply plus the initial position
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshots: Vec<Snapshot>,
}

impl SnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot; it becomes the latest
    pub fn append(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    /// Snapshot at `index`
    pub fn get(&self, index: usize) -> Result<&Snapshot, SessionError> {
        self.snapshots.get(index).ok_or(SessionError::OutOfRange {
            index,
            len: self.snapshots.len(),
        })
    }

    /// Index of the latest snapshot, `None` when empty
    pub fn latest_index(&self) -> Option<usize> {
        self.snapshots.len().checked_sub(1)
    }

    /// The latest snapshot
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Drop the whole history
    pub(crate) fn clear(&mut self) {
        self.snapshots.clear();
    }
}
