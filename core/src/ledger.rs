// SPDX-License-Identifier: MIT OR Apache-2.0

//! Move ledger: the ordered record of confirmed moves

use crate::{Piece, Side, Square};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One confirmed ply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// The piece that moved
    pub piece: Piece,
    /// Origin square
    pub from: Square,
    /// Destination square
    pub to: Square,
    /// 1-based ply number, equal to the record's position in the ledger
    pub ply: u32,
    /// Side to move before this move was played
    pub side: Side,
}

impl fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{}", self.piece.glyph(), self.from, self.to)
    }
}

/// A numbered row of the move list: White's move and Black's reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePair<'a> {
    /// Move number, starting at 1
    pub number: u32,
    pub white: &'a MoveRecord,
    /// Absent while Black has not replied yet
    pub black: Option<&'a MoveRecord>,
}

/// Ordered sequence of confirmed moves.
///
/// The ledger is a record, not a rules authority: nothing here checks that a
/// move is legal.
#[derive(Debug, Clone, Default)]
pub struct MoveLedger {
    moves: Vec<MoveRecord>,
}

impl MoveLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a confirmed move and return the stored record
    pub fn record(&mut self, piece: Piece, from: Square, to: Square, side: Side) -> &MoveRecord {
        let ply = self.next_ply();
        self.moves.push(MoveRecord {
            piece,
            from,
            to,
            ply,
            side,
        });
        &self.moves[self.moves.len() - 1]
    }

    /// Ply number the next recorded move will carry
    pub fn next_ply(&self) -> u32 {
        self.moves.len() as u32 + 1
    }

    /// Number labelling the move pair the next move belongs to
    pub fn next_pair_number(&self) -> u32 {
        (self.moves.len() / 2) as u32 + 1
    }

    /// Move list rows in insertion order. Recomputed from the ledger on every
    /// call, so it can be restarted at will.
    pub fn pairs_for_display(&self) -> impl Iterator<Item = MovePair<'_>> + '_ {
        self.moves.chunks(2).enumerate().map(|(idx, pair)| MovePair {
            number: idx as u32 + 1,
            white: &pair[0],
            black: pair.get(1),
        })
    }

    /// Empty the ledger; numbering restarts at 1
    pub fn clear(&mut self) {
        self.moves.clear();
    }

    pub fn get(&self, index: usize) -> Option<&MoveRecord> {
        self.moves.get(index)
    }

    pub fn last(&self) -> Option<&MoveRecord> {
        self.moves.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoveRecord> {
        self.moves.iter()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}
