// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text rendering for the CLI.

use pichess_core::scheduler::SpeedAdvice;
use pichess_core::{GameMode, GameSpeed, MoveLedger, MoveRecord, Phase, Session, Snapshot, Square};

/// Render a snapshot as an 8x8 grid, rank 8 at the top
pub fn render_board(snapshot: &Snapshot) -> String {
    let mut output = String::new();
    let files = "   a b c d e f g h\n";

    output.push_str(files);
    for rank in (0..8u8).rev() {
        output.push_str(&format!("{}  ", rank + 1));
        for file in 0..8u8 {
            let symbol = Square::new(file, rank)
                .and_then(|sq| snapshot.piece_at(sq))
                .map(|piece| piece.glyph())
                .unwrap_or_else(|| empty_square(file, rank));
            output.push(symbol);
            output.push(' ');
        }
        output.push_str(&format!(" {}\n", rank + 1));
    }
    output.push_str(files);

    output
}

/// Light squares as '.', dark squares as ':'
fn empty_square(file: u8, rank: u8) -> char {
    if (file + rank) % 2 == 0 {
        ':'
    } else {
        '.'
    }
}

/// Move list, one numbered pair per line: `1. ♙ e2-e4  ♟ e7-e5`
pub fn render_moves(ledger: &MoveLedger) -> String {
    ledger
        .pairs_for_display()
        .map(|pair| match pair.black {
            Some(black) => format!("{}. {}  {}", pair.number, pair.white, black),
            None => format!("{}. {}", pair.number, pair.white),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single move as it is played, numbered by ply: `3. ♘ g1-f3`
pub fn render_move_line(record: &MoveRecord) -> String {
    format!("{}. {}", record.ply, record)
}

/// One-line session summary
pub fn render_status(session: &Session, speed: GameSpeed) -> String {
    let phase = match session.phase() {
        Phase::NotStarted => "not started",
        Phase::AwaitingMove => "your move",
        Phase::WaitingOnEngine => "engine thinking",
        Phase::Paused => "paused",
        Phase::Ended => "game over",
    };

    let mut parts = vec![phase.to_string()];
    if let Some(mode) = session.mode() {
        parts.push(mode.to_string());
    }
    if session.phase().is_running() || session.is_paused() {
        parts.push(format!("{} to move", session.side_to_move()));
    }
    if let Some(idx) = session.view_index() {
        parts.push(format!("viewing {} of {}", idx + 1, session.snapshots().len()));
    }
    if session.mode() == Some(GameMode::EngineVsEngine) {
        parts.push(format!("speed {}", speed.value()));
    }
    parts.push(if session.is_connected() {
        "connected".to_string()
    } else {
        "disconnected".to_string()
    });
    parts.push(format!("score {}", session.tally()));

    parts.join(" | ")
}

/// Whether the board should be drawn at this speed
pub fn board_visible(session: &Session, speed: GameSpeed) -> bool {
    match session.mode() {
        Some(mode) => speed.advice(mode) != Some(SpeedAdvice::TooFastToDisplay),
        None => true,
    }
}
