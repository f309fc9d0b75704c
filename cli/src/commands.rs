// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of interactive commands

use anyhow::{anyhow, bail, Result};
use pichess_core::{GameMode, Square};

/// A line of user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move the piece on `from` to `to`
    Move { from: Square, to: Square },
    Previous,
    Next,
    Latest,
    Pause,
    Resume,
    Speed(u8),
    Reset,
    Interrupt,
    /// Start a game, optionally switching mode
    Start(Option<GameMode>),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  e2e4 | e2 e4     move the piece on e2 to e4
  prev | next      step through the game history
  latest           back to the current position
  pause | resume   suspend or continue play
  speed <1-20>     engine-vs-engine speed
  start [hve|eve]  start a game (human-vs-engine or engine-vs-engine)
  reset            new game, score kept
  interrupt        abandon the session, score cleared
  status           show the status line
  quit";

/// Parse one input line
pub fn parse_command(input: &str) -> Result<Command> {
    let input = input.trim().to_lowercase();
    let mut words = input.split_whitespace();
    let Some(first) = words.next() else {
        bail!("Empty command");
    };
    let rest: Vec<&str> = words.collect();

    let command = match (first, rest.as_slice()) {
        ("prev" | "p" | "back", []) => Command::Previous,
        ("next" | "n" | "forward", []) => Command::Next,
        ("latest" | "live", []) => Command::Latest,
        ("pause", []) => Command::Pause,
        ("resume" | "continue", []) => Command::Resume,
        ("speed", [value]) => {
            let speed = value
                .parse::<u8>()
                .map_err(|_| anyhow!("Speed must be a number between 1 and 20"))?;
            Command::Speed(speed)
        }
        ("reset", []) => Command::Reset,
        ("interrupt", []) => Command::Interrupt,
        ("start", []) => Command::Start(None),
        ("start", [mode]) => Command::Start(Some(parse_mode(mode)?)),
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (from, [to]) => Command::Move {
            from: from.parse()?,
            to: to.parse()?,
        },
        (word, []) if word.len() == 4 && word.is_ascii() => Command::Move {
            from: word[..2].parse()?,
            to: word[2..].parse()?,
        },
        _ => bail!("Unknown command '{}'. Type 'help' for a list.", input),
    };
    Ok(command)
}

fn parse_mode(mode: &str) -> Result<GameMode> {
    match mode {
        "hve" | "human" | "user_vs_cpu" => Ok(GameMode::HumanVsEngine),
        "eve" | "engine" | "cpu_vs_cpu" => Ok(GameMode::EngineVsEngine),
        other => Err(anyhow!("Unknown mode '{}': use hve or eve", other)),
    }
}
