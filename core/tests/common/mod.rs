// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted in-memory backend for session tests

#![allow(dead_code)]

use async_trait::async_trait;
use pichess_core::gateway::{
    BackendGateway, Connectivity, EngineMove, EngineReply, GameStatus, GatewayError, MoveReply,
    MoveSubmission, SessionReady,
};
use pichess_core::{
    ControllerOptions, EngineSettings, GameMode, GameSpeed, Piece, SchedulerConfig,
    SessionConfig, SessionController, Snapshot, Winner,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Number of calls seen per gateway operation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub configure: usize,
    pub submit: usize,
    pub engine_move: usize,
    pub game_over: usize,
    pub reset: usize,
    pub connectivity: usize,
}

#[derive(Default)]
struct Script {
    submits: VecDeque<Result<MoveReply, GatewayError>>,
    engine_moves: VecDeque<Result<EngineReply, GatewayError>>,
    statuses: VecDeque<Result<GameStatus, GatewayError>>,
    resets: VecDeque<Result<SessionReady, GatewayError>>,
    connectivity: VecDeque<Result<Connectivity, GatewayError>>,
    calls: CallCounts,
    submissions: Vec<MoveSubmission>,
    speeds: Vec<GameSpeed>,
}

/// Gateway that replays queued replies.
///
/// With nothing queued: user moves are accepted (the board is tracked by
/// relocating pieces), the game is in progress, resets succeed, the backend
/// is connected, and engine move requests fail as unreachable.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    board: Mutex<Option<Snapshot>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(&self, reply: Result<MoveReply, GatewayError>) {
        self.script.lock().unwrap().submits.push_back(reply);
    }

    pub fn push_engine(&self, reply: Result<EngineReply, GatewayError>) {
        self.script.lock().unwrap().engine_moves.push_back(reply);
    }

    pub fn push_engine_move(&self, piece: &str, from: &str, to: &str) {
        self.push_engine(Ok(engine_move(piece, from, to, None)));
    }

    pub fn push_status(&self, reply: Result<GameStatus, GatewayError>) {
        self.script.lock().unwrap().statuses.push_back(reply);
    }

    pub fn push_reset(&self, reply: Result<SessionReady, GatewayError>) {
        self.script.lock().unwrap().resets.push_back(reply);
    }

    pub fn push_connectivity(&self, reply: Result<Connectivity, GatewayError>) {
        self.script.lock().unwrap().connectivity.push_back(reply);
    }

    pub fn calls(&self) -> CallCounts {
        self.script.lock().unwrap().calls
    }

    pub fn submissions(&self) -> Vec<MoveSubmission> {
        self.script.lock().unwrap().submissions.clone()
    }

    pub fn speeds(&self) -> Vec<GameSpeed> {
        self.script.lock().unwrap().speeds.clone()
    }

    fn board(&self) -> Snapshot {
        self.board
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(Snapshot::starting_position)
    }
}

#[async_trait]
impl BackendGateway for ScriptedGateway {
    async fn configure_session(
        &self,
        _mode: GameMode,
        _config: &SessionConfig,
    ) -> Result<SessionReady, GatewayError> {
        self.script.lock().unwrap().calls.configure += 1;
        *self.board.lock().unwrap() = Some(Snapshot::starting_position());
        Ok(SessionReady {
            snapshot: Some(Snapshot::starting_position()),
        })
    }

    async fn submit_move(&self, submission: &MoveSubmission) -> Result<MoveReply, GatewayError> {
        let scripted = {
            let mut script = self.script.lock().unwrap();
            script.calls.submit += 1;
            script.submissions.push(*submission);
            script.submits.pop_front()
        };
        match scripted {
            Some(reply) => reply,
            None => {
                let next = self.board().with_move(submission.from, submission.to);
                *self.board.lock().unwrap() = Some(next.clone());
                Ok(MoveReply::Accepted {
                    snapshot: next,
                    side_to_move: None,
                    game_over: None,
                })
            }
        }
    }

    async fn request_engine_move(&self, speed: GameSpeed) -> Result<EngineReply, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.calls.engine_move += 1;
        script.speeds.push(speed);
        script
            .engine_moves
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Unreachable("no scripted engine move".into())))
    }

    async fn query_game_over(&self) -> Result<GameStatus, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.calls.game_over += 1;
        script.statuses.pop_front().unwrap_or(Ok(GameStatus::InProgress))
    }

    async fn reset_session(&self) -> Result<SessionReady, GatewayError> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.reset += 1;
            script.resets.pop_front()
        };
        *self.board.lock().unwrap() = Some(Snapshot::starting_position());
        reply.unwrap_or_else(|| {
            Ok(SessionReady {
                snapshot: Some(Snapshot::starting_position()),
            })
        })
    }

    async fn query_connectivity(&self) -> Result<Connectivity, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.calls.connectivity += 1;
        script
            .connectivity
            .pop_front()
            .unwrap_or(Ok(Connectivity::Connected))
    }
}

/// An engine reply without a board; the client derives the snapshot
pub fn engine_move(piece: &str, from: &str, to: &str, game_over: Option<Winner>) -> EngineReply {
    EngineReply::Moved {
        mv: EngineMove {
            piece: Piece::from_code(piece).unwrap(),
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
        },
        snapshot: None,
        side_to_move: None,
        game_over,
    }
}

pub fn sq(name: &str) -> pichess_core::Square {
    name.parse().unwrap()
}

pub fn piece(code: &str) -> Piece {
    Piece::from_code(code).unwrap()
}

pub fn options(auto_restart: bool) -> ControllerOptions {
    ControllerOptions {
        scheduler: SchedulerConfig::default(),
        speed: GameSpeed::new(10),
        auto_restart,
    }
}

pub fn controller(auto_restart: bool) -> SessionController<ScriptedGateway> {
    SessionController::new(ScriptedGateway::new(), options(auto_restart))
}

pub fn engine_config() -> SessionConfig {
    SessionConfig::engine_vs_engine(EngineSettings::default(), EngineSettings::new(2200))
}

pub fn human_config() -> SessionConfig {
    SessionConfig::human_vs_engine(EngineSettings::default())
}
