// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway to the chess backend bridge
//!
//! The bridge answers every endpoint with a loosely shaped JSON object
//! carrying a `status` field. [`ApiReply`] captures that shape; the
//! gateway turns it into the tagged reply types of
//! [`pichess_core::gateway`].

use crate::config::ClientConfig;
use async_trait::async_trait;
use pichess_core::gateway::{
    BackendGateway, Connectivity, EngineMove, EngineReply, GameStatus, GatewayError, MoveReply,
    MoveSubmission, SessionReady,
};
use pichess_core::{GameMode, GameSpeed, Piece, SessionConfig, Side, Snapshot, Square, Winner};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw reply body shared by all bridge endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiReply {
    pub status: Option<String>,
    pub message: Option<String>,
    pub board_state: Option<HashMap<String, Option<String>>>,
    pub current_player: Option<String>,
    pub move_accepted: Option<bool>,
    pub game_over: Option<bool>,
    pub winner: Option<String>,
    pub engine_move: Option<WireEngineMove>,
    pub white_connected: Option<bool>,
    pub black_connected: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireEngineMove {
    pub from: Option<String>,
    pub to: Option<String>,
    pub piece: Option<String>,
}

impl ApiReply {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }

    /// Board reported with the reply, if any
    pub fn snapshot(&self) -> Option<Snapshot> {
        let board = self.board_state.as_ref()?;
        Some(Snapshot::from_square_map(
            board
                .iter()
                .filter_map(|(square, piece)| Some((square.as_str(), piece.as_deref()?))),
        ))
    }

    pub fn side_to_move(&self) -> Option<Side> {
        self.current_player.as_deref().and_then(Side::from_name)
    }

    /// Winner when the reply says the game is over
    pub fn game_over(&self) -> Option<Winner> {
        self.game_over
            .unwrap_or(false)
            .then(|| Winner::from_backend(self.winner.as_deref()))
    }

    fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "no message from backend".to_string())
    }

    /// Error for a reply whose status is not `success`
    pub fn into_error(self) -> GatewayError {
        let message = self.message();
        if message.to_ascii_lowercase().contains("not initialized") {
            GatewayError::Fatal(message)
        } else {
            GatewayError::Rejected(message)
        }
    }

    fn into_ready(self) -> SessionReady {
        SessionReady {
            snapshot: self.snapshot(),
        }
    }

    /// Interpret a reply to a user move
    pub fn into_move_reply(self) -> Result<MoveReply, GatewayError> {
        if !self.is_success() || self.move_accepted == Some(false) {
            let err = self.into_error();
            return match err {
                GatewayError::Rejected(reason) => Ok(MoveReply::Rejected { reason }),
                other => Err(other),
            };
        }
        let snapshot = self
            .snapshot()
            .ok_or_else(|| GatewayError::Protocol("accepted move without board_state".into()))?;
        Ok(MoveReply::Accepted {
            snapshot,
            side_to_move: self.side_to_move(),
            game_over: self.game_over(),
        })
    }

    /// Interpret a reply to an engine move request
    pub fn into_engine_reply(self) -> Result<EngineReply, GatewayError> {
        if !self.is_success() {
            return Err(self.into_error());
        }
        let snapshot = self.snapshot();
        let game_over = self.game_over();

        let Some(wire) = &self.engine_move else {
            return match game_over {
                Some(winner) => Ok(EngineReply::GameOver { winner }),
                None => Err(GatewayError::Protocol("reply without engine_move".into())),
            };
        };

        let square = |name: &Option<String>, field: &str| {
            name.as_deref()
                .and_then(|s| s.parse::<Square>().ok())
                .ok_or_else(|| GatewayError::Protocol(format!("engine_move.{field} missing or invalid")))
        };
        let from = square(&wire.from, "from")?;
        let to = square(&wire.to, "to")?;
        // The bridge reports the piece as it stands after the move; fall back
        // to the destination square of the reported board
        let piece = wire
            .piece
            .as_deref()
            .and_then(Piece::from_code)
            .or_else(|| snapshot.as_ref().and_then(|board| board.piece_at(to)))
            .ok_or_else(|| GatewayError::Protocol("engine_move.piece missing or invalid".into()))?;

        Ok(EngineReply::Moved {
            mv: EngineMove { piece, from, to },
            snapshot,
            side_to_move: self.side_to_move(),
            game_over,
        })
    }

    /// Interpret a board-state reply
    pub fn into_game_status(self) -> Result<GameStatus, GatewayError> {
        if !self.is_success() {
            return Err(self.into_error());
        }
        Ok(match self.game_over() {
            Some(winner) => GameStatus::Over { winner },
            None => GameStatus::InProgress,
        })
    }

    /// Interpret a connectivity reply. Here `status` names the state.
    pub fn into_connectivity(self) -> Result<Connectivity, GatewayError> {
        match self.status.as_deref() {
            Some("connected") => Ok(Connectivity::Connected),
            Some("partial") => Ok(Connectivity::Partial),
            Some("disconnected") => Ok(Connectivity::Disconnected),
            other => Err(GatewayError::Protocol(format!("unknown connectivity status {:?}", other))),
        }
    }
}

/// Body of `POST /api/set-game-mode`
#[derive(Debug, Clone, Serialize)]
pub struct GameModeRequest {
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_elo: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_elo: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_nnue: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_nnue: Option<bool>,
}

impl GameModeRequest {
    pub fn new(mode: GameMode, config: &SessionConfig) -> Self {
        Self {
            mode: mode.as_str(),
            white_elo: config.white.map(|s| s.elo),
            black_elo: config.black.map(|s| s.elo),
            white_nnue: config.white.map(|s| s.nnue),
            black_nnue: config.black.map(|s| s.nnue),
        }
    }
}

/// Body of `POST /api/move`
#[derive(Debug, Clone, Serialize)]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    pub piece: String,
    pub move_number: u32,
}

impl From<&MoveSubmission> for MoveRequest {
    fn from(submission: &MoveSubmission) -> Self {
        Self {
            from: submission.from.to_string(),
            to: submission.to.to_string(),
            piece: submission.piece.code(),
            move_number: submission.ply,
        }
    }
}

/// [`BackendGateway`] over the bridge's JSON API
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pichess/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(&config.backend_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<ApiReply, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        read_reply(path, response).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiReply, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        read_reply(path, response).await
    }
}

fn transport_error(path: &str, err: reqwest::Error) -> GatewayError {
    debug!(path, "Request failed: {}", err);
    GatewayError::Unreachable(format!("{}: {}", path, err))
}

/// Parse a reply body. Error statuses still carry a usable body; only an
/// unreadable body on an error status counts as unreachable.
async fn read_reply(path: &str, response: reqwest::Response) -> Result<ApiReply, GatewayError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(path, e))?;

    match serde_json::from_str::<ApiReply>(&body) {
        Ok(reply) => {
            if !status.is_success() {
                debug!(path, %status, message = ?reply.message, "Backend returned error status");
            }
            Ok(reply)
        }
        Err(e) if status.is_success() => {
            warn!(path, "Unparseable backend reply: {}", e);
            Err(GatewayError::Protocol(format!("{}: {}", path, e)))
        }
        Err(_) => Err(GatewayError::Unreachable(format!("{}: HTTP {}", path, status))),
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    #[tracing::instrument(skip(self, config))]
    async fn configure_session(
        &self,
        mode: GameMode,
        config: &SessionConfig,
    ) -> Result<SessionReady, GatewayError> {
        let reply = self
            .post("/api/set-game-mode", &GameModeRequest::new(mode, config))
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(reply.into_ready())
    }

    #[tracing::instrument(skip(self))]
    async fn submit_move(&self, submission: &MoveSubmission) -> Result<MoveReply, GatewayError> {
        self.post("/api/move", &MoveRequest::from(submission))
            .await?
            .into_move_reply()
    }

    #[tracing::instrument(skip(self))]
    async fn request_engine_move(&self, speed: GameSpeed) -> Result<EngineReply, GatewayError> {
        self.post(
            "/api/engine-move",
            &serde_json::json!({ "game_speed": speed.value() }),
        )
        .await?
        .into_engine_reply()
    }

    async fn query_game_over(&self) -> Result<GameStatus, GatewayError> {
        self.get("/api/board-state").await?.into_game_status()
    }

    #[tracing::instrument(skip(self))]
    async fn reset_session(&self) -> Result<SessionReady, GatewayError> {
        let reply = self
            .post("/api/game-control", &serde_json::json!({ "command": "reset" }))
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(reply.into_ready())
    }

    async fn query_connectivity(&self) -> Result<Connectivity, GatewayError> {
        self.get("/api/pi-status").await?.into_connectivity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pichess_core::EngineSettings;
    use serde_json::json;

    fn reply(value: serde_json::Value) -> ApiReply {
        serde_json::from_value(value).unwrap()
    }

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_accepted_move() {
        let r = reply(json!({
            "status": "success",
            "move_accepted": true,
            "board_state": { "e4": "P", "e8": "k", "e1": "K" },
            "game_over": false,
            "winner": null,
            "current_player": "black"
        }));
        match r.into_move_reply().unwrap() {
            MoveReply::Accepted {
                snapshot,
                side_to_move,
                game_over,
            } => {
                assert_eq!(snapshot.piece_count(), 3);
                assert_eq!(snapshot.piece_at(sq("e4")), Piece::from_code("wP"));
                assert_eq!(side_to_move, Some(Side::Black));
                assert_eq!(game_over, None);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_rejected_and_fatal_moves() {
        let rejected = reply(json!({
            "status": "error",
            "message": "Failed to make move",
            "move_accepted": false
        }));
        assert_eq!(
            rejected.into_move_reply().unwrap(),
            MoveReply::Rejected {
                reason: "Failed to make move".into()
            }
        );

        let fatal = reply(json!({ "status": "error", "message": "Game not initialized" }));
        assert!(matches!(fatal.into_move_reply(), Err(GatewayError::Fatal(_))));
    }

    #[test]
    fn test_engine_reply_piece_fallback() {
        let r = reply(json!({
            "status": "success",
            "engine_move": { "from": "g8", "to": "f6", "piece": null, "san": "Nf6" },
            "board_state": { "f6": "n" },
            "game_over": true,
            "winner": "draw"
        }));
        match r.into_engine_reply().unwrap() {
            EngineReply::Moved { mv, game_over, .. } => {
                assert_eq!(mv.piece, Piece::from_code("bN").unwrap());
                assert_eq!(mv.from, sq("g8"));
                assert_eq!(game_over, Some(Winner::Draw));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_engine_reply_without_move() {
        let over = reply(json!({ "status": "success", "game_over": true, "winner": "white" }));
        assert_eq!(
            over.into_engine_reply().unwrap(),
            EngineReply::GameOver {
                winner: Winner::White
            }
        );

        let empty = reply(json!({ "status": "success" }));
        assert!(matches!(empty.into_engine_reply(), Err(GatewayError::Protocol(_))));

        let engine_down = reply(json!({ "status": "error", "message": "Chess engine not initialized" }));
        assert!(matches!(engine_down.into_engine_reply(), Err(GatewayError::Fatal(_))));
    }

    #[test]
    fn test_connectivity_status() {
        let r = reply(json!({ "status": "partial", "white_connected": false, "black_connected": true }));
        assert_eq!(r.into_connectivity().unwrap(), Connectivity::Partial);
        assert!(reply(json!({ "status": "success" })).into_connectivity().is_err());
    }

    #[test]
    fn test_game_mode_request_body() {
        let config = SessionConfig::human_vs_engine(EngineSettings::new(1900).with_nnue(true));
        let body = serde_json::to_value(GameModeRequest::new(GameMode::HumanVsEngine, &config)).unwrap();
        assert_eq!(
            body,
            json!({ "mode": "user_vs_cpu", "black_elo": 1900, "black_nnue": true })
        );
    }

    #[test]
    fn test_move_request_body() {
        let submission = MoveSubmission {
            from: sq("e2"),
            to: sq("e4"),
            piece: Piece::from_code("wP").unwrap(),
            ply: 1,
        };
        let body = serde_json::to_value(MoveRequest::from(&submission)).unwrap();
        assert_eq!(
            body,
            json!({ "from": "e2", "to": "e4", "piece": "wP", "move_number": 1 })
        );
    }
}
