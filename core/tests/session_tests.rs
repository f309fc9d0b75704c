// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-vs-engine sessions driven through the controller

mod common;

use common::*;
use pichess_core::gateway::{GatewayError, MoveReply};
use pichess_core::{
    GameMode, NotReady, Phase, ScoreTally, SessionError, SessionEvent, Side, Snapshot, ViewCursor,
    Winner,
};

#[tokio::test]
async fn test_start_rejects_missing_engine_settings() {
    let mut ctl = controller(true);
    let err = ctl
        .start(GameMode::EngineVsEngine, human_config())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidConfig(_)));
    assert_eq!(ctl.session().phase(), Phase::NotStarted);
    // Refused locally, the backend is never asked
    assert_eq!(ctl.gateway().calls().configure, 0);
}

#[tokio::test]
async fn test_first_accepted_move_is_ply_one() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    assert_eq!(ctl.session().phase(), Phase::AwaitingMove);
    assert_eq!(ctl.session().snapshots().len(), 1);

    let record = ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    assert_eq!(record.piece, piece("wP"));
    assert_eq!(record.from, sq("e2"));
    assert_eq!(record.to, sq("e4"));
    assert_eq!(record.ply, 1);
    assert_eq!(record.side, Side::White);

    assert_eq!(ctl.gateway().submissions()[0].ply, 1);
    assert_eq!(ctl.session().phase(), Phase::WaitingOnEngine);
    assert_eq!(ctl.session().side_to_move(), Side::Black);
    assert_eq!(ctl.session().ledger().len(), 1);
    assert_eq!(ctl.session().snapshots().len(), 2);
}

#[tokio::test]
async fn test_rejected_move_changes_nothing() {
    let mut ctl = controller(true);
    let mut events = ctl.subscribe();
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();

    ctl.gateway().push_submit(Ok(MoveReply::Rejected {
        reason: "Illegal move".into(),
    }));
    let err = ctl.submit_move(sq("e2"), sq("e5"), piece("wP")).await.unwrap_err();
    assert_eq!(err, SessionError::GatewayRejected("Illegal move".into()));

    assert_eq!(ctl.session().ledger().len(), 0);
    assert_eq!(ctl.session().snapshots().len(), 1);
    assert_eq!(ctl.session().phase(), Phase::AwaitingMove);
    assert!(ctl.next_due().is_none());

    assert!(matches!(events.recv().await.unwrap(), SessionEvent::Started { .. }));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::MoveRejected { .. }
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_one_shot_error() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.gateway()
        .push_submit(Err(GatewayError::Unreachable("timeout".into())));

    let err = ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap_err();
    assert!(matches!(err, SessionError::GatewayUnreachable(_)));
    assert_eq!(ctl.session().ledger().len(), 0);

    // Still the user's move
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    assert_eq!(ctl.session().ledger().len(), 1);
}

#[tokio::test]
async fn test_submit_refused_outside_awaiting_move() {
    let mut ctl = controller(true);
    let err = ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap_err();
    assert_eq!(err, SessionError::NotReady(NotReady::NotStarted));

    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    let err = ctl.submit_move(sq("d2"), sq("d4"), piece("wP")).await.unwrap_err();
    assert_eq!(err, SessionError::NotReady(NotReady::WaitingOnEngine));
    assert_eq!(ctl.gateway().calls().submit, 1);
}

#[tokio::test(start_paused = true)]
async fn test_engine_replies_after_user_move() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();

    ctl.gateway().push_engine_move("bP", "e7", "e5");
    assert!(ctl.step().await);

    let session = ctl.session();
    assert_eq!(session.phase(), Phase::AwaitingMove);
    assert_eq!(session.side_to_move(), Side::White);
    assert_eq!(session.ledger().len(), 2);
    assert_eq!(session.snapshots().len(), 3);

    // The board was derived locally from the engine's move
    let latest = session.snapshots().latest().unwrap();
    assert_eq!(latest.piece_at(sq("e5")), Some(piece("bP")));
    assert_eq!(latest.piece_at(sq("e7")), None);
    assert_eq!(latest.piece_at(sq("e4")), Some(piece("wP")));

    let pairs: Vec<_> = session.ledger().pairs_for_display().collect();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].white.to_string(), "♙ e2-e4");
    assert_eq!(pairs[0].black.unwrap().to_string(), "♟ e7-e5");
}

#[tokio::test]
async fn test_move_that_ends_game_updates_tally() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.gateway().push_submit(Ok(MoveReply::Accepted {
        snapshot: Snapshot::starting_position().with_move(sq("d1"), sq("h5")),
        side_to_move: Some(Side::Black),
        game_over: Some(Winner::White),
    }));

    ctl.submit_move(sq("d1"), sq("h5"), piece("wQ")).await.unwrap();
    assert_eq!(ctl.session().phase(), Phase::Ended);
    assert_eq!(ctl.session().tally().white, 1);
    // No engine reply and no auto-restart in human games
    assert!(ctl.next_due().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_round_trip() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    ctl.gateway().push_engine_move("bP", "e7", "e5");
    ctl.step().await;
    ctl.submit_move(sq("g1"), sq("f3"), piece("wN")).await.unwrap();

    assert_eq!(ctl.session().view_index(), Some(3));
    assert!(ctl.view_previous());
    let interior = ctl.session().viewed_snapshot().unwrap().clone();
    assert!(ctl.view_previous());
    assert!(ctl.view_next());
    assert_eq!(ctl.session().viewed_snapshot(), Some(&interior));

    // Clamped at both ends
    while ctl.view_previous() {}
    assert_eq!(ctl.session().view_index(), Some(0));
    assert!(!ctl.view_previous());
    ctl.view_latest();
    assert_eq!(ctl.session().cursor(), ViewCursor::Latest);
    assert!(!ctl.view_next());
}

#[tokio::test]
async fn test_pause_blocks_moves_and_resume_restores() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.pause().unwrap();
    ctl.pause().unwrap();
    assert!(ctl.session().is_paused());

    let err = ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap_err();
    assert_eq!(err, SessionError::NotReady(NotReady::Paused));

    ctl.resume().unwrap();
    assert_eq!(ctl.session().phase(), Phase::AwaitingMove);
    assert!(ctl.next_due().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pause_while_engine_to_move_defers_reply() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    assert!(ctl.next_due().is_some());

    ctl.pause().unwrap();
    assert!(ctl.next_due().is_none());

    ctl.resume().unwrap();
    ctl.gateway().push_engine_move("bP", "e7", "e5");
    assert!(ctl.step().await);
    assert_eq!(ctl.gateway().calls().engine_move, 1);
    assert_eq!(ctl.session().phase(), Phase::AwaitingMove);
}

#[tokio::test]
async fn test_reset_keeps_tally_interrupt_clears() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.gateway().push_submit(Ok(MoveReply::Accepted {
        snapshot: Snapshot::starting_position(),
        side_to_move: None,
        game_over: Some(Winner::Draw),
    }));
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    assert_eq!(ctl.session().tally().draws, 1);

    ctl.reset().await.unwrap();
    assert_eq!(ctl.session().phase(), Phase::NotStarted);
    assert_eq!(ctl.session().tally().draws, 1);
    assert!(ctl.session().ledger().is_empty());
    assert!(ctl.session().snapshots().is_empty());

    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    ctl.interrupt();
    assert_eq!(ctl.session().phase(), Phase::NotStarted);
    assert_eq!(ctl.session().tally(), ScoreTally::default());
    assert!(ctl.next_due().is_none());
}

#[tokio::test]
async fn test_reset_clears_locally_when_backend_down() {
    let mut ctl = controller(true);
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();
    ctl.gateway()
        .push_reset(Err(GatewayError::Unreachable("connection refused".into())));

    assert!(ctl.reset().await.is_err());
    assert_eq!(ctl.session().phase(), Phase::NotStarted);
    assert!(ctl.session().ledger().is_empty());
}

#[tokio::test]
async fn test_connectivity_gates_moves() {
    use pichess_core::Connectivity;

    let mut ctl = controller(true);
    let mut events = ctl.subscribe();
    ctl.start(GameMode::HumanVsEngine, human_config()).await.unwrap();

    ctl.gateway().push_connectivity(Ok(Connectivity::Partial));
    assert!(!ctl.poll_connectivity().await);
    let err = ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap_err();
    assert_eq!(err, SessionError::NotReady(NotReady::Disconnected));

    ctl.gateway()
        .push_connectivity(Err(GatewayError::Unreachable("down".into())));
    assert!(!ctl.poll_connectivity().await);

    assert!(ctl.poll_connectivity().await);
    ctl.submit_move(sq("e2"), sq("e4"), piece("wP")).await.unwrap();

    let mut changes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ConnectivityChanged { connected } = event {
            changes.push(connected);
        }
    }
    // Only transitions are broadcast
    assert_eq!(changes, vec![false, true]);
}
