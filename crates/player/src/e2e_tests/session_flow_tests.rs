//! Full client flows over a real socket.

use std::time::Duration;

use serde_json::json;

use super::*;
use crate::application::dispatcher::DispatchError;
use crate::application::dto::FormSubmission;
use crate::infrastructure::messaging::ConnectionState;
use crate::infrastructure::websocket::SessionError;
use crate::ports::outbound::storage_keys;
use crate::state::SessionPhase;

#[tokio::test]
async fn test_new_player_joins_and_answers_prompt() {
    let server = FakeServer::bind().await;
    let client = start_client(&server, None);
    let mut snapshots = client.handle.subscribe();

    let mut ws = server.accept().await;
    wait_for_snapshot(&mut snapshots, |s| {
        s.connection == ConnectionState::Connected
    })
    .await;

    client
        .handle
        .on_submit_form(FormSubmission::join_game("g1", " bob "))
        .await
        .unwrap();
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "join_game", "game_id": "g1", "player_name": "bob"})
    );

    send_json(&mut ws, json!({"type": "game_id", "game_id": "g1"})).await;
    send_json(&mut ws, json!({"type": "player_id", "player_id": "p1"})).await;
    send_json(&mut ws, json!({"type": "game_begun"})).await;
    send_json(
        &mut ws,
        json!({"type": "state_update", "updates": {
            "players": ["alice", "bob", "carol", "dave", "erin"],
            "president": "alice",
            "identity": "liberal"
        }}),
    )
    .await;
    send_json(
        &mut ws,
        json!({"type": "prompt", "action": "vote", "prompt": "vote for chancellor",
               "choices": ["ja", "nein"]}),
    )
    .await;

    let snapshot = wait_for_snapshot(&mut snapshots, |s| s.state.prompt().is_some()).await;
    assert_eq!(snapshot.state.phase(), SessionPhase::InGame);
    assert_eq!(snapshot.state.roster().live_players.len(), 5);
    assert_eq!(snapshot.state.roster().president.as_deref(), Some("alice"));
    assert_eq!(snapshot.state.secret_role(), Some("liberal"));
    assert!(snapshot.awaiting_answer());
    assert_eq!(
        client.identity.load(storage_keys::PLAYER_ID),
        Some("p1".to_string())
    );

    client.handle.on_user_choice("nein").await.unwrap();
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "user_action", "action": "vote", "choice": "nein"})
    );

    let second = client.handle.on_user_choice("ja").await;
    assert!(matches!(
        second,
        Err(SessionError::Rejected(DispatchError::AlreadySubmitted { epoch: 1 }))
    ));
    assert!(!sends_within(&mut ws, Duration::from_millis(200)).await);

    client.handle.stop().await;
}

#[tokio::test]
async fn test_stored_identity_reconnects_first() {
    let server = FakeServer::bind().await;
    let client = start_client(&server, Some(("g1", "p1")));

    let mut ws = server.accept().await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "reconnect", "game_id": "g1", "player_id": "p1"})
    );

    client.handle.stop().await;
}

#[tokio::test]
async fn test_dropped_socket_reconnects_with_identity() {
    let server = FakeServer::bind().await;
    let client = start_client(&server, None);
    let mut snapshots = client.handle.subscribe();

    let mut ws = server.accept().await;
    send_json(&mut ws, json!({"type": "game_id", "game_id": "g7"})).await;
    send_json(&mut ws, json!({"type": "player_id", "player_id": "p7"})).await;
    send_json(
        &mut ws,
        json!({"type": "state_update", "updates": {"liberal_progress": 2}}),
    )
    .await;
    wait_for_snapshot(&mut snapshots, |s| s.state.board().liberal_progress == 2).await;

    drop(ws);

    let mut ws = server.accept().await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "reconnect", "game_id": "g7", "player_id": "p7"})
    );

    // State survives the reconnect.
    let snapshot = wait_for_snapshot(&mut snapshots, |s| {
        s.connection == ConnectionState::Connected
    })
    .await;
    assert_eq!(snapshot.state.board().liberal_progress, 2);
    assert_eq!(snapshot.state.phase(), SessionPhase::AwaitingStart);
    assert!(client.handle.connection().is_connected());

    client.handle.stop().await;
}

#[tokio::test]
async fn test_stop_leaves_no_retry_behind() {
    let server = FakeServer::bind().await;
    let client = start_client(&server, None);

    let ws = server.accept().await;
    let observer = client.handle.connection();
    client.handle.stop().await;
    drop(ws);

    assert_eq!(observer.state(), ConnectionState::Disconnected);
    assert!(!server.connects_within(Duration::from_millis(300)).await);
}

#[tokio::test]
async fn test_stop_sends_close_frame() {
    let server = FakeServer::bind().await;
    let client = start_client(&server, None);
    let mut snapshots = client.handle.subscribe();

    let mut ws = server.accept().await;
    wait_for_snapshot(&mut snapshots, |s| {
        s.connection == ConnectionState::Connected
    })
    .await;

    client.handle.stop().await;
    assert!(closes_within(&mut ws, STEP_TIMEOUT).await);
}

#[tokio::test]
async fn test_refused_reconnect_falls_back_to_join() {
    let server = FakeServer::bind().await;
    let client = start_client(&server, Some(("gone", "p0")));
    let mut snapshots = client.handle.subscribe();

    let mut ws = server.accept().await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "reconnect", "game_id": "gone", "player_id": "p0"})
    );
    send_json(&mut ws, json!({"type": "error", "msg": "Game does not exist."})).await;

    wait_for_snapshot(&mut snapshots, |s| !s.state.event_log().is_empty()).await;
    assert_eq!(client.identity.load(storage_keys::GAME_ID), None);
    assert_eq!(client.identity.load(storage_keys::PLAYER_ID), None);

    client
        .handle
        .on_submit_form(FormSubmission::join_game("g2", "bob"))
        .await
        .unwrap();
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "join_game", "game_id": "g2", "player_name": "bob"})
    );

    client.handle.stop().await;
}

#[tokio::test]
async fn test_malformed_frames_are_survived() {
    let server = FakeServer::bind().await;
    let client = start_client(&server, None);
    let mut snapshots = client.handle.subscribe();

    let mut ws = server.accept().await;
    send_json(&mut ws, json!("just a string")).await;
    send_json(&mut ws, json!({"type": "prompt", "action": "vote"})).await;
    send_json(&mut ws, json!({"type": "error", "msg": "Game is full"})).await;

    let snapshot = wait_for_snapshot(&mut snapshots, |s| !s.state.event_log().is_empty()).await;
    assert!(snapshot.state.prompt().is_none());
    assert_eq!(snapshot.connection, ConnectionState::Connected);
    assert_eq!(
        snapshot.state.event_log().latest().map(|e| e.is_error),
        Some(true)
    );

    client.handle.stop().await;
}
