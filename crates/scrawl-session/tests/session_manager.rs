//! Integration tests for session lifecycle: start gating, disconnect
//! grace windows, reconnection state push, and teardown.
//!
//! Timers (2s first-round delay, 30s grace, 40s rounds) run under paused
//! time.

use std::sync::Arc;
use std::time::Duration;

use scrawl_grace::{GraceConfig, GraceScheduler};
use scrawl_protocol::{
    ChannelBroadcaster, ConnId, PlayerId, RoomCode, RoundEndReason, ServerEvent, SessionId,
    UserChannel,
};
use scrawl_round::{RoundConfig, RoundEngine, WordSource};
use scrawl_session::{SessionError, SessionManager};
use scrawl_store::{CanvasStore, MemoryCanvas, MemoryStore, Room, RoomMembership, RoomStatus, Store};
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Helpers
// =========================================================================

struct FixedWord;

impl WordSource for FixedWord {
    fn pick(&self) -> String {
        "castle".to_string()
    }
}

struct Harness {
    manager: Arc<SessionManager>,
    store: Arc<MemoryStore>,
    bus: Arc<ChannelBroadcaster>,
    canvas: Arc<MemoryCanvas>,
    room: RoomCode,
}

fn harness(players: &[(u64, &str)]) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let canvas = Arc::new(MemoryCanvas::new());
    let bus = Arc::new(ChannelBroadcaster::new());
    let room = RoomCode::from("654321");

    store
        .insert_room(Room::new(room.clone(), PlayerId(players[0].0)))
        .unwrap();
    for (id, name) in players {
        store
            .insert_membership(RoomMembership::new(
                room.clone(),
                PlayerId(*id),
                name.to_string(),
                ConnId(format!("conn-{id}")),
            ))
            .unwrap();
    }

    let rounds = Arc::new(RoundEngine::new(
        RoundConfig::default(),
        store.clone(),
        canvas.clone(),
        Arc::new(FixedWord),
        bus.clone(),
    ));
    let manager = Arc::new(SessionManager::new(
        store.clone(),
        canvas.clone(),
        bus.clone(),
        rounds,
        GraceScheduler::new(GraceConfig::default()),
    ));

    Harness {
        manager,
        store,
        bus,
        canvas,
        room,
    }
}

impl Harness {
    fn start(&self) -> SessionId {
        self.manager
            .start_session(&self.room, PlayerId(1))
            .unwrap()
            .id
    }
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs) + Duration::from_millis(10)).await;
    tokio::task::yield_now().await;
}

fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn drain_user(
    rx: &mut UnboundedReceiver<(UserChannel, ServerEvent)>,
) -> Vec<(UserChannel, ServerEvent)> {
    let mut out = Vec::new();
    while let Ok(pair) = rx.try_recv() {
        out.push(pair);
    }
    out
}

fn conn(id: &str) -> ConnId {
    ConnId(id.to_string())
}

// =========================================================================
// Session start
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_session_seats_players_and_starts_rounds() {
    let h = harness(&[(1, "ada"), (2, "bea"), (3, "cal")]);
    let mut rx = h.bus.subscribe_room(&h.room);

    let session = h.manager.start_session(&h.room, PlayerId(1)).unwrap();

    assert_eq!(session.total_rounds, 6, "two rounds per player");
    assert_eq!(h.store.room(&h.room).unwrap().status, RoomStatus::Playing);
    assert_eq!(h.store.session_players(session.id).len(), 3);
    assert!(
        h.store.session_player(session.id, PlayerId(1)).unwrap().is_host
    );
    assert!(
        !h.store.session_player(session.id, PlayerId(2)).unwrap().is_host
    );

    let events = drain(&mut rx);
    let started = events
        .iter()
        .find(|e| matches!(e, ServerEvent::GameStarted { .. }))
        .expect("GAME_STARTED");
    if let ServerEvent::GameStarted {
        total_rounds,
        current_round,
        players,
        ..
    } = started
    {
        assert_eq!(*total_rounds, 6);
        assert_eq!(*current_round, 0);
        assert_eq!(players.len(), 3);
    }

    // The first round follows after the client-render delay.
    advance(2).await;
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::RoundStarted { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_start_session_rejects_non_host() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    let err = h.manager.start_session(&h.room, PlayerId(2)).unwrap_err();
    assert!(matches!(err, SessionError::NotHost));
}

#[tokio::test(start_paused = true)]
async fn test_start_session_rejects_double_start() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    h.start();
    let err = h.manager.start_session(&h.room, PlayerId(1)).unwrap_err();
    assert!(matches!(err, SessionError::AlreadyRunning));
}

#[tokio::test(start_paused = true)]
async fn test_start_session_requires_two_players() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    h.store
        .deactivate_membership(&h.room, PlayerId(2))
        .unwrap();
    let err = h.manager.start_session(&h.room, PlayerId(1)).unwrap_err();
    assert!(matches!(err, SessionError::NotEnoughPlayers));
}

#[tokio::test(start_paused = true)]
async fn test_start_session_unknown_room() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    let err = h
        .manager
        .start_session(&RoomCode::from("000000"), PlayerId(1))
        .unwrap_err();
    assert!(matches!(err, SessionError::RoomNotFound(_)));
}

// =========================================================================
// Disconnect grace
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_keeps_seat_active() {
    let h = harness(&[(1, "ada"), (2, "bea"), (3, "cal")]);
    let session = h.start();
    advance(2).await;
    let mut rx = h.bus.subscribe_room(&h.room);

    h.manager
        .handle_player_disconnect(&h.room, PlayerId(2), conn("conn-2"));
    assert!(h.manager.is_disconnect_pending(session, PlayerId(2)));

    advance(20).await;
    h.manager
        .handle_player_reconnection(&h.room, PlayerId(2))
        .await
        .unwrap();
    assert!(!h.manager.is_disconnect_pending(session, PlayerId(2)));

    // Past the original deadline: the departure never lands.
    advance(15).await;
    assert!(
        h.store.session_player(session, PlayerId(2)).unwrap().active
    );
    assert!(!drain(&mut rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::PlayerLeft { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_guesser_grace_expiry_marks_seat_inactive() {
    let h = harness(&[(1, "ada"), (2, "bea"), (3, "cal")]);
    let session = h.start();
    advance(2).await;
    let mut rx = h.bus.subscribe_room(&h.room);

    h.manager
        .handle_player_disconnect(&h.room, PlayerId(2), conn("conn-2"));
    advance(30).await;

    let seat = h.store.session_player(session, PlayerId(2)).unwrap();
    assert!(!seat.active);
    assert!(seat.left_at.is_some());

    let events = drain(&mut rx);
    let left = events
        .iter()
        .find(|e| matches!(e, ServerEvent::PlayerLeft { .. }))
        .expect("PLAYER_LEFT");
    if let ServerEvent::PlayerLeft {
        username, in_game, ..
    } = left
    {
        assert_eq!(username, "bea");
        assert!(in_game);
    }

    // Two players remain; the session survives.
    assert!(h.manager.active_session(&h.room).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_drawer_grace_expiry_forfeits_round() {
    let h = harness(&[(1, "ada"), (2, "bea"), (3, "cal")]);
    h.start();
    advance(2).await; // round 1, ada draws
    let mut rx = h.bus.subscribe_room(&h.room);

    h.manager
        .handle_player_disconnect(&h.room, PlayerId(1), conn("conn-1"));
    advance(30).await;

    let events = drain(&mut rx);
    let ended = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::RoundEnded { reason, .. } => Some(*reason),
            _ => None,
        })
        .expect("ROUND_ENDED");
    assert_eq!(ended, RoundEndReason::DrawerLeft);
}

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_below_two_players_ends_session() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    let session = h.start();
    advance(2).await;
    let mut rx = h.bus.subscribe_room(&h.room);

    h.manager
        .handle_player_disconnect(&h.room, PlayerId(2), conn("conn-2"));
    advance(30).await;

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::GameEnded { .. })));
    assert!(h.manager.active_session(&h.room).is_none());
    assert!(h.store.room(&h.room).unwrap().status.is_finished());
    // Grace bookkeeping is gone too.
    assert!(!h.manager.is_disconnect_pending(session, PlayerId(2)));
}

#[tokio::test(start_paused = true)]
async fn test_explicit_leave_skips_grace() {
    let h = harness(&[(1, "ada"), (2, "bea"), (3, "cal")]);
    let session = h.start();
    advance(2).await;
    let mut rx = h.bus.subscribe_room(&h.room);

    h.manager
        .handle_player_leave(&h.room, PlayerId(3))
        .await
        .unwrap();

    assert!(
        !h.store.session_player(session, PlayerId(3)).unwrap().active
    );
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::PlayerLeft { .. })));
}

// =========================================================================
// Reconnection state push
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnection_pushes_round_snapshot_and_canvas() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    h.start();
    advance(2).await;
    h.canvas
        .append_stroke(&h.room, serde_json::json!({"x": 3, "y": 4}));

    let mut bea_rx = h.bus.subscribe_user(PlayerId(2));
    h.manager
        .handle_player_reconnection(&h.room, PlayerId(2))
        .await
        .unwrap();

    let pushed = drain_user(&mut bea_rx);
    let snapshot = pushed
        .iter()
        .find(|(c, _)| *c == UserChannel::RoundState)
        .expect("round state push");
    if let (_, ServerEvent::RoundState { snapshot }) = snapshot {
        assert!(!snapshot.between_rounds);
        assert_eq!(snapshot.round_number, 1);
        assert_eq!(snapshot.word_length, Some("castle".len()));
    }
    let canvas = pushed
        .iter()
        .find(|(c, _)| *c == UserChannel::CanvasState)
        .expect("canvas push");
    assert!(matches!(canvas.1, ServerEvent::CanvasState { .. }));

    // Bea is not drawing, so no word push.
    assert!(!pushed.iter().any(|(c, _)| *c == UserChannel::Word));
}

#[tokio::test(start_paused = true)]
async fn test_reconnecting_drawer_gets_word_again() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    h.start();
    advance(2).await;

    let mut ada_rx = h.bus.subscribe_user(PlayerId(1));
    h.manager
        .handle_player_reconnection(&h.room, PlayerId(1))
        .await
        .unwrap();

    let pushed = drain_user(&mut ada_rx);
    let word = pushed
        .iter()
        .find(|(c, _)| *c == UserChannel::Word)
        .expect("word re-push");
    assert_eq!(
        word.1,
        ServerEvent::YourWord {
            word: "castle".into(),
            round_number: 1
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnection_between_rounds_gets_between_snapshot() {
    let h = harness(&[(1, "ada"), (2, "bea"), (3, "cal")]);
    h.start();
    advance(2).await;

    h.manager
        .handle_player_disconnect(&h.room, PlayerId(2), conn("conn-2"));
    // End the round via drawer leave to land between rounds.
    h.manager
        .handle_player_leave(&h.room, PlayerId(1))
        .await
        .unwrap();

    let mut bea_rx = h.bus.subscribe_user(PlayerId(2));
    h.manager
        .handle_player_reconnection(&h.room, PlayerId(2))
        .await
        .unwrap();

    let pushed = drain_user(&mut bea_rx);
    let (_, state) = pushed
        .iter()
        .find(|(c, _)| *c == UserChannel::RoundState)
        .expect("round state push");
    if let ServerEvent::RoundState { snapshot } = state {
        assert!(snapshot.between_rounds);
    }
}

// =========================================================================
// Session end
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_end_session_is_idempotent_and_reports_scores() {
    let h = harness(&[(1, "ada"), (2, "bea")]);
    h.start();
    advance(2).await;
    let mut rx = h.bus.subscribe_room(&h.room);

    h.manager.end_session(&h.room).await.unwrap();
    h.manager.end_session(&h.room).await.unwrap();

    let events = drain(&mut rx);
    let ended: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::GameEnded { .. }))
        .collect();
    assert_eq!(ended.len(), 1, "second end is a no-op");
    if let ServerEvent::GameEnded { final_scores, .. } = ended[0] {
        assert_eq!(final_scores.len(), 2);
    }

    // Round timers are dead: nothing more fires.
    advance(120).await;
    assert!(drain(&mut rx).is_empty());
}
