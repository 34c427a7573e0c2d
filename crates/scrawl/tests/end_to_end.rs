//! End-to-end tests driving the engine through the public facade only:
//! create a room, seat players, play rounds, and watch the event stream
//! a real transport would relay.

use std::sync::Arc;
use std::time::Duration;

use scrawl::{
    ChannelBroadcaster, ConnId, Engine, PlayerId, RoomCode, RoundEndReason, ScrawlError,
    ServerEvent, SessionStatus, UserChannel, WordSource,
};
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Helpers
// =========================================================================

struct FixedWord;

impl WordSource for FixedWord {
    fn pick(&self) -> String {
        "rocket".to_string()
    }
}

fn engine() -> (Engine, Arc<ChannelBroadcaster>) {
    let bus = Arc::new(ChannelBroadcaster::new());
    let engine = Engine::builder()
        .broadcaster(bus.clone())
        .word_source(Arc::new(FixedWord))
        .build();
    (engine, bus)
}

fn conn(id: u64) -> ConnId {
    ConnId(format!("conn-{id}"))
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

async fn seated_room(engine: &Engine, players: &[(u64, &str)]) -> RoomCode {
    let host = PlayerId(players[0].0);
    let room = engine.create_room(host).unwrap();
    for (id, name) in players {
        engine
            .join_room(&room.code, PlayerId(*id), name, conn(*id))
            .await
            .unwrap();
    }
    room.code
}

// =========================================================================
// The happy path
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_game_flow() {
    let (engine, bus) = engine();
    let code = seated_room(&engine, &[(1, "ada"), (2, "bea")]).await;
    let mut rx = bus.subscribe_room(&code);
    let mut bea = bus.subscribe_user(PlayerId(2));

    // Host starts: two players means four rounds.
    let session = engine.start_game(&code, PlayerId(1)).unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.total_rounds, 4);

    // Round one opens after the initial delay, hosted by the first joiner.
    advance(2).await;
    let events = drain(&mut rx);
    let started = events
        .iter()
        .find(|e| matches!(e, ServerEvent::RoundStarted { .. }))
        .expect("ROUND_STARTED");
    if let ServerEvent::RoundStarted {
        round_number,
        drawer_name,
        word_length,
        duration_seconds,
        ..
    } = started
    {
        assert_eq!(*round_number, 1);
        assert_eq!(drawer_name, "ada");
        assert_eq!(*word_length, "rocket".len());
        assert_eq!(*duration_seconds, 40);
    }
    assert!(engine.is_drawer(&code, PlayerId(1)).await);

    // The guesser nails it immediately: full marks, drawer bonus, and the
    // round closes because every guesser is done.
    engine
        .handle_chat_message(&code, PlayerId(2), "bea", "rocket")
        .await
        .unwrap();

    let events = drain(&mut rx);
    let correct = events
        .iter()
        .find(|e| matches!(e, ServerEvent::CorrectGuess { .. }))
        .expect("CORRECT_GUESS");
    if let ServerEvent::CorrectGuess {
        username,
        score,
        correct_count,
        total_guessers,
    } = correct
    {
        assert_eq!(username, "bea");
        assert_eq!(*score, 500);
        assert_eq!(*correct_count, 1);
        assert_eq!(*total_guessers, 1);
    }
    let ended = events
        .iter()
        .find(|e| matches!(e, ServerEvent::RoundEnded { .. }))
        .expect("ROUND_ENDED");
    if let ServerEvent::RoundEnded { word, reason, .. } = ended {
        assert_eq!(word, "rocket");
        assert_eq!(*reason, RoundEndReason::AllGuessed);
    }

    // Both sides scored.
    let seats = engine.store().session_players(session.id);
    let score_of = |name: &str| seats.iter().find(|p| p.username == name).unwrap().score;
    assert_eq!(score_of("bea"), 500);
    assert_eq!(score_of("ada"), 100);

    // Round two follows after the inter-round delay, drawer rotated.
    advance(5).await;
    let events = drain(&mut rx);
    let started = events
        .iter()
        .find(|e| matches!(e, ServerEvent::RoundStarted { .. }))
        .expect("round two");
    if let ServerEvent::RoundStarted {
        round_number,
        drawer_name,
        ..
    } = started
    {
        assert_eq!(*round_number, 2);
        assert_eq!(drawer_name, "bea");
    }

    // Bea, now drawing, got the word privately.
    let mut got_word = false;
    while let Ok((channel, event)) = bea.try_recv() {
        if channel == UserChannel::Word {
            assert!(matches!(event, ServerEvent::YourWord { ref word, .. } if word == "rocket"));
            got_word = true;
        }
    }
    assert!(got_word, "drawer must receive YOUR_WORD");
}

#[tokio::test(start_paused = true)]
async fn test_game_runs_to_completion() {
    let (engine, bus) = engine();
    let code = seated_room(&engine, &[(1, "ada"), (2, "bea")]).await;
    let mut rx = bus.subscribe_room(&code);

    let session = engine.start_game(&code, PlayerId(1)).unwrap();
    advance(2).await;

    // Let all four rounds time out.
    for _ in 0..4 {
        advance(40).await;
        advance(5).await;
    }

    let events = drain(&mut rx);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ServerEvent::RoundEnded { .. }))
            .count(),
        4
    );
    let complete = events
        .iter()
        .find(|e| matches!(e, ServerEvent::AllRoundsComplete { .. }))
        .expect("ALL_ROUNDS_COMPLETE");
    if let ServerEvent::AllRoundsComplete {
        final_scores,
        winner,
    } = complete
    {
        assert_eq!(final_scores.len(), 2);
        assert!(winner.is_some());
    }

    let session = engine.store().session(session.id).unwrap();
    assert_eq!(session.status, SessionStatus::Finished);
    assert!(engine.active_session(&code).is_none());
}

// =========================================================================
// Chat and strokes
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_lobby_chat_passes_through() {
    let (engine, bus) = engine();
    let code = seated_room(&engine, &[(1, "ada"), (2, "bea")]).await;
    let mut rx = bus.subscribe_room(&code);

    engine
        .handle_chat_message(&code, PlayerId(1), "ada", "ready when you are")
        .await
        .unwrap();
    // Blank lines are dropped.
    engine
        .handle_chat_message(&code, PlayerId(2), "bea", "   ")
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ServerEvent::ChatMessage { username, message }
            if username == "ada" && message == "ready when you are"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_only_the_drawer_may_draw() {
    let (engine, _bus) = engine();
    let code = seated_room(&engine, &[(1, "ada"), (2, "bea")]).await;
    engine.start_game(&code, PlayerId(1)).unwrap();
    advance(2).await;

    let stroke = serde_json::json!({"x": 10, "y": 20});
    assert!(engine.append_stroke(&code, PlayerId(1), stroke.clone()).await);
    assert!(!engine.append_stroke(&code, PlayerId(2), stroke).await);
}

// =========================================================================
// Disconnects through the facade
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_and_rejoin_within_grace() {
    let (engine, bus) = engine();
    let code = seated_room(&engine, &[(1, "ada"), (2, "bea")]).await;
    engine.start_game(&code, PlayerId(1)).unwrap();
    advance(2).await;

    engine.handle_disconnect(&conn(2));
    advance(10).await;

    let mut bea = bus.subscribe_user(PlayerId(2));
    engine
        .join_room(&code, PlayerId(2), "bea", ConnId::from("conn-2b"))
        .await
        .unwrap();

    // The catch-up push includes the round snapshot.
    let mut got_snapshot = false;
    while let Ok((channel, _)) = bea.try_recv() {
        if channel == UserChannel::RoundState {
            got_snapshot = true;
        }
    }
    assert!(got_snapshot);

    // The abandoned window never fires.
    advance(30).await;
    assert!(engine.active_session(&code).is_some());
    assert_eq!(engine.active_players(&code).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_expiry_ends_understaffed_game() {
    let (engine, bus) = engine();
    let code = seated_room(&engine, &[(1, "ada"), (2, "bea")]).await;
    let mut rx = bus.subscribe_room(&code);
    engine.start_game(&code, PlayerId(1)).unwrap();
    advance(2).await;

    engine.handle_disconnect(&conn(2));
    advance(30).await;

    assert!(engine.active_session(&code).is_none());
    assert!(engine.room(&code).unwrap().status.is_finished());
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::GameEnded { .. })));
}

// =========================================================================
// Errors surface through the unified type
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_facade_wraps_layer_errors() {
    let (engine, _bus) = engine();
    let code = seated_room(&engine, &[(1, "ada"), (2, "bea")]).await;

    let err = engine.start_game(&code, PlayerId(2)).unwrap_err();
    assert!(matches!(err, ScrawlError::Session(_)));

    let err = engine
        .join_room(&RoomCode::from("000000"), PlayerId(3), "cal", conn(3))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrawlError::Room(_)));
}
