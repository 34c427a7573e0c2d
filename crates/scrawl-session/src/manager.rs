//! Session start/end, disconnect grace handling, and reconnection.

use std::collections::HashSet;
use std::sync::Arc;

use scrawl_grace::GraceScheduler;
use scrawl_protocol::{
    Broadcaster, ConnId, FinalScore, PlayerId, RoomCode, RoomPlayerSummary, ServerEvent,
    SessionId, SessionPlayerSummary, UserChannel,
};
use scrawl_round::RoundEngine;
use scrawl_store::{
    CanvasStore, GameSession, RoomStatus, SessionPlayer, SessionStatus, Store, StoreError,
};
use tracing::{error, info, warn};

/// Grace windows are scoped per seat, so one player's room-level and
/// session-level windows never collide.
type SessionKey = (SessionId, PlayerId);

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("only the host can start the session")]
    NotHost,

    #[error("session is already in progress")]
    AlreadyRunning,

    #[error("need at least 2 players to start a session")]
    NotEnoughPlayers,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates session lifecycle for every room.
pub struct SessionManager {
    store: Arc<dyn Store>,
    canvas: Arc<dyn CanvasStore>,
    broadcaster: Arc<dyn Broadcaster>,
    rounds: Arc<RoundEngine>,
    grace: GraceScheduler<SessionKey>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn Store>,
        canvas: Arc<dyn CanvasStore>,
        broadcaster: Arc<dyn Broadcaster>,
        rounds: Arc<RoundEngine>,
        grace: GraceScheduler<SessionKey>,
    ) -> Self {
        Self {
            store,
            canvas,
            broadcaster,
            rounds,
            grace,
        }
    }

    /// Start a game in a waiting room. Host only.
    ///
    /// Total rounds scale with the table: two per seated player, so
    /// everyone draws twice.
    pub fn start_session(
        self: &Arc<Self>,
        room_code: &RoomCode,
        host: PlayerId,
    ) -> Result<GameSession, SessionError> {
        let room = self
            .store
            .room(room_code)
            .ok_or_else(|| SessionError::RoomNotFound(room_code.clone()))?;

        if room.host != host {
            return Err(SessionError::NotHost);
        }
        if room.status != RoomStatus::Waiting {
            return Err(SessionError::AlreadyRunning);
        }
        // Concurrent start requests race on room status; the session
        // lookup is the second line of defense.
        if self.store.active_session_for_room(room_code).is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        // One seat per player, even if the store holds duplicate rows.
        let mut members = self.store.active_memberships(room_code);
        let mut seen = HashSet::new();
        members.retain(|m| seen.insert(m.player));
        if members.len() < 2 {
            return Err(SessionError::NotEnoughPlayers);
        }

        self.store.set_room_status(room_code, RoomStatus::Playing)?;

        let total_rounds = members.len() as u32 * 2;
        let session = self.store.create_session(room_code, total_rounds)?;
        for member in &members {
            self.store.insert_session_player(SessionPlayer::new(
                session.id,
                member.player,
                member.username.clone(),
                member.player == host,
            ))?;
        }
        info!(
            session = %session.id,
            room = %room_code,
            players = members.len(),
            total_rounds,
            "session started"
        );

        self.broadcaster.publish_to_room(
            room_code,
            &ServerEvent::GameStarted {
                session_id: session.id,
                total_rounds: session.total_rounds,
                current_round: session.current_round,
                players: self.session_roster(session.id),
            },
        );

        self.rounds.initialize_game(&session);
        Ok(session)
    }

    /// Tear down the room's active session, if any. Idempotent.
    pub async fn end_session(&self, room_code: &RoomCode) -> Result<(), SessionError> {
        let Some(room) = self.store.room(room_code) else {
            warn!(room = %room_code, "end_session: room not found");
            return Ok(());
        };
        let Some(session) = self.store.active_session_for_room(room_code) else {
            info!(room = %room_code, "end_session: no active session");
            return Ok(());
        };

        self.store
            .set_session_status(session.id, SessionStatus::Finished)?;
        if room.status != RoomStatus::Finished {
            self.store.set_room_status(room_code, RoomStatus::Finished)?;
        }
        info!(session = %session.id, room = %room_code, "session ended");

        self.rounds.cleanup(session.id).await;
        self.grace.resolve_where(|(sid, _)| *sid == session.id);

        let (final_scores, winner) = self.final_scores(session.id);
        self.broadcaster.publish_to_room(
            room_code,
            &ServerEvent::GameEnded {
                final_scores,
                winner,
            },
        );
        Ok(())
    }

    /// A seated player's connection dropped mid-game: start the grace
    /// window instead of removing them.
    pub fn handle_player_disconnect(
        self: &Arc<Self>,
        room_code: &RoomCode,
        player: PlayerId,
        conn: ConnId,
    ) {
        let Some(session) = self.store.active_session_for_room(room_code) else {
            info!(room = %room_code, "no active session for disconnect handling");
            return;
        };

        info!(
            session = %session.id,
            player = %player,
            grace_secs = self.grace.grace_period().as_secs(),
            "player disconnected from session, grace period started"
        );

        let manager = Arc::clone(self);
        let room = room_code.clone();
        let session_id = session.id;
        self.grace.begin((session_id, player), conn, move || async move {
            if let Err(err) = manager
                .handle_delayed_disconnect(&room, session_id, player)
                .await
            {
                error!(session = %session_id, player = %player, %err, "delayed session disconnect failed");
            }
        });
    }

    /// Apply a session departure whose grace window expired.
    pub async fn handle_delayed_disconnect(
        self: &Arc<Self>,
        room_code: &RoomCode,
        session_id: SessionId,
        player: PlayerId,
    ) -> Result<(), SessionError> {
        info!(session = %session_id, player = %player, "session grace period expired, marking inactive");
        self.mark_left(room_code, session_id, player).await
    }

    /// A seated player left on purpose (no grace window).
    pub async fn handle_player_leave(
        self: &Arc<Self>,
        room_code: &RoomCode,
        player: PlayerId,
    ) -> Result<(), SessionError> {
        let Some(session) = self.store.active_session_for_room(room_code) else {
            return Ok(());
        };
        self.grace.resolve(&(session.id, player));
        self.mark_left(room_code, session.id, player).await
    }

    async fn mark_left(
        self: &Arc<Self>,
        room_code: &RoomCode,
        session_id: SessionId,
        player: PlayerId,
    ) -> Result<(), SessionError> {
        let mut username = None;
        if let Some(seat) = self.store.session_player(session_id, player) {
            if seat.active {
                self.store
                    .set_session_player_active(session_id, player, false)?;
                username = Some(seat.username);
            }
        }
        if let Some(username) = username {
            self.broadcaster.publish_to_room(
                room_code,
                &ServerEvent::PlayerLeft {
                    username,
                    in_game: true,
                    players: self.room_roster(room_code),
                },
            );
        }

        // The round may not survive the departure.
        self.rounds.handle_drawer_disconnect(session_id, player).await;
        self.rounds.handle_guesser_disconnect(session_id).await;

        if self.store.count_active_session_players(session_id) < 2 {
            warn!(session = %session_id, "fewer than 2 players left, ending session");
            self.end_session(room_code).await?;
        }
        Ok(())
    }

    /// A seated player came back: reactivate them, cancel any pending
    /// grace window, and push the private catch-up state (round
    /// snapshot, the word if they are the drawer, canvas replay).
    pub async fn handle_player_reconnection(
        &self,
        room_code: &RoomCode,
        player: PlayerId,
    ) -> Result<(), SessionError> {
        let Some(session) = self.store.active_session_for_room(room_code) else {
            info!(room = %room_code, "no active session for reconnection");
            return Ok(());
        };
        let Some(seat) = self.store.session_player(session.id, player) else {
            warn!(session = %session.id, player = %player, "reconnecting player has no seat");
            return Ok(());
        };

        if !seat.active {
            self.store
                .set_session_player_active(session.id, player, true)?;
            info!(session = %session.id, player = %player, "seat reactivated on reconnect");
        }
        if self.grace.resolve(&(session.id, player)).is_some() {
            info!(session = %session.id, player = %player, "cancelled pending session disconnect");
        }

        if let Some(snapshot) = self.rounds.round_snapshot(session.id).await {
            let round_number = snapshot.round_number;
            self.broadcaster.publish_to_user(
                player,
                UserChannel::RoundState,
                &ServerEvent::RoundState { snapshot },
            );
            if let Some(word) = self.rounds.word_for_drawer(session.id, player).await {
                self.broadcaster.publish_to_user(
                    player,
                    UserChannel::Word,
                    &ServerEvent::YourWord { word, round_number },
                );
            }
        } else if let Some(snapshot) = self.rounds.between_rounds_snapshot(session.id) {
            self.broadcaster.publish_to_user(
                player,
                UserChannel::RoundState,
                &ServerEvent::RoundState { snapshot },
            );
        }

        let strokes = self.canvas.strokes(room_code);
        if !strokes.is_empty() {
            self.broadcaster.publish_to_user(
                player,
                UserChannel::CanvasState,
                &ServerEvent::CanvasState { strokes },
            );
        }
        Ok(())
    }

    /// The room's active session, if one is running.
    pub fn active_session(&self, room_code: &RoomCode) -> Option<GameSession> {
        self.store.active_session_for_room(room_code)
    }

    /// Whether the player has a pending session grace window.
    pub fn is_disconnect_pending(&self, session: SessionId, player: PlayerId) -> bool {
        self.grace.is_pending(&(session, player))
    }

    fn session_roster(&self, session: SessionId) -> Vec<SessionPlayerSummary> {
        self.store
            .active_session_players(session)
            .iter()
            .map(|p| SessionPlayerSummary {
                player_id: p.player,
                username: p.username.clone(),
                score: p.score,
                is_host: p.is_host,
            })
            .collect()
    }

    fn room_roster(&self, room_code: &RoomCode) -> Vec<RoomPlayerSummary> {
        let host = self.store.room(room_code).map(|r| r.host);
        self.store
            .active_memberships(room_code)
            .iter()
            .map(|m| RoomPlayerSummary {
                player_id: m.player,
                username: m.username.clone(),
                is_host: host == Some(m.player),
            })
            .collect()
    }

    /// Every seat, sorted by score descending; join order breaks ties.
    fn final_scores(&self, session: SessionId) -> (Vec<FinalScore>, Option<String>) {
        let mut scores: Vec<FinalScore> = self
            .store
            .session_players(session)
            .iter()
            .map(|p| FinalScore {
                username: p.username.clone(),
                score: p.score,
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        let winner = scores.first().map(|s| s.username.clone());
        (scores, winner)
    }
}
