//! Room creation, admission, disconnects, and closure.

use std::sync::Arc;

use rand::Rng;
use scrawl_grace::GraceScheduler;
use scrawl_protocol::{Broadcaster, ConnId, PlayerId, RoomCode, RoomPlayerSummary, ServerEvent};
use scrawl_session::{SessionError, SessionManager};
use scrawl_store::{Room, RoomMembership, RoomStatus, Store, StoreError};
use tracing::{error, info, warn};

/// Grace windows are scoped per room membership.
type RoomKey = (RoomCode, PlayerId);

/// Tunables for room admission.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Cap on simultaneously active members. Reconnects of existing
    /// members bypass it.
    pub max_players: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { max_players: 5 }
    }
}

/// Errors from room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("cannot join finished room {0}")]
    RoomFinished(RoomCode),

    #[error("room is full (max {max} players)")]
    RoomFull { max: usize },

    #[error("cannot join room, game in progress")]
    GameInProgress,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates room lifecycle and delegates in-game consequences to the
/// session layer.
pub struct RoomManager {
    config: RoomConfig,
    store: Arc<dyn Store>,
    broadcaster: Arc<dyn Broadcaster>,
    sessions: Arc<SessionManager>,
    grace: GraceScheduler<RoomKey>,
}

impl RoomManager {
    pub fn new(
        config: RoomConfig,
        store: Arc<dyn Store>,
        broadcaster: Arc<dyn Broadcaster>,
        sessions: Arc<SessionManager>,
        grace: GraceScheduler<RoomKey>,
    ) -> Self {
        Self {
            config,
            store,
            broadcaster,
            sessions,
            grace,
        }
    }

    /// Open a new waiting room with a fresh join code. The creator
    /// becomes host but is not seated until they join.
    pub fn create_room(&self, host: PlayerId) -> Result<Room, RoomError> {
        let code = self.generate_room_code();
        let room = Room::new(code.clone(), host);
        self.store.insert_room(room.clone())?;
        info!(room = %code, host = %host, "room created");
        Ok(room)
    }

    /// Six decimal digits, re-rolled until unused.
    fn generate_room_code(&self) -> RoomCode {
        loop {
            let code = RoomCode(format!("{:06}", rand::rng().random_range(0..1_000_000u32)));
            if !self.store.room_code_exists(&code) {
                return code;
            }
        }
    }

    /// Admit a player into a room, or re-admit a returning one.
    ///
    /// Admission rules: finished rooms reject everyone; the capacity cap
    /// applies to players with no membership row; a playing room admits
    /// only reconnections (a pending grace window or a still-active
    /// membership row).
    pub async fn join_room(
        self: &Arc<Self>,
        room_code: &RoomCode,
        player: PlayerId,
        username: &str,
        conn: ConnId,
    ) -> Result<(), RoomError> {
        let room = self
            .store
            .room(room_code)
            .ok_or_else(|| RoomError::RoomNotFound(room_code.clone()))?;
        if room.status.is_finished() {
            return Err(RoomError::RoomFinished(room_code.clone()));
        }

        let existing = self.store.membership(room_code, player);
        if existing.is_none()
            && self.store.count_active_memberships(room_code) >= self.config.max_players
        {
            return Err(RoomError::RoomFull {
                max: self.config.max_players,
            });
        }

        let key = (room_code.clone(), player);
        let is_reconnecting =
            self.grace.is_pending(&key) || existing.as_ref().is_some_and(|m| m.active);

        if room.status == RoomStatus::Playing && !is_reconnecting {
            warn!(room = %room_code, player = %player, "join rejected, game in progress");
            return Err(RoomError::GameInProgress);
        }

        if self.grace.resolve(&key).is_some() {
            info!(room = %room_code, player = %player, "cancelled pending room disconnect");
        }

        match existing {
            Some(m) if m.active => {
                self.store.set_membership_conn(room_code, player, conn)?;
            }
            Some(_) => {
                self.store.activate_membership(room_code, player, conn)?;
            }
            None => {
                self.store.insert_membership(RoomMembership::new(
                    room_code.clone(),
                    player,
                    username.to_string(),
                    conn,
                ))?;
            }
        }

        let in_game = room.status == RoomStatus::Playing;
        if is_reconnecting {
            info!(room = %room_code, player = %player, in_game, "player reconnected");
            self.broadcaster.publish_to_room(
                room_code,
                &ServerEvent::PlayerReconnected {
                    username: username.to_string(),
                    in_game,
                    players: self.active_players(room_code),
                },
            );
            if in_game {
                self.sessions
                    .handle_player_reconnection(room_code, player)
                    .await?;
            }
        } else {
            info!(room = %room_code, player = %player, "player joined");
            self.broadcaster.publish_to_room(
                room_code,
                &ServerEvent::PlayerJoined {
                    username: username.to_string(),
                    players: self.active_players(room_code),
                },
            );
        }
        Ok(())
    }

    /// A connection dropped: announce it, start the room grace window,
    /// and (mid-game) the session grace window alongside.
    pub fn handle_player_disconnect(self: &Arc<Self>, conn: &ConnId) {
        let Some(membership) = self.store.membership_by_conn(conn) else {
            warn!(conn = %conn.0, "no membership for disconnected connection");
            return;
        };
        let Some(room) = self.store.room(&membership.room) else {
            error!(room = %membership.room, "membership points at missing room");
            return;
        };

        let room_code = membership.room.clone();
        let player = membership.player;
        let in_game = room.status == RoomStatus::Playing;
        let grace_secs = self.grace.grace_period().as_secs();

        info!(
            room = %room_code,
            player = %player,
            grace_secs,
            "player disconnected, grace period started"
        );

        self.broadcaster.publish_to_room(
            &room_code,
            &ServerEvent::PlayerDisconnected {
                username: membership.username.clone(),
                in_game,
                grace_period_seconds: grace_secs,
                players: self.active_players(&room_code),
            },
        );

        if in_game {
            self.sessions
                .handle_player_disconnect(&room_code, player, conn.clone());
        }

        let manager = Arc::clone(self);
        let key_room = room_code.clone();
        self.grace.begin((room_code, player), conn.clone(), move || async move {
            if let Err(err) = manager.handle_delayed_disconnect(&key_room, player).await {
                error!(room = %key_room, player = %player, %err, "delayed room disconnect failed");
            }
        });
    }

    /// Apply a room departure whose grace window expired: deactivate the
    /// membership, cascade into the session layer, then run the closure
    /// and host-reassignment rules.
    pub async fn handle_delayed_disconnect(
        self: &Arc<Self>,
        room_code: &RoomCode,
        player: PlayerId,
    ) -> Result<(), RoomError> {
        let Some(membership) = self.store.membership(room_code, player) else {
            return Ok(());
        };
        if self.store.room(room_code).is_none() {
            return Ok(());
        }

        info!(room = %room_code, player = %player, "room grace period expired, removing member");
        self.store.deactivate_membership(room_code, player)?;

        // Session-side departure is immediate now that the room window
        // has expired.
        self.sessions.handle_player_leave(room_code, player).await?;

        // Re-read: the session cascade may already have finished the room.
        let Some(room) = self.store.room(room_code) else {
            return Ok(());
        };
        self.broadcaster.publish_to_room(
            room_code,
            &ServerEvent::PlayerLeft {
                username: membership.username,
                in_game: room.status == RoomStatus::Playing,
                players: self.active_players(room_code),
            },
        );

        let active_count = self.store.count_active_memberships(room_code);

        if active_count == 0
            && room.status == RoomStatus::Waiting
            && !self
                .grace
                .has_pending_where(|(code, _)| code == room_code)
        {
            // Lobby abandoned before a game ever started.
            self.close_room(room_code)?;
            info!(room = %room_code, "room closed, all players left before game start");
        }

        if active_count < 2 && room.status != RoomStatus::Waiting {
            self.close_room(room_code)?;
            self.sessions.end_session(room_code).await?;
            info!(room = %room_code, "room closed, not enough players mid-game");
        }

        if active_count == 0 {
            self.close_room(room_code)?;
        } else {
            self.reassign_host_if_needed(room_code, player)?;
        }
        Ok(())
    }

    fn close_room(&self, room_code: &RoomCode) -> Result<(), RoomError> {
        if let Some(room) = self.store.room(room_code) {
            if !room.status.is_finished() {
                self.store.set_room_status(room_code, RoomStatus::Finished)?;
            }
        }
        Ok(())
    }

    fn reassign_host_if_needed(
        &self,
        room_code: &RoomCode,
        departed: PlayerId,
    ) -> Result<(), RoomError> {
        let Some(room) = self.store.room(room_code) else {
            return Ok(());
        };
        if room.host != departed {
            return Ok(());
        }

        let members = self.store.active_memberships(room_code);
        let Some(new_host) = members.first() else {
            info!(room = %room_code, "no active players to reassign host to");
            return Ok(());
        };

        self.store.set_room_host(room_code, new_host.player)?;
        info!(room = %room_code, new_host = %new_host.username, "host reassigned");

        self.broadcaster.publish_to_room(
            room_code,
            &ServerEvent::HostChanged {
                new_host: new_host.username.clone(),
                players: self.active_players(room_code),
            },
        );
        Ok(())
    }

    /// The room record for a join code.
    pub fn room(&self, room_code: &RoomCode) -> Option<Room> {
        self.store.room(room_code)
    }

    /// Currently active members in join order.
    pub fn active_players(&self, room_code: &RoomCode) -> Vec<RoomPlayerSummary> {
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

    /// Whether the player has a pending room grace window.
    pub fn is_disconnect_pending(&self, room_code: &RoomCode, player: PlayerId) -> bool {
        self.grace.is_pending(&(room_code.clone(), player))
    }
}
