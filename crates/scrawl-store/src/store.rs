//! The `Store` trait: the narrow interface the engine sees.
//!
//! Implementations must reflect writes immediately to subsequent reads in
//! the same process (read-after-write). All methods are synchronous — the
//! engine only awaits timers, never storage.

use scrawl_protocol::{ConnId, PlayerId, RoomCode, SessionId};

use crate::{GameSession, Room, RoomMembership, RoomStatus, SessionPlayer, SessionStatus};

/// Errors from the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room code {0} already exists")]
    DuplicateRoomCode(RoomCode),

    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("player {1} has no membership in room {0}")]
    MembershipNotFound(RoomCode, PlayerId),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("player {1} has no seat in session {0}")]
    SessionPlayerNotFound(SessionId, PlayerId),
}

/// CRUD plus status-filtered lookups for all engine records.
///
/// Ordering contract: every `Vec`-returning method lists rows in their
/// original insertion order. Host reassignment, drawer rotation, and
/// final-score tie-breaks all lean on this.
pub trait Store: Send + Sync + 'static {
    // -- Rooms --

    fn insert_room(&self, room: Room) -> Result<(), StoreError>;
    fn room(&self, code: &RoomCode) -> Option<Room>;
    fn room_code_exists(&self, code: &RoomCode) -> bool;
    /// Sets `closed_at` automatically when transitioning to `Finished`.
    fn set_room_status(
        &self,
        code: &RoomCode,
        status: RoomStatus,
    ) -> Result<(), StoreError>;
    fn set_room_host(
        &self,
        code: &RoomCode,
        host: PlayerId,
    ) -> Result<(), StoreError>;

    // -- Room memberships --

    fn insert_membership(
        &self,
        membership: RoomMembership,
    ) -> Result<(), StoreError>;
    fn membership(
        &self,
        room: &RoomCode,
        player: PlayerId,
    ) -> Option<RoomMembership>;
    fn membership_by_conn(&self, conn: &ConnId) -> Option<RoomMembership>;
    /// Reactivates the row and records the new connection identity.
    fn activate_membership(
        &self,
        room: &RoomCode,
        player: PlayerId,
        conn: ConnId,
    ) -> Result<(), StoreError>;
    /// Marks the row inactive and stamps `left_at`.
    fn deactivate_membership(
        &self,
        room: &RoomCode,
        player: PlayerId,
    ) -> Result<(), StoreError>;
    fn set_membership_conn(
        &self,
        room: &RoomCode,
        player: PlayerId,
        conn: ConnId,
    ) -> Result<(), StoreError>;
    fn active_memberships(&self, room: &RoomCode) -> Vec<RoomMembership>;
    fn count_active_memberships(&self, room: &RoomCode) -> usize;

    // -- Sessions --

    /// Creates a new `Active` session at round 0 and assigns its id.
    fn create_session(
        &self,
        room: &RoomCode,
        total_rounds: u32,
    ) -> Result<GameSession, StoreError>;
    fn session(&self, id: SessionId) -> Option<GameSession>;
    fn active_session_for_room(&self, room: &RoomCode) -> Option<GameSession>;
    /// Sets `ended_at` automatically when transitioning to `Finished`.
    fn set_session_status(
        &self,
        id: SessionId,
        status: SessionStatus,
    ) -> Result<(), StoreError>;
    fn set_current_round(
        &self,
        id: SessionId,
        round: u32,
    ) -> Result<(), StoreError>;

    // -- Session players --

    fn insert_session_player(
        &self,
        player: SessionPlayer,
    ) -> Result<(), StoreError>;
    fn session_player(
        &self,
        session: SessionId,
        player: PlayerId,
    ) -> Option<SessionPlayer>;
    fn set_session_player_active(
        &self,
        session: SessionId,
        player: PlayerId,
        active: bool,
    ) -> Result<(), StoreError>;
    /// Adds `delta` to the player's score. Scores only ever grow.
    fn add_score(
        &self,
        session: SessionId,
        player: PlayerId,
        delta: i64,
    ) -> Result<(), StoreError>;
    fn active_session_players(&self, session: SessionId) -> Vec<SessionPlayer>;
    /// Every seat in the session, active or not (final scoreboards).
    fn session_players(&self, session: SessionId) -> Vec<SessionPlayer>;
    fn count_active_session_players(&self, session: SessionId) -> usize;
}
