//! In-memory `Store` implementation.
//!
//! A single mutex over plain collections. Critical sections are a few map
//! operations each, and the engine never holds the lock across an await,
//! so contention is not a concern at party-game scale.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use scrawl_protocol::{ConnId, PlayerId, RoomCode, SessionId};

use crate::{
    GameSession, Room, RoomMembership, RoomStatus, SessionPlayer,
    SessionStatus, Store, StoreError,
};

#[derive(Default)]
struct Inner {
    rooms: Vec<Room>,
    memberships: Vec<RoomMembership>,
    sessions: Vec<GameSession>,
    session_players: Vec<SessionPlayer>,
}

/// Map-backed [`Store`] with read-after-write consistency.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    next_session_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_session_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock poisoned")
    }
}

impl Store for MemoryStore {
    fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.rooms.iter().any(|r| r.code == room.code) {
            return Err(StoreError::DuplicateRoomCode(room.code));
        }
        inner.rooms.push(room);
        Ok(())
    }

    fn room(&self, code: &RoomCode) -> Option<Room> {
        self.lock().rooms.iter().find(|r| &r.code == code).cloned()
    }

    fn room_code_exists(&self, code: &RoomCode) -> bool {
        self.lock().rooms.iter().any(|r| &r.code == code)
    }

    fn set_room_status(
        &self,
        code: &RoomCode,
        status: RoomStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let room = inner
            .rooms
            .iter_mut()
            .find(|r| &r.code == code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        room.status = status;
        if status == RoomStatus::Finished {
            room.closed_at = Some(SystemTime::now());
        }
        Ok(())
    }

    fn set_room_host(
        &self,
        code: &RoomCode,
        host: PlayerId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let room = inner
            .rooms
            .iter_mut()
            .find(|r| &r.code == code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        room.host = host;
        Ok(())
    }

    fn insert_membership(
        &self,
        membership: RoomMembership,
    ) -> Result<(), StoreError> {
        self.lock().memberships.push(membership);
        Ok(())
    }

    fn membership(
        &self,
        room: &RoomCode,
        player: PlayerId,
    ) -> Option<RoomMembership> {
        self.lock()
            .memberships
            .iter()
            .find(|m| &m.room == room && m.player == player)
            .cloned()
    }

    fn membership_by_conn(&self, conn: &ConnId) -> Option<RoomMembership> {
        self.lock()
            .memberships
            .iter()
            .find(|m| &m.conn == conn)
            .cloned()
    }

    fn activate_membership(
        &self,
        room: &RoomCode,
        player: PlayerId,
        conn: ConnId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let m = inner
            .memberships
            .iter_mut()
            .find(|m| &m.room == room && m.player == player)
            .ok_or_else(|| {
                StoreError::MembershipNotFound(room.clone(), player)
            })?;
        m.active = true;
        m.left_at = None;
        m.conn = conn;
        Ok(())
    }

    fn deactivate_membership(
        &self,
        room: &RoomCode,
        player: PlayerId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let m = inner
            .memberships
            .iter_mut()
            .find(|m| &m.room == room && m.player == player)
            .ok_or_else(|| {
                StoreError::MembershipNotFound(room.clone(), player)
            })?;
        m.active = false;
        m.left_at = Some(SystemTime::now());
        Ok(())
    }

    fn set_membership_conn(
        &self,
        room: &RoomCode,
        player: PlayerId,
        conn: ConnId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let m = inner
            .memberships
            .iter_mut()
            .find(|m| &m.room == room && m.player == player)
            .ok_or_else(|| {
                StoreError::MembershipNotFound(room.clone(), player)
            })?;
        m.conn = conn;
        Ok(())
    }

    fn active_memberships(&self, room: &RoomCode) -> Vec<RoomMembership> {
        self.lock()
            .memberships
            .iter()
            .filter(|m| &m.room == room && m.active)
            .cloned()
            .collect()
    }

    fn count_active_memberships(&self, room: &RoomCode) -> usize {
        self.lock()
            .memberships
            .iter()
            .filter(|m| &m.room == room && m.active)
            .count()
    }

    fn create_session(
        &self,
        room: &RoomCode,
        total_rounds: u32,
    ) -> Result<GameSession, StoreError> {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let session = GameSession {
            id,
            room: room.clone(),
            status: SessionStatus::Active,
            total_rounds,
            current_round: 0,
            started_at: SystemTime::now(),
            ended_at: None,
        };
        self.lock().sessions.push(session.clone());
        Ok(session)
    }

    fn session(&self, id: SessionId) -> Option<GameSession> {
        self.lock().sessions.iter().find(|s| s.id == id).cloned()
    }

    fn active_session_for_room(&self, room: &RoomCode) -> Option<GameSession> {
        self.lock()
            .sessions
            .iter()
            .find(|s| &s.room == room && s.status.is_active())
            .cloned()
    }

    fn set_session_status(
        &self,
        id: SessionId,
        status: SessionStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.status = status;
        if status == SessionStatus::Finished {
            session.ended_at = Some(SystemTime::now());
        }
        Ok(())
    }

    fn set_current_round(
        &self,
        id: SessionId,
        round: u32,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.current_round = round;
        Ok(())
    }

    fn insert_session_player(
        &self,
        player: SessionPlayer,
    ) -> Result<(), StoreError> {
        self.lock().session_players.push(player);
        Ok(())
    }

    fn session_player(
        &self,
        session: SessionId,
        player: PlayerId,
    ) -> Option<SessionPlayer> {
        self.lock()
            .session_players
            .iter()
            .find(|p| p.session == session && p.player == player)
            .cloned()
    }

    fn set_session_player_active(
        &self,
        session: SessionId,
        player: PlayerId,
        active: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let p = inner
            .session_players
            .iter_mut()
            .find(|p| p.session == session && p.player == player)
            .ok_or(StoreError::SessionPlayerNotFound(session, player))?;
        p.active = active;
        p.left_at = if active { None } else { Some(SystemTime::now()) };
        Ok(())
    }

    fn add_score(
        &self,
        session: SessionId,
        player: PlayerId,
        delta: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let p = inner
            .session_players
            .iter_mut()
            .find(|p| p.session == session && p.player == player)
            .ok_or(StoreError::SessionPlayerNotFound(session, player))?;
        p.score += delta;
        Ok(())
    }

    fn active_session_players(&self, session: SessionId) -> Vec<SessionPlayer> {
        self.lock()
            .session_players
            .iter()
            .filter(|p| p.session == session && p.active)
            .cloned()
            .collect()
    }

    fn session_players(&self, session: SessionId) -> Vec<SessionPlayer> {
        self.lock()
            .session_players
            .iter()
            .filter(|p| p.session == session)
            .cloned()
            .collect()
    }

    fn count_active_session_players(&self, session: SessionId) -> usize {
        self.lock()
            .session_players
            .iter()
            .filter(|p| p.session == session && p.active)
            .count()
    }
}
