//! Record types owned by the persistence collaborator.
//!
//! The engine treats these as snapshots: it re-fetches the authoritative
//! row before every mutation instead of trusting a copy held across an
//! await point. Rooms are never physically deleted — a closed room is
//! marked [`RoomStatus::Finished`] with a `closed_at` timestamp.

use std::time::SystemTime;

use scrawl_protocol::{ConnId, PlayerId, RoomCode, SessionId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Lifecycle state of a room.
///
/// ```text
/// Waiting → Playing → Finished
///    └───────────────────┘  (lobby abandoned before a game started)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Whether new (non-reconnecting) players may join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "WAITING",
            Self::Playing => "PLAYING",
            Self::Finished => "FINISHED",
        };
        f.write_str(s)
    }
}

/// A lobby of players identified by a short join code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub host: PlayerId,
    pub status: RoomStatus,
    pub created_at: SystemTime,
    pub closed_at: Option<SystemTime>,
}

impl Room {
    pub fn new(code: RoomCode, host: PlayerId) -> Self {
        Self {
            code,
            host,
            status: RoomStatus::Waiting,
            created_at: SystemTime::now(),
            closed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomMembership
// ---------------------------------------------------------------------------

/// One player's membership row in one room.
///
/// Created on first join and reactivated (never recreated) on
/// reconnection; marked inactive when a disconnect grace period expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMembership {
    pub room: RoomCode,
    pub player: PlayerId,
    pub username: String,
    pub conn: ConnId,
    pub active: bool,
    pub joined_at: SystemTime,
    pub left_at: Option<SystemTime>,
}

impl RoomMembership {
    pub fn new(
        room: RoomCode,
        player: PlayerId,
        username: String,
        conn: ConnId,
    ) -> Self {
        Self {
            room,
            player,
            username,
            conn,
            active: true,
            joined_at: SystemTime::now(),
            left_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

/// Lifecycle state of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Waiting,
    Active,
    Finished,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "WAITING",
            Self::Active => "ACTIVE",
            Self::Finished => "FINISHED",
        };
        f.write_str(s)
    }
}

/// One playthrough of the game within a room.
///
/// `current_round` is 0 before the first round starts; the round engine
/// persists each increment before broadcasting the round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub room: RoomCode,
    pub status: SessionStatus,
    pub total_rounds: u32,
    pub current_round: u32,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
}

// ---------------------------------------------------------------------------
// SessionPlayer
// ---------------------------------------------------------------------------

/// One player's participation row in one session.
///
/// `score` is monotonically non-decreasing within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlayer {
    pub session: SessionId,
    pub player: PlayerId,
    pub username: String,
    pub score: i64,
    pub is_host: bool,
    pub active: bool,
    pub joined_at: SystemTime,
    pub left_at: Option<SystemTime>,
}

impl SessionPlayer {
    pub fn new(
        session: SessionId,
        player: PlayerId,
        username: String,
        is_host: bool,
    ) -> Self {
        Self {
            session,
            player,
            username,
            score: 0,
            is_host,
            active: true,
            joined_at: SystemTime::now(),
            left_at: None,
        }
    }
}
