//! Every message kind the engine emits toward clients.
//!
//! The engine does not own a wire format — it hands [`ServerEvent`]s to a
//! [`Broadcaster`](crate::Broadcaster) and the transport layer decides how
//! they reach clients. The serde attributes here still pin down the JSON
//! shape, because the browser client matches on the `"type"` discriminant
//! (`"ROUND_STARTED"`, `"YOUR_WORD"`, …).

use serde::{Deserialize, Serialize};

use crate::{PlayerId, SessionId};

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundEndReason {
    /// The round timer expired.
    TimeUp,
    /// Every eligible guesser found the word.
    AllGuessed,
    /// The drawer disconnected mid-round.
    DrawerLeft,
    /// Fewer than two players remained active.
    NotEnoughPlayers,
}

impl std::fmt::Display for RoundEndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TimeUp => "TIME_UP",
            Self::AllGuessed => "ALL_GUESSED",
            Self::DrawerLeft => "DRAWER_LEFT",
            Self::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
        };
        f.write_str(s)
    }
}

/// One player's row in lobby rosters (`PLAYER_JOINED`, `HOST_CHANGED`, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlayerSummary {
    pub player_id: PlayerId,
    pub username: String,
    pub is_host: bool,
}

/// One player's row in in-game rosters and score tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlayerSummary {
    pub player_id: PlayerId,
    pub username: String,
    pub score: i64,
    pub is_host: bool,
}

/// One line of the final scoreboard, sorted descending by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub username: String,
    pub score: i64,
}

/// Point-in-time round view pushed to a reconnecting player.
///
/// Two shapes share this struct: mid-round (drawer, word length, elapsed
/// time and guess progress are present) and between rounds
/// (`between_rounds = true`, only round counters and scores). The secret
/// word itself never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_number: u32,
    pub total_rounds: u32,
    pub between_rounds: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawer_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    pub players: Vec<SessionPlayerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_guessers: Option<usize>,
    pub correct_guessers: Vec<String>,
}

/// Everything the engine can say to clients.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "CHAT_MESSAGE", "username": "ada", "message": "hi" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // -- Round flow --
    #[serde(rename = "ROUND_STARTED")]
    RoundStarted {
        round_number: u32,
        total_rounds: u32,
        drawer_id: PlayerId,
        drawer_name: String,
        /// Length only — the word itself goes to the drawer alone.
        word_length: usize,
        duration_seconds: u64,
        players: Vec<SessionPlayerSummary>,
    },

    /// Private: the secret word, delivered to the drawer only.
    #[serde(rename = "YOUR_WORD")]
    YourWord { word: String, round_number: u32 },

    #[serde(rename = "CORRECT_GUESS")]
    CorrectGuess {
        username: String,
        score: i64,
        correct_count: usize,
        total_guessers: usize,
    },

    /// Private: why a guess was rejected (drawer, duplicate, too close).
    #[serde(rename = "GUESS_BLOCKED")]
    GuessBlocked { message: String },

    #[serde(rename = "ROUND_ENDED")]
    RoundEnded {
        round_number: u32,
        /// The word is revealed to the whole room at round end.
        word: String,
        reason: RoundEndReason,
        correct_guessers: Vec<String>,
        drawer_name: String,
    },

    #[serde(rename = "CHAT_MESSAGE")]
    ChatMessage { username: String, message: String },

    #[serde(rename = "ALL_ROUNDS_COMPLETE")]
    AllRoundsComplete {
        final_scores: Vec<FinalScore>,
        winner: Option<String>,
    },

    // -- Session flow --
    #[serde(rename = "GAME_STARTED")]
    GameStarted {
        session_id: SessionId,
        total_rounds: u32,
        current_round: u32,
        players: Vec<SessionPlayerSummary>,
    },

    #[serde(rename = "GAME_ENDED")]
    GameEnded {
        final_scores: Vec<FinalScore>,
        winner: Option<String>,
    },

    // -- Presence --
    #[serde(rename = "PLAYER_JOINED")]
    PlayerJoined {
        username: String,
        players: Vec<RoomPlayerSummary>,
    },

    #[serde(rename = "PLAYER_RECONNECTED")]
    PlayerReconnected {
        username: String,
        /// Whether the room was mid-game when the player came back.
        in_game: bool,
        players: Vec<RoomPlayerSummary>,
    },

    #[serde(rename = "PLAYER_DISCONNECTED")]
    PlayerDisconnected {
        username: String,
        in_game: bool,
        grace_period_seconds: u64,
        players: Vec<RoomPlayerSummary>,
    },

    #[serde(rename = "PLAYER_LEFT")]
    PlayerLeft {
        username: String,
        in_game: bool,
        players: Vec<RoomPlayerSummary>,
    },

    #[serde(rename = "HOST_CHANGED")]
    HostChanged {
        new_host: String,
        players: Vec<RoomPlayerSummary>,
    },

    // -- Reconnection state push --
    #[serde(rename = "ROUND_STATE")]
    RoundState {
        #[serde(flatten)]
        snapshot: RoundSnapshot,
    },

    #[serde(rename = "CANVAS_STATE")]
    CanvasState { strokes: Vec<serde_json::Value> },

    /// Broadcast at each round start after the stroke buffer is wiped.
    #[serde(rename = "CANVAS_CLEAR")]
    CanvasClear,
}
