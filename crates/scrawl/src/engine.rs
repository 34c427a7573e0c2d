//! `Engine` builder and the unified game-facing API.
//!
//! This is the entry point for embedding Scrawl. The builder wires the
//! collaborators together (store, canvas buffer, broadcaster, word
//! source) and hands back an [`Engine`] whose methods cover the whole
//! player lifecycle: create/join a room, start a game, route chat and
//! guesses, feed connection drops in, and replay state to reconnects.

use std::sync::Arc;
use std::time::Duration;

use scrawl_grace::{GraceConfig, GraceScheduler};
use scrawl_protocol::{
    Broadcaster, ChannelBroadcaster, ConnId, PlayerId, RoomCode, RoomPlayerSummary, ServerEvent,
};
use scrawl_room::{RoomConfig, RoomManager};
use scrawl_round::{RoundConfig, RoundEngine, WordList, WordSource};
use scrawl_session::SessionManager;
use scrawl_store::{CanvasStore, GameSession, MemoryCanvas, MemoryStore, Room, Store};

use crate::ScrawlError;

/// Builder for configuring and assembling an [`Engine`].
///
/// Every collaborator has an in-process default (memory store, memory
/// canvas, channel broadcaster, built-in word list), so
/// `Engine::builder().build()` is a fully working engine.
pub struct EngineBuilder {
    round_config: RoundConfig,
    room_config: RoomConfig,
    grace_period: Duration,
    store: Option<Arc<dyn Store>>,
    canvas: Option<Arc<dyn CanvasStore>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    words: Option<Arc<dyn WordSource>>,
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            round_config: RoundConfig::default(),
            room_config: RoomConfig::default(),
            grace_period: GraceConfig::default().grace_period,
            store: None,
            canvas: None,
            broadcaster: None,
            words: None,
        }
    }

    /// Sets the round timing and scoring configuration.
    pub fn round_config(mut self, config: RoundConfig) -> Self {
        self.round_config = config;
        self
    }

    /// Sets the room admission configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long disconnected players are held before removal.
    /// Applies to both the room-level and session-level windows.
    pub fn grace_period(mut self, period: Duration) -> Self {
        self.grace_period = period;
        self
    }

    /// Sets the persistence collaborator.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the canvas stroke buffer.
    pub fn canvas(mut self, canvas: Arc<dyn CanvasStore>) -> Self {
        self.canvas = Some(canvas);
        self
    }

    /// Sets the outbound message broadcaster (the transport seam).
    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Sets the word source for round starts.
    pub fn word_source(mut self, words: Arc<dyn WordSource>) -> Self {
        self.words = Some(words);
        self
    }

    /// Assembles the engine, wiring defaults for anything unset.
    pub fn build(self) -> Engine {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let canvas = self.canvas.unwrap_or_else(|| Arc::new(MemoryCanvas::new()));
        let broadcaster = self
            .broadcaster
            .unwrap_or_else(|| Arc::new(ChannelBroadcaster::new()));
        let words = self.words.unwrap_or_else(|| Arc::new(WordList::default()));
        let grace = GraceConfig {
            grace_period: self.grace_period,
        };

        let rounds = Arc::new(RoundEngine::new(
            self.round_config,
            store.clone(),
            canvas.clone(),
            words,
            broadcaster.clone(),
        ));
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            canvas.clone(),
            broadcaster.clone(),
            rounds.clone(),
            GraceScheduler::new(grace.clone()),
        ));
        let rooms = Arc::new(RoomManager::new(
            self.room_config,
            store.clone(),
            broadcaster.clone(),
            sessions.clone(),
            GraceScheduler::new(grace),
        ));

        Engine {
            store,
            canvas,
            broadcaster,
            rounds,
            sessions,
            rooms,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled game engine.
///
/// One `Engine` serves every room in the process. Methods that touch
/// timers take `&self`; the engine is cheap to share behind an `Arc`.
pub struct Engine {
    store: Arc<dyn Store>,
    canvas: Arc<dyn CanvasStore>,
    broadcaster: Arc<dyn Broadcaster>,
    rounds: Arc<RoundEngine>,
    sessions: Arc<SessionManager>,
    rooms: Arc<RoomManager>,
}

impl Engine {
    /// Creates a new builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    // -- Room lifecycle --

    /// Opens a new waiting room hosted by `host`.
    pub fn create_room(&self, host: PlayerId) -> Result<Room, ScrawlError> {
        Ok(self.rooms.create_room(host)?)
    }

    /// Admits a player into a room, or re-admits a returning one (which
    /// also pushes the private catch-up state mid-game).
    pub async fn join_room(
        &self,
        room_code: &RoomCode,
        player: PlayerId,
        username: &str,
        conn: ConnId,
    ) -> Result<(), ScrawlError> {
        Ok(self
            .rooms
            .join_room(room_code, player, username, conn)
            .await?)
    }

    /// The room record for a join code.
    pub fn room(&self, room_code: &RoomCode) -> Option<Room> {
        self.rooms.room(room_code)
    }

    /// Currently active members of a room, in join order.
    pub fn active_players(&self, room_code: &RoomCode) -> Vec<RoomPlayerSummary> {
        self.rooms.active_players(room_code)
    }

    // -- Game lifecycle --

    /// Starts a game in a waiting room. Host only; needs two players.
    pub fn start_game(
        &self,
        room_code: &RoomCode,
        host: PlayerId,
    ) -> Result<GameSession, ScrawlError> {
        Ok(self.sessions.start_session(room_code, host)?)
    }

    /// Tears down the room's running game, if any. Idempotent.
    pub async fn end_game(&self, room_code: &RoomCode) -> Result<(), ScrawlError> {
        Ok(self.sessions.end_session(room_code).await?)
    }

    /// The room's active session, if a game is running.
    pub fn active_session(&self, room_code: &RoomCode) -> Option<GameSession> {
        self.sessions.active_session(room_code)
    }

    // -- In-game traffic --

    /// Routes a chat message. Mid-round it doubles as a guess: correct
    /// guesses score and are announced, near-misses and drawer messages
    /// are blocked privately, everything else passes through as chat.
    pub async fn handle_chat_message(
        &self,
        room_code: &RoomCode,
        player: PlayerId,
        username: &str,
        message: &str,
    ) -> Result<(), ScrawlError> {
        if let Some(session) = self.sessions.active_session(room_code) {
            self.rounds
                .process_guess(session.id, room_code, player, username, message)
                .await?;
        } else if !message.trim().is_empty() {
            self.broadcaster.publish_to_room(
                room_code,
                &ServerEvent::ChatMessage {
                    username: username.to_string(),
                    message: message.to_string(),
                },
            );
        }
        Ok(())
    }

    /// Buffers a canvas stroke for reconnect replay. Only the current
    /// drawer may draw; returns whether the stroke was accepted.
    pub async fn append_stroke(
        &self,
        room_code: &RoomCode,
        player: PlayerId,
        stroke: serde_json::Value,
    ) -> bool {
        if !self.rounds.is_drawer(room_code, player).await {
            return false;
        }
        self.canvas.append_stroke(room_code, stroke);
        true
    }

    /// Whether `player` is drawing in the room's current round.
    pub async fn is_drawer(&self, room_code: &RoomCode, player: PlayerId) -> bool {
        self.rounds.is_drawer(room_code, player).await
    }

    // -- Connection events --

    /// Feeds a dropped connection in. Starts the grace window(s); the
    /// departure is only applied if the player does not rejoin in time.
    pub fn handle_disconnect(&self, conn: &ConnId) {
        self.rooms.handle_player_disconnect(conn);
    }

    // -- Collaborator access --

    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn rounds(&self) -> &Arc<RoundEngine> {
        &self.rounds
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<dyn Broadcaster> {
        &self.broadcaster
    }
}
