//! # Scrawl
//!
//! Real-time drawing-and-guessing game engine.
//!
//! Scrawl owns rooms, game sessions, and round orchestration for a
//! party game where one player draws a secret word and the others race
//! to guess it in chat. The engine is transport-agnostic: it emits
//! [`ServerEvent`]s through a [`Broadcaster`] and receives player
//! actions as plain method calls, so any websocket (or test) layer can
//! sit in front of it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scrawl::{ConnId, Engine, PlayerId};
//!
//! # async fn run() -> Result<(), scrawl::ScrawlError> {
//! let engine = Engine::builder().build();
//!
//! let room = engine.create_room(PlayerId(1))?;
//! engine
//!     .join_room(&room.code, PlayerId(1), "ada", ConnId::from("c1"))
//!     .await?;
//! engine
//!     .join_room(&room.code, PlayerId(2), "bea", ConnId::from("c2"))
//!     .await?;
//! engine.start_game(&room.code, PlayerId(1))?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;

pub use engine::{Engine, EngineBuilder};
pub use error::ScrawlError;

pub use scrawl_grace::{GraceConfig, GraceScheduler};
pub use scrawl_protocol::{
    Broadcaster, ChannelBroadcaster, ConnId, FinalScore, PlayerId, RoomCode, RoomPlayerSummary,
    RoundEndReason, RoundSnapshot, ServerEvent, SessionId, SessionPlayerSummary, UserChannel,
};
pub use scrawl_room::{RoomConfig, RoomError, RoomManager};
pub use scrawl_round::{RoundConfig, RoundEngine, RoundError, WordList, WordSource};
pub use scrawl_session::{SessionError, SessionManager};
pub use scrawl_store::{
    CanvasStore, GameSession, MemoryCanvas, MemoryStore, Room, RoomStatus, SessionStatus, Store,
    StoreError,
};

/// Installs a `tracing` subscriber reading `RUST_LOG`. No-op if a
/// subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
