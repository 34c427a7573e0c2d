//! Shared vocabulary for the Scrawl game engine.
//!
//! This crate defines what the rest of the workspace talks about:
//!
//! - **Identities** ([`PlayerId`], [`SessionId`], [`RoomCode`], [`ConnId`])
//! - **Events** ([`ServerEvent`] and its payload structs) — every message
//!   kind the engine emits toward clients
//! - **The broadcast seam** ([`Broadcaster`]) — how those events leave the
//!   engine, with a channel-backed in-process implementation
//!   ([`ChannelBroadcaster`])
//!
//! It knows nothing about rooms, rounds, or storage — only the shapes that
//! cross layer boundaries.

mod broadcast;
mod events;
mod ids;

pub use broadcast::{Broadcaster, ChannelBroadcaster, UserChannel};
pub use events::{
    FinalScore, RoomPlayerSummary, RoundEndReason, RoundSnapshot,
    ServerEvent, SessionPlayerSummary,
};
pub use ids::{ConnId, PlayerId, RoomCode, SessionId};
