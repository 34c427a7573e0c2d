//! Persistence collaborator for the Scrawl engine.
//!
//! The engine owns no durable state — it reads and writes rooms,
//! memberships, sessions, and per-session player rows through the
//! [`Store`] trait, and always re-fetches authoritative status before
//! mutating. [`MemoryStore`] is the in-process implementation used by the
//! engine's single-authority deployment model (and by every test).
//!
//! The trivial canvas stroke buffer ([`CanvasStore`]/[`MemoryCanvas`])
//! lives here too.

mod canvas;
mod memory;
mod records;
mod store;

pub use canvas::{CanvasStore, MemoryCanvas};
pub use memory::MemoryStore;
pub use records::{
    GameSession, Room, RoomMembership, RoomStatus, SessionPlayer,
    SessionStatus,
};
pub use store::{Store, StoreError};
