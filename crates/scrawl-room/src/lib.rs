//! Room lifecycle for Scrawl.
//!
//! Rooms are lobbies identified by a six-digit join code. This crate
//! owns code generation, join/reconnect admission, room-level disconnect
//! grace windows, host reassignment, and the closure rules that retire a
//! room once it empties out. In-game consequences of membership changes
//! are delegated to [`scrawl_session::SessionManager`].

mod manager;

pub use manager::{RoomConfig, RoomError, RoomManager};
