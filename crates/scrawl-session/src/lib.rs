//! Game session lifecycle for Scrawl.
//!
//! A session is one playthrough inside a room: host-gated start,
//! per-player scores, disconnect grace windows, reconnection state push,
//! and the end-of-game teardown. Round mechanics are delegated to
//! [`scrawl_round::RoundEngine`]; room membership lives one layer up in
//! `scrawl-room`.

mod manager;

pub use manager::{SessionError, SessionManager};
