//! Unified error type for the Scrawl engine.

use scrawl_room::RoomError;
use scrawl_round::RoundError;
use scrawl_session::SessionError;
use scrawl_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `scrawl` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ScrawlError {
    /// A room-level error (full, not found, game in progress).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A session-level error (not host, already running, understaffed).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A round-level error.
    #[error(transparent)]
    Round(#[from] RoundError),

    /// A persistence-level error.
    #[error(transparent)]
    Store(#[from] StoreError),
}
