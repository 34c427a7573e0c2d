//! Round lifecycle engine for Scrawl.
//!
//! Owns everything that happens between `GAME_STARTED` and
//! `ALL_ROUNDS_COMPLETE`: drawer rotation, word selection, the round
//! timer, guess adjudication, scoring, and the delayed hand-off to the
//! next round. Session and room lifecycle live one layer up.

mod config;
mod engine;
mod state;
mod words;

pub use config::RoundConfig;
pub use engine::{RoundEngine, RoundError};
pub use state::RoundState;
pub use words::{WordList, WordSource};
