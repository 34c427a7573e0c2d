//! In-flight round state.

use std::time::Duration;

use scrawl_protocol::PlayerId;
use tokio::time::Instant;

/// Everything the engine tracks about the round currently in play.
///
/// Lives only in memory; when a round ends (for any reason) the state is
/// dropped and the store's `current_round` counter is the sole survivor.
#[derive(Debug)]
pub struct RoundState {
    pub round_number: u32,
    pub drawer: PlayerId,
    pub drawer_name: String,
    /// The secret word. Leaves the engine only via the drawer's private
    /// channel and the end-of-round reveal.
    pub word: String,
    pub started_at: Instant,
    /// Active non-drawer players at round start. Fixed for the round —
    /// `ALL_GUESSED` compares against this, not the live roster.
    pub total_guessers: usize,
    /// Players who found the word, in guess order.
    correct: Vec<(PlayerId, String)>,
}

impl RoundState {
    pub fn new(
        round_number: u32,
        drawer: PlayerId,
        drawer_name: String,
        word: String,
        total_guessers: usize,
    ) -> Self {
        Self {
            round_number,
            drawer,
            drawer_name,
            word,
            started_at: Instant::now(),
            total_guessers,
            correct: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn has_guessed(&self, player: PlayerId) -> bool {
        self.correct.iter().any(|(p, _)| *p == player)
    }

    pub fn add_correct_guesser(&mut self, player: PlayerId, username: String) {
        self.correct.push((player, username));
    }

    pub fn correct_count(&self) -> usize {
        self.correct.len()
    }

    pub fn correct_guesser_names(&self) -> Vec<String> {
        self.correct.iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn everyone_guessed(&self) -> bool {
        self.correct.len() >= self.total_guessers
    }

    /// Case-insensitive exact match after trimming.
    pub fn is_correct_guess(&self, message: &str) -> bool {
        message.trim().eq_ignore_ascii_case(&self.word)
    }

    /// Whether the message leaks the word without being an exact guess.
    pub fn mentions_word(&self, message: &str) -> bool {
        message.to_lowercase().contains(&self.word.to_lowercase())
    }
}
