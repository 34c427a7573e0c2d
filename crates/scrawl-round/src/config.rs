//! Tunables for the round engine.

use std::time::Duration;

/// Full configuration for round timing and scoring.
#[derive(Debug, Clone)]
pub struct RoundConfig {
    /// How long each drawing round lasts.
    pub round_duration: Duration,
    /// Points for a guess at t=0. Decays linearly to the 50-point floor
    /// over the round duration.
    pub max_guesser_points: i64,
    /// Flat award to the drawer for each correct guess.
    pub drawer_points_per_guess: i64,
    /// Pause between one round ending and the next starting.
    pub between_rounds_delay: Duration,
    /// Pause between game start and the first round, so clients can
    /// render the game screen first.
    pub first_round_delay: Duration,
    /// How long to wait before re-attempting a round start that found
    /// fewer than two active players.
    pub start_retry_interval: Duration,
    /// How many re-attempts before giving up on an understaffed session.
    pub max_start_retries: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(40),
            max_guesser_points: 500,
            drawer_points_per_guess: 100,
            between_rounds_delay: Duration::from_secs(5),
            first_round_delay: Duration::from_secs(2),
            start_retry_interval: Duration::from_secs(5),
            max_start_retries: 6,
        }
    }
}

impl RoundConfig {
    /// The guesser award for a correct guess `elapsed` into the round.
    ///
    /// Linear decay from `max_guesser_points` with a floor of 50, so a
    /// buzzer-beater guess still pays something.
    pub fn guesser_points(&self, elapsed: Duration) -> i64 {
        let duration_secs = self.round_duration.as_secs().max(1) as i64;
        let elapsed_secs = elapsed.as_secs() as i64;
        let decayed =
            self.max_guesser_points - elapsed_secs * self.max_guesser_points / duration_secs;
        decayed.max(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guesser_points_full_at_instant_guess() {
        let cfg = RoundConfig::default();
        assert_eq!(cfg.guesser_points(Duration::ZERO), 500);
    }

    #[test]
    fn test_guesser_points_decay_is_linear() {
        let cfg = RoundConfig::default();
        assert_eq!(cfg.guesser_points(Duration::from_secs(10)), 375);
        assert_eq!(cfg.guesser_points(Duration::from_secs(20)), 250);
        assert_eq!(cfg.guesser_points(Duration::from_secs(30)), 125);
    }

    #[test]
    fn test_guesser_points_floor_at_fifty() {
        let cfg = RoundConfig::default();
        assert_eq!(cfg.guesser_points(Duration::from_secs(39)), 50);
        assert_eq!(cfg.guesser_points(Duration::from_secs(40)), 50);
        // Even past the nominal duration (timer races), never below 50.
        assert_eq!(cfg.guesser_points(Duration::from_secs(120)), 50);
    }
}
