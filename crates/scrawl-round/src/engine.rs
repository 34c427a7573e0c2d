//! The round engine: drawer rotation, guess processing, scoring, and the
//! round timer chain.
//!
//! One [`SessionEntry`] exists per running game. All round operations for
//! a session serialize on that entry's async mutex; the engine-level map
//! lock is held only long enough to look the entry up, so sessions never
//! block each other.
//!
//! Timer tasks (round expiry, between-rounds delay, understaffed-start
//! retries) capture `Arc<RoundEngine>` and re-enter through the public
//! operations, taking the session lock like any other caller. A fired
//! timer that finds its round already gone simply does nothing, which is
//! what makes round end idempotent across the `TIME_UP` / `ALL_GUESSED` /
//! `DRAWER_LEFT` races.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use scrawl_protocol::{
    Broadcaster, FinalScore, PlayerId, RoomCode, RoundEndReason, RoundSnapshot, ServerEvent,
    SessionId, SessionPlayerSummary, UserChannel,
};
use scrawl_store::{CanvasStore, GameSession, RoomStatus, SessionPlayer, SessionStatus, Store, StoreError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{RoundConfig, RoundState, WordSource};

/// Errors from round operations.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct SessionEntry {
    room: RoomCode,
    state: tokio::sync::Mutex<SessionRound>,
}

/// Per-session mutable state, guarded by the entry's async mutex.
#[derive(Default)]
struct SessionRound {
    /// Join order captured at game start. Never reordered; rotation
    /// filters it down to currently-active players each round.
    drawer_order: Vec<PlayerId>,
    /// Monotonic pick counter. Advances every round even when the active
    /// subset shrinks, so returning players slot back into the cycle.
    rotation: u32,
    round: Option<RoundState>,
    round_timer: Option<JoinHandle<()>>,
    /// Delayed next-round or retry task. Replaced, never awaited.
    pending_next: Option<JoinHandle<()>>,
}

enum GuessOutcome {
    DrawerBlocked,
    AlreadyGuessed,
    Correct,
    TooClose,
    Chat,
}

/// Orchestrates rounds for every running session.
pub struct RoundEngine {
    config: RoundConfig,
    store: Arc<dyn Store>,
    canvas: Arc<dyn CanvasStore>,
    words: Arc<dyn WordSource>,
    broadcaster: Arc<dyn Broadcaster>,
    sessions: Mutex<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl RoundEngine {
    pub fn new(
        config: RoundConfig,
        store: Arc<dyn Store>,
        canvas: Arc<dyn CanvasStore>,
        words: Arc<dyn WordSource>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            config,
            store,
            canvas,
            words,
            broadcaster,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    fn entry(&self, session: SessionId) -> Option<Arc<SessionEntry>> {
        self.sessions
            .lock()
            .expect("round engine lock poisoned")
            .get(&session)
            .cloned()
    }

    /// Capture the drawer rotation for a freshly started session and
    /// schedule its first round after a short client-render delay.
    pub fn initialize_game(self: &Arc<Self>, session: &GameSession) {
        let drawer_order: Vec<PlayerId> = self
            .store
            .active_session_players(session.id)
            .iter()
            .map(|p| p.player)
            .collect();

        info!(
            session = %session.id,
            room = %session.room,
            ?drawer_order,
            "game initialized"
        );

        let entry = Arc::new(SessionEntry {
            room: session.room.clone(),
            state: tokio::sync::Mutex::new(SessionRound {
                drawer_order,
                ..SessionRound::default()
            }),
        });
        self.sessions
            .lock()
            .expect("round engine lock poisoned")
            .insert(session.id, entry);

        let engine = Arc::clone(self);
        let session_id = session.id;
        let delay = self.config.first_round_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = engine.start_next_round(session_id).await {
                error!(session = %session_id, %err, "failed to start first round");
            }
        });
    }

    /// Attempt to start the session's next round immediately.
    pub async fn start_next_round(self: &Arc<Self>, session_id: SessionId) -> Result<(), RoundError> {
        self.start_attempt(session_id, 0).await
    }

    async fn start_attempt(
        self: &Arc<Self>,
        session_id: SessionId,
        retry: u32,
    ) -> Result<(), RoundError> {
        let Some(entry) = self.entry(session_id) else {
            return Ok(());
        };
        let mut state = entry.state.lock().await;

        // A live round owns the session until it ends.
        if state.round.is_some() {
            debug!(session = %session_id, "round already in play, not starting another");
            return Ok(());
        }

        // Detach (don't abort) any scheduled start: we may *be* that task.
        state.pending_next = None;

        let Some(session) = self.store.session(session_id) else {
            warn!(session = %session_id, "session record missing, abandoning rounds");
            self.remove_entry_locked(session_id, &mut state);
            return Ok(());
        };
        if !session.status.is_active() {
            info!(session = %session_id, status = %session.status, "session not active, not starting round");
            self.remove_entry_locked(session_id, &mut state);
            return Ok(());
        }

        let next_round = session.current_round + 1;
        if next_round > session.total_rounds {
            info!(
                session = %session_id,
                total_rounds = session.total_rounds,
                "all rounds complete"
            );
            self.remove_entry_locked(session_id, &mut state);
            drop(state);
            self.broadcast_all_rounds_complete(&entry.room, &session);
            self.finalize(&session)?;
            return Ok(());
        }

        let active = self.store.active_session_players(session_id);
        if active.len() < 2 {
            self.retry_or_give_up(session_id, retry, &mut state, "fewer than 2 active players");
            return Ok(());
        }

        let active_ids: HashSet<PlayerId> = active.iter().map(|p| p.player).collect();
        let active_order: Vec<PlayerId> = state
            .drawer_order
            .iter()
            .copied()
            .filter(|p| active_ids.contains(p))
            .collect();
        if active_order.is_empty() {
            self.retry_or_give_up(session_id, retry, &mut state, "no rotation candidates active");
            return Ok(());
        }

        let drawer = active_order[state.rotation as usize % active_order.len()];
        state.rotation += 1;

        let Some(drawer_row) = active.iter().find(|p| p.player == drawer) else {
            error!(session = %session_id, drawer = %drawer, "drawer missing from active players");
            return Ok(());
        };

        let word = self.words.pick();

        // Fresh canvas before anyone sees the new round.
        self.canvas.clear(&entry.room);
        self.broadcaster
            .publish_to_room(&entry.room, &ServerEvent::CanvasClear);

        self.store.set_current_round(session_id, next_round)?;

        let round = RoundState::new(
            next_round,
            drawer,
            drawer_row.username.clone(),
            word.clone(),
            active.len() - 1,
        );

        let engine = Arc::clone(self);
        let duration = self.config.round_duration;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            engine.end_round(session_id, RoundEndReason::TimeUp).await;
        });
        if let Some(stale) = state.round_timer.replace(timer) {
            stale.abort();
        }
        state.round = Some(round);

        let players: Vec<SessionPlayerSummary> =
            active.iter().map(player_summary).collect();
        self.broadcaster.publish_to_room(
            &entry.room,
            &ServerEvent::RoundStarted {
                round_number: next_round,
                total_rounds: session.total_rounds,
                drawer_id: drawer,
                drawer_name: drawer_row.username.clone(),
                word_length: word.chars().count(),
                duration_seconds: duration.as_secs(),
                players,
            },
        );
        self.broadcaster.publish_to_user(
            drawer,
            UserChannel::Word,
            &ServerEvent::YourWord {
                word,
                round_number: next_round,
            },
        );

        info!(
            session = %session_id,
            round = next_round,
            drawer = %drawer_row.username,
            "round started"
        );
        Ok(())
    }

    fn retry_or_give_up(
        self: &Arc<Self>,
        session_id: SessionId,
        retry: u32,
        state: &mut SessionRound,
        why: &str,
    ) {
        if retry < self.config.max_start_retries {
            info!(
                session = %session_id,
                attempt = retry + 1,
                max = self.config.max_start_retries,
                why,
                "cannot start round, retrying"
            );
            let engine = Arc::clone(self);
            let interval = self.config.start_retry_interval;
            state.pending_next = Some(tokio::spawn(async move {
                tokio::time::sleep(interval).await;
                if let Err(err) = engine.start_attempt(session_id, retry + 1).await {
                    error!(session = %session_id, %err, "round start retry failed");
                }
            }));
        } else {
            warn!(
                session = %session_id,
                retries = self.config.max_start_retries,
                why,
                "giving up on starting next round"
            );
        }
    }

    /// Route a chat message through guess checking.
    ///
    /// Outside a round everything is plain chat. During a round the
    /// drawer and prior correct guessers are blocked privately, exact
    /// matches score, and near-misses that contain the word are
    /// suppressed so the word never leaks into room chat.
    pub async fn process_guess(
        self: &Arc<Self>,
        session_id: SessionId,
        room: &RoomCode,
        player: PlayerId,
        username: &str,
        message: &str,
    ) -> Result<(), RoundError> {
        if message.trim().is_empty() {
            return Ok(());
        }
        let Some(entry) = self.entry(session_id) else {
            self.broadcast_chat(room, username, message);
            return Ok(());
        };
        let mut state = entry.state.lock().await;

        let outcome = match state.round.as_ref() {
            None => {
                drop(state);
                self.broadcast_chat(room, username, message);
                return Ok(());
            }
            Some(round) => {
                if round.drawer == player {
                    GuessOutcome::DrawerBlocked
                } else if round.has_guessed(player) {
                    GuessOutcome::AlreadyGuessed
                } else if round.is_correct_guess(message) {
                    GuessOutcome::Correct
                } else if round.mentions_word(message) {
                    GuessOutcome::TooClose
                } else {
                    GuessOutcome::Chat
                }
            }
        };

        match outcome {
            GuessOutcome::DrawerBlocked => {
                self.send_guess_blocked(player, "You are drawing, cannot send message when drawing");
            }
            GuessOutcome::AlreadyGuessed => {
                self.send_guess_blocked(player, "Already guessed");
            }
            GuessOutcome::Correct => {
                self.apply_correct_guess(session_id, &entry.room, &mut state, player, username)?;
            }
            GuessOutcome::TooClose => {
                self.send_guess_blocked(player, "Almost guessed");
            }
            GuessOutcome::Chat => {
                self.broadcast_chat(room, username, message);
            }
        }
        Ok(())
    }

    fn apply_correct_guess(
        self: &Arc<Self>,
        session_id: SessionId,
        room: &RoomCode,
        state: &mut SessionRound,
        player: PlayerId,
        username: &str,
    ) -> Result<(), RoundError> {
        let everyone_guessed = {
            let Some(round) = state.round.as_mut() else {
                return Ok(());
            };
            round.add_correct_guesser(player, username.to_string());

            let points = self.config.guesser_points(round.elapsed());
            self.store.add_score(session_id, player, points)?;
            self.store
                .add_score(session_id, round.drawer, self.config.drawer_points_per_guess)?;

            self.broadcaster.publish_to_room(
                room,
                &ServerEvent::CorrectGuess {
                    username: username.to_string(),
                    score: points,
                    correct_count: round.correct_count(),
                    total_guessers: round.total_guessers,
                },
            );
            info!(
                session = %session_id,
                username,
                points,
                progress = format!("{}/{}", round.correct_count(), round.total_guessers),
                "correct guess"
            );
            round.everyone_guessed()
        };

        if everyone_guessed {
            self.end_round_locked(session_id, room, state, RoundEndReason::AllGuessed);
        }
        Ok(())
    }

    /// End the session's current round, if one is in play. Idempotent.
    pub async fn end_round(self: &Arc<Self>, session_id: SessionId, reason: RoundEndReason) {
        let Some(entry) = self.entry(session_id) else {
            return;
        };
        let mut state = entry.state.lock().await;
        self.end_round_locked(session_id, &entry.room, &mut state, reason);
    }

    fn end_round_locked(
        self: &Arc<Self>,
        session_id: SessionId,
        room: &RoomCode,
        state: &mut SessionRound,
        reason: RoundEndReason,
    ) {
        let Some(round) = state.round.take() else {
            debug!(session = %session_id, %reason, "round already ended");
            return;
        };
        if let Some(timer) = state.round_timer.take() {
            timer.abort();
        }

        info!(
            session = %session_id,
            round = round.round_number,
            %reason,
            correct = round.correct_count(),
            "round ended"
        );

        self.broadcaster.publish_to_room(
            room,
            &ServerEvent::RoundEnded {
                round_number: round.round_number,
                word: round.word.clone(),
                reason,
                correct_guessers: round.correct_guesser_names(),
                drawer_name: round.drawer_name.clone(),
            },
        );

        let engine = Arc::clone(self);
        let delay = self.config.between_rounds_delay;
        state.pending_next = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = engine.start_next_round(session_id).await {
                error!(session = %session_id, %err, "failed to start next round");
            }
        }));
    }

    /// The drawer's departure forfeits the round immediately.
    pub async fn handle_drawer_disconnect(
        self: &Arc<Self>,
        session_id: SessionId,
        player: PlayerId,
    ) {
        let Some(entry) = self.entry(session_id) else {
            return;
        };
        let mut state = entry.state.lock().await;
        let is_drawer = state.round.as_ref().is_some_and(|r| r.drawer == player);
        if is_drawer {
            info!(session = %session_id, player = %player, "drawer left mid-round");
            self.end_round_locked(session_id, &entry.room, &mut state, RoundEndReason::DrawerLeft);
        }
    }

    /// Re-check round viability after a guesser's departure: the round
    /// ends early if the table dropped below two players, or if everyone
    /// still present has already found the word.
    pub async fn handle_guesser_disconnect(self: &Arc<Self>, session_id: SessionId) {
        let Some(entry) = self.entry(session_id) else {
            return;
        };
        let mut state = entry.state.lock().await;

        let reason = {
            let Some(round) = state.round.as_ref() else {
                return;
            };
            if self.store.count_active_session_players(session_id) < 2 {
                Some(RoundEndReason::NotEnoughPlayers)
            } else {
                let remaining = self
                    .store
                    .active_session_players(session_id)
                    .iter()
                    .filter(|p| p.player != round.drawer && !round.has_guessed(p.player))
                    .count();
                (remaining == 0).then_some(RoundEndReason::AllGuessed)
            }
        };

        if let Some(reason) = reason {
            info!(session = %session_id, %reason, "ending round after guesser departure");
            self.end_round_locked(session_id, &entry.room, &mut state, reason);
        }
    }

    /// Mid-round view for a reconnecting player, or `None` when no round
    /// is in play.
    pub async fn round_snapshot(&self, session_id: SessionId) -> Option<RoundSnapshot> {
        let entry = self.entry(session_id)?;
        let state = entry.state.lock().await;
        let round = state.round.as_ref()?;
        let session = self.store.session(session_id)?;
        let active = self.store.active_session_players(session_id);

        let total_guessers = active.iter().filter(|p| p.player != round.drawer).count();
        let correct_guessers = active
            .iter()
            .filter(|p| p.player != round.drawer && round.has_guessed(p.player))
            .map(|p| p.username.clone())
            .collect();

        Some(RoundSnapshot {
            round_number: round.round_number,
            total_rounds: session.total_rounds,
            between_rounds: false,
            drawer_id: Some(round.drawer),
            drawer_name: Some(round.drawer_name.clone()),
            word_length: Some(round.word.chars().count()),
            elapsed_seconds: Some(round.elapsed().as_secs()),
            duration_seconds: Some(self.config.round_duration.as_secs()),
            players: active.iter().map(player_summary).collect(),
            total_guessers: Some(total_guessers),
            correct_guessers,
        })
    }

    /// Round counters and live scores for a reconnect that lands in the
    /// pause between rounds.
    pub fn between_rounds_snapshot(&self, session_id: SessionId) -> Option<RoundSnapshot> {
        let session = self.store.session(session_id)?;
        let active = self.store.active_session_players(session_id);
        Some(RoundSnapshot {
            round_number: session.current_round,
            total_rounds: session.total_rounds,
            between_rounds: true,
            drawer_id: None,
            drawer_name: None,
            word_length: None,
            elapsed_seconds: None,
            duration_seconds: None,
            players: active.iter().map(player_summary).collect(),
            total_guessers: None,
            correct_guessers: Vec::new(),
        })
    }

    /// The secret word, but only for the current drawer.
    pub async fn word_for_drawer(&self, session_id: SessionId, player: PlayerId) -> Option<String> {
        let entry = self.entry(session_id)?;
        let state = entry.state.lock().await;
        let round = state.round.as_ref()?;
        (round.drawer == player).then(|| round.word.clone())
    }

    /// Whether `player` is drawing in the room's active session right now.
    pub async fn is_drawer(&self, room: &RoomCode, player: PlayerId) -> bool {
        let Some(session) = self.store.active_session_for_room(room) else {
            return false;
        };
        self.word_for_drawer(session.id, player).await.is_some()
    }

    /// Whether a round is currently in play for the session.
    pub async fn round_in_progress(&self, session_id: SessionId) -> bool {
        match self.entry(session_id) {
            Some(entry) => entry.state.lock().await.round.is_some(),
            None => false,
        }
    }

    /// Drop all engine state for a session and cancel its timers.
    ///
    /// Called when a session ends for any reason other than completing
    /// its final round (which cleans up on its own).
    pub async fn cleanup(&self, session_id: SessionId) {
        let entry = self
            .sessions
            .lock()
            .expect("round engine lock poisoned")
            .remove(&session_id);
        let Some(entry) = entry else {
            return;
        };
        let mut state = entry.state.lock().await;
        state.round = None;
        if let Some(timer) = state.round_timer.take() {
            timer.abort();
        }
        if let Some(pending) = state.pending_next.take() {
            pending.abort();
        }
        debug!(session = %session_id, "round state cleaned up");
    }

    fn remove_entry_locked(&self, session_id: SessionId, state: &mut SessionRound) {
        self.sessions
            .lock()
            .expect("round engine lock poisoned")
            .remove(&session_id);
        state.round = None;
        if let Some(timer) = state.round_timer.take() {
            timer.abort();
        }
        // pending_next was already detached by start_attempt.
        state.pending_next = None;
    }

    fn broadcast_all_rounds_complete(&self, room: &RoomCode, session: &GameSession) {
        // Every seat counts toward the final board, including players who
        // left mid-game. Stable sort keeps join order on score ties.
        let mut final_scores: Vec<FinalScore> = self
            .store
            .session_players(session.id)
            .iter()
            .map(|p| FinalScore {
                username: p.username.clone(),
                score: p.score,
            })
            .collect();
        final_scores.sort_by(|a, b| b.score.cmp(&a.score));
        let winner = final_scores.first().map(|s| s.username.clone());

        self.broadcaster.publish_to_room(
            room,
            &ServerEvent::AllRoundsComplete {
                final_scores,
                winner,
            },
        );
    }

    fn finalize(&self, session: &GameSession) -> Result<(), RoundError> {
        self.store
            .set_session_status(session.id, SessionStatus::Finished)?;
        self.store
            .set_room_status(&session.room, RoomStatus::Finished)?;
        info!(
            session = %session.id,
            room = %session.room,
            "session and room finalized after final round"
        );
        Ok(())
    }

    fn broadcast_chat(&self, room: &RoomCode, username: &str, message: &str) {
        self.broadcaster.publish_to_room(
            room,
            &ServerEvent::ChatMessage {
                username: username.to_string(),
                message: message.to_string(),
            },
        );
    }

    fn send_guess_blocked(&self, player: PlayerId, message: &str) {
        self.broadcaster.publish_to_user(
            player,
            UserChannel::Errors,
            &ServerEvent::GuessBlocked {
                message: message.to_string(),
            },
        );
    }
}

fn player_summary(p: &SessionPlayer) -> SessionPlayerSummary {
    SessionPlayerSummary {
        player_id: p.player,
        username: p.username.clone(),
        score: p.score,
        is_host: p.is_host,
    }
}
