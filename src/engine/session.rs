// Ephemeral lobby game: one short-lived session per channel.
//
// Lifecycle: Joining -> InProgress -> Ended. A dedicated task (`run`)
// drives the join-phase and per-turn timers; message handlers call the
// synchronous methods (`join`, `play_word`, ...) from arbitrary worker
// tasks. All state lives behind one Mutex, held only for mutation;
// events are broadcast and timers awaited outside the lock.
//
// Lobby rules are deliberately harsh: any invalid word eliminates the
// player, as does a turn timeout or giving up. Last player standing wins.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Notify};
use tokio::time::{timeout_at, Instant};

use crate::metrics;
use crate::registry::SessionRegistry;

use super::events::{EliminationReason, GameEvent, PlayerInfo};
use super::language::last_two_units;
use super::lexicon::{Dictionaries, LanguageDict};
use super::validator::{validate, GameMode, Verdict};
use super::EngineError;

/// Per-session configuration, fixed at creation.
#[derive(Debug, Clone)]
pub struct GameOptions {
    pub language: super::language::Language,
    pub mode: GameMode,
    pub min_players: usize,
    pub join_secs: u64,
    pub turn_secs: u64,
}

impl Default for GameOptions {
    fn default() -> Self {
        GameOptions {
            language: super::language::Language::En,
            mode: GameMode::Normal,
            min_players: 2,
            join_secs: 30,
            turn_secs: 30,
        }
    }
}

/// A player in a lobby game. Never removed, only marked eliminated;
/// insertion order defines the turn rotation.
#[derive(Debug, Clone)]
pub struct Player {
    pub user_id: u64,
    pub display_name: String,
    pub eliminated: bool,
}

impl Player {
    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Joining,
    InProgress,
    Ended,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Joining => "joining",
            Phase::InProgress => "in_progress",
            Phase::Ended => "ended",
        }
    }
}

/// Point-in-time view of a session for API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub channel_id: i64,
    pub phase: &'static str,
    pub language: super::language::Language,
    pub mode: GameMode,
    pub current_word: Option<String>,
    pub required_prefix: Option<String>,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub user_id: u64,
    pub display_name: String,
    pub eliminated: bool,
    pub on_turn: bool,
}

struct SessionState {
    phase: Phase,
    players: Vec<Player>,
    current_turn: usize,
    current_word: String,
    used_words: HashSet<String>,
    /// Bumped on every turn change; lets the timer detect that the turn
    /// it armed for has already been resolved.
    turn_seq: u64,
    turn_deadline: Option<Instant>,
    start_requested: bool,
    started_at: Option<Instant>,
    /// Events queued under the lock, drained and broadcast after release.
    pending: Vec<GameEvent>,
}

pub struct GameSession {
    channel_id: i64,
    options: GameOptions,
    dict: Arc<LanguageDict>,
    state: Mutex<SessionState>,
    /// Signaled whenever the awaited turn resolves (play, elimination, stop).
    turn_notify: Notify,
    /// Signaled on join, start request, and stop during the join phase.
    join_notify: Notify,
    events_tx: broadcast::Sender<GameEvent>,
}

impl GameSession {
    pub fn new(channel_id: i64, options: GameOptions, dict: Arc<LanguageDict>) -> Arc<GameSession> {
        let (events_tx, _) = broadcast::channel(64);
        Arc::new(GameSession {
            channel_id,
            options,
            dict,
            state: Mutex::new(SessionState {
                phase: Phase::Joining,
                players: Vec::new(),
                current_turn: 0,
                current_word: String::new(),
                used_words: HashSet::new(),
                turn_seq: 0,
                turn_deadline: None,
                start_requested: false,
                started_at: None,
                pending: Vec::new(),
            }),
            turn_notify: Notify::new(),
            join_notify: Notify::new(),
            events_tx,
        })
    }

    pub fn channel_id(&self) -> i64 {
        self.channel_id
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events_tx.subscribe()
    }

    /// Create a snapshot of the session state for API consumers.
    pub fn snapshot(&self) -> SessionSnapshot {
        let st = self.state.lock().unwrap();
        let in_progress = st.phase == Phase::InProgress;
        SessionSnapshot {
            channel_id: self.channel_id,
            phase: st.phase.label(),
            language: self.options.language,
            mode: self.options.mode,
            current_word: in_progress.then(|| st.current_word.clone()),
            required_prefix: if in_progress {
                last_two_units(&st.current_word, self.options.language)
            } else {
                None
            },
            players: st
                .players
                .iter()
                .enumerate()
                .map(|(i, p)| PlayerSnapshot {
                    user_id: p.user_id,
                    display_name: p.display_name.clone(),
                    eliminated: p.eliminated,
                    on_turn: in_progress && i == st.current_turn,
                })
                .collect(),
        }
    }

    /// Join during the join phase. Returns false once the game has
    /// started or if the user already joined.
    pub fn join(&self, user_id: u64, display_name: &str) -> bool {
        {
            let mut st = self.state.lock().unwrap();
            if st.phase != Phase::Joining {
                return false;
            }
            if st.players.iter().any(|p| p.user_id == user_id) {
                return false;
            }
            st.players.push(Player {
                user_id,
                display_name: display_name.to_string(),
                eliminated: false,
            });
        }
        self.join_notify.notify_one();
        true
    }

    /// Ask to skip the rest of the join window. Honored by the session
    /// driver once enough players have joined.
    pub fn request_start(&self, user_id: u64) -> bool {
        {
            let mut st = self.state.lock().unwrap();
            if st.phase != Phase::Joining {
                return false;
            }
            if !st.players.iter().any(|p| p.user_id == user_id) {
                return false;
            }
            st.start_requested = true;
        }
        self.join_notify.notify_one();
        true
    }

    /// Play a word. On a valid word the turn advances; on any invalid
    /// word the acting player is eliminated. Either way the caller gets
    /// the verdict back for presentation.
    pub fn play_word(&self, user_id: u64, text: &str) -> Result<Verdict, EngineError> {
        let (verdict, events) = {
            let mut st = self.state.lock().unwrap();
            if st.phase != Phase::InProgress {
                return Err(EngineError::NotInProgress);
            }
            let idx = st
                .players
                .iter()
                .position(|p| p.user_id == user_id && !p.eliminated)
                .ok_or(EngineError::NotYourTurn)?;
            if idx != st.current_turn {
                return Err(EngineError::NotYourTurn);
            }

            let validate_start = std::time::Instant::now();
            let verdict = validate(
                text,
                &st.current_word,
                &st.used_words,
                &self.dict,
                self.options.mode,
            );
            metrics::VALIDATION_DURATION_MS.observe(validate_start.elapsed().as_secs_f64() * 1000.0);
            if verdict.is_valid() {
                let word = text.trim().to_lowercase();
                st.used_words.insert(word.clone());
                st.current_word = word.clone();
                let player = st.players[idx].info();
                st.pending.push(GameEvent::WordPlayed { player, word });
                self.advance_turn(&mut st);
            } else {
                self.eliminate_current(&mut st, EliminationReason::InvalidWord { verdict });
            }
            (verdict, std::mem::take(&mut st.pending))
        };
        metrics::WORDS_PLAYED_TOTAL
            .with_label_values(&["lobby", verdict.label()])
            .inc();
        self.turn_notify.notify_one();
        self.send_events(events);
        Ok(verdict)
    }

    /// Voluntary self-elimination, honored on the caller's turn only.
    pub fn give_up(&self, user_id: u64) -> bool {
        let events = {
            let mut st = self.state.lock().unwrap();
            if st.phase != Phase::InProgress {
                return false;
            }
            let on_turn = st
                .players
                .get(st.current_turn)
                .map(|p| p.user_id == user_id && !p.eliminated)
                .unwrap_or(false);
            if !on_turn {
                return false;
            }
            self.eliminate_current(&mut st, EliminationReason::GaveUp);
            std::mem::take(&mut st.pending)
        };
        self.turn_notify.notify_one();
        self.send_events(events);
        true
    }

    /// External stop signal. Ends the game with no winner; safe to call
    /// in any phase, repeated calls are no-ops.
    pub fn stop(&self) {
        let events = {
            let mut st = self.state.lock().unwrap();
            if st.phase == Phase::Ended {
                return;
            }
            self.finish(&mut st, None);
            std::mem::take(&mut st.pending)
        };
        self.join_notify.notify_one();
        self.turn_notify.notify_one();
        self.send_events(events);
    }

    /// Transition Joining -> InProgress: pick a starting word, seed the
    /// used set, arm the first turn. Returns false if the session is no
    /// longer joinable (stopped meanwhile) or the dictionary is broken.
    pub fn begin(&self) -> bool {
        let (started, events) = {
            let mut st = self.state.lock().unwrap();
            if st.phase != Phase::Joining {
                return false;
            }
            if st.players.is_empty() {
                self.finish(&mut st, None);
                let events = std::mem::take(&mut st.pending);
                drop(st);
                self.send_events(events);
                return false;
            }
            match self.dict.index.pick_starting_word(&self.dict.lexicon) {
                Some(starting_word) => {
                    st.phase = Phase::InProgress;
                    st.started_at = Some(Instant::now());
                    st.used_words.insert(starting_word.clone());
                    st.current_word = starting_word.clone();
                    st.current_turn = 0;
                    let first_player = st.players[0].info();
                    st.pending.push(GameEvent::GameStarted {
                        starting_word,
                        first_player,
                    });
                    self.arm_turn(&mut st);
                    (true, std::mem::take(&mut st.pending))
                }
                None => {
                    // Dictionary produced no starting word at all.
                    self.finish(&mut st, None);
                    (false, std::mem::take(&mut st.pending))
                }
            }
        };
        if started {
            metrics::GAMES_STARTED_TOTAL.with_label_values(&["lobby"]).inc();
        }
        self.send_events(events);
        started
    }

    /// End a join phase that attracted too few players.
    pub fn abort_joining(&self) {
        let events = {
            let mut st = self.state.lock().unwrap();
            if st.phase != Phase::Joining {
                return;
            }
            self.finish(&mut st, None);
            std::mem::take(&mut st.pending)
        };
        self.send_events(events);
    }

    /// Timer expiry for the turn that was armed with `seq`. A stale seq
    /// means the turn already resolved and the expiry is ignored.
    pub fn expire_turn(&self, seq: u64) {
        let events = {
            let mut st = self.state.lock().unwrap();
            if st.phase != Phase::InProgress || st.turn_seq != seq {
                return;
            }
            self.eliminate_current(&mut st, EliminationReason::Timeout);
            std::mem::take(&mut st.pending)
        };
        self.send_events(events);
    }

    /// Session driver: waits out the join phase, then arbitrates turn
    /// deadlines until the game ends. Owns registry cleanup on every
    /// exit path.
    pub async fn run(self: Arc<Self>, registry: SessionRegistry) {
        let join_deadline = Instant::now() + Duration::from_secs(self.options.join_secs);
        loop {
            {
                let st = self.state.lock().unwrap();
                match st.phase {
                    Phase::Ended => {
                        registry.remove(self.channel_id);
                        return;
                    }
                    Phase::Joining => {
                        if st.start_requested && st.players.len() >= self.options.min_players {
                            break;
                        }
                    }
                    Phase::InProgress => break,
                }
            }
            if timeout_at(join_deadline, self.join_notify.notified())
                .await
                .is_err()
            {
                // Join window closed.
                break;
            }
        }

        let enough = {
            let st = self.state.lock().unwrap();
            st.phase == Phase::Joining && st.players.len() >= self.options.min_players
        };
        if !enough {
            tracing::info!(channel_id = self.channel_id, "Lobby game never started: not enough players");
            self.abort_joining();
            registry.remove(self.channel_id);
            return;
        }
        if !self.begin() {
            registry.remove(self.channel_id);
            return;
        }

        loop {
            let (seq, deadline) = {
                let st = self.state.lock().unwrap();
                match (st.phase, st.turn_deadline) {
                    (Phase::InProgress, Some(deadline)) => (st.turn_seq, deadline),
                    _ => break,
                }
            };
            if timeout_at(deadline, self.turn_notify.notified())
                .await
                .is_err()
            {
                self.expire_turn(seq);
            }
        }

        registry.remove(self.channel_id);
    }

    // ── State-machine internals (all called with the lock held) ─────

    /// Move to the next non-eliminated player and arm their turn.
    fn advance_turn(&self, st: &mut SessionState) {
        if let Some(next) = Self::next_active(st, st.current_turn) {
            st.current_turn = next;
            self.arm_turn(st);
        }
    }

    /// Reset the deadline and announce the (already selected) current turn.
    fn arm_turn(&self, st: &mut SessionState) {
        st.turn_seq += 1;
        st.turn_deadline = Some(Instant::now() + Duration::from_secs(self.options.turn_secs));
        let player = st.players[st.current_turn].info();
        let required_prefix =
            last_two_units(&st.current_word, self.options.language).unwrap_or_default();
        st.pending.push(GameEvent::PlayerTurn {
            player,
            current_word: st.current_word.clone(),
            required_prefix,
            remaining_secs: self.options.turn_secs,
        });
    }

    /// Eliminate the player whose turn it is, then either hand the turn
    /// on or end the game if at most one player remains.
    fn eliminate_current(&self, st: &mut SessionState, reason: EliminationReason) {
        let idx = st.current_turn;
        st.players[idx].eliminated = true;
        let player = st.players[idx].info();
        st.pending.push(GameEvent::PlayerEliminated { player, reason });
        metrics::PLAYERS_ELIMINATED_TOTAL
            .with_label_values(&[reason.label()])
            .inc();

        let active: Vec<usize> = st
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.eliminated)
            .map(|(i, _)| i)
            .collect();
        match active.as_slice() {
            [] => self.finish(st, None),
            [last] => {
                let winner = st.players[*last].clone();
                self.finish(st, Some(winner));
            }
            _ => {
                if let Some(next) = Self::next_active(st, idx) {
                    st.current_turn = next;
                    self.arm_turn(st);
                }
            }
        }
    }

    /// Terminal transition; emits GameEnded exactly once.
    fn finish(&self, st: &mut SessionState, winner: Option<Player>) {
        if st.phase == Phase::Ended {
            return;
        }
        st.phase = Phase::Ended;
        st.turn_deadline = None;
        st.turn_seq += 1;
        let words_played = st.used_words.len().saturating_sub(1);
        st.pending.push(GameEvent::GameEnded {
            winner: winner.as_ref().map(Player::info),
            words_played,
        });
        // Lobbies that never left the join phase do not count as completed.
        if let Some(started_at) = st.started_at {
            metrics::GAMES_COMPLETED_TOTAL.with_label_values(&["lobby"]).inc();
            metrics::GAME_DURATION_SECONDS
                .with_label_values(&["lobby"])
                .observe(started_at.elapsed().as_secs_f64());
        }
    }

    /// Index of the next non-eliminated player after `from`, wrapping.
    fn next_active(st: &SessionState, from: usize) -> Option<usize> {
        let n = st.players.len();
        (1..=n)
            .map(|step| (from + step) % n)
            .find(|&i| !st.players[i].eliminated)
    }

    fn send_events(&self, events: Vec<GameEvent>) {
        for event in events {
            // Send only fails when nobody is subscribed, which is fine.
            let _ = self.events_tx.send(event);
        }
    }
}

/// Create a session for a channel and spawn its driver task. Refuses if
/// the language has no usable dictionary or the channel already has a
/// live game (atomic insert-if-absent on the registry).
pub fn start_session(
    registry: &SessionRegistry,
    dicts: &Dictionaries,
    channel_id: i64,
    options: GameOptions,
) -> Result<Arc<GameSession>, EngineError> {
    let dict = dicts
        .get(options.language)
        .ok_or(EngineError::DictionaryUnavailable(options.language))?;
    let session = GameSession::new(channel_id, options, dict);
    if !registry.insert_if_absent(channel_id, session.clone()) {
        return Err(EngineError::GameAlreadyRunning);
    }
    tokio::spawn(session.clone().run(registry.clone()));
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::language::Language;
    use crate::engine::lexicon::Lexicon;

    /// Dictionary where "table" is the only possible starting word:
    /// "lemon" has no continuation and "nonono" is a self-loop.
    fn test_session(mode: GameMode) -> Arc<GameSession> {
        let dict = Arc::new(LanguageDict::new(Lexicon::from_words(
            Language::En,
            ["table", "lemon", "nonono"],
        )));
        GameSession::new(
            1,
            GameOptions {
                language: Language::En,
                mode,
                min_players: 2,
                join_secs: 30,
                turn_secs: 30,
            },
            dict,
        )
    }

    fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    #[test]
    fn test_join_rules() {
        let session = test_session(GameMode::Normal);
        assert!(session.join(1, "ana"));
        assert!(!session.join(1, "ana again"));
        assert!(session.join(2, "bob"));

        assert!(session.begin());
        // No joining once in progress.
        assert!(!session.join(3, "late"));
        assert_eq!(session.phase(), Phase::InProgress);
    }

    #[test]
    fn test_begin_emits_start_and_first_turn() {
        let session = test_session(GameMode::Normal);
        let mut rx = session.subscribe();
        session.join(1, "ana");
        session.join(2, "bob");
        assert!(session.begin());

        let events = drain(&mut rx);
        match &events[0] {
            GameEvent::GameStarted {
                starting_word,
                first_player,
            } => {
                assert_eq!(starting_word, "table");
                assert_eq!(first_player.user_id, 1);
            }
            other => panic!("expected GameStarted, got {other:?}"),
        }
        match &events[1] {
            GameEvent::PlayerTurn {
                required_prefix, ..
            } => assert_eq!(required_prefix, "le"),
            other => panic!("expected PlayerTurn, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_play_advances_turn() {
        let session = test_session(GameMode::Normal);
        session.join(1, "ana");
        session.join(2, "bob");
        session.begin();

        // Not bob's turn yet.
        assert!(matches!(
            session.play_word(2, "lemon"),
            Err(EngineError::NotYourTurn)
        ));

        let verdict = session.play_word(1, "lemon").unwrap();
        assert_eq!(verdict, Verdict::Valid);

        // Now it is bob's turn; ana is rejected.
        assert!(matches!(
            session.play_word(1, "nonono"),
            Err(EngineError::NotYourTurn)
        ));
    }

    #[test]
    fn test_invalid_word_eliminates_and_ends_two_player_game() {
        let session = test_session(GameMode::Normal);
        let mut rx = session.subscribe();
        session.join(1, "ana");
        session.join(2, "bob");
        session.begin();
        drain(&mut rx);

        // "orange" is not in the dictionary and has the wrong prefix.
        let verdict = session.play_word(1, "orange").unwrap();
        assert_eq!(verdict, Verdict::WrongLetters);
        assert_eq!(session.phase(), Phase::Ended);

        let events = drain(&mut rx);
        assert!(matches!(
            events[0],
            GameEvent::PlayerEliminated {
                reason: EliminationReason::InvalidWord {
                    verdict: Verdict::WrongLetters
                },
                ..
            }
        ));
        match &events[1] {
            GameEvent::GameEnded { winner, .. } => {
                assert_eq!(winner.as_ref().map(|w| w.user_id), Some(2));
            }
            other => panic!("expected GameEnded, got {other:?}"),
        }
    }

    #[test]
    fn test_elimination_skips_to_next_active_player() {
        let session = test_session(GameMode::Normal);
        session.join(1, "ana");
        session.join(2, "bob");
        session.join(3, "eva");
        session.begin();

        // Ana eliminated; three players, so the game continues with bob.
        session.play_word(1, "bogus").unwrap();
        assert_eq!(session.phase(), Phase::InProgress);
        let verdict = session.play_word(2, "lemon").unwrap();
        assert_eq!(verdict, Verdict::Valid);
    }

    #[test]
    fn test_give_up_only_on_own_turn() {
        let session = test_session(GameMode::Normal);
        session.join(1, "ana");
        session.join(2, "bob");
        session.join(3, "eva");
        session.begin();

        assert!(!session.give_up(2));
        assert!(session.give_up(1));
        assert_eq!(session.phase(), Phase::InProgress);
    }

    #[test]
    fn test_turn_timeout_respects_sequence() {
        let session = test_session(GameMode::Normal);
        session.join(1, "ana");
        session.join(2, "bob");
        session.join(3, "eva");
        session.begin();

        let seq = session.state.lock().unwrap().turn_seq;
        // A stale expiry (turn already resolved) must be ignored.
        session.expire_turn(seq + 1);
        assert_eq!(session.phase(), Phase::InProgress);
        assert!(!session.state.lock().unwrap().players[0].eliminated);

        session.expire_turn(seq);
        assert!(session.state.lock().unwrap().players[0].eliminated);
        assert_eq!(session.phase(), Phase::InProgress);
    }

    #[test]
    fn test_stop_is_idempotent_and_final() {
        let session = test_session(GameMode::Normal);
        let mut rx = session.subscribe();
        session.join(1, "ana");
        session.join(2, "bob");
        session.begin();
        drain(&mut rx);

        session.stop();
        session.stop();
        let events = drain(&mut rx);
        let ended: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, GameEvent::GameEnded { .. }))
            .collect();
        assert_eq!(ended.len(), 1, "GameEnded must fire exactly once");
        assert!(matches!(
            session.play_word(1, "lemon"),
            Err(EngineError::NotInProgress)
        ));
    }

    #[test]
    fn test_endless_mode_rejects_dead_end_word() {
        let session = test_session(GameMode::Endless);
        session.join(1, "ana");
        session.join(2, "bob");
        session.begin();

        // "lemon" ends "on" and no dictionary word starts "on", so in
        // endless mode it is a dead end and eliminates ana.
        let verdict = session.play_word(1, "lemon").unwrap();
        assert_eq!(verdict, Verdict::DeadEnd);
        assert_eq!(session.phase(), Phase::Ended);
    }
}
