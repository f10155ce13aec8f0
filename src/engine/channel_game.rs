// Persistent always-on channel game.
//
// Bound permanently to one channel: no join phase, no eliminations. Every
// inbound channel message runs through a cheap pre-filter so ordinary chat
// never pays for full validation; an invalid word is rejected without any
// state change. Whoever plays a valid word is implicitly part of the round
// roster; when the last participant gives up the round ends and a new one
// starts immediately with a fresh word; the game never needs a human to
// re-initiate it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::db::{ChannelGameRow, Database};
use crate::metrics;

use super::events::{GameEvent, PlayerInfo};
use super::language::{last_two_units, unit_count, Language};
use super::lexicon::{Dictionaries, LanguageDict};
use super::validator::{validate, GameMode, Verdict};
use super::EngineError;

struct ChannelState {
    current_word: String,
    used_words: HashSet<String>,
    /// Users who played a valid word this round (statistics roster).
    participants: HashSet<u64>,
    words_played: i64,
    /// Set when a durable write failed; the next successful play retries
    /// by writing absolute values.
    storage_dirty: bool,
}

pub struct ChannelGame {
    channel_id: i64,
    language: Language,
    mode: GameMode,
    turn_time_secs: i64,
    dict: Arc<LanguageDict>,
    db: Arc<Database>,
    state: Mutex<ChannelState>,
    events_tx: broadcast::Sender<GameEvent>,
}

impl ChannelGame {
    /// Bind a new channel: picks a starting word, persists the binding,
    /// and returns the live game object.
    pub async fn create(
        db: Arc<Database>,
        dicts: &Dictionaries,
        channel_id: i64,
        language: Language,
        mode: GameMode,
        turn_time_secs: i64,
    ) -> Result<Arc<ChannelGame>, EngineError> {
        let dict = dicts
            .get(language)
            .ok_or(EngineError::DictionaryUnavailable(language))?;
        let starting_word = dict
            .index
            .pick_starting_word(&dict.lexicon)
            .ok_or(EngineError::DictionaryUnavailable(language))?;

        db.create_channel_game(channel_id, language.tag(), mode.tag(), turn_time_secs, &starting_word)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref d) if d.is_unique_violation() => {
                    EngineError::GameAlreadyRunning
                }
                other => EngineError::Storage(other),
            })?;

        metrics::GAMES_STARTED_TOTAL.with_label_values(&["channel"]).inc();
        tracing::info!(channel_id, language = %language, starting_word, "Bound channel game");

        Ok(Self::build(db, dict, channel_id, mode, turn_time_secs, starting_word, Vec::new(), 0))
    }

    /// Rebuild a live game from its durable row at service startup. The
    /// used-word set read from storage is ground truth for validation.
    pub async fn resume(
        db: Arc<Database>,
        dicts: &Dictionaries,
        row: &ChannelGameRow,
    ) -> Result<Arc<ChannelGame>, EngineError> {
        let language = Language::from_tag(&row.language)
            .ok_or_else(|| EngineError::UnknownLanguage(row.language.clone()))?;
        let dict = dicts
            .get(language)
            .ok_or(EngineError::DictionaryUnavailable(language))?;
        let mode = GameMode::from_tag(&row.mode).unwrap_or(GameMode::Normal);
        let used = db.get_used_words(row.channel_id).await?;

        Ok(Self::build(
            db,
            dict,
            row.channel_id,
            mode,
            row.turn_time_secs,
            row.current_word.clone(),
            used,
            row.words_played,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        db: Arc<Database>,
        dict: Arc<LanguageDict>,
        channel_id: i64,
        mode: GameMode,
        turn_time_secs: i64,
        current_word: String,
        used: impl IntoIterator<Item = String>,
        words_played: i64,
    ) -> Arc<ChannelGame> {
        let language = dict.language();
        let mut used_words: HashSet<String> = used.into_iter().collect();
        used_words.insert(current_word.clone());
        let (events_tx, _) = broadcast::channel(64);
        Arc::new(ChannelGame {
            channel_id,
            language,
            mode,
            turn_time_secs,
            dict,
            db,
            state: Mutex::new(ChannelState {
                current_word,
                used_words,
                participants: HashSet::new(),
                words_played,
                storage_dirty: false,
            }),
            events_tx,
        })
    }

    pub fn channel_id(&self) -> i64 {
        self.channel_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn turn_time_secs(&self) -> i64 {
        self.turn_time_secs
    }

    pub fn current_word(&self) -> String {
        self.state.lock().unwrap().current_word.clone()
    }

    pub fn participant_count(&self) -> usize {
        self.state.lock().unwrap().participants.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events_tx.subscribe()
    }

    /// Cheap pre-filter: single token, at least 3 letter units, and the
    /// right leading characters. Everything else is ordinary chat and is
    /// ignored without full validation.
    fn passes_prefilter(&self, text: &str, current_word: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || text.contains(char::is_whitespace) {
            return false;
        }
        let lower = text.to_lowercase();
        if unit_count(&lower, self.language) < 3 {
            return false;
        }
        match last_two_units(current_word, self.language) {
            Some(prefix) => lower.starts_with(&prefix),
            None => false,
        }
    }

    /// Handle one inbound channel message. Returns None when the message
    /// does not look like a play attempt; otherwise the verdict.
    pub async fn handle_message(
        &self,
        user_id: u64,
        display_name: &str,
        text: &str,
    ) -> Option<Verdict> {
        let (verdict, persist) = {
            let mut st = self.state.lock().unwrap();
            if !self.passes_prefilter(text, &st.current_word) {
                return None;
            }
            let validate_start = std::time::Instant::now();
            let verdict = validate(text, &st.current_word, &st.used_words, &self.dict, self.mode);
            metrics::VALIDATION_DURATION_MS.observe(validate_start.elapsed().as_secs_f64() * 1000.0);
            if !verdict.is_valid() {
                (verdict, None)
            } else {
                let word = text.trim().to_lowercase();
                st.used_words.insert(word.clone());
                st.current_word = word.clone();
                st.participants.insert(user_id);
                st.words_played += 1;
                (verdict, Some((word, st.words_played)))
            }
        };

        if let Some((ref word, _)) = persist {
            let _ = self.events_tx.send(GameEvent::WordPlayed {
                player: PlayerInfo {
                    user_id,
                    display_name: display_name.to_string(),
                },
                word: word.clone(),
            });
        }

        metrics::WORDS_PLAYED_TOTAL
            .with_label_values(&["channel", verdict.label()])
            .inc();

        if let Some((word, words_played)) = persist {
            if let Err(e) = self.db.record_play(self.channel_id, &word, words_played).await {
                // Keep the in-memory state authoritative; retry the write
                // on the next qualifying event instead of looping here.
                tracing::error!(channel_id = self.channel_id, "Failed to persist play: {e}");
                self.state.lock().unwrap().storage_dirty = true;
            } else if self.take_storage_dirty() {
                tracing::info!(channel_id = self.channel_id, "Durable state caught up after earlier write failure");
            }
        }
        Some(verdict)
    }

    /// Remove a user from the implicit roster. When the last participant
    /// leaves, the round ends and a new one starts immediately.
    pub async fn give_up(&self, user_id: u64) -> bool {
        let (was_participant, restart) = {
            let mut st = self.state.lock().unwrap();
            let was = st.participants.remove(&user_id);
            (was, was && st.participants.is_empty())
        };
        if restart {
            self.restart_round().await;
        }
        was_participant
    }

    /// End the current round and bootstrap the next: fresh starting word,
    /// cleared used set, one `RoundRestarted` announcement.
    async fn restart_round(&self) {
        let starting_word = match self.dict.index.pick_starting_word(&self.dict.lexicon) {
            Some(w) => w,
            None => {
                tracing::error!(channel_id = self.channel_id, "No starting word available, round not restarted");
                return;
            }
        };

        let round_words = {
            let mut st = self.state.lock().unwrap();
            let round_words = st.words_played;
            st.used_words.clear();
            st.used_words.insert(starting_word.clone());
            st.current_word = starting_word.clone();
            st.participants.clear();
            st.words_played = 0;
            round_words
        };

        if let Err(e) = self.db.reset_round(self.channel_id, &starting_word).await {
            tracing::error!(channel_id = self.channel_id, "Failed to persist round restart: {e}");
            self.state.lock().unwrap().storage_dirty = true;
        }

        metrics::ROUNDS_RESTARTED_TOTAL.inc();
        metrics::ROUND_WORDS_PLAYED.observe(round_words as f64);
        metrics::GAMES_COMPLETED_TOTAL.with_label_values(&["channel"]).inc();
        tracing::info!(channel_id = self.channel_id, starting_word, "Round restarted");
        let _ = self.events_tx.send(GameEvent::RoundRestarted { starting_word });
    }

    fn take_storage_dirty(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        std::mem::replace(&mut st.storage_dirty, false)
    }
}
