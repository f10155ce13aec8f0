// Word-chain game engine: dictionaries, validation, and the two game kinds.

pub mod channel_game;
pub mod events;
pub mod language;
pub mod lexicon;
pub mod reachability;
pub mod session;
pub mod validator;

use thiserror::Error;

use language::Language;

/// Engine-level refusals. Validation outcomes are NOT errors (they are
/// `Verdict` values); this enum covers refusals to act at all plus
/// storage faults from the persistence layer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown language tag '{0}'")]
    UnknownLanguage(String),
    #[error("no dictionary loaded for language '{0}'")]
    DictionaryUnavailable(Language),
    #[error("a game is already running in this channel")]
    GameAlreadyRunning,
    #[error("no game is running in this channel")]
    GameNotFound,
    #[error("the game is not accepting plays right now")]
    NotInProgress,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("storage error")]
    Storage(#[from] sqlx::Error),
}
