// Lifecycle events broadcast to the presentation layer.
//
// The engine never renders anything; it emits these over a per-game
// broadcast channel and the gateway adapter turns them into chat
// messages/reactions.

use serde::Serialize;

use super::validator::Verdict;

/// A player as shown to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    pub user_id: u64,
    pub display_name: String,
}

/// Why a player left the active rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EliminationReason {
    /// Played a word that failed validation (lobby games only).
    InvalidWord { verdict: Verdict },
    /// Let the turn timer run out.
    Timeout,
    /// Gave up voluntarily.
    GaveUp,
}

impl EliminationReason {
    /// Stable label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EliminationReason::InvalidWord { .. } => "invalid_word",
            EliminationReason::Timeout => "timeout",
            EliminationReason::GaveUp => "gave_up",
        }
    }
}

/// Events emitted by both game kinds. `RoundRestarted` is only ever
/// produced by persistent channel games.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted {
        starting_word: String,
        first_player: PlayerInfo,
    },
    PlayerTurn {
        player: PlayerInfo,
        current_word: String,
        required_prefix: String,
        remaining_secs: u64,
    },
    WordPlayed {
        player: PlayerInfo,
        word: String,
    },
    PlayerEliminated {
        player: PlayerInfo,
        reason: EliminationReason,
    },
    GameEnded {
        winner: Option<PlayerInfo>,
        words_played: usize,
    },
    RoundRestarted {
        starting_word: String,
    },
}
