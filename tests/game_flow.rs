// Integration tests for the word-chain engine: lobby game lifecycle
// (join phase, turn timers, eliminations, win condition) and persistent
// channel games (round restart, durable state).
//
// Timer-driven tests run under a paused tokio clock so join and turn
// deadlines fire instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use kaladont_backend::db::Database;
use kaladont_backend::engine::channel_game::ChannelGame;
use kaladont_backend::engine::events::{EliminationReason, GameEvent};
use kaladont_backend::engine::language::Language;
use kaladont_backend::engine::lexicon::{Dictionaries, Lexicon};
use kaladont_backend::engine::session::{start_session, GameOptions, Phase};
use kaladont_backend::engine::validator::{GameMode, Verdict};
use kaladont_backend::engine::EngineError;
use kaladont_backend::registry::SessionRegistry;
use tokio::sync::broadcast;

/// Dictionary where "table" is the only possible starting word:
/// "lemon" has no continuation and "nonono" is a self-loop.
fn test_dicts() -> Dictionaries {
    Dictionaries::from_lexicons([Lexicon::from_words(
        Language::En,
        ["table", "lemon", "nonono"],
    )])
}

fn options(min_players: usize, join_secs: u64, turn_secs: u64) -> GameOptions {
    GameOptions {
        language: Language::En,
        mode: GameMode::Normal,
        min_players,
        join_secs,
        turn_secs,
    }
}

fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

fn kinds(events: &[GameEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|e| match e {
            GameEvent::GameStarted { .. } => "game_started",
            GameEvent::PlayerTurn { .. } => "player_turn",
            GameEvent::WordPlayed { .. } => "word_played",
            GameEvent::PlayerEliminated { .. } => "player_eliminated",
            GameEvent::GameEnded { .. } => "game_ended",
            GameEvent::RoundRestarted { .. } => "round_restarted",
        })
        .collect()
}

// ── Lobby game lifecycle ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_join_phase_expires_without_enough_players() {
    let registry = SessionRegistry::new();
    let dicts = test_dicts();
    let session = start_session(&registry, &dicts, 1, options(2, 5, 30)).unwrap();
    let mut rx = session.subscribe();

    assert!(session.join(1, "ana"));

    // Let the join window elapse with only one player.
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(session.phase(), Phase::Ended);
    assert!(registry.get(1).is_none(), "channel slot must be freed");

    let events = drain(&mut rx);
    assert_eq!(kinds(&events), vec!["game_ended"]);
    match &events[0] {
        GameEvent::GameEnded { winner, .. } => assert!(winner.is_none()),
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_game_to_victory() {
    let registry = SessionRegistry::new();
    let dicts = test_dicts();
    let session = start_session(&registry, &dicts, 1, options(2, 300, 30)).unwrap();
    let mut rx = session.subscribe();

    assert!(session.join(1, "ana"));
    assert!(session.join(2, "bob"));
    assert!(session.request_start(1));

    // Give the session driver a chance to process the start request.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.phase(), Phase::InProgress);

    // Starting word is "table"; ana chains "lemon", bob fumbles.
    assert_eq!(session.play_word(1, "lemon").unwrap(), Verdict::Valid);
    assert_eq!(session.play_word(2, "orange").unwrap(), Verdict::WrongLetters);
    assert_eq!(session.phase(), Phase::Ended);

    let events = drain(&mut rx);
    assert_eq!(
        kinds(&events),
        vec![
            "game_started",
            "player_turn",
            "word_played",
            "player_turn",
            "player_eliminated",
            "game_ended",
        ]
    );
    match events.last() {
        Some(GameEvent::GameEnded { winner, words_played }) => {
            assert_eq!(winner.as_ref().map(|w| w.user_id), Some(1));
            assert_eq!(*words_played, 1);
        }
        other => panic!("expected GameEnded, got {other:?}"),
    }

    // The driver task frees the channel slot on its way out.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(registry.get(1).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_turn_timeouts_eliminate_down_to_a_winner() {
    let registry = SessionRegistry::new();
    let dicts = test_dicts();
    let session = start_session(&registry, &dicts, 1, options(3, 300, 10)).unwrap();
    let mut rx = session.subscribe();

    session.join(1, "ana");
    session.join(2, "bob");
    session.join(3, "eva");
    session.request_start(1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.phase(), Phase::InProgress);

    // Nobody plays: ana times out, then bob, and eva wins.
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(session.phase(), Phase::InProgress);
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(session.phase(), Phase::Ended);

    let events = drain(&mut rx);
    let timeouts: Vec<_> = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                GameEvent::PlayerEliminated {
                    reason: EliminationReason::Timeout,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(timeouts.len(), 2);
    match events.last() {
        Some(GameEvent::GameEnded { winner, .. }) => {
            assert_eq!(winner.as_ref().map(|w| w.user_id), Some(3));
        }
        other => panic!("expected GameEnded, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(registry.get(1).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_turn_timer() {
    let registry = SessionRegistry::new();
    let dicts = test_dicts();
    let session = start_session(&registry, &dicts, 1, options(2, 300, 10)).unwrap();
    let mut rx = session.subscribe();

    session.join(1, "ana");
    session.join(2, "bob");
    session.request_start(1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    drain(&mut rx);

    session.stop();
    // Sleep well past the turn deadline: the canceled timer must not fire
    // an elimination on the ended session.
    tokio::time::sleep(Duration::from_secs(60)).await;

    let events = drain(&mut rx);
    assert_eq!(kinds(&events), vec!["game_ended"]);
    assert!(registry.get(1).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_one_live_session_per_channel() {
    let registry = SessionRegistry::new();
    let dicts = test_dicts();

    let session = start_session(&registry, &dicts, 1, options(2, 300, 30)).unwrap();
    assert!(matches!(
        start_session(&registry, &dicts, 1, options(2, 300, 30)),
        Err(EngineError::GameAlreadyRunning)
    ));
    // A different channel is independent.
    assert!(start_session(&registry, &dicts, 2, options(2, 300, 30)).is_ok());

    // Once the first session ends and its driver exits, the slot reopens.
    session.stop();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(start_session(&registry, &dicts, 1, options(2, 300, 30)).is_ok());
}

#[tokio::test]
async fn test_start_refused_without_dictionary() {
    let registry = SessionRegistry::new();
    let dicts = test_dicts();
    let mut opts = options(2, 300, 30);
    opts.language = Language::Sr;
    assert!(matches!(
        start_session(&registry, &dicts, 1, opts),
        Err(EngineError::DictionaryUnavailable(Language::Sr))
    ));
    assert!(registry.is_empty());
}

// ── Persistent channel game ──────────────────────────────────────────

#[tokio::test]
async fn test_channel_round_restarts_when_roster_empties() {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    let dicts = Dictionaries::from_lexicons([Lexicon::from_words(
        Language::En,
        ["table", "lemon", "stranded"],
    )]);
    let game = ChannelGame::create(db.clone(), &dicts, 7, Language::En, GameMode::Normal, 60)
        .await
        .unwrap();
    let mut rx = game.subscribe();

    // Two participants; the round survives the first one leaving.
    assert_eq!(game.handle_message(1, "ana", "lemon").await, Some(Verdict::Valid));
    // bob tries to continue with an unknown word: rejected, not enrolled.
    assert_eq!(
        game.handle_message(2, "bob", "onward").await,
        Some(Verdict::NotInDictionary)
    );
    assert_eq!(game.participant_count(), 1);

    assert!(game.give_up(1).await);

    // Roster emptied: exactly one restart, fresh word, cleared used set.
    let events = drain(&mut rx);
    let restarts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            GameEvent::RoundRestarted { starting_word } => Some(starting_word.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(restarts, vec!["table".to_string()]);
    assert_eq!(game.current_word(), "table");
    assert_eq!(game.handle_message(2, "bob", "lemon").await, Some(Verdict::Valid));

    // Durable state reflects the restarted round plus bob's play.
    let row = db.get_channel_game(7).await.unwrap().unwrap();
    assert_eq!(row.current_word, "lemon");
    assert_eq!(row.words_played, 1);
}

#[tokio::test]
async fn test_channel_game_survives_service_restart() {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    let dicts = Dictionaries::from_lexicons([Lexicon::from_words(
        Language::En,
        ["table", "lemon", "stranded"],
    )]);
    {
        let game = ChannelGame::create(db.clone(), &dicts, 7, Language::En, GameMode::Normal, 60)
            .await
            .unwrap();
        game.handle_message(1, "ana", "lemon").await;
    }

    // "Restart": rebuild the live object from the durable row.
    let row = db.get_channel_game(7).await.unwrap().unwrap();
    let game = ChannelGame::resume(db, &dicts, &row).await.unwrap();
    assert_eq!(game.current_word(), "lemon");
    assert_eq!(
        game.handle_message(2, "bob", "lemon").await,
        Some(Verdict::AlreadyUsed)
    );
}
