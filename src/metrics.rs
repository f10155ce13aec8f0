// Prometheus metrics definitions for the Kaladont backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Currently running ephemeral lobby sessions.
    pub static ref ACTIVE_SESSIONS: IntGauge =
        IntGauge::new("kaladont_active_sessions", "Currently running lobby sessions").unwrap();

    /// Persistent channel games currently bound.
    pub static ref CHANNEL_GAMES: IntGauge =
        IntGauge::new("kaladont_channel_games", "Bound persistent channel games").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total games started, by kind (lobby, channel).
    pub static ref GAMES_STARTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kaladont_games_started_total", "Total games started"),
        &["kind"],
    )
    .unwrap();

    /// Total games completed (lobby games ended, channel rounds closed), by kind.
    pub static ref GAMES_COMPLETED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kaladont_games_completed_total", "Total games completed"),
        &["kind"],
    )
    .unwrap();

    /// Total word plays that reached validation, by kind and verdict.
    pub static ref WORDS_PLAYED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kaladont_words_played_total", "Total validated word plays"),
        &["kind", "verdict"],
    )
    .unwrap();

    /// Total lobby eliminations, by reason.
    pub static ref PLAYERS_ELIMINATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kaladont_players_eliminated_total", "Total lobby eliminations"),
        &["reason"],
    )
    .unwrap();

    /// Total automatic round restarts in persistent channel games.
    pub static ref ROUNDS_RESTARTED_TOTAL: IntCounter = IntCounter::new(
        "kaladont_rounds_restarted_total",
        "Automatic channel-game round restarts",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Lobby game duration in seconds.
    pub static ref GAME_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("kaladont_game_duration_seconds", "Game duration in seconds")
            .buckets(vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 3600.0]),
        &["kind"],
    )
    .unwrap();

    /// Words played per completed channel-game round.
    pub static ref ROUND_WORDS_PLAYED: Histogram = Histogram::with_opts(
        HistogramOpts::new("kaladont_round_words_played", "Words played per channel round")
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
    )
    .unwrap();

    /// Time spent validating one candidate word, in ms. The dead-end scan
    /// in endless mode dominates the upper buckets.
    pub static ref VALIDATION_DURATION_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("kaladont_validation_duration_ms", "Word validation time in ms")
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_SESSIONS.clone()),
        Box::new(CHANNEL_GAMES.clone()),
        Box::new(GAMES_STARTED_TOTAL.clone()),
        Box::new(GAMES_COMPLETED_TOTAL.clone()),
        Box::new(WORDS_PLAYED_TOTAL.clone()),
        Box::new(PLAYERS_ELIMINATED_TOTAL.clone()),
        Box::new(ROUNDS_RESTARTED_TOTAL.clone()),
        Box::new(GAME_DURATION_SECONDS.clone()),
        Box::new(ROUND_WORDS_PLAYED.clone()),
        Box::new(VALIDATION_DURATION_MS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
