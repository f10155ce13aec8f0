use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use kaladont_backend::api;
use kaladont_backend::config::Config;
use kaladont_backend::db::Database;
use kaladont_backend::engine::channel_game::ChannelGame;
use kaladont_backend::engine::lexicon::Dictionaries;
use kaladont_backend::metrics;
use kaladont_backend::registry::{ChannelGameRegistry, SessionRegistry};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "kaladont-backend" }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    let dicts = Arc::new(Dictionaries::load(&config.words_dir));
    if dicts.available().is_empty() {
        tracing::warn!(
            words_dir = %config.words_dir.display(),
            "No dictionaries loaded; game starts will be refused"
        );
    }

    let sessions = SessionRegistry::new();
    let channels = ChannelGameRegistry::new();

    // Resume persistent channel games from durable storage.
    match db.list_channel_games().await {
        Ok(rows) => {
            for row in rows {
                match ChannelGame::resume(db.clone(), &dicts, &row).await {
                    Ok(game) => {
                        channels.insert_if_absent(row.channel_id, game);
                    }
                    Err(e) => {
                        // Leave the row in place; the channel stays dormant
                        // until its dictionary (or data) is fixed.
                        tracing::error!(
                            channel_id = row.channel_id,
                            "Could not resume channel game: {e}"
                        );
                    }
                }
            }
            tracing::info!(count = channels.len(), "Resumed persistent channel games");
        }
        Err(e) => tracing::error!("Could not list channel games: {e}"),
    }

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api::router(db, dicts, sessions, channels))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind HTTP port");

    tracing::info!("Kaladont backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
