// Database access layer (SQLite via sqlx).
//
// Stores the persistent channel-game configuration and the durable state
// of the current round. Every mutation is a single statement or a
// transaction, and the next read reflects it; the engine treats the read
// value as ground truth for prefix validation after a restart.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Durable configuration and round state of one persistent channel game.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelGameRow {
    pub channel_id: i64,
    pub language: String,
    pub mode: String,
    pub turn_time_secs: i64,
    pub current_word: String,
    pub words_played: i64,
    pub round_started_at: String,
    pub created_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_games (
                channel_id INTEGER PRIMARY KEY,
                language TEXT NOT NULL,
                mode TEXT NOT NULL DEFAULT 'normal',
                turn_time_secs INTEGER NOT NULL DEFAULT 60,
                current_word TEXT NOT NULL,
                words_played INTEGER NOT NULL DEFAULT 0,
                round_started_at TEXT NOT NULL DEFAULT (datetime('now')),
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_used_words (
                channel_id INTEGER NOT NULL REFERENCES channel_games(channel_id) ON DELETE CASCADE,
                word TEXT NOT NULL,
                UNIQUE(channel_id, word)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Channel games ─────────────────────────────────────────────────

    /// Bind a channel to a persistent game. Fails with a unique-constraint
    /// error if the channel is already bound.
    pub async fn create_channel_game(
        &self,
        channel_id: i64,
        language: &str,
        mode: &str,
        turn_time_secs: i64,
        starting_word: &str,
    ) -> Result<ChannelGameRow, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO channel_games (channel_id, language, mode, turn_time_secs, current_word, round_started_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(channel_id)
        .bind(language)
        .bind(mode)
        .bind(turn_time_secs)
        .bind(starting_word)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO channel_used_words (channel_id, word) VALUES (?, ?)")
            .bind(channel_id)
            .bind(starting_word)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        match self.get_channel_game(channel_id).await? {
            Some(row) => Ok(row),
            None => Err(sqlx::Error::RowNotFound),
        }
    }

    pub async fn get_channel_game(
        &self,
        channel_id: i64,
    ) -> Result<Option<ChannelGameRow>, sqlx::Error> {
        let row = sqlx::query_as::<_, ChannelGameRow>(
            "SELECT channel_id, language, mode, turn_time_secs, current_word, words_played, round_started_at, created_at
             FROM channel_games WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_channel_games(&self) -> Result<Vec<ChannelGameRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ChannelGameRow>(
            "SELECT channel_id, language, mode, turn_time_secs, current_word, words_played, round_started_at, created_at
             FROM channel_games ORDER BY channel_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The used-word set of the current round, for seeding in-memory state
    /// after a service restart.
    pub async fn get_used_words(&self, channel_id: i64) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT word FROM channel_used_words WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Record one accepted play: the word joins the round's used set and
    /// becomes the current word. Atomic; a reader immediately afterwards
    /// sees the new state.
    pub async fn record_play(
        &self,
        channel_id: i64,
        word: &str,
        words_played: i64,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE channel_games SET current_word = ?, words_played = ? WHERE channel_id = ?",
        )
        .bind(word)
        .bind(words_played)
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT OR IGNORE INTO channel_used_words (channel_id, word) VALUES (?, ?)")
            .bind(channel_id)
            .bind(word)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Reset a channel to a fresh round: clear the used set, seed it with
    /// the new starting word, zero the counter.
    pub async fn reset_round(
        &self,
        channel_id: i64,
        starting_word: &str,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM channel_used_words WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO channel_used_words (channel_id, word) VALUES (?, ?)")
            .bind(channel_id)
            .bind(starting_word)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE channel_games SET current_word = ?, words_played = 0, round_started_at = ? WHERE channel_id = ?",
        )
        .bind(starting_word)
        .bind(Utc::now().to_rfc3339())
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Unbind a channel. Returns whether anything was deleted.
    pub async fn delete_channel_game(&self, channel_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM channel_used_words WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM channel_games WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
