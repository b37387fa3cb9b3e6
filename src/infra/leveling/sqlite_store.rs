use crate::core::leveling::{LevelingError, ScoreStore, UserScore};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// SQLite-backed ScoreStore.
///
/// Two tables, both keyed by user_id. Each statement runs as its own implicit
/// transaction, so every trait call is durable before it returns.
pub struct SqliteScoreStore {
    pool: Pool<Sqlite>,
}

impl SqliteScoreStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                xp INTEGER NOT NULL,
                level INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cooldowns (
                user_id INTEGER PRIMARY KEY,
                last_message REAL NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn get_score(&self, user_id: u64) -> Result<Option<UserScore>, LevelingError> {
        let row = sqlx::query("SELECT xp, level FROM users WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(row.map(|row| UserScore {
            user_id,
            xp: row.get::<i64, _>("xp") as u64,
            level: row.get::<i64, _>("level") as u32,
        }))
    }

    async fn upsert_score(&self, user_id: u64, xp: u64, level: u32) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, xp, level)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                xp = excluded.xp,
                level = excluded.level
            "#,
        )
        .bind(user_id as i64)
        .bind(xp as i64)
        .bind(level as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn get_cooldown(&self, user_id: u64) -> Result<Option<f64>, LevelingError> {
        let row = sqlx::query("SELECT last_message FROM cooldowns WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(row.map(|row| row.get::<f64, _>("last_message")))
    }

    async fn touch_cooldown(
        &self,
        user_id: u64,
        last_message_at: f64,
    ) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO cooldowns (user_id, last_message)
            VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                last_message = excluded.last_message
            "#,
        )
        .bind(user_id as i64)
        .bind(last_message_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn top_n(&self, n: usize) -> Result<Vec<UserScore>, LevelingError> {
        let rows =
            sqlx::query("SELECT user_id, xp, level FROM users ORDER BY xp DESC, user_id ASC LIMIT ?")
                .bind(n as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| UserScore {
                user_id: row.get::<i64, _>("user_id") as u64,
                xp: row.get::<i64, _>("xp") as u64,
                level: row.get::<i64, _>("level") as u32,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, SqliteScoreStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("leveling.db");
        let store = SqliteScoreStore::new(db_path.to_str().unwrap())
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn score_round_trip() {
        let (_dir, store) = temp_store().await;

        assert!(store.get_score(1).await.unwrap().is_none());

        store.upsert_score(1, 10, 0).await.unwrap();
        let score = store.get_score(1).await.unwrap().unwrap();
        assert_eq!(score.xp, 10);
        assert_eq!(score.level, 0);

        store.upsert_score(1, 400, 2).await.unwrap();
        let score = store.get_score(1).await.unwrap().unwrap();
        assert_eq!(score.xp, 400);
        assert_eq!(score.level, 2);
    }

    #[tokio::test]
    async fn cooldown_round_trip() {
        let (_dir, store) = temp_store().await;

        assert!(store.get_cooldown(1).await.unwrap().is_none());

        store.touch_cooldown(1, 1700000000.25).await.unwrap();
        assert_eq!(store.get_cooldown(1).await.unwrap(), Some(1700000000.25));

        // Overwrite, and idempotence for the same value
        store.touch_cooldown(1, 1700000060.0).await.unwrap();
        store.touch_cooldown(1, 1700000060.0).await.unwrap();
        assert_eq!(store.get_cooldown(1).await.unwrap(), Some(1700000060.0));
    }

    #[tokio::test]
    async fn top_n_orders_and_limits() {
        let (_dir, store) = temp_store().await;

        store.upsert_score(1, 500, 2).await.unwrap();
        store.upsert_score(2, 1500, 3).await.unwrap();
        store.upsert_score(3, 10, 0).await.unwrap();

        let top = store.top_n(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, 2);
        assert_eq!(top[1].user_id, 1);
    }
}
