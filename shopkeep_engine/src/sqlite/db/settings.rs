use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::Setting;

pub async fn fetch_setting(key: &str, conn: &mut SqliteConnection) -> Result<Option<Setting>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM settings WHERE key = $1").bind(key).fetch_optional(conn).await
}

pub async fn fetch_all_settings(conn: &mut SqliteConnection) -> Result<Vec<Setting>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM settings ORDER BY key").fetch_all(conn).await
}

pub async fn upsert_setting(key: &str, value: &str, conn: &mut SqliteConnection) -> Result<Setting, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}
