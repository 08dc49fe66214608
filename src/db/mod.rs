use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::utils::config::Config;

pub mod models;
pub mod queries;

pub async fn init_db(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    tracing::info!("Connected to Postgres successfully");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool, config: &Config) -> Result<()> {
    tracing::info!("Running database migrations...");

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
        session_id TEXT NOT NULL,
        sort_ts TEXT NOT NULL,
        original_ts TEXT NOT NULL,
        query TEXT,
        response TEXT,
        location TEXT,
        category TEXT,
        sentiment TEXT,
        satisfaction_score DOUBLE PRECISION,
        PRIMARY KEY (session_id, sort_ts)
    )",
        config.conversation_table
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
        message_id TEXT PRIMARY KEY,
        feedback TEXT
    )",
        config.feedback_table
    ))
    .execute(pool)
    .await?;

    tracing::info!("✅ Database migrations completed successfully");
    Ok(())
}
