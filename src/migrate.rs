//! Database schema migrations (idempotent).
//!
//! `posts.scope_query` and `posts.scope_user_id` store `''` for "no scope"
//! so the `UNIQUE(url, scope_query)` constraint also covers background
//! posts (SQLite treats NULLs as distinct in unique indexes).

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Create posts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            channel TEXT NOT NULL,
            source TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            scope_query TEXT NOT NULL DEFAULT '',
            scope_user_id TEXT NOT NULL DEFAULT '',
            ingested_at INTEGER NOT NULL,
            UNIQUE(url, scope_query)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create insights table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS insights (
            id TEXT PRIMARY KEY,
            post_ref TEXT NOT NULL UNIQUE,
            signal TEXT NOT NULL,
            why_it_matters TEXT NOT NULL,
            action_angle TEXT NOT NULL,
            sector TEXT NOT NULL,
            tone TEXT NOT NULL,
            urgency_score INTEGER NOT NULL,
            novelty_score INTEGER NOT NULL,
            interesting_score INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_url ON posts(url)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_posts_scope ON posts(scope_user_id, scope_query)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_insights_created_at ON insights(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
