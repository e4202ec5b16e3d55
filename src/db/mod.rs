mod models;

pub use models::*;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("trimly.db");
    let db_url = format!("sqlite:{}", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = connect(&db_url, 5).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

async fn connect(db_url: &str, max_connections: u32) -> Result<DbPool> {
    // WAL for better concurrency; foreign_keys must be set per connection
    // or cascade deletes silently stop working on pooled connections
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users, sessions, cities, salons, salon images
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Membership plans and customer memberships
    execute_sql(pool, include_str!("../../migrations/002_memberships.sql")).await?;

    // Migration 003: Coupons, purchased instances, redemptions
    execute_sql(pool, include_str!("../../migrations/003_coupons.sql")).await?;

    // Migration 004: Reviews, review images, likes, reports
    execute_sql(pool, include_str!("../../migrations/004_reviews.sql")).await?;

    // Migration 005: Add opening/closing time columns to salons
    let has_opening_time: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM pragma_table_info('salons') WHERE name = 'opening_time'",
    )
    .fetch_optional(pool)
    .await?;
    if has_opening_time.is_none() {
        execute_sql(pool, include_str!("../../migrations/005_salon_hours.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

/// In-memory database for unit tests. A single connection keeps every
/// query on the same in-memory instance.
#[cfg(test)]
pub async fn init_in_memory() -> Result<DbPool> {
    connect("sqlite::memory:", 1).await
}
