//! Database initialization
//!
//! Creates the database file and schema on first run; all statements are
//! idempotent so startup is safe to repeat. Referential integrity between
//! sessions and events is maintained by the application (explicit deletes
//! in a transaction) rather than relying on the engine's cascade, so the
//! foreign keys here are documentation plus a backstop.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_clients_table(&pool).await?;
    create_behaviors_table(&pool).await?;
    create_skills_table(&pool).await?;
    create_behavior_sessions_table(&pool).await?;
    create_behavior_events_table(&pool).await?;
    create_skill_events_table(&pool).await?;

    Ok(pool)
}

async fn create_clients_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            birthdate TEXT NOT NULL,
            info TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_clients_name ON clients(name)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_behaviors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS behaviors (
            guid TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES clients(guid),
            name TEXT NOT NULL,
            description TEXT,
            method TEXT NOT NULL CHECK (method IN ('FREQUENCY', 'DURATION', 'INTERVAL', 'MTS')),
            settings TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_behaviors_client ON behaviors(client_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_skills_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skills (
            guid TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES clients(guid),
            name TEXT NOT NULL,
            description TEXT,
            method TEXT NOT NULL DEFAULT 'PERCENTAGE',
            skill_type TEXT NOT NULL DEFAULT 'OTHER'
                CHECK (skill_type IN ('LR', 'MAND', 'TACT', 'IV', 'MI', 'PLAY', 'VP', 'ADL', 'SOC', 'ACAD', 'OTHER')),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_skills_client ON skills(client_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_behavior_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS behavior_sessions (
            guid TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES clients(guid),
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_client ON behavior_sessions(client_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_started ON behavior_sessions(started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_behavior_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS behavior_events (
            guid TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES behavior_sessions(guid) ON DELETE CASCADE,
            behavior_id TEXT NOT NULL REFERENCES behaviors(guid),
            event_type TEXT NOT NULL CHECK (event_type IN ('INC', 'DEC', 'START', 'STOP', 'HIT')),
            value INTEGER,
            happened_at TEXT NOT NULL,
            extra TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_behavior_events_session ON behavior_events(session_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_behavior_events_behavior ON behavior_events(behavior_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_behavior_events_happened ON behavior_events(happened_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_skill_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skill_events (
            guid TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES behavior_sessions(guid) ON DELETE CASCADE,
            skill_id TEXT NOT NULL REFERENCES skills(guid),
            event_type TEXT NOT NULL CHECK (event_type IN ('CORRECT', 'WRONG')),
            happened_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_skill_events_session ON skill_events(session_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_skill_events_skill ON skill_events(skill_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
