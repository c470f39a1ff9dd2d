pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder().max_size(8).build(manager)?;

    // Configure SQLite for performance
    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Whether the application schema has ever been created. Used by the admin
/// reset endpoint: a fresh store may be initialized without credentials.
pub fn schema_exists(conn: &rusqlite::Connection) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'users'",
        [],
        |row| row.get(0),
    )
}

/// Drop every application table and re-run the migrations from scratch.
pub fn reset_schema(pool: &DbPool) -> anyhow::Result<()> {
    {
        let conn = pool.get()?;
        // Children before parents, foreign_keys is ON
        conn.execute_batch(
            "DROP TABLE IF EXISTS comments;
             DROP TABLE IF EXISTS likes;
             DROP TABLE IF EXISTS posts;
             DROP TABLE IF EXISTS users;
             DROP TABLE IF EXISTS schema_version;",
        )?;
    }
    run_migrations(pool)?;
    tracing::info!("Database schema reset");
    Ok(())
}

/// Delete a post and everything hanging off it, in one transaction.
pub fn cascade_delete_post(
    conn: &mut rusqlite::Connection,
    post_id: &str,
) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM likes WHERE post_id = ?1", params![post_id])?;
    tx.execute("DELETE FROM comments WHERE post_id = ?1", params![post_id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
    tx.commit()
}

/// Delete a user, their likes and comments, their posts, and the likes and
/// comments other users left on those posts. One transaction, committed once.
pub fn cascade_delete_user(
    conn: &mut rusqlite::Connection,
    user_id: &str,
) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM likes WHERE post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
        params![user_id],
    )?;
    tx.execute(
        "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
        params![user_id],
    )?;
    tx.execute("DELETE FROM likes WHERE author_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM comments WHERE author_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM posts WHERE author_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    tx.commit()
}
