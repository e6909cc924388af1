//! Schema migrations, applied in order and tracked in the `migrations` table.

use rusqlite::{params, Connection};
use tracing::{debug, info};

pub const CURRENT_VERSION: i32 = 1;

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        info!(current, target = CURRENT_VERSION, "running migrations");
    }

    if current < 1 {
        // the schema change and its version row land together or not at all
        let tx = conn.unchecked_transaction()?;
        v1_ownership(&tx)?;
        tx.commit()?;
    }

    Ok(())
}

fn record(conn: &Connection, version: i32, name: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        params![version, name],
    )?;
    debug!(version, name, "migration applied");
    Ok(())
}

/// Users, the servers they own, and the access grants on those servers.
fn v1_ownership(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            discord_id INTEGER NOT NULL UNIQUE,
            panel_id INTEGER NOT NULL,
            email TEXT NOT NULL,
            banned INTEGER NOT NULL DEFAULT 0,
            registered_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS servers (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id TEXT NOT NULL UNIQUE,
            owner_id INTEGER NOT NULL REFERENCES users(discord_id),
            panel_id INTEGER,
            name TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_servers_owner ON servers(owner_id);

        CREATE TABLE IF NOT EXISTS grants (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id TEXT NOT NULL REFERENCES servers(server_id) ON DELETE CASCADE,
            grantee_id INTEGER NOT NULL,
            granted_at TEXT NOT NULL,
            UNIQUE(server_id, grantee_id)
        );

        CREATE INDEX IF NOT EXISTS idx_grants_grantee ON grants(grantee_id);
        ",
    )?;
    record(conn, 1, "ownership")
}
