use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};
use thiserror::Error;
use tracing::debug;

use super::models::{Grant, NewServerRecord, ServerRecord, UserId, UserRecord};
use crate::database::{Database, DbError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("server {0} is not recorded")]
    NotOwner(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(e))
    }
}

/// Users, the servers they own, and who else may use those servers.
pub type OwnershipStore = Database;

fn user_exists(tx: &Transaction<'_>, discord_id: UserId) -> rusqlite::Result<bool> {
    tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE discord_id = ?1)",
        params![discord_id],
        |row| row.get(0),
    )
}

fn owner_in(tx: &Transaction<'_>, server_id: &str) -> rusqlite::Result<Option<UserId>> {
    tx.query_row(
        "SELECT owner_id FROM servers WHERE server_id = ?1",
        params![server_id],
        |row| row.get(0),
    )
    .optional()
}

impl OwnershipStore {
    pub async fn register_user(
        &self,
        discord_id: UserId,
        panel_id: i64,
        email: &str,
    ) -> Result<UserRecord, StoreError> {
        self.transaction(|tx| {
            if user_exists(tx, discord_id)? {
                return Err(StoreError::AlreadyExists(format!("user {}", discord_id)));
            }

            let user = UserRecord {
                discord_id,
                panel_id,
                email: email.to_string(),
                banned: false,
                registered_at: Utc::now(),
            };
            tx.execute(
                "INSERT INTO users (discord_id, panel_id, email, banned, registered_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![user.discord_id, user.panel_id, user.email, user.registered_at],
            )?;
            debug!(discord_id, panel_id, "registered user");
            Ok(user)
        })
        .await
    }

    pub async fn get_user(&self, discord_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE discord_id = ?1", UserRecord::COLUMNS);
        Ok(self
            .read(|conn| {
                conn.query_row(&sql, params![discord_id], UserRecord::from_row)
                    .optional()
            })
            .await?)
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY seq", UserRecord::COLUMNS);
        Ok(self
            .read(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], UserRecord::from_row)?;
                rows.collect()
            })
            .await?)
    }

    pub async fn set_banned(&self, discord_id: UserId, banned: bool) -> Result<(), StoreError> {
        self.transaction(|tx| {
            let updated = tx.execute(
                "UPDATE users SET banned = ?1 WHERE discord_id = ?2",
                params![banned, discord_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("user {}", discord_id)));
            }
            Ok(())
        })
        .await
    }

    /// Records `server.owner_id` as the owner of `server.server_id`.
    ///
    /// Re-recording an existing identifier replaces its owner in place; grants
    /// on the server survive, except one held by the new owner.
    pub async fn record_server(&self, server: NewServerRecord) -> Result<(), StoreError> {
        self.transaction(|tx| {
            if !user_exists(tx, server.owner_id)? {
                return Err(StoreError::NotFound(format!("user {}", server.owner_id)));
            }

            tx.execute(
                "INSERT INTO servers (server_id, owner_id, panel_id, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(server_id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    panel_id = COALESCE(excluded.panel_id, servers.panel_id),
                    name = COALESCE(excluded.name, servers.name)",
                params![
                    server.server_id,
                    server.owner_id,
                    server.panel_id,
                    server.name,
                    Utc::now()
                ],
            )?;
            tx.execute(
                "DELETE FROM grants WHERE server_id = ?1 AND grantee_id = ?2",
                params![server.server_id, server.owner_id],
            )?;
            debug!(server_id = %server.server_id, owner_id = server.owner_id, "recorded server");
            Ok(())
        })
        .await
    }

    /// Removes the record and, by cascade, every grant on it.
    pub async fn remove_server(&self, server_id: &str) -> Result<bool, StoreError> {
        self.transaction(|tx| {
            let removed = tx.execute("DELETE FROM servers WHERE server_id = ?1", params![server_id])?;
            Ok(removed > 0)
        })
        .await
    }

    pub async fn get_server(&self, server_id: &str) -> Result<Option<ServerRecord>, StoreError> {
        let sql = format!("SELECT {} FROM servers WHERE server_id = ?1", ServerRecord::COLUMNS);
        Ok(self
            .read(|conn| {
                conn.query_row(&sql, params![server_id], ServerRecord::from_row)
                    .optional()
            })
            .await?)
    }

    /// Looks a server up by the numeric id the panel assigned it.
    pub async fn find_by_panel_id(&self, panel_id: i64) -> Result<Option<ServerRecord>, StoreError> {
        let sql = format!("SELECT {} FROM servers WHERE panel_id = ?1", ServerRecord::COLUMNS);
        Ok(self
            .read(|conn| {
                conn.query_row(&sql, params![panel_id], ServerRecord::from_row)
                    .optional()
            })
            .await?)
    }

    pub async fn owner_of(&self, server_id: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self
            .read(|conn| {
                conn.query_row(
                    "SELECT owner_id FROM servers WHERE server_id = ?1",
                    params![server_id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?)
    }

    /// Returns `Ok(true)` when a new grant was written. Repeat grants, and
    /// grants to the owner, leave the store unchanged and return `Ok(false)`.
    pub async fn grant_access(&self, server_id: &str, grantee: UserId) -> Result<bool, StoreError> {
        self.transaction(|tx| {
            let owner = owner_in(tx, server_id)?
                .ok_or_else(|| StoreError::NotOwner(server_id.to_string()))?;
            if owner == grantee {
                return Ok(false);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO grants (server_id, grantee_id, granted_at) VALUES (?1, ?2, ?3)",
                params![server_id, grantee, Utc::now()],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    pub async fn revoke_access(&self, server_id: &str, grantee: UserId) -> Result<bool, StoreError> {
        self.transaction(|tx| {
            let removed = tx.execute(
                "DELETE FROM grants WHERE server_id = ?1 AND grantee_id = ?2",
                params![server_id, grantee],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    /// Whether `discord_id` owns the server or holds a grant on it.
    pub async fn has_access(&self, server_id: &str, discord_id: UserId) -> Result<bool, StoreError> {
        Ok(self
            .read(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM servers WHERE server_id = ?1 AND owner_id = ?2)
                         OR EXISTS(SELECT 1 FROM grants WHERE server_id = ?1 AND grantee_id = ?2)",
                    params![server_id, discord_id],
                    |row| row.get(0),
                )
            })
            .await?)
    }

    pub async fn list_owned(&self, discord_id: UserId) -> Result<Vec<String>, StoreError> {
        self.list_ids(
            "SELECT server_id FROM servers WHERE owner_id = ?1 ORDER BY seq",
            discord_id,
        )
        .await
    }

    pub async fn list_shared(&self, discord_id: UserId) -> Result<Vec<String>, StoreError> {
        self.list_ids(
            "SELECT server_id FROM grants WHERE grantee_id = ?1 ORDER BY seq",
            discord_id,
        )
        .await
    }

    pub async fn list_grantees(&self, server_id: &str) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .read(|conn| {
                let mut stmt =
                    conn.prepare("SELECT grantee_id FROM grants WHERE server_id = ?1 ORDER BY seq")?;
                let rows = stmt.query_map(params![server_id], |row| row.get(0))?;
                rows.collect()
            })
            .await?)
    }

    /// Every grant, optionally narrowed to one server, oldest first.
    pub async fn list_grants(&self, server_id: Option<&str>) -> Result<Vec<Grant>, StoreError> {
        Ok(self
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT g.server_id, g.grantee_id, s.owner_id, g.granted_at
                     FROM grants g JOIN servers s ON s.server_id = g.server_id
                     WHERE ?1 IS NULL OR g.server_id = ?1
                     ORDER BY g.seq",
                )?;
                let rows = stmt.query_map(params![server_id], |row| {
                    Ok(Grant {
                        server_id: row.get(0)?,
                        grantee_id: row.get(1)?,
                        owner_id: row.get(2)?,
                        granted_at: row.get(3)?,
                    })
                })?;
                rows.collect()
            })
            .await?)
    }

    async fn list_ids(&self, sql: &str, discord_id: UserId) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read(|conn| {
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt.query_map(params![discord_id], |row| row.get(0))?;
                rows.collect()
            })
            .await?)
    }
}
