use chrono::{DateTime, Utc};
use rusqlite::Row;

/// Discord user id.
pub type UserId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub discord_id: UserId,
    pub panel_id: i64,
    pub email: String,
    pub banned: bool,
    pub registered_at: DateTime<Utc>,
}

impl UserRecord {
    pub(crate) const COLUMNS: &'static str = "discord_id, panel_id, email, banned, registered_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            discord_id: row.get(0)?,
            panel_id: row.get(1)?,
            email: row.get(2)?,
            banned: row.get(3)?,
            registered_at: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewServerRecord {
    pub server_id: String,
    pub owner_id: UserId,
    /// Numeric id used by the panel's application API, when known.
    pub panel_id: Option<i64>,
    pub name: Option<String>,
}

impl NewServerRecord {
    pub fn new(server_id: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            server_id: server_id.into(),
            owner_id,
            panel_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerRecord {
    pub server_id: String,
    pub owner_id: UserId,
    pub panel_id: Option<i64>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ServerRecord {
    pub(crate) const COLUMNS: &'static str = "server_id, owner_id, panel_id, name, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            server_id: row.get(0)?,
            owner_id: row.get(1)?,
            panel_id: row.get(2)?,
            name: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    /// The name to show in replies, falling back to the identifier.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.server_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub server_id: String,
    pub grantee_id: UserId,
    pub owner_id: UserId,
    pub granted_at: DateTime<Utc>,
}
