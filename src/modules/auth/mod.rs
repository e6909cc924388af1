//! The authorization gate every command passes through before it touches the
//! panel or the store.

use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::modules::ownership::{OwnershipStore, StoreError, UserId, UserRecord};

/// What a command needs from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission<'a> {
    /// Any caller who is not banned.
    SelfService,
    /// Member of the configured administrator set.
    Admin,
    /// Recorded owner of the server.
    Owner(&'a str),
    /// Owner of the server or a user it has been shared with.
    Access(&'a str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("caller is banned")]
    Banned,
    #[error("caller is not an administrator")]
    NotAdmin,
    #[error("caller does not own {0}")]
    NotOwner(String),
    #[error("caller has no access to {0}")]
    NoAccess(String),
}

impl Denial {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Banned => "🚫 You are banned from using this bot.",
            Self::NotAdmin => "⛔ You are not authorized.",
            Self::NotOwner(_) => "⛔ That's not your server.",
            Self::NoAccess(_) => "⛔ You don't have access to that server.",
        }
    }
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Denied(#[from] Denial),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stateless permission check, built once from the configured admin set.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    admins: HashSet<UserId>,
}

impl AuthorizationGate {
    pub fn new(admins: HashSet<UserId>) -> Self {
        Self { admins }
    }

    pub fn is_admin(&self, caller: UserId) -> bool {
        self.admins.contains(&caller)
    }

    /// Checks `caller` against `permission`. Bans are checked first and apply
    /// to every permission kind. Returns the caller's registration, if any.
    pub async fn authorize(
        &self,
        store: &OwnershipStore,
        caller: UserId,
        permission: Permission<'_>,
    ) -> Result<Option<UserRecord>, GateError> {
        let user = store.get_user(caller).await?;
        if user.as_ref().is_some_and(|u| u.banned) {
            debug!(caller, ?permission, "denied banned caller");
            return Err(Denial::Banned.into());
        }

        let allowed = match permission {
            Permission::SelfService => Ok(()),
            Permission::Admin => {
                if self.is_admin(caller) {
                    Ok(())
                } else {
                    Err(Denial::NotAdmin)
                }
            }
            Permission::Owner(server_id) => {
                if store.owner_of(server_id).await? == Some(caller) {
                    Ok(())
                } else {
                    Err(Denial::NotOwner(server_id.to_string()))
                }
            }
            Permission::Access(server_id) => {
                if store.has_access(server_id, caller).await? {
                    Ok(())
                } else {
                    Err(Denial::NoAccess(server_id.to_string()))
                }
            }
        };

        if let Err(denial) = allowed {
            debug!(caller, ?permission, %denial, "denied");
            return Err(denial.into());
        }
        Ok(user)
    }

    /// Same check as [`authorize`](Self::authorize), collapsed to a yes/no.
    /// Store failures still surface as errors.
    pub async fn allows(
        &self,
        store: &OwnershipStore,
        caller: UserId,
        permission: Permission<'_>,
    ) -> Result<bool, StoreError> {
        match self.authorize(store, caller, permission).await {
            Ok(_) => Ok(true),
            Err(GateError::Denied(_)) => Ok(false),
            Err(GateError::Store(e)) => Err(e),
        }
    }
}
