use thiserror::Error;

use crate::database::DbError;
use crate::modules::auth::{Denial, GateError};
use crate::modules::ownership::StoreError;
use crate::modules::panel::PanelError;

/// Why a command could not do what was asked. Every variant becomes one short
/// reply via [`CommandError::user_message`].
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] Denial),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("failed to {action}: {source}")]
    RemoteOperationFailed {
        action: &'static str,
        #[source]
        source: PanelError,
    },
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("storage failure: {0}")]
    Storage(#[from] DbError),
}

impl CommandError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized(denial) => denial.user_message().to_string(),
            Self::NotFound(message) | Self::Invalid(message) => format!("❌ {}", message),
            Self::AlreadyExists(message) => format!("⚠️ {}", message),
            Self::RemoteOperationFailed { action, .. } => format!("❌ Failed to {}.", action),
            Self::Storage(_) => "❌ Something went wrong on our side. Please try again later.".to_string(),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(format!("{} was not found.", what)),
            StoreError::AlreadyExists(what) => Self::AlreadyExists(format!("{} already exists.", what)),
            StoreError::NotOwner(server_id) => Self::Unauthorized(Denial::NotOwner(server_id)),
            StoreError::Db(e) => Self::Storage(e),
        }
    }
}

impl From<GateError> for CommandError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Denied(denial) => Self::Unauthorized(denial),
            GateError::Store(e) => e.into(),
        }
    }
}

/// Attaches the user-facing action name to a failed panel call.
pub trait RemoteContext<T> {
    fn failed_to(self, action: &'static str) -> Result<T, CommandError>;
}

impl<T> RemoteContext<T> for Result<T, PanelError> {
    fn failed_to(self, action: &'static str) -> Result<T, CommandError> {
        self.map_err(|source| CommandError::RemoteOperationFailed { action, source })
    }
}
