pub mod database;
pub mod models;

pub use database::{OwnershipStore, StoreError};
pub use models::{NewServerRecord, ServerRecord, UserId, UserRecord};
