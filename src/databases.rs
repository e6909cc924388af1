use std::path::Path;

use crate::database::{Database, DbError};
use crate::modules::ownership::OwnershipStore;

#[derive(Debug)]
pub struct Databases {
    pub ownership: OwnershipStore,
}

impl Databases {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Ok(Self {
            ownership: Database::new(path).await?,
        })
    }

    pub fn in_memory() -> Result<Self, DbError> {
        Ok(Self {
            ownership: Database::open_in_memory()?,
        })
    }
}
