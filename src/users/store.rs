use async_trait::async_trait;
use thiserror::Error;

use super::model::{NewUser, User, UserChanges};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Io(#[from] sqlx::Error),
}

/// Persistence capability consumed by the user handlers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_users(&self) -> Result<Vec<User>, StoreError>;
    async fn get_user_by_id(&self, id: i64) -> Result<User, StoreError>;
    async fn get_user_by_username(&self, user_name: &str) -> Result<User, StoreError>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<User, StoreError>;
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;
}

pub(crate) fn user_not_found(id: i64) -> StoreError {
    StoreError::NotFound(format!("user {id}"))
}

pub(crate) fn user_name_taken(user_name: &str) -> StoreError {
    StoreError::Conflict(format!("user name {user_name} already taken"))
}
