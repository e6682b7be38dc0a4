use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{
    model::{NewUser, User, UserChanges},
    store::{user_name_taken, user_not_found, StoreError, UserStore},
};

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    last_id: i64,
}

impl Inner {
    fn name_taken(&self, user_name: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.user_name == user_name && Some(u.id) != except)
    }
}

/// In-process store with sequential ids.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.name_taken(&user.user_name, None) {
            return Err(user_name_taken(&user.user_name));
        }
        inner.last_id += 1;
        let created = User {
            id: inner.last_id,
            user_name: user.user_name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| user_not_found(id))
    }

    async fn get_user_by_username(&self, user_name: &str) -> Result<User, StoreError> {
        self.inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.user_name == user_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {user_name}")))
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(name) = &changes.user_name {
            if inner.name_taken(name, Some(id)) {
                return Err(user_name_taken(name));
            }
        }
        let user = inner.users.get_mut(&id).ok_or_else(|| user_not_found(id))?;
        if let Some(name) = changes.user_name {
            user.user_name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| user_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            user_name: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_and_never_reused() {
        let store = MemoryUserStore::new();
        let a = store.create_user(new_user("a")).await.unwrap();
        let b = store.create_user(new_user("b")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        store.delete_user(b.id).await.unwrap();
        let c = store.create_user(new_user("c")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn duplicate_user_name_conflicts() {
        let store = MemoryUserStore::new();
        store.create_user(new_user("alice")).await.unwrap();
        let err = store.create_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn lookups_and_missing_records() {
        let store = MemoryUserStore::new();
        let alice = store.create_user(new_user("alice")).await.unwrap();

        assert_eq!(store.get_user_by_id(alice.id).await.unwrap().user_name, "alice");
        assert_eq!(store.get_user_by_username("alice").await.unwrap().id, alice.id);
        assert_eq!(store.get_users().await.unwrap().len(), 1);

        assert!(matches!(
            store.get_user_by_id(99).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.get_user_by_username("bob").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.delete_user(99).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let store = MemoryUserStore::new();
        let alice = store.create_user(new_user("alice")).await.unwrap();
        store.create_user(new_user("bob")).await.unwrap();

        let updated = store
            .update_user(
                alice.id,
                UserChanges {
                    email: Some("new@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.user_name, "alice");
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.password_hash, "hash");

        let err = store
            .update_user(
                alice.id,
                UserChanges {
                    user_name: Some("bob".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store.update_user(42, UserChanges::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
