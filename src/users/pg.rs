use async_trait::async_trait;
use sqlx::PgPool;

use super::{
    model::{NewUser, User, UserChanges},
    store::{user_name_taken, user_not_found, StoreError, UserStore},
};

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, user_name, email, password_hash, created_at
            "#,
        )
        .bind(&user.user_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                user_name_taken(&user.user_name)
            } else {
                StoreError::Io(e)
            }
        })
    }

    async fn get_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(
            r#"SELECT id, user_name, email, password_hash, created_at FROM users"#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| user_not_found(id))
    }

    async fn get_user_by_username(&self, user_name: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, password_hash, created_at
            FROM users
            WHERE user_name = $1
            "#,
        )
        .bind(user_name)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("user {user_name}")))
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<User, StoreError> {
        let new_name = changes.user_name.clone();
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET user_name     = COALESCE($2, user_name),
                   email         = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash)
             WHERE id = $1
            RETURNING id, user_name, email, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(changes.user_name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                user_name_taken(new_name.as_deref().unwrap_or_default())
            } else {
                StoreError::Io(e)
            }
        })?
        .ok_or_else(|| user_not_found(id))
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(user_not_found(id));
        }
        Ok(())
    }
}

/// These run against a live database and are skipped unless `DATABASE_URL`
/// is set.
#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    async fn store() -> Option<PgUserStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let db = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("run migrations");
        Some(PgUserStore::new(db))
    }

    fn unique_name(prefix: &str) -> String {
        let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
        format!("{prefix}-{nanos}")
    }

    fn new_user(user_name: &str) -> NewUser {
        NewUser {
            user_name: user_name.to_string(),
            email: format!("{user_name}@x.com"),
            password_hash: "$argon2id$v=19$stub".into(),
        }
    }

    #[tokio::test]
    async fn create_fetch_and_duplicate_conflict() {
        let Some(store) = store().await else { return };
        let name = unique_name("pg-create");

        let created = store.create_user(new_user(&name)).await.unwrap();
        assert_eq!(store.get_user_by_id(created.id).await.unwrap().user_name, name);
        assert_eq!(store.get_user_by_username(&name).await.unwrap().id, created.id);

        let err = store.create_user(new_user(&name)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.delete_user(created.id).await.unwrap();
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let Some(store) = store().await else { return };

        assert!(matches!(
            store.get_user_by_id(i64::MAX).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.delete_user(i64::MAX).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        let changes = UserChanges {
            email: Some("ghost@x.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_user(i64::MAX, changes).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let Some(store) = store().await else { return };
        let name = unique_name("pg-update");
        let created = store.create_user(new_user(&name)).await.unwrap();

        let changes = UserChanges {
            email: Some("changed@x.com".into()),
            ..Default::default()
        };
        let updated = store.update_user(created.id, changes).await.unwrap();
        assert_eq!(updated.email, "changed@x.com");
        assert_eq!(updated.user_name, name);
        assert_eq!(updated.password_hash, created.password_hash);

        store.delete_user(created.id).await.unwrap();
        assert!(matches!(
            store.get_user_by_id(created.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn renaming_onto_a_taken_name_conflicts() {
        let Some(store) = store().await else { return };
        let first = store.create_user(new_user(&unique_name("pg-first"))).await.unwrap();
        let second = store.create_user(new_user(&unique_name("pg-second"))).await.unwrap();

        let changes = UserChanges {
            user_name: Some(first.user_name.clone()),
            ..Default::default()
        };
        let err = store.update_user(second.id, changes).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.delete_user(first.id).await.unwrap();
        store.delete_user(second.id).await.unwrap();
    }
}
