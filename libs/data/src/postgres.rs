//! PostgreSQL implementation of the subscriber store.

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::time::Duration;
use tracing::info;

use crate::entity;
use crate::error::{DataError, DataResult};
use crate::models::User;
use crate::store::UserStore;

/// Statement executed at startup; the unique constraint on the nickname is
/// what rejects duplicate subscriptions later on.
const CREATE_USERS_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS users (nickname TEXT, email TEXT, UNIQUE (nickname))";

/// [`UserStore`] backed by PostgreSQL through sea-orm.
pub struct PgUserStore {
    db: DatabaseConnection,
}

impl PgUserStore {
    /// Connect to PostgreSQL, verify the connection and bootstrap the
    /// users table.
    pub async fn connect(dsn: &str) -> DataResult<Self> {
        info!("Connecting to database...");

        let mut opt = ConnectOptions::new(dsn);
        opt.connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let db = Database::connect(opt)
            .await
            .map_err(|e| DataError::Storage(e.to_string()))?;

        db.ping()
            .await
            .map_err(|e| DataError::Storage(e.to_string()))?;

        db.execute_unprepared(CREATE_USERS_TABLE)
            .await
            .map_err(|e| DataError::Storage(e.to_string()))?;

        info!("Successfully connected to database");
        Ok(Self { db })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User) -> DataResult<()> {
        let row = entity::ActiveModel {
            nickname: Set(user.nickname.clone()),
            email: Set(user.email.clone()),
        };
        entity::Entity::insert(row)
            .exec(&self.db)
            .await
            .map_err(|e| DataError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, user: &User) -> DataResult<u64> {
        let result = entity::Entity::delete_many()
            .filter(entity::Column::Nickname.eq(&user.nickname))
            .filter(entity::Column::Email.eq(&user.email))
            .exec(&self.db)
            .await
            .map_err(|e| DataError::Storage(e.to_string()))?;
        Ok(result.rows_affected)
    }

    async fn email_of(&self, nickname: &str) -> DataResult<Option<String>> {
        let found = entity::Entity::find_by_id(nickname)
            .one(&self.db)
            .await
            .map_err(|e| DataError::Storage(e.to_string()))?;
        Ok(found.map(|m| m.email))
    }

    async fn all(&self) -> DataResult<Vec<User>> {
        let rows = entity::Entity::find()
            .all(&self.db)
            .await
            .map_err(|e| DataError::Storage(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
