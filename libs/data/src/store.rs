//! Authoritative subscriber store seam.

use async_trait::async_trait;

use crate::error::DataResult;
use crate::models::User;

/// The authoritative subscriber store.
///
/// Implemented over PostgreSQL in [`crate::postgres::PgUserStore`]; tests
/// substitute an in-memory implementation.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a subscriber. The unique constraint on the nickname rejects
    /// duplicates as a storage error.
    async fn insert(&self, user: &User) -> DataResult<()>;

    /// Delete subscribers matching both nickname and email. Returns the
    /// number of removed rows.
    async fn delete(&self, user: &User) -> DataResult<u64>;

    /// Look up the email recorded for a nickname.
    async fn email_of(&self, nickname: &str) -> DataResult<Option<String>>;

    /// Fetch the full subscriber list.
    async fn all(&self) -> DataResult<Vec<User>>;
}
