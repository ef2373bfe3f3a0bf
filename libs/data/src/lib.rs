//! Data layer for the watermelon delivery services.
//!
//! Owns the authoritative subscriber store (PostgreSQL) and the advisory
//! cache in front of it (Redis). The cache carries three kinds of entries:
//!
//! - `token -> json(Operation)` — a pending subscribe/unsubscribe intent,
//!   15-minute TTL, consumed when the user confirms;
//! - `nickname -> email-or-empty` — read-through membership lookup,
//!   1-minute TTL;
//! - `"UsersList" -> json([User])` — the full listing, 1-minute TTL,
//!   evicted on any membership change.
//!
//! The store is authoritative; the cache is an eventually-consistent derived
//! view. Writes go to Postgres first and invalidate the listing entry on
//! success.

pub mod cache;
pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod retry;
pub mod store;

pub use cache::{Cache, RedisCache};
pub use error::{DataError, DataResult};
pub use models::{Method, Operation, User};
pub use postgres::PgUserStore;
pub use repository::{Data, PostgresRedisData};
pub use retry::{retry_with_backoff, RetryConfig};
pub use store::UserStore;

/// Confirmation key size in raw bytes before base64url encoding.
pub const KEY_SIZE: usize = 128;

/// TTL for pending operations in the cache.
pub const AUTH_EXPIRATION: std::time::Duration = std::time::Duration::from_secs(15 * 60);

/// TTL for membership lookups and the listing entry.
pub const CACHE_EXPIRATION: std::time::Duration = std::time::Duration::from_secs(60);

/// Cache key holding the JSON-encoded full subscriber list.
pub const LIST_USERS_KEY: &str = "UsersList";
