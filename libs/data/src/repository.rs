//! The combined cache + store repository.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use rand::RngCore;
use tracing::warn;

use crate::cache::Cache;
use crate::error::{DataError, DataResult};
use crate::models::{Method, Operation, User};
use crate::store::UserStore;
use crate::{AUTH_EXPIRATION, CACHE_EXPIRATION, KEY_SIZE, LIST_USERS_KEY};

/// The data layer capability set used by the user-handling service.
///
/// A seam: production wires [`PostgresRedisData`], tests substitute mocks.
#[async_trait]
pub trait Data: Send + Sync {
    /// Look up a pending operation by its confirmation key. A missing or
    /// expired key is `Ok(None)`; a present but undecodable entry is
    /// [`DataError::Corrupt`].
    async fn get_operation(&self, key: &str) -> DataResult<Option<Operation>>;

    /// Record a pending operation and return the freshly minted
    /// confirmation key.
    async fn set_operation(&self, user: &User, method: Method) -> DataResult<String>;

    /// Drop a pending operation once it has been applied.
    async fn delete_operation(&self, key: &str) -> DataResult<()>;

    /// Whether a subscriber with this nickname exists.
    async fn check_nickname(&self, nickname: &str) -> DataResult<bool>;

    /// Read-through lookup of the email stored for a nickname; empty string
    /// when the nickname is unknown.
    async fn email_by_nickname(&self, nickname: &str) -> DataResult<String>;

    /// Add a subscriber to the authoritative store.
    async fn add_user(&self, user: &User) -> DataResult<()>;

    /// Remove a subscriber from the authoritative store.
    async fn delete_user(&self, user: &User) -> DataResult<()>;

    /// The full subscriber list, served from the listing cache when warm.
    async fn list_users(&self) -> DataResult<Vec<User>>;
}

/// Production data layer: PostgreSQL authoritative store with a Redis
/// cache in front of it.
pub struct PostgresRedisData<C, S> {
    cache: C,
    store: S,
}

impl<C: Cache, S: UserStore> PostgresRedisData<C, S> {
    pub fn new(cache: C, store: S) -> Self {
        Self { cache, store }
    }

    /// Draw a fresh confirmation key: 128 random bytes, base64url-encoded.
    fn generate_key() -> String {
        let mut buf = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut buf);
        URL_SAFE.encode(buf)
    }

    /// Drop the cached listing after a membership change. Best-effort: the
    /// 1-minute TTL bounds staleness if the eviction fails.
    async fn evict_users_list(&self) {
        if let Err(e) = self.cache.del(LIST_USERS_KEY).await {
            warn!(error = %e, "Failed to evict users list from cache");
        }
    }
}

#[async_trait]
impl<C: Cache, S: UserStore> Data for PostgresRedisData<C, S> {
    async fn get_operation(&self, key: &str) -> DataResult<Option<Operation>> {
        let Some(json) = self.cache.get(key).await? else {
            return Ok(None);
        };
        let operation =
            serde_json::from_str(&json).map_err(|e| DataError::Corrupt(e.to_string()))?;
        Ok(Some(operation))
    }

    async fn set_operation(&self, user: &User, method: Method) -> DataResult<String> {
        let operation = Operation::new(user.clone(), method);
        let json =
            serde_json::to_string(&operation).map_err(|e| DataError::Corrupt(e.to_string()))?;

        let key = Self::generate_key();
        self.cache.set(&key, &json, AUTH_EXPIRATION).await?;
        Ok(key)
    }

    async fn delete_operation(&self, key: &str) -> DataResult<()> {
        self.cache.del(key).await
    }

    async fn check_nickname(&self, nickname: &str) -> DataResult<bool> {
        Ok(!self.email_by_nickname(nickname).await?.is_empty())
    }

    async fn email_by_nickname(&self, nickname: &str) -> DataResult<String> {
        if let Some(cached) = self.cache.get(nickname).await? {
            return Ok(cached);
        }

        // Cache the outcome either way: an empty value is a negative entry
        // and spares the store repeated misses for unknown nicknames.
        let email = self.store.email_of(nickname).await?.unwrap_or_default();
        if let Err(e) = self.cache.set(nickname, &email, CACHE_EXPIRATION).await {
            warn!(error = %e, "Failed to cache nickname lookup");
        }
        Ok(email)
    }

    async fn add_user(&self, user: &User) -> DataResult<()> {
        self.store.insert(user).await?;
        self.evict_users_list().await;
        Ok(())
    }

    async fn delete_user(&self, user: &User) -> DataResult<()> {
        let removed = self.store.delete(user).await?;
        if removed > 0 {
            self.evict_users_list().await;
        }
        Ok(())
    }

    async fn list_users(&self) -> DataResult<Vec<User>> {
        if let Some(json) = self.cache.get(LIST_USERS_KEY).await? {
            return serde_json::from_str(&json).map_err(|e| DataError::Corrupt(e.to_string()));
        }

        let users = self.store.all().await?;
        let json = serde_json::to_string(&users).map_err(|e| DataError::Corrupt(e.to_string()))?;
        self.cache.set(LIST_USERS_KEY, &json, CACHE_EXPIRATION).await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory cache double. TTLs are recorded but never enforced; tests
    /// that care about expiry remove entries by hand.
    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, String>>,
        fail_writes: bool,
    }

    impl MemoryCache {
        fn new() -> Self {
            Self::default()
        }

        fn failing_writes() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                fail_writes: true,
            }
        }

        fn insert(&self, key: &str, value: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }

        fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl Cache for MemoryCache {
        async fn get(&self, key: &str) -> DataResult<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> DataResult<()> {
            if self.fail_writes {
                return Err(DataError::CacheUnavailable("write refused".into()));
            }
            self.insert(key, value);
            Ok(())
        }

        async fn del(&self, key: &str) -> DataResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    /// In-memory store double enforcing the nickname unique constraint.
    #[derive(Default)]
    struct MemoryStore {
        users: Mutex<Vec<User>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self::default()
        }

        fn with_users(users: Vec<User>) -> Self {
            Self {
                users: Mutex::new(users),
            }
        }
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn insert(&self, user: &User) -> DataResult<()> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.nickname == user.nickname) {
                return Err(DataError::Storage(
                    "duplicate key value violates unique constraint".into(),
                ));
            }
            users.push(user.clone());
            Ok(())
        }

        async fn delete(&self, user: &User) -> DataResult<u64> {
            let mut users = self.users.lock().unwrap();
            let before = users.len();
            users.retain(|u| !(u.nickname == user.nickname && u.email == user.email));
            Ok((before - users.len()) as u64)
        }

        async fn email_of(&self, nickname: &str) -> DataResult<Option<String>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.nickname == nickname)
                .map(|u| u.email.clone()))
        }

        async fn all(&self) -> DataResult<Vec<User>> {
            Ok(self.users.lock().unwrap().clone())
        }
    }

    fn repo() -> PostgresRedisData<MemoryCache, MemoryStore> {
        PostgresRedisData::new(MemoryCache::new(), MemoryStore::new())
    }

    #[tokio::test]
    async fn test_set_operation_returns_distinct_keys() {
        let repo = repo();
        let user = User::new("arbuz", "arbuz@gmail.com");

        let first = repo.set_operation(&user, Method::Add).await.unwrap();
        let second = repo.set_operation(&user, Method::Add).await.unwrap();

        assert_ne!(first, second);
        // 128 raw bytes encode to 172 base64 characters.
        assert_eq!(first.len(), 172);
    }

    #[tokio::test]
    async fn test_operation_round_trip_through_cache() {
        let repo = repo();
        let user = User::new("arbuz", "arbuz@gmail.com");

        let key = repo.set_operation(&user, Method::Delete).await.unwrap();
        let operation = repo.get_operation(&key).await.unwrap().unwrap();

        assert_eq!(operation.user, user);
        assert_eq!(operation.method, Method::Delete);
    }

    #[tokio::test]
    async fn test_get_operation_missing_key_is_none() {
        let repo = repo();
        assert!(repo.get_operation("Idonotexist").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_operation_corrupt_entry() {
        let cache = MemoryCache::new();
        cache.insert("badkey", "{not json");
        let repo = PostgresRedisData::new(cache, MemoryStore::new());

        assert!(matches!(
            repo.get_operation("badkey").await,
            Err(DataError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_set_operation_cache_failure_propagates() {
        let repo = PostgresRedisData::new(MemoryCache::failing_writes(), MemoryStore::new());
        let user = User::new("arbuz", "arbuz@gmail.com");

        assert!(matches!(
            repo.set_operation(&user, Method::Add).await,
            Err(DataError::CacheUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_operation_consumes_key() {
        let repo = repo();
        let user = User::new("arbuz", "arbuz@gmail.com");

        let key = repo.set_operation(&user, Method::Add).await.unwrap();
        repo.delete_operation(&key).await.unwrap();

        assert!(repo.get_operation(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_by_nickname_reads_through_and_caches() {
        let store = MemoryStore::with_users(vec![User::new("arbuz", "arbuz@gmail.com")]);
        let repo = PostgresRedisData::new(MemoryCache::new(), store);

        assert_eq!(repo.email_by_nickname("arbuz").await.unwrap(), "arbuz@gmail.com");
        assert!(repo.cache.contains("arbuz"));

        // Unknown nicknames get a cached negative entry.
        assert_eq!(repo.email_by_nickname("ghost").await.unwrap(), "");
        assert!(repo.cache.contains("ghost"));
    }

    #[tokio::test]
    async fn test_check_nickname() {
        let store = MemoryStore::with_users(vec![User::new("arbuz", "arbuz@gmail.com")]);
        let repo = PostgresRedisData::new(MemoryCache::new(), store);

        assert!(repo.check_nickname("arbuz").await.unwrap());
        assert!(!repo.check_nickname("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_user_rejects_duplicate_nickname() {
        let repo = repo();
        let user = User::new("arbuz", "arbuz@gmail.com");

        repo.add_user(&user).await.unwrap();
        let duplicate = User::new("arbuz", "x@y.com");

        assert!(matches!(
            repo.add_user(&duplicate).await,
            Err(DataError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_membership_change_evicts_listing_cache() {
        let repo = repo();

        // Warm the listing cache.
        assert!(repo.list_users().await.unwrap().is_empty());
        assert!(repo.cache.contains(LIST_USERS_KEY));

        let user = User::new("arbuz", "arbuz@gmail.com");
        repo.add_user(&user).await.unwrap();
        assert!(!repo.cache.contains(LIST_USERS_KEY));

        // The next listing reflects the change and re-warms the cache.
        assert_eq!(repo.list_users().await.unwrap(), vec![user.clone()]);
        assert!(repo.cache.contains(LIST_USERS_KEY));

        repo.delete_user(&user).await.unwrap();
        assert!(!repo.cache.contains(LIST_USERS_KEY));
        assert!(repo.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_absent_user_keeps_listing_cache() {
        let repo = repo();
        assert!(repo.list_users().await.unwrap().is_empty());
        assert!(repo.cache.contains(LIST_USERS_KEY));

        repo.delete_user(&User::new("ghost", "ghost@example.com"))
            .await
            .unwrap();
        assert!(repo.cache.contains(LIST_USERS_KEY));
    }

    #[tokio::test]
    async fn test_list_users_served_from_cache() {
        let cache = MemoryCache::new();
        cache.insert(
            LIST_USERS_KEY,
            r#"[{"nickname":"pupa","email":"buhga@example.com"}]"#,
        );
        // The store is empty; a cache hit must short-circuit it.
        let repo = PostgresRedisData::new(cache, MemoryStore::new());

        let users = repo.list_users().await.unwrap();
        assert_eq!(users, vec![User::new("pupa", "buhga@example.com")]);
    }
}
