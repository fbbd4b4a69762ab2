//! Shared database handle with hot reload support.
//!
//! This module provides a database handle for long-running services with:
//! - LRU cache for lookup results
//! - Atomic hot reload for replacing the database without downtime
//! - Thread-safe concurrent access

use arc_swap::ArcSwap;
use quick_cache::sync::Cache;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::reader::Database;
use crate::address::Address;
use crate::network::Network;
use crate::Result;

/// Default cache capacity (number of entries).
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Configuration for the shared database.
#[derive(Debug, Clone)]
pub struct SharedDatabaseConfig {
    /// Maximum number of entries in the cache.
    pub cache_capacity: usize,
    /// Whether to enable caching.
    pub cache_enabled: bool,
}

impl Default for SharedDatabaseConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
        }
    }
}

impl SharedDatabaseConfig {
    /// Create a new configuration with the specified cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache_capacity: capacity,
            cache_enabled: true,
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            cache_capacity: 0,
            cache_enabled: false,
        }
    }
}

/// A database that can be swapped out while readers keep using it.
///
/// Lookups go through an optional cache keyed by reload generation and
/// address. Every reload replaces the database atomically and clears the
/// cache; lookups already in flight finish against the database they
/// started with, which stays mapped until its last [`Arc`] is dropped.
///
/// # Example
///
/// ```ignore
/// use locdb::SharedDatabase;
/// use std::path::Path;
///
/// let db = SharedDatabase::open(Path::new("location.db"))?;
/// let network = db.lookup("2001:db8::1".parse()?)?;
///
/// // Pick up a freshly written database
/// db.reload(Path::new("location.db"))?;
/// ```
pub struct SharedDatabase {
    inner: ArcSwap<Database>,
    cache: Option<Cache<(u64, Address), Option<Network>>>,
    config: SharedDatabaseConfig,
    generation: AtomicU64,
}

impl SharedDatabase {
    /// Open a database file with default configuration.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, SharedDatabaseConfig::default())
    }

    /// Open a database file with custom configuration.
    pub fn open_with_config(path: &Path, config: SharedDatabaseConfig) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, config))
    }

    /// Create from bytes with default configuration.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_config(data, SharedDatabaseConfig::default())
    }

    /// Create from bytes with custom configuration.
    pub fn from_bytes_with_config(data: Vec<u8>, config: SharedDatabaseConfig) -> Result<Self> {
        Ok(Self::new(Database::from_bytes(data)?, config))
    }

    /// Wrap an already opened database.
    pub fn new(database: Database, config: SharedDatabaseConfig) -> Self {
        let cache = if config.cache_enabled && config.cache_capacity > 0 {
            Some(Cache::new(config.cache_capacity))
        } else {
            None
        };

        Self {
            inner: ArcSwap::from_pointee(database),
            cache,
            config,
            generation: AtomicU64::new(0),
        }
    }

    /// Hot reload the database from a file.
    pub fn reload(&self, path: &Path) -> Result<()> {
        let database = Database::open(path)?;
        self.replace(database);
        log::info!("Hot reloaded database from {:?}", path);
        Ok(())
    }

    /// Hot reload the database from bytes.
    pub fn reload_from_bytes(&self, data: Vec<u8>) -> Result<()> {
        let database = Database::from_bytes(data)?;
        self.replace(database);
        log::info!("Hot reloaded database from bytes");
        Ok(())
    }

    fn replace(&self, database: Database) {
        self.inner.store(Arc::new(database));

        // Entries are keyed by generation, so results computed against the
        // old database can no longer be hit once this is bumped.
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Longest-prefix match with caching.
    pub fn lookup(&self, address: Address) -> Result<Option<Network>> {
        // Read the generation before the database: a reload stores the new
        // database first and bumps the generation second.
        let key = (self.generation(), address);
        if let Some(ref cache) = self.cache {
            if let Some(result) = cache.get(&key) {
                return Ok(result);
            }
        }

        // Cache miss - perform lookup
        let database = self.inner.load();
        let result = database.lookup(address)?;

        self.remember(key, result);
        Ok(result)
    }

    fn remember(&self, key: (u64, Address), result: Option<Network>) {
        if let Some(ref cache) = self.cache {
            cache.insert(key, result);
        }
    }

    /// Parse `address` and look it up with caching.
    pub fn lookup_str(&self, address: &str) -> Result<Option<Network>> {
        self.lookup(address.parse()?)
    }

    /// The current database. It stays valid after a reload.
    pub fn snapshot(&self) -> Arc<Database> {
        self.inner.load_full()
    }

    /// Clear the cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        match self.cache {
            Some(ref cache) => CacheStats {
                capacity: self.config.cache_capacity,
                len: cache.len(),
                enabled: true,
            },
            None => CacheStats {
                capacity: 0,
                len: 0,
                enabled: false,
            },
        }
    }

    /// Get the current generation (incremented on each reload).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseWriter;

    fn database_bytes(country: &str) -> Vec<u8> {
        let mut writer = DatabaseWriter::new();
        let network: Network = "10.0.0.0/8".parse().unwrap();
        writer
            .add_network(network.with_country_code(country).unwrap())
            .unwrap();
        writer.write().unwrap()
    }

    fn country(db: &SharedDatabase, address: &str) -> Option<String> {
        db.lookup_str(address)
            .unwrap()
            .and_then(|n| n.country_code())
            .map(|c| c.to_string())
    }

    #[test]
    fn test_shared_lookup() {
        let db = SharedDatabase::from_bytes(database_bytes("DE")).unwrap();
        assert_eq!(country(&db, "10.1.2.3").as_deref(), Some("DE"));
        assert_eq!(country(&db, "11.0.0.1"), None);
    }

    #[test]
    fn test_cache_hit() {
        let db = SharedDatabase::from_bytes(database_bytes("DE")).unwrap();

        // First call - cache miss
        let _ = db.lookup_str("10.0.0.1");
        assert_eq!(db.cache_stats().len, 1);

        // Second call - cache hit
        let _ = db.lookup_str("10.0.0.1");
        assert_eq!(db.cache_stats().len, 1);
    }

    #[test]
    fn test_hot_reload() {
        let db = SharedDatabase::from_bytes(database_bytes("DE")).unwrap();
        assert_eq!(country(&db, "10.0.0.1").as_deref(), Some("DE"));
        assert_eq!(db.generation(), 0);

        let old = db.snapshot();
        db.reload_from_bytes(database_bytes("FR")).unwrap();

        assert_eq!(db.generation(), 1);
        assert_eq!(db.cache_stats().len, 0);
        assert_eq!(country(&db, "10.0.0.1").as_deref(), Some("FR"));

        // The old snapshot is still mapped and readable.
        let network = old.lookup_str("10.0.0.1").unwrap().unwrap();
        assert_eq!(network.country_code().unwrap().as_str(), "DE");
    }

    #[test]
    fn test_result_from_before_reload_is_not_served() {
        let db = SharedDatabase::from_bytes(database_bytes("DE")).unwrap();
        let address: Address = "10.0.0.1".parse().unwrap();

        // A lookup that read the old database and finishes after a reload.
        let generation = db.generation();
        let stale = db.snapshot().lookup(address).unwrap();
        db.reload_from_bytes(database_bytes("FR")).unwrap();
        db.remember((generation, address), stale);

        assert_eq!(country(&db, "10.0.0.1").as_deref(), Some("FR"));
        assert_eq!(country(&db, "10.0.0.1").as_deref(), Some("FR"));
    }

    #[test]
    fn test_reload_failure_keeps_database() {
        let db = SharedDatabase::from_bytes(database_bytes("DE")).unwrap();
        assert!(db.reload_from_bytes(b"not a database".to_vec()).is_err());
        assert_eq!(db.generation(), 0);
        assert_eq!(country(&db, "10.0.0.1").as_deref(), Some("DE"));
    }

    #[test]
    fn test_no_cache_config() {
        let db = SharedDatabase::from_bytes_with_config(
            database_bytes("DE"),
            SharedDatabaseConfig::no_cache(),
        )
        .unwrap();

        let _ = db.lookup_str("10.0.0.1");
        let stats = db.cache_stats();
        assert!(!stats.enabled);
        assert_eq!(stats.len, 0);
    }

    #[test]
    fn test_custom_capacity() {
        let db = SharedDatabase::from_bytes_with_config(
            database_bytes("DE"),
            SharedDatabaseConfig::with_capacity(100),
        )
        .unwrap();

        let stats = db.cache_stats();
        assert!(stats.enabled);
        assert_eq!(stats.capacity, 100);
    }
}
