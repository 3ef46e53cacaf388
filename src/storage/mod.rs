//! Storage for already notified releases.
//!
//! The [`DedupStore`] is the in-memory authority on which identity keys have
//! been notified. A [`ReleaseRepository`] gives it durability across restarts:
//!
//! ```text
//! startup:    repository.load_all() ──► DedupStore
//! each cycle: DedupStore.save_all() ──► repository.upsert(..) per record
//! shutdown:   DedupStore.save_all() ──► repository
//! ```

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::Result;
use crate::models::ReleaseRecord;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Durable key-value table of notified releases.
#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Load every stored `(identity_key, record)` row.
    async fn load_all(&self) -> Result<Vec<(String, ReleaseRecord)>>;

    /// Insert or update one row keyed by `identity_key`.
    async fn upsert(&self, identity_key: &str, record: &ReleaseRecord) -> Result<()>;

    /// Upsert every row, stopping at the first failure.
    async fn upsert_all(&self, rows: &[(String, ReleaseRecord)]) -> Result<usize> {
        for (key, record) in rows {
            self.upsert(key, record).await?;
        }
        Ok(rows.len())
    }
}

/// Concurrent registry of notified identity keys.
///
/// Keys are only ever added. Dispatchers reserve a key with [`claim`](Self::claim)
/// before notifying so that one key cannot be notified twice concurrently.
pub struct DedupStore {
    entries: DashMap<String, ReleaseRecord>,
    claims: DashMap<String, ()>,
    repository: Arc<dyn ReleaseRepository>,
}

impl DedupStore {
    /// Create an empty store backed by the given repository.
    pub fn new(repository: Arc<dyn ReleaseRepository>) -> Self {
        Self {
            entries: DashMap::new(),
            claims: DashMap::new(),
            repository,
        }
    }

    /// Whether the key has already been notified.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record a key as notified.
    ///
    /// Returns `false` if the key was already present; the stored record is kept.
    pub fn insert(&self, key: impl Into<String>, record: ReleaseRecord) -> bool {
        match self.entries.entry(key.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Reserve a key that is neither stored nor claimed by someone else.
    ///
    /// The claim is released when the guard drops; [`Claim::commit`] stores the
    /// record before releasing it.
    pub fn claim(&self, key: &str) -> Option<Claim<'_>> {
        match self.claims.entry(key.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                if self.entries.contains_key(key) {
                    return None;
                }
                slot.insert(());
                Some(Claim {
                    store: self,
                    key: key.to_string(),
                })
            }
        }
    }

    /// Get a copy of the stored record for a key.
    pub fn get(&self, key: &str) -> Option<ReleaseRecord> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Hydrate the store from the repository.
    ///
    /// Errors must abort startup: an unknown store state would re-notify everything.
    pub async fn load_all(&self) -> Result<usize> {
        let rows = self.repository.load_all().await?;
        let count = rows.len();
        for (key, record) in rows {
            self.entries.insert(key, record);
        }
        log::debug!("Loaded {} collected chapters", count);
        Ok(count)
    }

    /// Flush every entry to the repository.
    ///
    /// Upserts are idempotent, so unchanged entries are safe to write again.
    pub async fn save_all(&self) -> Result<usize> {
        let rows: Vec<(String, ReleaseRecord)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let saved = self.repository.upsert_all(&rows).await?;
        log::debug!("Saved {} collected chapters", saved);
        Ok(saved)
    }
}

/// Exclusive reservation of one identity key.
pub struct Claim<'a> {
    store: &'a DedupStore,
    key: String,
}

impl Claim<'_> {
    /// Store the record, then release the reservation.
    pub fn commit(self, record: ReleaseRecord) -> bool {
        self.store.insert(self.key.clone(), record)
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.store.claims.remove(&self.key);
    }
}
