//! In-memory repository.
//!
//! Keeps rows for the lifetime of the value. Used by `check --dry-run` and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::ReleaseRecord;
use crate::storage::ReleaseRepository;

/// Repository backed by a shared map.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    rows: Arc<Mutex<BTreeMap<String, ReleaseRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent upserts fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, ReleaseRecord>>> {
        self.rows
            .lock()
            .map_err(|_| AppError::storage("memory repository lock poisoned"))
    }
}

#[async_trait]
impl ReleaseRepository for MemoryRepository {
    async fn load_all(&self) -> Result<Vec<(String, ReleaseRecord)>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn upsert(&self, identity_key: &str, record: &ReleaseRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::storage("writes disabled"));
        }
        self.lock()?
            .insert(identity_key.to_string(), record.clone());
        Ok(())
    }
}
