// src/pipeline/cycle.rs

//! One poll cycle: fetch → extract → filter → dedup → notify.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{CycleStats, ReleaseRecord};
use crate::services::{Dispatch, Dispatcher, RecordExtractor, ReleaseFetcher, WatchFilter};
use crate::storage::DedupStore;

/// Wires the cycle components together.
pub struct Pipeline {
    fetcher: Arc<dyn ReleaseFetcher>,
    extractor: RecordExtractor,
    filter: WatchFilter,
    store: Arc<DedupStore>,
    dispatcher: Arc<Dispatcher>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn ReleaseFetcher>,
        filter: WatchFilter,
        store: Arc<DedupStore>,
        dispatcher: Arc<Dispatcher>,
        concurrency: usize,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            extractor: RecordExtractor::new()?,
            filter,
            store,
            dispatcher,
            concurrency: concurrency.max(1),
        })
    }

    pub fn store(&self) -> &Arc<DedupStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run one cycle without touching the error state or flushing the store.
    ///
    /// Per-candidate validation failures are skipped. A fetch failure, a timestamp
    /// format break or a failed notification fails the cycle; releases notified
    /// before a notification failure stay recorded.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let candidates = self.fetcher.fetch().await?;
        let mut stats = CycleStats {
            candidates: candidates.len(),
            ..CycleStats::default()
        };

        let watched = self.select_watched(&candidates, &mut stats)?;
        stats.watched = watched.len();

        let results: Vec<(String, Result<Dispatch>)> = stream::iter(watched)
            .map(|record| async move {
                let key = record.identity_key();
                if self.store.contains(&key) {
                    return (key, Ok(Dispatch::AlreadySeen));
                }
                let result = self.dispatcher.notify_new_release(&record).await;
                (key, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut first_error: Option<AppError> = None;
        for (key, result) in results {
            match result {
                Ok(Dispatch::Sent) => {
                    stats.notified += 1;
                    log::info!("Sent notification for {:?}", key);
                }
                Ok(Dispatch::AlreadySeen) => {
                    stats.already_seen += 1;
                    log::trace!("{:?} was already notified", key);
                }
                Err(e) => {
                    log::error!("Error sending notification for {:?}: {}", key, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Extract every candidate and keep the watched ones.
    fn select_watched(
        &self,
        candidates: &[crate::models::RawCandidate],
        stats: &mut CycleStats,
    ) -> Result<Vec<ReleaseRecord>> {
        let mut watched = Vec::new();
        for raw in candidates {
            let record = match self.extractor.extract(raw) {
                Ok(record) => record,
                Err(e) if e.is_candidate_rejection() => {
                    stats.rejected += 1;
                    log::warn!("Skipping candidate: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if self.filter.accepts(&record.subject_title) {
                watched.push(record);
            } else {
                log::trace!("{:?} is not on the watch list", record.subject_title);
            }
        }
        Ok(watched)
    }
}
