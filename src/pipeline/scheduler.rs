// src/pipeline/scheduler.rs

//! Periodic driver for the poll cycle.
//!
//! Ticks never overlap: a cycle that outlasts the interval delays the next tick
//! instead of queueing a burst of catch-up cycles.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::error::Result;
use crate::models::CycleStats;
use crate::pipeline::Pipeline;

/// Whether a cycle is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
    state: Mutex<SchedulerState>,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            state: Mutex::new(SchedulerState::Idle),
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SchedulerState::Idle)
    }

    fn set_state(&self, state: SchedulerState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    /// Run one cycle, report its outcome to the alert channel and flush the store.
    ///
    /// Returns the cycle result. Alert delivery and flush failures are logged
    /// only; both are retried on the next cycle.
    pub async fn run_once(&self) -> Result<CycleStats> {
        let _guard = self.cycle_lock.lock().await;
        self.set_state(SchedulerState::Running);
        log::debug!("Checking for new releases");

        let result = self.pipeline.run_cycle().await;
        let failure = match &result {
            Ok(stats) => {
                log::info!(
                    "Cycle done: {} candidates, {} watched, {} new, {} rejected",
                    stats.candidates,
                    stats.watched,
                    stats.notified,
                    stats.rejected
                );
                None
            }
            Err(e) => {
                log::error!("Error checking for new releases: {}", e);
                Some(e.to_string())
            }
        };

        let dispatcher = self.pipeline.dispatcher();
        match failure {
            None => match dispatcher.notify_pipeline_resolved().await {
                Ok(true) => log::info!("Reported recovery"),
                Ok(false) => {}
                Err(e) => log::error!("Failed to report recovery: {}", e),
            },
            Some(message) => {
                if let Err(e) = dispatcher.notify_pipeline_error(&message).await {
                    log::error!("Failed to report error: {}", e);
                }
            }
        }

        if let Err(e) = self.pipeline.store().save_all().await {
            log::error!("Failed to save collected chapters: {}", e);
        }

        self.set_state(SchedulerState::Idle);
        result
    }

    /// Run cycles on the configured interval until `shutdown` turns `true`.
    ///
    /// The first cycle starts immediately. A cycle in progress when shutdown is
    /// signalled runs to completion, then the store is flushed one last time.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("Checking every {} minutes", self.interval.as_secs() / 60);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    // Errors were already reported by run_once.
                    let _ = self.run_once().await;
                }
            }
        }

        log::info!("Shutting down, saving collected chapters");
        let saved = self.pipeline.store().save_all().await?;
        log::info!("Saved {} collected chapters", saved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::colors;
    use crate::services::testing::{RecordingNotifier, ScriptedFetcher, candidate};
    use crate::services::{Dispatcher, WatchFilter};
    use crate::storage::{DedupStore, MemoryRepository, ReleaseRepository};

    struct Harness {
        scheduler: Scheduler,
        notifier: Arc<RecordingNotifier>,
        repository: MemoryRepository,
    }

    fn harness(fetcher: ScriptedFetcher) -> Harness {
        let repository = MemoryRepository::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(DedupStore::new(Arc::new(repository.clone())));
        let dispatcher = Arc::new(Dispatcher::new(
            notifier.clone(),
            store.clone(),
            "https://tcbscans.me",
        ));
        let pipeline = Pipeline::new(
            Arc::new(fetcher),
            WatchFilter::new(["One Piece"]),
            store,
            dispatcher,
            1,
        )
        .unwrap();

        Harness {
            scheduler: Scheduler::new(pipeline, Duration::from_secs(15 * 60)),
            notifier,
            repository,
        }
    }

    fn fail(message: &str) -> std::result::Result<Vec<crate::models::RawCandidate>, String> {
        Err(message.to_string())
    }

    #[tokio::test]
    async fn test_error_and_resolution_single_flight() {
        let h = harness(ScriptedFetcher::new(vec![
            fail("connection refused"),
            fail("connection refused"),
            fail("connection refused"),
            Ok(vec![]),
            fail("connection reset"),
        ]));

        for _ in 0..3 {
            assert!(h.scheduler.run_once().await.is_err());
        }
        assert_eq!(h.notifier.sent().len(), 1);

        h.scheduler.run_once().await.unwrap();
        h.scheduler.run_once().await.unwrap_err();

        let sent = h.notifier.sent();
        let seen: Vec<u32> = sent.iter().map(|m| m.color).collect();
        assert_eq!(seen, vec![colors::ERROR, colors::RESOLVED, colors::ERROR]);
        assert!(sent[0].description.contains("connection refused"));
        assert!(sent[1].description.contains("connection refused"));
        assert!(sent[2].description.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_run_once_saves_and_returns_idle() {
        let h = harness(ScriptedFetcher::always(vec![candidate("One Piece", "1100", "")]));

        let stats = h.scheduler.run_once().await.unwrap();
        assert_eq!(stats.notified, 1);
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);

        let rows = h.repository.load_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "One Piece 1100");
    }

    #[tokio::test]
    async fn test_save_failure_does_not_fail_cycle() {
        let h = harness(ScriptedFetcher::always(vec![candidate("One Piece", "1100", "")]));
        h.repository.set_fail_writes(true);

        let stats = h.scheduler.run_once().await.unwrap();
        assert_eq!(stats.notified, 1);
        assert!(h.scheduler.pipeline().store().contains("One Piece 1100"));
        assert!(h.notifier.sent().iter().all(|m| m.color == colors::RELEASE));
    }

    #[tokio::test]
    async fn test_alert_failure_is_retried_next_cycle() {
        let h = harness(ScriptedFetcher::new(vec![fail("timed out")]));
        h.notifier.fail_with(Some("Discord unavailable"));
        assert!(h.scheduler.run_once().await.is_err());
        assert!(h.notifier.sent().is_empty());

        h.notifier.fail_with(None);
        assert!(h.scheduler.run_once().await.is_err());
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let h = harness(ScriptedFetcher::new(vec![
            fail("connection refused"),
            fail("connection refused"),
            Ok(vec![candidate("One Piece", "1100", "")]),
        ]));
        let scheduler = Arc::new(h.scheduler);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(rx).await }
        });

        // Ticks at 0, 15 and 30 minutes.
        time::sleep(Duration::from_secs(31 * 60)).await;
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        let seen: Vec<u32> = h.notifier.sent().iter().map(|m| m.color).collect();
        assert_eq!(seen, vec![colors::ERROR, colors::RELEASE, colors::RESOLVED]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        assert_eq!(h.repository.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_cycle_finishes_and_saves() {
        let h = harness(
            ScriptedFetcher::always(vec![candidate("One Piece", "1100", "")])
                .with_delay(Duration::from_secs(60)),
        );
        let scheduler = Arc::new(h.scheduler);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(rx).await }
        });

        // The first cycle is still waiting on the fetch.
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state(), SchedulerState::Running);
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "One Piece");
        let rows = h.repository.load_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "One Piece 1100");
    }

    #[tokio::test]
    async fn test_run_exits_when_already_shut_down() {
        let h = harness(ScriptedFetcher::always(vec![candidate("One Piece", "1100", "")]));
        let (_tx, rx) = watch::channel(true);

        h.scheduler.run(rx).await.unwrap();
        assert!(h.notifier.sent().is_empty());
    }
}
