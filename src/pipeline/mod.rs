//! Pipeline entry points for release watching.
//!
//! - `Pipeline`: one fetch → extract → filter → notify cycle
//! - `Scheduler`: periodic driver with error reporting and flushing
//! - `build_scheduler` / `start`: wire the components from configuration

pub mod cycle;
pub mod scheduler;

use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::services::{
    DiscordNotifier, Dispatcher, HttpFetcher, LogNotifier, Notifier, ReleaseFetcher,
    WatchFilter,
};
use crate::storage::{DedupStore, MemoryRepository, ReleaseRepository, SqliteRepository};

pub use cycle::Pipeline;
pub use scheduler::{Scheduler, SchedulerState};

/// Wire a scheduler with the given notifier and repository.
///
/// The store is hydrated before returning. A load failure is returned as is:
/// starting with an unknown store would notify every listed release again.
pub async fn build_scheduler(
    config: &Config,
    notifier: Arc<dyn Notifier>,
    repository: Arc<dyn ReleaseRepository>,
) -> Result<Scheduler> {
    let store = Arc::new(DedupStore::new(repository));
    let loaded = store.load_all().await?;
    log::info!("Loaded {} collected chapters", loaded);

    let fetcher = HttpFetcher::new(&config.source)?;
    let dispatcher = Arc::new(Dispatcher::new(
        notifier,
        store.clone(),
        fetcher.source_url(),
    ));

    let filter = WatchFilter::new(
        config
            .watch
            .subjects
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty()),
    );
    log::info!("Watching {}", filter.subjects().join(", "));

    let pipeline = Pipeline::new(
        Arc::new(fetcher),
        filter,
        store,
        dispatcher,
        config.source.max_concurrent_notifications,
    )?;

    Ok(Scheduler::new(pipeline, config.schedule.interval()?))
}

/// Wire the production scheduler: SQLite persistence and Discord delivery.
pub async fn start(config: &Config) -> Result<Scheduler> {
    let repository = Arc::new(SqliteRepository::open(&config.storage.database)?);
    let notifier = Arc::new(DiscordNotifier::new(config)?);
    build_scheduler(config, notifier, repository).await
}

/// Wire a scheduler that logs messages and never writes the database.
///
/// Stored releases are copied into memory from a read-only connection; a
/// missing database starts empty and is not created.
pub async fn dry_run(config: &Config) -> Result<Scheduler> {
    let path = std::path::Path::new(&config.storage.database);
    let rows = if path.exists() {
        SqliteRepository::open_read_only(path)?.load_all().await?
    } else {
        log::info!("{} does not exist yet, starting empty", path.display());
        Vec::new()
    };

    let scratch = MemoryRepository::new();
    scratch.upsert_all(&rows).await?;
    build_scheduler(config, Arc::new(LogNotifier), Arc::new(scratch)).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::error::AppError;
    use crate::models::ReleaseRecord;
    use crate::services::testing::RecordingNotifier;

    fn config(database: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.discord.token = "token".to_string();
        config.discord.channel_id = "1".to_string();
        config.storage.database = database.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_build_scheduler_hydrates_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collected_chapters.db");
        let repository = Arc::new(SqliteRepository::open(&path).unwrap());
        let record = ReleaseRecord {
            subject_title: "One Piece".to_string(),
            sequence_label: "1100".to_string(),
            detail_title: "Final Arc".to_string(),
            link: "/chapters/123/one-piece-chapter-1100".to_string(),
            published_at: "2024-05-01T12:00:00Z".to_string(),
        };
        repository.upsert(&record.identity_key(), &record).await.unwrap();

        let scheduler = build_scheduler(
            &config(&path),
            Arc::new(RecordingNotifier::default()),
            repository,
        )
        .await
        .unwrap();

        assert!(scheduler.pipeline().store().contains("One Piece 1100"));
        assert_eq!(scheduler.interval(), Duration::from_secs(15 * 60));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_missing_database_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/collected_chapters.db");

        let scheduler = dry_run(&config(&path)).await.unwrap();
        assert!(scheduler.pipeline().store().is_empty());
        assert!(!path.exists());
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn test_dry_run_copies_stored_releases() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collected_chapters.db");
        let record = ReleaseRecord {
            subject_title: "Jujutsu Kaisen".to_string(),
            sequence_label: "260".to_string(),
            detail_title: String::new(),
            link: "/chapters/9/jujutsu-kaisen-chapter-260".to_string(),
            published_at: "2024-05-01T12:00:00Z".to_string(),
        };
        SqliteRepository::open(&path)
            .unwrap()
            .upsert(&record.identity_key(), &record)
            .await
            .unwrap();

        let scheduler = dry_run(&config(&path)).await.unwrap();
        assert!(scheduler.pipeline().store().contains("Jujutsu Kaisen 260"));
    }

    #[tokio::test]
    async fn test_build_scheduler_rejects_oversized_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collected_chapters.db");
        let mut config = config(&path);
        config.schedule.interval_minutes = u64::MAX / 10;

        let result = build_scheduler(
            &config,
            Arc::new(RecordingNotifier::default()),
            Arc::new(MemoryRepository::new()),
        )
        .await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_start_fails_on_unreadable_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collected_chapters.db");
        std::fs::write(&path, "not a database ".repeat(16)).unwrap();

        assert!(start(&config(&path)).await.is_err());
    }
}
