//! Notification dispatch.
//!
//! Release notifications are sent before the release is recorded in the
//! [`DedupStore`]. A failed send leaves the key unrecorded so the next cycle
//! retries it; a crash between send and flush can cause a duplicate, never a loss.
//!
//! Pipeline failures go through a small state machine so that a sustained outage
//! produces one alert per distinct error message and one resolution message.

use std::sync::{Arc, Mutex};

use crate::error::{AppError, Result};
use crate::models::{Channel, Message, ReleaseRecord, colors};
use crate::services::Notifier;
use crate::storage::DedupStore;
use crate::utils::{resolve, time};

/// Outcome of dispatching one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Notification delivered and key recorded
    Sent,
    /// Key already recorded or being notified concurrently
    AlreadySeen,
}

/// Last reported pipeline failure; empty while healthy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineErrorState {
    pub last_error_message: String,
}

impl PipelineErrorState {
    pub fn is_healthy(&self) -> bool {
        self.last_error_message.is_empty()
    }
}

/// Turns new releases and pipeline failures into outbound messages.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    store: Arc<DedupStore>,
    base_url: String,
    error_state: Mutex<PipelineErrorState>,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        store: Arc<DedupStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            notifier,
            store,
            base_url: base_url.into(),
            error_state: Mutex::new(PipelineErrorState::default()),
        }
    }

    /// Notify a release unless its identity key is already recorded.
    ///
    /// The key is reserved for the duration of the send and recorded only after
    /// the notifier reports success.
    pub async fn notify_new_release(&self, record: &ReleaseRecord) -> Result<Dispatch> {
        let key = record.identity_key();
        let Some(claim) = self.store.claim(&key) else {
            return Ok(Dispatch::AlreadySeen);
        };

        let message = self.release_message(record)?;
        self.notifier.send(&message).await?;

        claim.commit(record.clone());
        Ok(Dispatch::Sent)
    }

    /// Build the release notification for a record.
    pub fn release_message(&self, record: &ReleaseRecord) -> Result<Message> {
        let description = if record.detail_title.is_empty() {
            format!("Chapter {}", record.sequence_label)
        } else {
            format!("Chapter {}: {}", record.sequence_label, record.detail_title)
        };

        Ok(Message {
            channel: Channel::Release,
            title: record.subject_title.clone(),
            description,
            url: resolve(&self.base_url, &record.link),
            footer: format!("Released at {}", time::display(&record.published_at)?),
            color: colors::RELEASE,
        })
    }

    /// Report a failed cycle.
    ///
    /// Returns `true` if an alert was delivered, `false` if the message repeats the
    /// last reported one. The state only changes once delivery succeeds.
    pub async fn notify_pipeline_error(&self, error_message: &str) -> Result<bool> {
        if self.error_state()?.last_error_message == error_message {
            log::debug!("Error already reported, not notifying again");
            return Ok(false);
        }

        let message = Message::alert(
            "Error checking for new releases",
            error_message,
            colors::ERROR,
        );
        self.notifier.send(&message).await?;

        self.lock_state()?.last_error_message = error_message.to_string();
        Ok(true)
    }

    /// Report a successful cycle.
    ///
    /// Returns `true` if a resolution message was delivered, which only happens
    /// when a failure had been reported before.
    pub async fn notify_pipeline_resolved(&self) -> Result<bool> {
        let previous = self.error_state()?;
        if previous.is_healthy() {
            return Ok(false);
        }

        let message = Message::alert(
            "Resolved",
            format!(
                "Checking for new releases works again. Last error: {}",
                previous.last_error_message
            ),
            colors::RESOLVED,
        );
        self.notifier.send(&message).await?;

        self.lock_state()?.last_error_message.clear();
        Ok(true)
    }

    /// Snapshot of the pipeline error state.
    pub fn error_state(&self) -> Result<PipelineErrorState> {
        Ok(self.lock_state()?.clone())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, PipelineErrorState>> {
        self.error_state
            .lock()
            .map_err(|_| AppError::storage("error state lock poisoned"))
    }
}
