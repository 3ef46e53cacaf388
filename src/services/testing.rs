//! Test doubles for the external collaborators.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Message, RawCandidate};
use crate::services::{Notifier, ReleaseFetcher};

/// Notifier that records every delivered message.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Message>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    /// Make every following send fail with `message`, or succeed again with `None`.
    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(String::from);
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(AppError::notify(reason));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Fetcher returning a scripted sequence of responses, one per call.
///
/// The last response repeats once the script runs out.
pub struct ScriptedFetcher {
    responses: Mutex<Vec<std::result::Result<Vec<RawCandidate>, String>>>,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new(responses: Vec<std::result::Result<Vec<RawCandidate>, String>>) -> Self {
        assert!(!responses.is_empty());
        Self {
            responses: Mutex::new(responses),
            delay: Duration::ZERO,
        }
    }

    /// Sleep for `delay` before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetcher that always returns the same blocks.
    pub fn always(candidates: Vec<RawCandidate>) -> Self {
        Self::new(vec![Ok(candidates)])
    }
}

#[async_trait]
impl ReleaseFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses[0].clone()
        };
        next.map_err(|message| AppError::fetch(self.source_url(), message))
    }

    fn source_url(&self) -> &str {
        "https://tcbscans.me"
    }
}

/// Candidate block with the given title and chapter.
pub fn candidate(subject: &str, chapter: &str, detail: &str) -> RawCandidate {
    let slug = subject.to_lowercase().replace(' ', "-");
    RawCandidate {
        title: format!("{subject} Chapter {chapter}"),
        link: format!("/chapters/100/{slug}-chapter-{}", chapter.replace('.', "-")),
        detail_title: detail.to_string(),
        timestamp: "2024-05-01T12:00:00Z".to_string(),
    }
}
