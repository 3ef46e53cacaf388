//! Release record extraction.
//!
//! Turns the raw fields of one candidate block into a [`ReleaseRecord`].
//! Malformed blocks are rejected with [`AppError::Validation`] and only cost that
//! block; an unparseable release time is a format break and fails the cycle.

use chrono::DateTime;
use html_escape::decode_html_entities;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{RawCandidate, ReleaseRecord};

/// `<subject> Chapter <number>`, number integer or decimal.
const TITLE_PATTERN: &str = r"^(.+?) Chapter (\d+(?:\.\d+)?)$";

/// `/chapters/<id>/<slug>-chapter-<n>...`
const LINK_PATTERN: &str = r"^/chapters/\d+/[a-z0-9-]+-chapter-\d+.*$";

/// Validates and normalizes candidate blocks.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    title_re: Regex,
    link_re: Regex,
}

impl RecordExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title_re: Regex::new(TITLE_PATTERN)?,
            link_re: Regex::new(LINK_PATTERN)?,
        })
    }

    /// Extract a record from one candidate block.
    pub fn extract(&self, raw: &RawCandidate) -> Result<ReleaseRecord> {
        let raw_title = raw.title.trim();
        if raw_title.is_empty() {
            return Err(AppError::validation("missing release title"));
        }

        let link = raw.link.trim();
        if link.is_empty() {
            return Err(AppError::validation(format!(
                "missing link for '{raw_title}'"
            )));
        }

        let timestamp = raw.timestamp.trim();
        if timestamp.is_empty() {
            return Err(AppError::validation(format!(
                "missing release time for '{raw_title}'"
            )));
        }

        let title = decode_html_entities(raw_title);
        let detail_title = decode_html_entities(raw.detail_title.trim()).trim().to_string();
        if detail_title.is_empty() {
            log::debug!("No chapter title for '{}'", title);
        }

        let (subject_title, sequence_label) = self.split_title(&title)?;

        if !self.link_re.is_match(link) {
            return Err(AppError::validation(format!(
                "unexpected link shape '{link}' for '{title}'"
            )));
        }

        DateTime::parse_from_rfc3339(timestamp).map_err(|e| AppError::timestamp(timestamp, e))?;

        Ok(ReleaseRecord {
            subject_title,
            sequence_label,
            detail_title,
            link: link.to_string(),
            published_at: timestamp.to_string(),
        })
    }

    /// Split a composite title into trimmed subject and chapter label.
    fn split_title(&self, title: &str) -> Result<(String, String)> {
        let caps = self
            .title_re
            .captures(title)
            .ok_or_else(|| AppError::validation(format!("unexpected title shape '{title}'")))?;

        let subject = caps.get(1).map_or("", |m| m.as_str()).trim();
        let sequence = caps.get(2).map_or("", |m| m.as_str()).trim();
        if subject.is_empty() {
            return Err(AppError::validation(format!("empty subject in '{title}'")));
        }

        Ok((subject.to_string(), sequence.to_string()))
    }
}
