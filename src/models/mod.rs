// src/models/mod.rs

//! Domain models for the notifier.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod message;
mod release;

// Re-export all public types
pub use config::{
    Config, DiscordConfig, ENV_PREFIX, ListingSelectors, LoggingConfig, ScheduleConfig,
    SourceConfig, StorageConfig, WatchConfig,
};
pub use message::{Channel, Message, colors};
pub use release::{RawCandidate, ReleaseRecord};

/// Summary of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Candidate blocks found in the document
    pub candidates: usize,
    /// Candidates rejected by validation
    pub rejected: usize,
    /// Records belonging to a watched series
    pub watched: usize,
    /// Records already notified earlier
    pub already_seen: usize,
    /// Notifications delivered in this cycle
    pub notified: usize,
}
