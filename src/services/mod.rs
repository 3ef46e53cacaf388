//! Service layer for the notifier.
//!
//! This module contains the business logic for:
//! - Listing fetch (`ReleaseFetcher`, `HttpFetcher`)
//! - Record extraction (`RecordExtractor`)
//! - Watch list filtering (`WatchFilter`)
//! - Notification dispatch (`Dispatcher`, `Notifier`)

mod dispatcher;
mod extractor;
mod fetcher;
mod notifier;
mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{Dispatch, Dispatcher, PipelineErrorState};
pub use extractor::RecordExtractor;
pub use fetcher::{HttpFetcher, ListingParser, ReleaseFetcher};
pub use notifier::{DiscordNotifier, LogNotifier, Notifier};
pub use watch::WatchFilter;
