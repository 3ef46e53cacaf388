//! Outbound notification message.

/// Which channel a message is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// New chapter announcements
    Release,
    /// Pipeline failure and recovery reports
    Alert,
}

/// Embed colours used by the notifier.
pub mod colors {
    pub const RELEASE: u32 = 3_447_003;
    pub const ERROR: u32 = 10_038_562;
    pub const RESOLVED: u32 = 3_066_993;
}

/// A structured message handed to a [`Notifier`](crate::services::Notifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: Channel,
    pub title: String,
    pub description: String,
    /// Link target, empty for alerts
    pub url: String,
    /// Footer text, empty for alerts
    pub footer: String,
    pub color: u32,
}

impl Message {
    /// Create an alert-channel message without link or footer.
    pub fn alert(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            channel: Channel::Alert,
            title: title.into(),
            description: description.into(),
            url: String::new(),
            footer: String::new(),
            color,
        }
    }
}
