//! Outbound notification transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Channel, Config, Message};
use crate::utils::http::with_deadline;

/// Delivers a structured message to a channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> Result<()>;
}

/// Discord REST embed payload.
#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<Footer<'a>>,
    color: u32,
}

#[derive(Debug, Serialize)]
struct Footer<'a> {
    text: &'a str,
}

/// Error body returned by the Discord API.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: u64,
}

/// Describe a failed response, preferring Discord's own error message.
fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(api) => format!("Discord returned {status}: {} (code {})", api.message, api.code),
        Err(_) => format!("Discord returned {status}: {}", body.trim()),
    }
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

impl<'a> From<&'a Message> for CreateMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            embeds: [Embed {
                title: &message.title,
                description: &message.description,
                url: &message.url,
                footer: (!message.footer.is_empty()).then_some(Footer {
                    text: &message.footer,
                }),
                color: message.color,
            }],
        }
    }
}

/// Posts embeds through the Discord bot API.
pub struct DiscordNotifier {
    client: Client,
    api_base: String,
    token: String,
    release_channel: String,
    alert_channel: String,
    timeout: Duration,
}

impl DiscordNotifier {
    /// Create a notifier with the given configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.discord.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: config.discord.api_base.trim_end_matches('/').to_string(),
            token: config.discord.token.clone(),
            release_channel: config.discord.channel_id.clone(),
            alert_channel: config.alert_channel_id().to_string(),
            timeout,
        })
    }

    fn channel_id(&self, channel: Channel) -> &str {
        match channel {
            Channel::Release => &self.release_channel,
            Channel::Alert => &self.alert_channel,
        }
    }

    async fn post(&self, message: &Message) -> Result<()> {
        let url = format!(
            "{}/channels/{}/messages",
            self.api_base,
            self.channel_id(message.channel)
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&CreateMessage::from(message))
            .send()
            .await
            .map_err(AppError::notify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notify(describe_failure(status, &body)));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        with_deadline("notify", self.timeout, self.post(message)).await
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        log::info!(
            "[dry-run] {:?} | {} | {} | {} | {}",
            message.channel,
            message.title,
            message.description,
            message.url,
            message.footer
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::colors;

    #[test]
    fn test_embed_payload() {
        let message = Message {
            channel: Channel::Release,
            title: "One Piece".to_string(),
            description: "Chapter 1100: Final Arc".to_string(),
            url: "https://tcbscans.me/chapters/123/one-piece-chapter-1100".to_string(),
            footer: "Released at Wed, 01 May 2024 14:00:00 CEST".to_string(),
            color: colors::RELEASE,
        };

        let json = serde_json::to_value(CreateMessage::from(&message)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "embeds": [{
                    "title": "One Piece",
                    "description": "Chapter 1100: Final Arc",
                    "url": "https://tcbscans.me/chapters/123/one-piece-chapter-1100",
                    "footer": { "text": "Released at Wed, 01 May 2024 14:00:00 CEST" },
                    "color": 3447003
                }]
            })
        );
    }

    #[test]
    fn test_alert_payload_omits_url_and_footer() {
        let message = Message::alert("Error checking releases", "boom", colors::ERROR);
        let json = serde_json::to_value(CreateMessage::from(&message)).unwrap();
        let embed = &json["embeds"][0];
        assert!(embed.get("url").is_none());
        assert!(embed.get("footer").is_none());
        assert_eq!(embed["color"], 10038562);
    }

    #[test]
    fn test_describe_failure() {
        let status = reqwest::StatusCode::FORBIDDEN;
        assert_eq!(
            describe_failure(status, r#"{"message": "Missing Access", "code": 50001}"#),
            "Discord returned 403 Forbidden: Missing Access (code 50001)"
        );
        assert_eq!(
            describe_failure(status, "  upstream error \n"),
            "Discord returned 403 Forbidden: upstream error"
        );
    }

    #[test]
    fn test_channel_routing() {
        let mut config = Config::default();
        config.discord.token = "t".to_string();
        config.discord.channel_id = "release".to_string();
        config.discord.error_channel_id = Some("alerts".to_string());

        let notifier = DiscordNotifier::new(&config).unwrap();
        assert_eq!(notifier.channel_id(Channel::Release), "release");
        assert_eq!(notifier.channel_id(Channel::Alert), "alerts");
    }
}
