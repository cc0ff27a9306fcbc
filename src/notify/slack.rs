use crate::feed::ReleaseEntry;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const GITHUB_BASE: &str = "https://github.com/";
const DEFAULT_ICON: &str = ":fried_shrimp:";
const POST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors delivering a notification to the webhook.
///
/// A failed delivery leaves the watermark untouched, so the same release is
/// retried on the next cycle.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Webhook request timed out")]
    Timeout,
    /// Anything other than HTTP 200 counts as a rejection.
    #[error("Webhook rejected notification: status {code} ({reason})")]
    Rejected { code: u16, reason: String },
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The JSON body posted to the incoming webhook.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub text: String,
    pub icon_emoji: String,
}

/// Builds notification payloads and delivers them to the configured webhook.
///
/// Stateless per call; the webhook URL embeds a Slack credential and is held
/// behind [`SecretString`] so it never appears in debug output.
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: SecretString,
    channel: Option<String>,
    username: Option<String>,
    icon: String,
}

impl Notifier {
    pub fn new(
        client: reqwest::Client,
        webhook_url: SecretString,
        channel: Option<String>,
        username: Option<String>,
        icon: Option<&str>,
    ) -> Self {
        Self {
            client,
            webhook_url,
            channel,
            username,
            icon: normalize_icon(icon),
        }
    }

    /// Build the message for a release entry.
    ///
    /// The text template embeds the entry title (the version string) and the
    /// release URL, normalized to an absolute github.com address.
    pub fn message(&self, entry: &ReleaseEntry) -> SlackMessage {
        let text = match entry.link.as_deref() {
            Some(link) => format!(
                "New release published: {}\n{}",
                entry.title,
                absolute_release_url(link)
            ),
            None => format!("New release published: {}", entry.title),
        };
        SlackMessage {
            channel: self.channel.clone(),
            username: self.username.clone(),
            text,
            icon_emoji: self.icon.clone(),
        }
    }

    /// Deliver a notification for `entry` to the webhook.
    ///
    /// Success is exactly HTTP 200; any other status is a rejection carrying
    /// the response reason phrase. The JSON body is sent under a
    /// form-urlencoded content type, which Slack's incoming webhooks accept.
    /// That header is the endpoint's long-observed wire contract; changing it
    /// is a deliberate decision, not a cleanup.
    pub async fn deliver(&self, entry: &ReleaseEntry) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(&self.message(entry))?;

        let response = tokio::time::timeout(
            POST_TIMEOUT,
            self.client
                .post(self.webhook_url.expose_secret())
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body)
                .send(),
        )
        .await
        .map_err(|_| DeliveryError::Timeout)?
        .map_err(DeliveryError::Network)?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(DeliveryError::Rejected {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        Ok(())
    }
}

/// Resolve a feed link to an absolute release URL.
///
/// GitHub release feeds publish relative hrefs; anything not already on
/// github.com is joined against the fixed base. Unresolvable links pass
/// through unchanged rather than failing the notification.
fn absolute_release_url(link: &str) -> String {
    if link.starts_with("https://github.com") {
        return link.to_string();
    }
    match Url::parse(GITHUB_BASE).and_then(|base| base.join(link)) {
        Ok(url) => url.to_string(),
        Err(_) => link.to_string(),
    }
}

/// Wrap an emoji code in colons unless it already is.
fn normalize_icon(icon: Option<&str>) -> String {
    match icon {
        None => DEFAULT_ICON.to_string(),
        Some(s) if s.trim().is_empty() => DEFAULT_ICON.to_string(),
        Some(s) if s.len() > 2 && s.starts_with(':') && s.ends_with(':') => s.to_string(),
        Some(s) => format!(":{}:", s),
    }
}
