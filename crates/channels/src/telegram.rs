//! Telegram channel adapter.
//!
//! Long-polls `getUpdates` in a background task and forwards text messages;
//! replies go out through `sendMessage`.

use async_trait::async_trait;
use gradrelay_config::TelegramConfig;
use gradrelay_core::channel::{Channel, ChannelId, ChannelMessage};
use gradrelay_core::error::ChannelError;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Extra time granted to the HTTP client on top of the long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Telegram Bot API channel.
pub struct TelegramChannel {
    channel_id: ChannelId,
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    allowed_users: Vec<String>,
    poll_timeout_secs: u64,
    retry_delay: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("api_url", &self.api_url)
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl TelegramChannel {
    pub fn new(
        bot_token: impl Into<String>,
        allowed_users: Vec<String>,
        poll_timeout_secs: u64,
        api_url: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs) + POLL_GRACE)
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            channel_id: ChannelId("telegram".into()),
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            allowed_users,
            poll_timeout_secs,
            retry_delay: Duration::from_secs(5),
            poller: Mutex::new(None),
        })
    }

    /// Build from config; fails when no bot token is set.
    pub fn from_config(config: &TelegramConfig) -> Result<Self, ChannelError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ChannelError::NotConfigured("telegram bot_token is not set".into()))?;

        Self::new(
            token,
            config.allowed_users.clone(),
            config.poll_timeout_secs,
            &config.api_url,
        )
    }

    /// Wait applied after a failed poll before trying again.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn method_url(&self, method: &str) -> String {
        method_url(&self.api_url, &self.bot_token, method)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: format!("{method}: {}", redact(&e.to_string(), &self.bot_token)),
            })?;

        let status = response.status();
        let reply: ApiResponse<serde_json::Value> = response.json().await.map_err(|e| {
            ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: format!(
                    "{method} returned {status}: {}",
                    redact(&e.to_string(), &self.bot_token)
                ),
            }
        })?;

        if !reply.ok {
            return Err(ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: format!(
                    "{method} returned {status}: {}",
                    reply.description.unwrap_or_default()
                ),
            });
        }
        Ok(())
    }
}

fn method_url(api_url: &str, token: &str, method: &str) -> String {
    format!("{api_url}/bot{token}/{method}")
}

/// reqwest errors embed the request URL, which carries the token.
fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        text.to_string()
    } else {
        text.replace(token, "[REDACTED]")
    }
}

struct Poller {
    client: reqwest::Client,
    url: String,
    token: String,
    poll_timeout_secs: u64,
    retry_delay: Duration,
    channel_id: ChannelId,
    tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
}

impl Poller {
    async fn run(self) {
        let mut offset: i64 = 0;

        while !self.tx.is_closed() {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            });

            let updates = match self.poll(&body).await {
                Ok(updates) => updates,
                Err(reason) => {
                    warn!(error = %reason, "Telegram poll failed");
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let Some(message) = update.message else {
                    continue;
                };
                let Some(text) = message.text else {
                    continue;
                };

                let (sender_id, sender_name) = match &message.from {
                    Some(user) => (
                        user.id.to_string(),
                        user.username.clone().or_else(|| user.first_name.clone()),
                    ),
                    None => (message.chat.id.to_string(), None),
                };

                let inbound = ChannelMessage {
                    channel_id: self.channel_id.clone(),
                    sender_id,
                    sender_name,
                    content: text,
                    chat_id: message.chat.id.to_string(),
                    message_id: Some(message.message_id.to_string()),
                };

                debug!(chat = %inbound.chat_id, update = update.update_id, "Telegram message received");
                if self.tx.send(Ok(inbound)).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn poll(&self, body: &serde_json::Value) -> Result<Vec<Update>, String> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| redact(&e.to_string(), &self.token))?;

        let status = response.status();
        let reply: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| format!("HTTP {status}: {}", redact(&e.to_string(), &self.token)))?;

        if !reply.ok {
            return Err(format!(
                "HTTP {status}: {}",
                reply.description.unwrap_or_default()
            ));
        }
        Ok(reply.result.unwrap_or_default())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        let poller = Poller {
            client: self.client.clone(),
            url: self.method_url("getUpdates"),
            token: self.bot_token.clone(),
            poll_timeout_secs: self.poll_timeout_secs,
            retry_delay: self.retry_delay,
            channel_id: self.channel_id.clone(),
            tx,
        };

        let handle = tokio::spawn(poller.run());
        let mut slot = self
            .poller
            .lock()
            .map_err(|_| ChannelError::ConnectionLost("poller state poisoned".into()))?;
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }

        info!(poll_timeout_secs = self.poll_timeout_secs, "Telegram channel listening");
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": content,
        });
        if let Some(id) = reply_to.and_then(|r| r.parse::<i64>().ok()) {
            body["reply_to_message_id"] = serde_json::json!(id);
        }

        self.call("sendMessage", body).await
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        self.call(
            "sendChatAction",
            serde_json::json!({ "chat_id": chat_id, "action": "typing" }),
        )
        .await
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.allowed_users
            .iter()
            .any(|u| u == "*" || u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        let handle = self
            .poller
            .lock()
            .map_err(|_| ChannelError::ConnectionLost("poller state poisoned".into()))?
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Telegram channel stopped");
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(redact(&e.to_string(), &self.bot_token)))?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let reply: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        Ok(reply.ok)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}
