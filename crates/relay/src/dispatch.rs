//! Channel dispatch loop.
//!
//! Pulls inbound messages from a [`Channel`], routes each one to the relay in
//! its own task, and sends the reply back to the originating chat.

use crate::relay::Relay;
use crate::session_key::SessionKeyPolicy;
use gradrelay_core::channel::{Channel, ChannelMessage};
use gradrelay_core::error::ChannelError;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// What an inbound text asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// `/start`, optionally addressed (`/start@bot`) or with a payload.
    Start,
    /// `/reset`: forget the session's history.
    Reset,
    /// Any other slash command; ignored.
    Command(&'a str),
    /// A free-text question.
    Question(&'a str),
    /// Nothing but whitespace.
    Empty,
}

pub fn classify(text: &str) -> Inbound<'_> {
    let text = text.trim();
    if text.is_empty() {
        return Inbound::Empty;
    }

    let Some(command) = text.strip_prefix('/') else {
        return Inbound::Question(text);
    };

    let name = command
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default();

    if name.eq_ignore_ascii_case("start") {
        Inbound::Start
    } else if name.eq_ignore_ascii_case("reset") {
        Inbound::Reset
    } else {
        Inbound::Command(name)
    }
}

/// Connects one channel to the relay.
pub struct Dispatcher {
    relay: Arc<Relay>,
    channel: Arc<dyn Channel>,
    sessions: SessionKeyPolicy,
}

impl Dispatcher {
    pub fn new(relay: Arc<Relay>, channel: Arc<dyn Channel>, sessions: SessionKeyPolicy) -> Self {
        Self {
            relay,
            channel,
            sessions,
        }
    }

    /// Serve until the channel closes.
    pub async fn run(self) -> Result<(), ChannelError> {
        self.serve(std::future::pending::<()>()).await
    }

    /// Serve until the channel closes or `shutdown` resolves. In-flight
    /// requests are awaited before the channel is stopped.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ChannelError>
    where
        F: Future<Output = ()>,
    {
        let mut inbound = self.channel.start().await?;
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        info!(channel = %self.channel.name(), "Dispatcher listening");

        loop {
            tokio::select! {
                next = inbound.recv() => match next {
                    Some(Ok(message)) => self.accept(&mut tasks, message),
                    Some(Err(e)) => warn!(channel = %self.channel.name(), error = %e, "Inbound error"),
                    None => {
                        info!(channel = %self.channel.name(), "Channel closed");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_outcome(joined);
                }
                () = &mut shutdown => {
                    info!(channel = %self.channel.name(), "Shutdown requested");
                    break;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_task_outcome(joined);
        }

        self.channel.stop().await
    }

    fn accept(&self, tasks: &mut JoinSet<()>, message: ChannelMessage) {
        if !self.channel.is_allowed(&message.sender_id) {
            warn!(
                channel = %self.channel.name(),
                sender = %message.sender_id,
                "Dropping message from sender outside the allowlist"
            );
            return;
        }

        let relay = self.relay.clone();
        let channel = self.channel.clone();
        let session = self.sessions.key_for(&message);

        tasks.spawn(async move {
            let reply = match classify(&message.content) {
                Inbound::Start => relay.on_start().to_string(),
                Inbound::Reset => relay.on_reset(&session).await,
                Inbound::Question(question) => {
                    if let Err(e) = channel.send_typing(&message.chat_id).await {
                        debug!(chat = %message.chat_id, error = %e, "Typing indicator failed");
                    }
                    relay.on_message(&session, question).await
                }
                Inbound::Command(name) => {
                    debug!(chat = %message.chat_id, command = name, "Ignoring command");
                    return;
                }
                Inbound::Empty => return,
            };

            if let Err(e) = channel
                .send(&message.chat_id, &reply, message.message_id.as_deref())
                .await
            {
                warn!(channel = %channel.name(), chat = %message.chat_id, error = %e, "Reply not delivered");
            }
        });
    }
}

fn log_task_outcome(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Request task panicked");
        } else {
            debug!(error = %e, "Request task cancelled");
        }
    }
}
