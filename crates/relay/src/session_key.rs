//! Session key policies: which history an inbound chat message lands in.

use gradrelay_config::{SessionConfig, SessionMode};
use gradrelay_core::channel::ChannelMessage;
use gradrelay_core::message::SessionId;

/// Maps an inbound chat onto the history session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyPolicy {
    /// One session per channel chat, keyed `<channel>:<chat_id>`. In a
    /// group chat every member shares that session.
    PerChat,
    /// One session per sender within a chat, keyed
    /// `<channel>:<chat_id>:<sender_id>`.
    PerSender,
    /// Every chat shares one session.
    Shared(SessionId),
}

impl SessionKeyPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        match config.mode {
            SessionMode::PerChat => Self::PerChat,
            SessionMode::PerSender => Self::PerSender,
            SessionMode::Shared => Self::Shared(SessionId::new(&config.default_session_id)),
        }
    }

    pub fn key_for(&self, message: &ChannelMessage) -> SessionId {
        self.key(&message.channel_id.0, &message.chat_id, &message.sender_id)
    }

    pub fn key(&self, channel: &str, chat_id: &str, sender_id: &str) -> SessionId {
        match self {
            Self::PerChat => SessionId::new(format!("{channel}:{chat_id}")),
            Self::PerSender => SessionId::new(format!("{channel}:{chat_id}:{sender_id}")),
            Self::Shared(id) => id.clone(),
        }
    }
}
