//! SessionStore trait — ordered per-session message history.
//!
//! The relay only ever appends through this trait and reads snapshots; it
//! never holds a mutable reference to a session's messages.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::{Message, SessionId};

/// The core SessionStore trait.
///
/// Implementations must keep insertion order per session and serialize
/// appends to the same session. Appends to different sessions carry no
/// ordering guarantee relative to each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Append one message to the end of a session, creating it on first use.
    async fn append(&self, session: &SessionId, message: Message) -> std::result::Result<(), MemoryError>;

    /// Append a question and its answer as one unit: no other append to the
    /// same session can land between them.
    async fn append_exchange(
        &self,
        session: &SessionId,
        question: Message,
        answer: Message,
    ) -> std::result::Result<(), MemoryError>;

    /// Full history in insertion order. Unknown sessions read as empty.
    async fn read(&self, session: &SessionId) -> std::result::Result<Vec<Message>, MemoryError>;

    /// Number of messages currently held for a session.
    async fn len(&self, session: &SessionId) -> std::result::Result<usize, MemoryError> {
        Ok(self.read(session).await?.len())
    }

    /// Empty a session's history. Returns whether it held any messages.
    async fn clear(&self, session: &SessionId) -> std::result::Result<bool, MemoryError>;

    /// Number of sessions with at least one message.
    async fn session_count(&self) -> std::result::Result<usize, MemoryError>;
}
