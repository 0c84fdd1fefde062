//! In-memory session store with per-session locking and bounded history.

use async_trait::async_trait;
use gradrelay_core::error::MemoryError;
use gradrelay_core::message::{Message, Role, SessionId};
use gradrelay_core::session::SessionStore;
use gradrelay_core::token::{estimate_message_tokens, estimate_messages_tokens};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Bounds applied to every session after each append. `None` = unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryLimit {
    /// Maximum number of messages kept per session.
    pub max_messages: Option<usize>,
    /// Maximum estimated tokens kept per session.
    pub max_tokens: Option<usize>,
}

impl HistoryLimit {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn messages(max: usize) -> Self {
        Self {
            max_messages: Some(max),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max: Option<usize>) -> Self {
        self.max_tokens = max;
        self
    }

    /// Evict oldest-first until the history fits, returning how many
    /// messages were dropped.
    ///
    /// A remaining history never starts with an assistant message whose
    /// question was evicted. When the newest exchange alone exceeds the
    /// bounds it is kept whole: question and answer stay together.
    fn enforce(&self, messages: &mut Vec<Message>) -> usize {
        let len = messages.len();
        if len == 0 {
            return 0;
        }

        let mut start = match self.max_messages {
            Some(max) if len > max => len - max,
            _ => 0,
        };

        if let Some(max_tokens) = self.max_tokens {
            let mut total = estimate_messages_tokens(&messages[start..]);
            while total > max_tokens && start + 1 < len {
                total -= estimate_message_tokens(&messages[start]);
                start += 1;
            }
        }

        if start > 0 {
            while start < len && messages[start].role == Role::Assistant {
                start += 1;
            }
            if start == len {
                // Only answers were left; fall back to the latest question.
                start = messages
                    .iter()
                    .rposition(|m| m.role == Role::User)
                    .unwrap_or(len);
            }
        }

        messages.drain(..start);
        start
    }
}

type SessionLog = Arc<Mutex<Vec<Message>>>;

/// Session histories held in process memory.
///
/// The outer map lock is held only long enough to find or create a session;
/// appends then serialize on that session's own mutex, so unrelated
/// sessions never wait on each other.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionLog>>,
    limit: HistoryLimit,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_limit(HistoryLimit::unbounded())
    }

    pub fn with_limit(limit: HistoryLimit) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limit,
        }
    }

    async fn existing(&self, session: &SessionId) -> Option<SessionLog> {
        self.sessions.read().await.get(session).cloned()
    }

    async fn get_or_create(&self, session: &SessionId) -> SessionLog {
        if let Some(log) = self.existing(session).await {
            return log;
        }
        self.sessions
            .write()
            .await
            .entry(session.clone())
            .or_default()
            .clone()
    }

    fn bound(&self, session: &SessionId, messages: &mut Vec<Message>) {
        let evicted = self.limit.enforce(messages);
        if evicted > 0 {
            debug!(session = %session, evicted, kept = messages.len(), "Trimmed session history");
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, session: &SessionId, message: Message) -> Result<(), MemoryError> {
        let log = self.get_or_create(session).await;
        let mut messages = log.lock().await;
        messages.push(message);
        self.bound(session, &mut messages);
        Ok(())
    }

    async fn append_exchange(
        &self,
        session: &SessionId,
        question: Message,
        answer: Message,
    ) -> Result<(), MemoryError> {
        let log = self.get_or_create(session).await;
        // Both pushes happen under one guard with no await in between.
        let mut messages = log.lock().await;
        messages.push(question);
        messages.push(answer);
        self.bound(session, &mut messages);
        Ok(())
    }

    async fn read(&self, session: &SessionId) -> Result<Vec<Message>, MemoryError> {
        match self.existing(session).await {
            Some(log) => Ok(log.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn len(&self, session: &SessionId) -> Result<usize, MemoryError> {
        match self.existing(session).await {
            Some(log) => Ok(log.lock().await.len()),
            None => Ok(0),
        }
    }

    async fn clear(&self, session: &SessionId) -> Result<bool, MemoryError> {
        // Emptied in place: a caller already holding this log keeps writing
        // into the live session.
        let Some(log) = self.existing(session).await else {
            return Ok(false);
        };
        let mut messages = log.lock().await;
        let had_history = !messages.is_empty();
        messages.clear();
        if had_history {
            debug!(session = %session, "Cleared session history");
        }
        Ok(had_history)
    }

    async fn session_count(&self) -> Result<usize, MemoryError> {
        let logs: Vec<SessionLog> = self.sessions.read().await.values().cloned().collect();
        let mut count = 0;
        for log in logs {
            if !log.lock().await.is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[tokio::test]
    async fn read_returns_insertion_order() {
        let store = InMemorySessionStore::new();
        let s = SessionId::from("chat-1");
        store.append(&s, Message::user("m1")).await.unwrap();
        store.append(&s, Message::assistant("m2")).await.unwrap();
        store.append(&s, Message::user("m3")).await.unwrap();

        let history = store.read(&s).await.unwrap();
        assert_eq!(contents(&history), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn unknown_session_reads_empty() {
        let store = InMemorySessionStore::new();
        let history = store.read(&SessionId::from("nobody")).await.unwrap();
        assert!(history.is_empty());
        assert_eq!(store.len(&SessionId::from("nobody")).await.unwrap(), 0);
        assert_eq!(store.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_is_idempotent() {
        let store = InMemorySessionStore::new();
        let s = SessionId::from("chat-1");
        store
            .append_exchange(&s, Message::user("q"), Message::assistant("a"))
            .await
            .unwrap();

        let first = store.read(&s).await.unwrap();
        let second = store.read(&s).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        store.append(&a, Message::user("for a")).await.unwrap();
        store.append(&b, Message::user("for b")).await.unwrap();

        assert_eq!(contents(&store.read(&a).await.unwrap()), vec!["for a"]);
        assert_eq!(contents(&store.read(&b).await.unwrap()), vec!["for b"]);
        assert_eq!(store.session_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn clear_removes_session() {
        let store = InMemorySessionStore::new();
        let s = SessionId::from("s");
        store.append(&s, Message::user("x")).await.unwrap();
        assert!(store.clear(&s).await.unwrap());
        assert!(!store.clear(&s).await.unwrap());
        assert!(store.read(&s).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_racing_clear_is_not_lost() {
        let store = InMemorySessionStore::new();
        let s = SessionId::from("s");
        store.append(&s, Message::user("old")).await.unwrap();

        // An append that looked the session up before the reset.
        let log = store.get_or_create(&s).await;
        assert!(store.clear(&s).await.unwrap());
        log.lock().await.push(Message::user("new"));

        assert_eq!(contents(&store.read(&s).await.unwrap()), vec!["new"]);
        assert_eq!(store.session_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn message_limit_evicts_oldest_first() {
        let store = InMemorySessionStore::with_limit(HistoryLimit::messages(4));
        let s = SessionId::from("s");
        for i in 1..=3 {
            store
                .append_exchange(&s, Message::user(format!("q{i}")), Message::assistant(format!("a{i}")))
                .await
                .unwrap();
        }

        let history = store.read(&s).await.unwrap();
        assert_eq!(contents(&history), vec!["q2", "a2", "q3", "a3"]);
    }

    #[tokio::test]
    async fn eviction_never_leaves_leading_answer() {
        let store = InMemorySessionStore::with_limit(HistoryLimit::messages(3));
        let s = SessionId::from("s");
        store
            .append_exchange(&s, Message::user("q1"), Message::assistant("a1"))
            .await
            .unwrap();
        store
            .append_exchange(&s, Message::user("q2"), Message::assistant("a2"))
            .await
            .unwrap();

        // Count bound alone would keep [a1, q2, a2]; a1 lost its question.
        let history = store.read(&s).await.unwrap();
        assert_eq!(contents(&history), vec!["q2", "a2"]);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn token_limit_keeps_recent_messages() {
        // Each message: 40 chars → 10 tokens + 4 overhead = 14
        let limit = HistoryLimit::unbounded().with_max_tokens(Some(30));
        let store = InMemorySessionStore::with_limit(limit);
        let s = SessionId::from("s");
        let body = |c: char| std::iter::repeat_n(c, 40).collect::<String>();

        store
            .append_exchange(&s, Message::user(body('a')), Message::assistant(body('b')))
            .await
            .unwrap();
        store
            .append_exchange(&s, Message::user(body('c')), Message::assistant(body('d')))
            .await
            .unwrap();

        let history = store.read(&s).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, body('c'));
        assert_eq!(history[1].content, body('d'));
    }

    #[tokio::test]
    async fn newest_question_survives_tiny_budget() {
        let limit = HistoryLimit::unbounded().with_max_tokens(Some(1));
        let store = InMemorySessionStore::with_limit(limit);
        let s = SessionId::from("s");
        store.append(&s, Message::user("a fairly long question")).await.unwrap();
        store.append(&s, Message::user("latest")).await.unwrap();

        let history = store.read(&s).await.unwrap();
        assert_eq!(contents(&history), vec!["latest"]);
    }

    #[tokio::test]
    async fn oversized_answer_keeps_its_question() {
        let limit = HistoryLimit::messages(40).with_max_tokens(Some(100));
        let store = InMemorySessionStore::with_limit(limit);
        let s = SessionId::from("s");
        let long_answer = "x".repeat(1000);

        store
            .append_exchange(&s, Message::user("q1"), Message::assistant(long_answer.clone()))
            .await
            .unwrap();
        let history = store.read(&s).await.unwrap();
        assert_eq!(contents(&history), vec!["q1", long_answer.as_str()]);
        assert_eq!(history[0].role, Role::User);

        store
            .append_exchange(&s, Message::user("q2"), Message::assistant(long_answer.clone()))
            .await
            .unwrap();
        let history = store.read(&s).await.unwrap();
        assert_eq!(contents(&history), vec!["q2", long_answer.as_str()]);
    }

    #[tokio::test]
    async fn single_message_limit_keeps_latest_exchange() {
        let store = InMemorySessionStore::with_limit(HistoryLimit::messages(1));
        let s = SessionId::from("s");
        for i in 1..=2 {
            store
                .append_exchange(&s, Message::user(format!("q{i}")), Message::assistant(format!("a{i}")))
                .await
                .unwrap();
            let history = store.read(&s).await.unwrap();
            assert_eq!(history[0].role, Role::User);
            assert_eq!(history.len(), 2);
        }
        assert_eq!(contents(&store.read(&s).await.unwrap()), vec!["q2", "a2"]);
    }

    #[tokio::test]
    async fn session_of_only_answers_is_emptied() {
        let store = InMemorySessionStore::with_limit(HistoryLimit::messages(1));
        let s = SessionId::from("s");
        store.append(&s, Message::assistant("a1")).await.unwrap();
        store.append(&s, Message::assistant("a2")).await.unwrap();

        assert!(store.read(&s).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exchanges_are_not_interleaved() {
        let store = Arc::new(InMemorySessionStore::new());
        let s = SessionId::from("shared");

        let mut handles = Vec::new();
        for worker in 0..4 {
            let store = store.clone();
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store
                        .append_exchange(
                            &s,
                            Message::user(format!("q-{worker}-{i}")),
                            Message::assistant(format!("a-{worker}-{i}")),
                        )
                        .await
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let history = store.read(&s).await.unwrap();
        assert_eq!(history.len(), 200);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content.replacen('q', "a", 1), pair[1].content);
        }
    }
}
