//! The conversational relay: one question in, one bounded answer out.

use crate::assembler::PromptAssembler;
use crate::error::RelayError;
use crate::invoker::InferenceInvoker;
use gradrelay_config::ReplyConfig;
use gradrelay_core::message::{Message, SessionId};
use gradrelay_core::session::SessionStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pipeline stages of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Received,
    Assembling,
    Invoking,
    Appending,
    Responding,
    Failed,
}

impl RelayStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Assembling => "assembling",
            Self::Invoking => "invoking",
            Self::Appending => "appending",
            Self::Responding => "responding",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RelayStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives assembly, inference and history for every inbound question.
///
/// Holds no per-request state; share it behind an `Arc` across tasks.
pub struct Relay {
    assembler: PromptAssembler,
    invoker: InferenceInvoker,
    store: Arc<dyn SessionStore>,
    reply: ReplyConfig,
}

impl Relay {
    pub fn new(
        assembler: PromptAssembler,
        invoker: InferenceInvoker,
        store: Arc<dyn SessionStore>,
        reply: ReplyConfig,
    ) -> Self {
        Self {
            assembler,
            invoker,
            store,
            reply,
        }
    }

    /// The configured greeting.
    pub fn on_start(&self) -> &str {
        &self.reply.greeting
    }

    /// Answer a question. Never fails: any error becomes the error notice.
    pub async fn on_message(&self, session: &SessionId, question: &str) -> String {
        match self.handle(session, question).await {
            Ok(reply) => reply,
            Err(e) => {
                let stage = RelayStage::Failed;
                match &e {
                    RelayError::Inference(_) => {
                        warn!(session = %session, %stage, failed_at = %e.stage(), error = %e, "Request failed")
                    }
                    _ => {
                        error!(session = %session, %stage, failed_at = %e.stage(), error = %e, "Request failed")
                    }
                }
                self.reply.error_notice.clone()
            }
        }
    }

    /// Answer a question, surfacing the typed error.
    ///
    /// On success the raw question and the untruncated answer are appended
    /// to the session as one exchange; on failure nothing is appended.
    pub async fn handle(&self, session: &SessionId, question: &str) -> Result<String, RelayError> {
        debug!(session = %session, stage = %RelayStage::Received, chars = question.chars().count(), "Question received");

        let prompt = self.assembler.build(session, question).await?;

        debug!(session = %session, stage = %RelayStage::Invoking, model = %self.invoker.model(), "Invoking provider");
        let answer = self.invoker.infer(&prompt).await?;

        if let Err(e) = self
            .store
            .append_exchange(session, Message::user(question), Message::assistant(&answer))
            .await
        {
            // The answer is still delivered; only the history lost this turn.
            error!(session = %session, stage = %RelayStage::Appending, error = %e, "Failed to record exchange");
        }

        let reply = truncate_reply(&answer, self.reply.max_chars);
        info!(
            session = %session,
            stage = %RelayStage::Responding,
            answer_chars = answer.chars().count(),
            reply_chars = reply.chars().count(),
            "Answered"
        );
        Ok(reply)
    }

    /// Forget the session's history and confirm, or return the error
    /// notice if the store fails.
    pub async fn on_reset(&self, session: &SessionId) -> String {
        match self.store.clear(session).await {
            Ok(had_history) => {
                info!(session = %session, had_history, "Session reset");
                self.reply.reset_notice.clone()
            }
            Err(e) => {
                error!(session = %session, error = %e, "Session reset failed");
                self.reply.error_notice.clone()
            }
        }
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }
}

/// Cut `text` to at most `max_chars` characters (not bytes).
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{relay_with, relay_with_store, BrokenStore, MockProvider, Script};
    use gradrelay_core::error::{AssemblyError, ProviderError};
    use gradrelay_core::message::Role;
    use std::time::Duration;

    #[test]
    fn truncate_short_text_untouched() {
        assert_eq!(truncate_reply("hello", 4000), "hello");
    }

    #[test]
    fn truncate_counts_characters() {
        let text = "ж".repeat(10);
        let cut = truncate_reply(&text, 4);
        assert_eq!(cut, "жжжж");
        assert_eq!(cut.len(), 8);
    }

    #[test]
    fn on_start_returns_greeting() {
        let (relay, _) = relay_with(Arc::new(MockProvider::fixed("x")));
        assert_eq!(relay.on_start(), ReplyConfig::default().greeting);
    }

    #[tokio::test]
    async fn long_answer_truncated_but_stored_whole() {
        let answer = "a".repeat(10_000);
        let (relay, store) = relay_with(Arc::new(MockProvider::fixed(&answer)));
        let session = SessionId::from("s");

        let reply = relay.on_message(&session, "Расскажи всё").await;
        assert_eq!(reply.chars().count(), 4000);
        assert_eq!(reply, answer[..4000]);

        let history = store.read(&session).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "Расскажи всё");
        assert_eq!(history[1].content.chars().count(), 10_000);
    }

    #[tokio::test]
    async fn inference_error_returns_notice_and_appends_nothing() {
        let provider = Arc::new(MockProvider::new(Script::Fail(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        })));
        let (relay, store) = relay_with(provider);
        let session = SessionId::from("s");

        let reply = relay.on_message(&session, "Hi").await;
        assert_eq!(reply, ReplyConfig::default().error_notice);
        assert!(store.read(&session).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn request_dropped_mid_inference_appends_nothing() {
        let provider = Arc::new(MockProvider::fixed("ответ").with_delay(Duration::from_secs(2)));
        let (relay, store) = relay_with(provider.clone());
        let session = SessionId::from("s");

        let dropped = tokio::time::timeout(Duration::from_millis(500), relay.on_message(&session, "Hi")).await;
        assert!(dropped.is_err());
        assert_eq!(provider.requests().len(), 1);
        assert!(store.read(&session).await.unwrap().is_empty());

        assert_eq!(relay.on_message(&session, "Hi again").await, "ответ");
        let history = store.read(&session).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "Hi again");
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_request_task_appends_nothing() {
        let provider = Arc::new(MockProvider::fixed("ответ").with_delay(Duration::from_secs(2)));
        let (relay, store) = relay_with(provider);
        let relay = Arc::new(relay);
        let session = SessionId::from("s");

        let task = tokio::spawn({
            let relay = relay.clone();
            let session = session.clone();
            async move { relay.on_message(&session, "Hi").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(store.read(&session).await.unwrap().is_empty());

        relay.on_message(&session, "Hi").await;
        assert_eq!(store.len(&session).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reset_forgets_history() {
        let (relay, store) = relay_with(Arc::new(MockProvider::fixed("ok")));
        let session = SessionId::from("s");
        relay.on_message(&session, "q").await;
        assert_eq!(store.len(&session).await.unwrap(), 2);

        assert_eq!(relay.on_reset(&session).await, ReplyConfig::default().reset_notice);
        assert!(store.read(&session).await.unwrap().is_empty());

        // Resetting an unknown session still confirms.
        assert_eq!(
            relay.on_reset(&SessionId::from("other")).await,
            ReplyConfig::default().reset_notice
        );
    }

    #[tokio::test]
    async fn answer_delivered_when_history_write_fails() {
        let provider = Arc::new(MockProvider::fixed("ответ"));
        let (relay, _) = relay_with_store(provider, Arc::new(BrokenStore));
        let session = SessionId::from("s");

        assert_eq!(relay.on_message(&session, "Hi").await, "ответ");
        assert_eq!(relay.on_reset(&session).await, ReplyConfig::default().error_notice);
    }

    #[tokio::test]
    async fn handle_exposes_typed_error() {
        let provider = Arc::new(MockProvider::new(Script::Fail(ProviderError::RateLimited {
            retry_after_secs: 3,
        })));
        let (relay, _) = relay_with(provider);

        let err = relay.handle(&SessionId::from("s"), "Hi").await.unwrap_err();
        assert!(matches!(err, RelayError::Inference(ProviderError::RateLimited { .. })));
        assert_eq!(err.stage(), RelayStage::Invoking);
    }

    #[tokio::test]
    async fn empty_question_fails_only_that_request() {
        let provider = Arc::new(MockProvider::fixed("ok"));
        let (relay, store) = relay_with(provider.clone());
        let session = SessionId::from("s");

        let err = relay.handle(&session, "   ").await.unwrap_err();
        assert!(matches!(err, RelayError::Assembly(AssemblyError::EmptyQuestion)));
        assert_eq!(err.stage(), RelayStage::Assembling);
        assert!(provider.requests().is_empty());

        assert_eq!(relay.on_message(&session, "next").await, "ok");
        assert_eq!(store.len(&session).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_question_sees_first_exchange() {
        let provider = Arc::new(MockProvider::new(Script::Echo));
        let (relay, _) = relay_with(provider.clone());
        let session = SessionId::from("s");

        relay.on_message(&session, "AI").await;
        relay.on_message(&session, "2 года Python").await;

        let requests = provider.requests();
        let second = &requests[1].messages;
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].content, "AI");
        assert_eq!(second[2].content, "echo: Вопрос: AI");
        assert!(second[3].content.starts_with("Вопрос: 2 года Python"));
    }

    #[tokio::test]
    async fn sessions_do_not_share_history() {
        let provider = Arc::new(MockProvider::fixed("ok"));
        let (relay, store) = relay_with(provider);
        relay.on_message(&SessionId::from("a"), "q").await;

        assert_eq!(store.len(&SessionId::from("a")).await.unwrap(), 2);
        assert_eq!(store.len(&SessionId::from("b")).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_questions_store_contiguous_pairs() {
        let provider = Arc::new(MockProvider::new(Script::Echo).with_delay(Duration::from_millis(20)));
        let (relay, store) = relay_with(provider);
        let relay = Arc::new(relay);
        let session = SessionId::from("shared");

        let (r1, r2) = tokio::join!(
            {
                let relay = relay.clone();
                let session = session.clone();
                tokio::spawn(async move { relay.on_message(&session, "first").await })
            },
            {
                let relay = relay.clone();
                let session = session.clone();
                tokio::spawn(async move { relay.on_message(&session, "second").await })
            }
        );
        assert_eq!(r1.unwrap(), "echo: Вопрос: first");
        assert_eq!(r2.unwrap(), "echo: Вопрос: second");

        let history = store.read(&session).await.unwrap();
        assert_eq!(history.len(), 4);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content, format!("echo: Вопрос: {}", pair[0].content));
        }
    }
}
