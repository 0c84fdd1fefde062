//! Scripted collaborators shared by the relay tests.

use async_trait::async_trait;
use gradrelay_config::ReplyConfig;
use gradrelay_core::channel::{Channel, ChannelId, ChannelMessage};
use gradrelay_core::error::{ChannelError, MemoryError, ProviderError};
use gradrelay_core::message::{Message, Role, SessionId};
use gradrelay_core::provider::{Provider, ProviderRequest, ProviderResponse};
use gradrelay_core::reference::{ReferenceCache, ReferenceDocument};
use gradrelay_core::session::SessionStore;
use gradrelay_memory::InMemorySessionStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::assembler::PromptAssembler;
use crate::invoker::InferenceInvoker;
use crate::relay::Relay;

pub const INSTRUCTIONS: &str = "You advise applicants about master's programs.";

/// How the mock provider answers.
#[derive(Clone)]
pub enum Script {
    /// Always this text.
    Fixed(String),
    /// `echo: ` followed by the first line of the last user message.
    Echo,
    /// Always this error.
    Fail(ProviderError),
}

/// A provider that answers from a script and records every request.
pub struct MockProvider {
    script: Script,
    delay: Duration,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(text: &str) -> Self {
        Self::new(Script::Fixed(text.into()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let text = match &self.script {
            Script::Fixed(text) => text.clone(),
            Script::Echo => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.lines().next().unwrap_or_default().to_string())
                    .unwrap_or_default();
                format!("echo: {last_user}")
            }
            Script::Fail(err) => return Err(err.clone()),
        };

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: request.model,
        })
    }
}

pub fn references() -> Arc<ReferenceCache> {
    Arc::new(ReferenceCache::from_documents(vec![
        ReferenceDocument::fetched("https://abit.example/ai", "AI program: 2 years, Python required"),
        ReferenceDocument::fetched("https://abit.example/ai_product", "AI Product program: product track"),
    ]))
}

/// Wire a relay around `provider` with an unbounded in-memory store.
pub fn relay_with(provider: Arc<MockProvider>) -> (Relay, Arc<dyn SessionStore>) {
    relay_with_store(provider, Arc::new(InMemorySessionStore::new()))
}

pub fn relay_with_store(
    provider: Arc<MockProvider>,
    store: Arc<dyn SessionStore>,
) -> (Relay, Arc<dyn SessionStore>) {
    let assembler = PromptAssembler::new(INSTRUCTIONS, references(), store.clone()).unwrap();
    let invoker = InferenceInvoker::new(provider, "mock-model").with_timeout(Duration::from_secs(5));
    let relay = Relay::new(assembler, invoker, store.clone(), ReplyConfig::default());
    (relay, store)
}

/// A store that reads as empty and rejects every write.
pub struct BrokenStore;

fn storage_down() -> MemoryError {
    MemoryError::Storage("storage unavailable".into())
}

#[async_trait]
impl SessionStore for BrokenStore {
    fn name(&self) -> &str {
        "broken"
    }

    async fn append(&self, _session: &SessionId, _message: Message) -> Result<(), MemoryError> {
        Err(storage_down())
    }

    async fn append_exchange(
        &self,
        _session: &SessionId,
        _question: Message,
        _answer: Message,
    ) -> Result<(), MemoryError> {
        Err(storage_down())
    }

    async fn read(&self, _session: &SessionId) -> Result<Vec<Message>, MemoryError> {
        Ok(Vec::new())
    }

    async fn clear(&self, _session: &SessionId) -> Result<bool, MemoryError> {
        Err(storage_down())
    }

    async fn session_count(&self) -> Result<usize, MemoryError> {
        Ok(0)
    }
}

/// A channel driven by the test: inbound messages go through the returned
/// sender, outbound replies are collected in `sent`.
pub struct MockChannel {
    id: ChannelId,
    allowed: Vec<String>,
    inbound: Mutex<Option<mpsc::Receiver<Result<ChannelMessage, ChannelError>>>>,
    sent: Mutex<Vec<(String, String)>>,
    typing: Mutex<Vec<String>>,
    fail_sends: bool,
}

impl MockChannel {
    pub fn new(allowed: &[&str]) -> (Arc<Self>, mpsc::Sender<Result<ChannelMessage, ChannelError>>) {
        Self::build(allowed, false)
    }

    pub fn failing_sends(
        allowed: &[&str],
    ) -> (Arc<Self>, mpsc::Sender<Result<ChannelMessage, ChannelError>>) {
        Self::build(allowed, true)
    }

    fn build(
        allowed: &[&str],
        fail_sends: bool,
    ) -> (Arc<Self>, mpsc::Sender<Result<ChannelMessage, ChannelError>>) {
        let (tx, rx) = mpsc::channel(16);
        let channel = Arc::new(Self {
            id: ChannelId("mock".into()),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            inbound: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
            typing: Mutex::new(Vec::new()),
            fail_sends,
        });
        (channel, tx)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        let mut sent = self.sent.lock().unwrap().clone();
        sent.sort();
        sent
    }

    pub fn typing(&self) -> Vec<String> {
        self.typing.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        self.inbound
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChannelError::NotConfigured("already started".into()))
    }

    async fn send(&self, chat_id: &str, content: &str, _reply_to: Option<&str>) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::DeliveryFailed {
                channel: "mock".into(),
                reason: "offline".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        self.typing.lock().unwrap().push(chat_id.to_string());
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.allowed.iter().any(|a| a == "*" || a == sender_id)
    }
}

pub fn inbound(sender: &str, chat: &str, text: &str) -> ChannelMessage {
    ChannelMessage {
        channel_id: ChannelId("mock".into()),
        sender_id: sender.into(),
        sender_name: None,
        content: text.into(),
        chat_id: chat.into(),
        message_id: None,
    }
}
