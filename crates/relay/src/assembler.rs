//! Prompt assembly.
//!
//! Combines three layers into one [`PromptRequest`]:
//!
//! 1. **System instructions** (persona, scope restriction, answer template)
//! 2. **Session history**, replayed verbatim in insertion order
//! 3. **Augmented question**: the user's text followed by every reference
//!    document in configured source order
//!
//! Assembly is deterministic for a given history snapshot.

use crate::error::RelayError;
use gradrelay_config::PromptConfig;
use gradrelay_core::error::AssemblyError;
use gradrelay_core::message::SessionId;
use gradrelay_core::prompt::PromptRequest;
use gradrelay_core::reference::ReferenceCache;
use gradrelay_core::session::SessionStore;
use std::sync::Arc;
use tracing::debug;

const QUESTION_LABEL: &str = "Вопрос:";
const CONTEXT_LABEL: &str = "Контекст:";

/// Builds inference requests for a session. Create once and share.
pub struct PromptAssembler {
    instructions: String,
    repeat_instructions: bool,
    references: Arc<ReferenceCache>,
    store: Arc<dyn SessionStore>,
}

impl PromptAssembler {
    /// Fails with [`AssemblyError::MissingInstructions`] when `instructions`
    /// is blank.
    pub fn new(
        instructions: impl Into<String>,
        references: Arc<ReferenceCache>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AssemblyError> {
        let instructions = instructions.into();
        if instructions.trim().is_empty() {
            return Err(AssemblyError::MissingInstructions);
        }

        Ok(Self {
            instructions,
            repeat_instructions: false,
            references,
            store,
        })
    }

    pub fn from_config(
        config: &PromptConfig,
        references: Arc<ReferenceCache>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AssemblyError> {
        Ok(Self::new(&config.system_instructions, references, store)?
            .with_repeat_instructions(config.repeat_instructions))
    }

    /// Also embed the instructions at the end of every augmented question.
    pub fn with_repeat_instructions(mut self, repeat: bool) -> Self {
        self.repeat_instructions = repeat;
        self
    }

    pub fn references(&self) -> &ReferenceCache {
        &self.references
    }

    /// Build the request for `question` in `session`.
    ///
    /// Reads a snapshot of the history; nothing is written.
    pub async fn build(&self, session: &SessionId, question: &str) -> Result<PromptRequest, RelayError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssemblyError::EmptyQuestion.into());
        }

        let history = self.store.read(session).await?;
        let augmented = self.augment(question);

        debug!(
            session = %session,
            history = history.len(),
            references = self.references.len(),
            question_chars = augmented.chars().count(),
            "Assembled prompt"
        );

        Ok(PromptRequest {
            system_instructions: self.instructions.clone(),
            history,
            question: augmented,
        })
    }

    fn augment(&self, question: &str) -> String {
        let mut out = format!("{QUESTION_LABEL} {question}");

        if !self.references.is_empty() {
            out.push('\n');
            out.push_str(CONTEXT_LABEL);
            out.push('\n');
            out.push_str(&self.references.render());
        }

        if self.repeat_instructions {
            out.push_str("\n\n");
            out.push_str(&self.instructions);
        }

        out
    }
}
