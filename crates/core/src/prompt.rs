//! The structured prompt handed from the assembler to the inference invoker.

use serde::{Deserialize, Serialize};
use crate::message::Message;

/// One inference request, built fresh per question and never persisted.
///
/// Kept structured (rather than flattened into a string) so the invoker can
/// map it onto whatever message format the provider speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Persona, scope restriction and response template.
    pub system_instructions: String,

    /// Prior turns of the session, oldest first.
    pub history: Vec<Message>,

    /// The user's question, already augmented with reference material.
    pub question: String,
}

impl PromptRequest {
    /// Flatten into chat messages: system, then history in order, then the
    /// question as the final user turn.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(&self.system_instructions));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(&self.question));
        messages
    }
}
