//! # gradrelay Relay
//!
//! The session-scoped conversational pipeline: each question is assembled
//! into a prompt with the session history and the reference cache, sent to
//! the inference provider once, recorded, and answered within the reply
//! bound.
//!
//! ```text
//! Channel ─▶ Dispatcher ─▶ Relay ─▶ PromptAssembler ─▶ InferenceInvoker
//!                            │            ▲
//!                            └──▶ SessionStore
//! ```

pub mod assembler;
pub mod dispatch;
pub mod error;
pub mod invoker;
pub mod relay;
pub mod session_key;

#[cfg(test)]
mod test_helpers;

pub use assembler::PromptAssembler;
pub use dispatch::{classify, Dispatcher, Inbound};
pub use error::RelayError;
pub use invoker::InferenceInvoker;
pub use relay::{truncate_reply, Relay, RelayStage};
pub use session_key::SessionKeyPolicy;
