//! # gradrelay Core
//!
//! Domain types, traits, and error definitions for the gradrelay
//! conversational relay. This crate has **no framework dependencies** — it
//! defines the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the relay is defined as a trait here. Implementations
//! live in their respective crates:
//! - [`Provider`] — the remote inference service (`gradrelay-providers`)
//! - [`Channel`] — the chat transport (`gradrelay-channels`)
//! - [`SessionStore`] — per-session history (`gradrelay-memory`)
//!
//! The reference cache is a concrete immutable value rather than a trait; its
//! loader lives in `gradrelay-reference`.

pub mod error;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod channel;
pub mod reference;
pub mod session;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{AssemblyError, ChannelError, Error, FetchError, MemoryError, ProviderError};
pub use message::{Message, Role, SessionId};
pub use prompt::PromptRequest;
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use reference::{ReferenceCache, ReferenceDocument};
pub use session::SessionStore;
