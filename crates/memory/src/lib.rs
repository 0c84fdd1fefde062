//! Session history stores for gradrelay.
//!
//! Only an in-memory store exists: history lives for the lifetime of the
//! process and is bounded by a [`HistoryLimit`].

pub mod in_memory;

pub use in_memory::{HistoryLimit, InMemorySessionStore};
