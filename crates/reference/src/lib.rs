//! # gradrelay Reference
//!
//! Loads the reference cache: each configured page is fetched once at
//! startup, reduced to its visible text, and bounded in length. Failed
//! sources are kept as error documents so every source has an entry.

pub mod extract;
pub mod loader;

pub use extract::extract_visible_text;
pub use loader::{load, ReferenceLoader};
