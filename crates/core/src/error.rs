//! Error types for the gradrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all gradrelay operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Session history errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Reference fetch errors ---
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    // --- Prompt assembly errors ---
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),
}

// --- Bounded context errors ---

/// Failures of the remote inference service.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failure to fetch a reference source. Never escapes the reference cache:
/// the loader turns it into an error document.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {source_id} timed out after {timeout_secs}s")]
    Timeout { source_id: String, timeout_secs: u64 },

    #[error("request to {source_id} failed: {reason}")]
    Network { source_id: String, reason: String },

    #[error("{source_id} returned HTTP {status}")]
    Status { source_id: String, status: u16 },

    #[error("could not read body of {source_id}: {reason}")]
    Body { source_id: String, reason: String },
}

impl FetchError {
    /// The source this failure belongs to.
    pub fn source_id(&self) -> &str {
        match self {
            Self::Timeout { source_id, .. }
            | Self::Network { source_id, .. }
            | Self::Status { source_id, .. }
            | Self::Body { source_id, .. } => source_id,
        }
    }
}

/// Prompt assembly failures. Not expected in normal operation; fatal to the
/// single request only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("system instructions are empty")]
    MissingInstructions,
}
