use crate::relay::RelayStage;
use gradrelay_core::error::{AssemblyError, MemoryError, ProviderError};
use thiserror::Error;

/// Why a single question could not be answered.
///
/// Every variant is scoped to one request; the relay keeps serving.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("prompt assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("session history unavailable: {0}")]
    History(#[from] MemoryError),

    #[error("inference failed: {0}")]
    Inference(#[from] ProviderError),
}

impl RelayError {
    /// The pipeline stage that produced the error.
    pub fn stage(&self) -> RelayStage {
        match self {
            Self::Assembly(_) | Self::History(_) => RelayStage::Assembling,
            Self::Inference(_) => RelayStage::Invoking,
        }
    }
}
