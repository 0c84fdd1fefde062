//! Single-shot inference: one provider call per question, no retry.

use gradrelay_config::AppConfig;
use gradrelay_core::error::ProviderError;
use gradrelay_core::prompt::PromptRequest;
use gradrelay_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Sends assembled prompts to the configured provider.
pub struct InferenceInvoker {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Upper bound on one provider call
    timeout: Duration,
}

impl InferenceInvoker {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, &config.default_model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_timeout(Duration::from_secs(config.inference_timeout_secs))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one completion and return the answer text.
    pub async fn infer(&self, prompt: &PromptRequest) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: prompt.to_messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let call = self.provider.complete(request);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    provider = %self.provider.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Inference timed out"
                );
                return Err(ProviderError::Timeout(format!(
                    "no completion within {:?}",
                    self.timeout
                )));
            }
        };

        debug!(
            provider = %self.provider.name(),
            model = %response.model,
            tokens = response.usage.as_ref().map(|u| u.total_tokens),
            answer_chars = response.message.content.chars().count(),
            "Inference complete"
        );

        Ok(response.message.content)
    }
}
