//! One-shot startup fetch of every configured reference source.

use crate::extract::{extract_visible_text, truncate_chars};
use futures::future::join_all;
use gradrelay_core::error::FetchError;
use gradrelay_core::reference::{ReferenceCache, ReferenceDocument};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches reference pages and reduces them to bounded visible text.
#[derive(Debug, Clone)]
pub struct ReferenceLoader {
    client: reqwest::Client,
    timeout: Duration,
    max_chars: usize,
}

impl ReferenceLoader {
    pub fn new(timeout: Duration, max_chars: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gradrelay/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            timeout,
            max_chars,
        })
    }

    /// Fetch every source once, concurrently.
    ///
    /// Never fails: a source that cannot be loaded is represented by an error
    /// document, and the cache lists documents in the order given.
    pub async fn load(&self, sources: &[String]) -> ReferenceCache {
        let fetches = sources.iter().map(|source| async move {
            match self.fetch(source).await {
                Ok(text) => {
                    debug!(source = %source, chars = text.chars().count(), "Loaded reference source");
                    ReferenceDocument::fetched(source.clone(), text)
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Reference source unavailable");
                    ReferenceDocument::failed(&e)
                }
            }
        });

        let cache = ReferenceCache::from_documents(join_all(fetches).await);
        info!(
            sources = cache.len(),
            failed = cache.failed_count(),
            "Reference cache ready"
        );
        cache
    }

    /// Fetch a single source and return its truncated visible text.
    pub async fn fetch(&self, source: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(source)
            .send()
            .await
            .map_err(|e| self.classify(source, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                source_id: source.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(source, e)
            } else {
                FetchError::Body {
                    source_id: source.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(truncate_chars(&extract_visible_text(&body), self.max_chars))
    }

    fn classify(&self, source: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                source_id: source.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Network {
                source_id: source.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Build the reference cache for `sources` with a fresh loader.
pub async fn load(
    sources: &[String],
    timeout: Duration,
    max_chars: usize,
) -> Result<ReferenceCache, reqwest::Error> {
    Ok(ReferenceLoader::new(timeout, max_chars)?.load(sources).await)
}
