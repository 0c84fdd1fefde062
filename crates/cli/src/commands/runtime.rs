//! Shared wiring for the commands that serve questions.

use gradrelay_config::{AppConfig, ConfigError};
use gradrelay_core::session::SessionStore;
use gradrelay_memory::{HistoryLimit, InMemorySessionStore};
use gradrelay_relay::{InferenceInvoker, PromptAssembler, Relay};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The config file in use: `--config` if given, else the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(&config_path(explicit))
}

pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    MISTRAL_API_KEY=...      (recommended)");
    eprintln!("    GRADRELAY_API_KEY=...    (generic)");
    eprintln!();
    eprintln!("  Or add api_key to your config file.");
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Fetch the reference sources and assemble the relay. Runs once per process.
pub async fn build_relay(config: &AppConfig) -> Result<Arc<Relay>, Box<dyn std::error::Error>> {
    let router = gradrelay_providers::router::build_from_config(config)?;
    let provider = router.default().ok_or("No default provider configured")?;

    let references = gradrelay_reference::load(
        &config.reference.sources,
        Duration::from_secs(config.reference.fetch_timeout_secs),
        config.reference.max_chars,
    )
    .await?;
    if references.failed_count() > 0 {
        eprintln!(
            "  ⚠️  {} of {} reference source(s) could not be loaded; answers will lack that material",
            references.failed_count(),
            references.len()
        );
    }

    let limit = HistoryLimit::messages(config.session.max_messages)
        .with_max_tokens(config.session.max_tokens);
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::with_limit(limit));

    let assembler = PromptAssembler::from_config(&config.prompt, Arc::new(references), store.clone())?;
    let invoker = InferenceInvoker::from_config(provider, config);

    info!(
        provider = %router.default_name(),
        model = %config.default_model,
        max_messages = config.session.max_messages,
        "Relay ready"
    );

    Ok(Arc::new(Relay::new(assembler, invoker, store, config.reply.clone())))
}

/// Resolves when the process receives Ctrl+C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
