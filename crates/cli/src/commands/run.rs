//! `gradrelay run` — Serve the Telegram bot until Ctrl+C.

use super::runtime;
use gradrelay_channels::TelegramChannel;
use gradrelay_core::channel::Channel;
use gradrelay_relay::{Dispatcher, SessionKeyPolicy};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    runtime::require_api_key(&config)?;

    let channel = TelegramChannel::from_config(&config.telegram).map_err(|e| {
        format!("{e}. Set TOKEN or GRADRELAY_TELEGRAM_TOKEN, or telegram.bot_token in the config")
    })?;

    match channel.health_check().await {
        Ok(true) => info!("Telegram bot token accepted"),
        Ok(false) => warn!("Telegram rejected the bot token; polling anyway"),
        Err(e) => warn!(error = %e, "Telegram unreachable; polling anyway"),
    }

    let relay = runtime::build_relay(&config).await?;
    let sessions = SessionKeyPolicy::from_config(&config.session);

    println!("🎓 gradrelay is listening on Telegram. Press Ctrl+C to stop.");
    Dispatcher::new(relay, Arc::new(channel), sessions)
        .serve(runtime::ctrl_c())
        .await?;

    println!("Goodbye! 👋");
    Ok(())
}
