//! `gradrelay status` — Show the effective configuration.

use super::runtime;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = runtime::config_path(config_path);
    let config = runtime::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🎓 gradrelay Status");
    println!("===================");
    println!("  Config file:   {}", path.display());
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", config.default_model);
    println!("  Temperature:   {}", config.default_temperature);
    println!("  Timeout:       {}s", config.inference_timeout_secs);
    println!("  API key:       {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Telegram:      {}", if config.telegram.bot_token.is_some() { "token set" } else { "no token" });
    println!("  Sessions:      {:?} (max {} messages)", config.session.mode, config.session.max_messages);
    println!("  Reply bound:   {} chars", config.reply.max_chars);
    println!("  References:    {}", config.reference.sources.len());
    for source in &config.reference.sources {
        println!("    - {source}");
    }

    if path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `gradrelay onboard` first");
    }

    Ok(())
}
