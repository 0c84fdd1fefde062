//! `gradrelay doctor` — Diagnose configuration and connectivity.

use super::runtime;
use gradrelay_channels::TelegramChannel;
use gradrelay_core::channel::Channel;
use gradrelay_reference::ReferenceLoader;
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 gradrelay Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let path = runtime::config_path(config_path);
    if !path.exists() {
        println!("  ⚠️  No config file at {} — using defaults", path.display());
    }

    let config = match runtime::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    // Inference provider
    if config.has_api_key() {
        println!("  ✅ API key configured");
        match gradrelay_providers::router::build_from_config(&config) {
            Ok(router) => match router.default() {
                Some(provider) => match provider.health_check().await {
                    Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
                    Ok(false) => {
                        println!("  ❌ Provider '{}' rejected the request", provider.name());
                        issues += 1;
                    }
                    Err(e) => {
                        println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                        issues += 1;
                    }
                },
                None => {
                    println!("  ❌ Default provider '{}' not registered", config.default_provider);
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Provider setup failed: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No API key — export MISTRAL_API_KEY");
        issues += 1;
    }

    // Telegram
    match TelegramChannel::from_config(&config.telegram) {
        Ok(channel) => match channel.health_check().await {
            Ok(true) => println!("  ✅ Telegram bot token accepted"),
            Ok(false) => {
                println!("  ❌ Telegram rejected the bot token");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Telegram unreachable: {e}");
                issues += 1;
            }
        },
        Err(_) => {
            println!("  ⚠️  No Telegram token — `gradrelay run` needs TOKEN");
            issues += 1;
        }
    }

    // Reference sources
    let loader = ReferenceLoader::new(
        Duration::from_secs(config.reference.fetch_timeout_secs),
        config.reference.max_chars,
    )?;
    for source in &config.reference.sources {
        match loader.fetch(source).await {
            Ok(text) => println!("  ✅ {source} ({} chars)", text.chars().count()),
            Err(e) => {
                println!("  ❌ {e}");
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
