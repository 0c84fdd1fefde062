//! `gradrelay chat` — Interactive or single-message chat from the terminal.

use super::runtime;
use gradrelay_channels::cli::{CLI_CHAT_ID, CLI_SENDER_ID};
use gradrelay_channels::CliChannel;
use gradrelay_relay::{Dispatcher, SessionKeyPolicy};
use std::path::Path;
use std::sync::Arc;

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    runtime::require_api_key(&config)?;

    let relay = runtime::build_relay(&config).await?;
    let sessions = SessionKeyPolicy::from_config(&config.session);

    if let Some(msg) = message {
        // Single message mode
        let session = sessions.key("cli", CLI_CHAT_ID, CLI_SENDER_ID);
        eprint!("  Thinking...");
        let reply = relay.on_message(&session, &msg).await;
        eprint!("\r              \r");
        println!("{reply}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         gradrelay — Interactive Chat         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:    {}", config.default_provider);
    println!("  Model:       {}", config.default_model);
    println!("  References:  {}", relay.assembler().references().len());
    println!();
    println!("{}", relay.on_start());
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    Dispatcher::new(relay, Arc::new(CliChannel::new()), sessions)
        .serve(runtime::ctrl_c())
        .await?;

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}
