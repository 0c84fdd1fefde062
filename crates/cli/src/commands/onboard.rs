//! `gradrelay onboard` — First-time setup.

use super::runtime;
use gradrelay_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = runtime::config_path(config_path);

    println!("🎓 gradrelay — First-Time Setup");
    println!("===============================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Export MISTRAL_API_KEY (or set api_key in the config)");
    println!("   2. Export TOKEN with your Telegram bot token");
    println!("   3. Run: gradrelay doctor");
    println!("   4. Run: gradrelay run\n");

    Ok(())
}
