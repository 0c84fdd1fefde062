//! Chat channel implementations for gradrelay.
//!
//! Each channel connects to a chat platform and hands inbound text to the
//! relay's dispatcher. Available channels:
//! - **Telegram** — Bot API long polling
//! - **CLI** — interactive terminal chat (stdin/stdout)

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::TelegramChannel;
