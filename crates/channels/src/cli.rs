//! CLI channel — interactive terminal-based chat.
//!
//! Reads questions line by line and writes each answer back. Used for
//! `gradrelay chat`.

use async_trait::async_trait;
use gradrelay_core::channel::{Channel, ChannelId, ChannelMessage};
use gradrelay_core::error::ChannelError;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

type Input = Box<dyn AsyncBufRead + Send + Unpin>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// The chat id every terminal message carries.
pub const CLI_CHAT_ID: &str = "local";
pub const CLI_SENDER_ID: &str = "local_user";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
    input: Mutex<Option<Input>>,
    output: Mutex<Output>,
}

impl CliChannel {
    /// Chat over stdin/stdout.
    pub fn new() -> Self {
        Self::with_io(BufReader::new(io::stdin()), io::stdout())
    }

    pub fn with_io(
        input: impl AsyncBufRead + Send + Unpin + 'static,
        output: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            id: ChannelId("cli".into()),
            input: Mutex::new(Some(Box::new(input))),
            output: Mutex::new(Box::new(output)),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let input = self
            .input
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::NotConfigured("terminal input already in use".into()))?;

        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let mut lines = input.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if is_exit(&line) {
                            break;
                        }

                        let msg = ChannelMessage {
                            channel_id: channel_id.clone(),
                            sender_id: CLI_SENDER_ID.into(),
                            sender_name: None,
                            content: line,
                            chat_id: CLI_CHAT_ID.into(),
                            message_id: None,
                        };

                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut out = self.output.lock().await;
        let write = async {
            out.write_all(content.as_bytes()).await?;
            out.write_all(b"\n\n").await?;
            out.flush().await
        };
        write.await.map_err(|e| ChannelError::DeliveryFailed {
            channel: "cli".into(),
            reason: e.to_string(),
        })
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // local user
    }
}
