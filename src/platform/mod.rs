pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A message received from any platform
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Platform identifier (e.g., "telegram")
    pub platform: String,
    /// Chat identifier exactly as the platform sent it
    pub chat_id: Value,
    /// The message text, if the message had one
    pub text: Option<String>,
}

/// Delivers one reply back to a chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: &Value, text: &str) -> Result<()>;
}
