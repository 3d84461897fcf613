use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::platform::{IncomingMessage, MessageSender};

/// The subset of a Telegram `Update` the bot looks at. Everything else in
/// the payload (edited messages, callbacks, user info) is ignored.
#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    /// Kept as a raw value so a non-string `text` does not reject the update.
    #[serde(default)]
    pub text: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub id: Value,
}

impl Update {
    /// Platform-neutral view of the update, or `None` when there is nobody
    /// to answer.
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        if message.chat.id.is_null() {
            return None;
        }

        let text = match message.text {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        Some(IncomingMessage {
            platform: "telegram".to_string(),
            chat_id: message.chat.id,
            text,
        })
    }
}

/// Body of a Bot API `sendMessage` call.
#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: &'a Value,
    pub text: &'a str,
}

/// Minimal Bot API client: one endpoint, one shared connection pool.
pub struct TelegramClient {
    client: reqwest::Client,
    send_url: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        let send_url = format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.bot_token
        );
        Self {
            client: reqwest::Client::new(),
            send_url,
        }
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, chat_id: &Value, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };

        debug!("Sending message to chat {}", chat_id);

        // without_url: the request URL carries the bot token
        let response = self
            .client
            .post(&self.send_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to send request to Telegram")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error ({}): {}", status, error_body);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const TOKEN: &str = "test-token";

    fn parse(body: Value) -> Option<IncomingMessage> {
        serde_json::from_value::<Update>(body)
            .ok()
            .and_then(Update::into_incoming)
    }

    /// Stand-in for api.telegram.org that records every sendMessage body.
    async fn spawn_api(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let app = Router::new().route(
            "/bottest-token/sendMessage",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().await.push(body);
                    (status, Json(json!({ "ok": status.is_success() })))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), received)
    }

    fn client_for(api_url: &str) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            bot_token: TOKEN.to_string(),
            api_url: api_url.to_string(),
        })
    }

    #[test]
    fn test_message_with_text() {
        let incoming = parse(json!({"message": {"chat": {"id": 42}, "text": "/start"}})).unwrap();
        assert_eq!(incoming.platform, "telegram");
        assert_eq!(incoming.chat_id, json!(42));
        assert_eq!(incoming.text.as_deref(), Some("/start"));
    }

    #[test]
    fn test_message_without_text() {
        let incoming = parse(json!({"message": {"chat": {"id": 7}, "photo": []}})).unwrap();
        assert_eq!(incoming.text, None);
    }

    #[test]
    fn test_non_string_text_is_treated_as_absent() {
        let incoming = parse(json!({"message": {"chat": {"id": 7}, "text": 12}})).unwrap();
        assert_eq!(incoming.text, None);
    }

    #[test]
    fn test_string_chat_id_is_kept_verbatim() {
        let incoming =
            parse(json!({"message": {"chat": {"id": "@zoo_channel"}, "text": "hi"}})).unwrap();
        assert_eq!(incoming.chat_id, json!("@zoo_channel"));
    }

    #[test]
    fn test_update_without_message() {
        assert_eq!(parse(json!({})), None);
        assert_eq!(parse(json!({"update_id": 1, "edited_message": {}})), None);
    }

    #[test]
    fn test_message_without_chat_id() {
        assert_eq!(parse(json!({"message": {"chat": {}, "text": "hi"}})), None);
        assert_eq!(parse(json!({"message": {"chat": {"id": null}}})), None);
    }

    #[test]
    fn test_malformed_message_fails_to_parse() {
        assert_eq!(parse(json!({"message": "hello"})), None);
        assert_eq!(parse(json!({"message": {"text": "no chat"}})), None);
    }

    #[test]
    fn test_send_request_shape() {
        let chat_id = json!(42);
        let body = serde_json::to_value(SendMessageRequest {
            chat_id: &chat_id,
            text: "hello",
        })
        .unwrap();
        assert_eq!(body, json!({"chat_id": 42, "text": "hello"}));
    }

    #[tokio::test]
    async fn test_send_message_posts_chat_id_and_text() {
        let (api_url, received) = spawn_api(StatusCode::OK).await;
        let client = client_for(&api_url);

        client.send_message(&json!(42), "Привет").await.unwrap();

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], json!({"chat_id": 42, "text": "Привет"}));
    }

    #[tokio::test]
    async fn test_trailing_slash_in_api_url() {
        let (api_url, received) = spawn_api(StatusCode::OK).await;
        let client = client_for(&format!("{api_url}/"));

        client.send_message(&json!("7"), "hi").await.unwrap();

        assert_eq!(received.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (api_url, _received) = spawn_api(StatusCode::BAD_REQUEST).await;
        let client = client_for(&api_url);

        let err = client.send_message(&json!(1), "hi").await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        // Bind then drop to get a port nobody is listening on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}"));
        let err = client.send_message(&json!(1), "hi").await.unwrap_err();
        assert!(!format!("{:#}", err).contains(TOKEN));
    }
}
