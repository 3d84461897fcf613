use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_telegram_config")]
    pub telegram: TelegramConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_replies_config")]
    pub replies: RepliesConfig,
}

#[derive(Deserialize, Clone)]
pub struct TelegramConfig {
    /// Usually left out of the file and supplied through `TELEGRAM_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

// Hand-written so the token never ends up in a log line.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The two canned answers the bot knows.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RepliesConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_fallback")]
    pub fallback: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        default_replies_config()
    }
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_greeting() -> String {
    "Привет! Я помогу вам забронировать тур в зоопарк. Напишите, что вас интересует!".to_string()
}

fn default_fallback() -> String {
    "Извините, я пока вас не понял. Попробуйте написать что-то другое.".to_string()
}

fn default_telegram_config() -> TelegramConfig {
    TelegramConfig {
        bot_token: String::new(),
        api_url: default_api_url(),
    }
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_replies_config() -> RepliesConfig {
    RepliesConfig {
        greeting: default_greeting(),
        fallback: default_fallback(),
    }
}

impl Config {
    /// Load the optional TOML file at `path`, then apply overrides from the
    /// process environment. A missing file just means "defaults".
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    fn load_with_env<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?
        } else {
            String::new()
        };

        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env(env)?;
        config.validate()?;

        Ok(config)
    }

    fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(url) = non_empty("TELEGRAM_API_URL") {
            self.telegram.api_url = url;
        }
        if let Some(host) = non_empty("HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!(
                "Telegram bot token is not set (export TELEGRAM_BOT_TOKEN or set [telegram] bot_token)"
            );
        }
        Ok(())
    }
}
