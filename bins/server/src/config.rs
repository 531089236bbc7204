use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use feed_api::{OverflowPolicy, TransportKind};
use history_helius::HistoryConfig;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "feed-server", about = "Live transaction feed: webhook ingestion and fan-out")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "FEED_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Сколько последних транзакций держать в памяти.
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
    /// Интервал keep-alive кадров для открытых соединений.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Размер очереди на одно клиентское соединение.
    #[serde(default = "default_conn_buffer")]
    pub conn_buffer: usize,
    /// Стратегия переполнения клиентской очереди.
    #[serde(default = "default_conn_overflow")]
    pub conn_overflow: OverflowPolicy,
    #[serde(default = "default_transports")]
    pub transports: Vec<TransportKind>,
    #[serde(default)]
    pub history: Option<HistoryConfig>,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_api_port() -> u16 {
    3000
}
fn default_store_capacity() -> usize {
    feed_api::DEFAULT_STORE_CAPACITY
}
fn default_keepalive_secs() -> u64 {
    30
}
fn default_conn_buffer() -> usize {
    256
}
fn default_conn_overflow() -> OverflowPolicy {
    OverflowPolicy::Drop
}
fn default_transports() -> Vec<TransportKind> {
    vec![TransportKind::Sse, TransportKind::WebSocket]
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::Config { context: "parse", detail: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        let invalid = |detail: &str| ServerError::Config { context: "validate", detail: detail.into() };
        if self.store_capacity == 0 {
            return Err(invalid("store_capacity must be > 0"));
        }
        if self.keepalive_secs == 0 {
            return Err(invalid("keepalive_secs must be > 0"));
        }
        if self.conn_buffer == 0 {
            return Err(invalid("conn_buffer must be > 0"));
        }
        if self.transports.is_empty() {
            return Err(invalid("at least one transport must be enabled"));
        }
        Ok(())
    }
}
