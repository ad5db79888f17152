//! # Configuration Module
//!
//! Server, assistant and recovery settings, read from environment variables
//! (a `.env` file is loaded first by the binary). Every setting except the
//! API key has a default.

use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::localization::DEFAULT_LANGUAGE;

// Constants for server configuration
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:3000,http://localhost:19006,http://localhost:8081";
pub const DEFAULT_MAX_PAYLOAD_MB: usize = 10;
pub const DEFAULT_DATA_DIR: &str = "./data";

// Constants for the chat-completion API
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_TOKENS: u32 = 250;

/// Retry and circuit breaker settings for calls to the chat-completion API
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,  // 0.5 seconds
            max_retry_delay_ms: 5_000, // 5 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Chat-completion API settings
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL up to and including the API version, without trailing slash
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub recovery: RecoveryConfig,
}

impl ChatConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_tokens: DEFAULT_MAX_TOKENS,
            recovery: RecoveryConfig::default(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deployment environment name ("development", "production", ...)
    pub environment: String,
    pub bind_address: String,
    pub port: u16,
    /// Origins allowed by CORS; "*" allows any
    pub allowed_origins: Vec<String>,
    /// Request body limit in megabytes
    pub max_payload_mb: usize,
    /// Directory holding the persisted snapshot
    pub data_dir: PathBuf,
    /// Language of user-facing replies
    pub language: String,
    pub chat: ChatConfig,
}

impl ServerConfig {
    /// Configuration suitable for tests and local runs
    pub fn with_api_key(api_key: &str) -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            max_payload_mb: DEFAULT_MAX_PAYLOAD_MB,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            language: DEFAULT_LANGUAGE.to_string(),
            chat: ChatConfig::new(api_key),
        }
    }

    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(api_key) = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty()) else {
            bail!("OPENAI_API_KEY is not set; add it to the environment or to a .env file");
        };

        let mut config = Self::with_api_key(api_key.trim());

        if let Some(environment) = lookup("CHEFCODE_ENV").or_else(|| lookup("NODE_ENV")) {
            config.environment = environment;
        }
        if let Some(bind) = lookup("BIND_ADDRESS") {
            config.bind_address = bind;
        }
        config.port = parse_or(&lookup, "PORT", DEFAULT_PORT);
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = split_origins(&origins);
        }
        config.max_payload_mb = parse_or(&lookup, "MAX_PAYLOAD_SIZE", DEFAULT_MAX_PAYLOAD_MB);
        if let Some(dir) = lookup("CHEFCODE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(language) = lookup("CHEFCODE_LANG") {
            config.language = language;
        }

        if let Some(model) = lookup("OPENAI_MODEL") {
            config.chat.model = model;
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            config.chat.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.chat.timeout_ms = parse_or(&lookup, "OPENAI_TIMEOUT", DEFAULT_TIMEOUT_MS);
        config.chat.max_tokens = parse_or(&lookup, "OPENAI_MAX_TOKENS", DEFAULT_MAX_TOKENS);

        Ok(config)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_mb * 1024 * 1024
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a variable, keeping the default when it is missing or malformed
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Ignoring malformed setting");
            default
        }),
        None => default,
    }
}
