pub mod persona;

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::cli::Args;
use crate::error::ChatError;
use crate::llm::{ parse_llm_type, LlmConfig, LlmType };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Redis,
    Memory,
}

impl FromStr for StoreType {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreType::Redis),
            "memory" => Ok(StoreType::Memory),
            _ => Err(ChatError::Configuration(format!("Unsupported store type: '{}'", s))),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreType::Redis => write!(f, "redis"),
            StoreType::Memory => write!(f, "memory"),
        }
    }
}

/// How a transcript write reconciles with whatever is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// The whole array is replaced; a concurrent session's entries are lost.
    #[default]
    LastWriterWins,
    /// The write only lands if the stored array still has the length this
    /// session last saw.
    CompareAndSwap,
}

impl FromStr for WriteMode {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "last-writer-wins" | "lww" => Ok(WriteMode::LastWriterWins),
            "compare-and-swap" | "cas" => Ok(WriteMode::CompareAndSwap),
            _ => Err(ChatError::Configuration(format!("Unsupported store write mode: '{}'", s))),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::LastWriterWins => write!(f, "last-writer-wins"),
            WriteMode::CompareAndSwap => write!(f, "compare-and-swap"),
        }
    }
}

/// Credential bundle for the document store, supplied as JSON.
#[derive(Deserialize, Clone)]
pub struct StoreCredentials {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<i64>,
}

// Keeps the password out of logs.
impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

impl StoreCredentials {
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let creds: StoreCredentials = serde_json
            ::from_str(raw)
            .map_err(|e| ChatError::Configuration(format!("Malformed STORE_CREDENTIALS: {}", e)))?;
        if creds.url.trim().is_empty() {
            return Err(ChatError::Configuration("STORE_CREDENTIALS is missing 'url'".into()));
        }
        Ok(creds)
    }
}

/// Validated runtime configuration. Built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chat: LlmConfig,
    pub chat_timeout: Duration,
    pub store_type: StoreType,
    pub store_credentials: Option<StoreCredentials>,
    pub key_prefix: String,
    pub write_mode: WriteMode,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Result<Self, ChatError> {
        let llm_type = parse_llm_type(&args.chat_llm_type).map_err(ChatError::Configuration)?;
        let api_key = Some(args.chat_api_key.trim().to_string()).filter(|k| !k.is_empty());
        if api_key.is_none() && llm_type != LlmType::Ollama {
            return Err(
                ChatError::Configuration(
                    format!("CHAT_API_KEY is required for the {} provider", args.chat_llm_type)
                )
            );
        }
        if args.chat_timeout_secs == 0 {
            return Err(ChatError::Configuration("CHAT_TIMEOUT_SECS must be positive".into()));
        }

        let store_type: StoreType = args.store_type.parse()?;
        let store_credentials = match (&args.store_credentials, store_type) {
            (Some(raw), _) if !raw.trim().is_empty() => Some(StoreCredentials::parse(raw)?),
            (_, StoreType::Redis) => {
                return Err(
                    ChatError::Configuration(
                        "STORE_CREDENTIALS is required for the redis store".into()
                    )
                );
            }
            (_, StoreType::Memory) => None,
        };

        Ok(Self {
            chat: LlmConfig {
                llm_type,
                api_key,
                completion_model: args.chat_model.clone(),
                base_url: args.chat_base_url.clone(),
            },
            chat_timeout: Duration::from_secs(args.chat_timeout_secs),
            store_type,
            store_credentials,
            key_prefix: args.store_key_prefix.clone(),
            write_mode: args.store_write_mode.parse()?,
        })
    }
}
