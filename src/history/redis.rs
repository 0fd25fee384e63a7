use async_trait::async_trait;
use ::redis::{ AsyncCommands, Client, IntoConnectionInfo, Script };
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

use super::{ Document, DocumentStore, SwapOutcome };
use crate::config::StoreCredentials;
use crate::error::{ ChatError, ChatResult };

// Returns -1 once written, otherwise the length actually stored.
const SWAP_ARRAY_SCRIPT: &str =
    r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
local len = 0
if current then
  local ok, decoded = pcall(cjson.decode, current)
  if ok and type(decoded) == 'table' then
    len = #decoded
  end
end
if len ~= tonumber(ARGV[2]) then
  return len
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
return -1
"#;

/// Documents live in Redis hashes: one hash per key, one JSON-encoded value
/// per top-level field. A merge write is an `HSET` of only the fields given.
pub struct RedisDocumentStore {
    client: Client,
    swap_script: Script,
}

impl RedisDocumentStore {
    pub fn new(creds: &StoreCredentials) -> ChatResult<Self> {
        let mut info = creds.url
            .as_str()
            .into_connection_info()
            .map_err(|e| ChatError::Configuration(format!("Invalid store url: {}", e)))?;
        if let Some(username) = &creds.username {
            info.redis.username = Some(username.clone());
        }
        if let Some(password) = &creds.password {
            info.redis.password = Some(password.clone());
        }
        if let Some(db) = creds.database {
            info.redis.db = db;
        }

        Ok(Self {
            client: Client::open(info).map_err(|e|
                ChatError::Configuration(format!("Invalid store credentials: {}", e))
            )?,
            swap_script: Script::new(SWAP_ARRAY_SCRIPT),
        })
    }

    async fn get_connection(&self) -> Result<::redis::aio::MultiplexedConnection, ::redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

fn encode_fields(document: &Document) -> ChatResult<Vec<(String, String)>> {
    document
        .iter()
        .map(|(field, value)| {
            serde_json
                ::to_string(value)
                .map(|json| (field.clone(), json))
                .map_err(|e| ChatError::StoreUnavailable(format!("Failed to encode field '{}': {}", field, e)))
        })
        .collect()
}

fn decode_fields(fields: HashMap<String, String>) -> Document {
    fields
        .into_iter()
        .map(|(field, raw)| {
            // Fields written by other tools may not be JSON.
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (field, value)
        })
        .collect()
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get(&self, key: &str) -> ChatResult<Option<Document>> {
        let mut conn = self.get_connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode_fields(fields)))
    }

    async fn set(&self, key: &str, document: Document, merge: bool) -> ChatResult<()> {
        let items = encode_fields(&document)?;
        let mut conn = self.get_connection().await?;
        debug!("Writing {} field(s) to {} (merge: {})", items.len(), key, merge);

        if merge {
            if !items.is_empty() {
                conn.hset_multiple::<_, _, _, ()>(key, &items[..]).await?;
            }
            return Ok(());
        }

        let mut pipe = ::redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.hset_multiple(key, &items[..]).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn set_array_if_len(
        &self,
        key: &str,
        field: &str,
        expected_len: usize,
        value: Vec<Value>
    ) -> ChatResult<SwapOutcome> {
        let payload = serde_json
            ::to_string(&Value::Array(value))
            .map_err(|e| ChatError::StoreUnavailable(format!("Failed to encode field '{}': {}", field, e)))?;
        let mut conn = self.get_connection().await?;

        let result: i64 = self.swap_script
            .key(key)
            .arg(field)
            .arg(expected_len)
            .arg(payload)
            .invoke_async(&mut conn).await?;

        if result < 0 {
            Ok(SwapOutcome::Written)
        } else {
            Ok(SwapOutcome::Stale { found: result as usize })
        }
    }
}
