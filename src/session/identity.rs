use serde::{ Deserialize, Serialize };
use std::fmt;
use uuid::Uuid;

use crate::error::ChatError;

/// Opaque token naming the owner of a transcript. Not authenticated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn generate() -> Self {
        Identity(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity(value)
    }
}

/// Trims `raw` and rejects names that are left empty.
pub fn validate_display_name(raw: &str) -> Result<String, ChatError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ChatError::Validation("Display name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}
