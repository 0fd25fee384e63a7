use serde::{ Serialize, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One line of a transcript. Never edited after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub message: String,
}

impl TranscriptEntry {
    pub fn user(message: impl Into<String>) -> Self {
        Self { role: Role::User, message: message.into() }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self { role: Role::Assistant, message: message.into() }
    }
}

/// Ordered, append-only log of entries for one identity.
pub type Transcript = Vec<TranscriptEntry>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

impl Persona {
    pub fn custom(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            icon: String::new(),
        }
    }

    pub fn system_instruction(&self) -> String {
        format!("You are {}, {}", self.name, self.description)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
        }
    }
}

/// A message in the request sent to the response-generation service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: PromptRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: PromptRole::User, content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_serialize_with_lowercase_roles() {
        let json = serde_json::to_value(TranscriptEntry::assistant("hello!")).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "assistant", "message": "hello!" }));
    }

    #[test]
    fn system_instruction_frames_the_persona() {
        let persona = Persona::custom("BFF", "A warm and friendly AI that loves to chat.");
        assert_eq!(
            persona.system_instruction(),
            "You are BFF, A warm and friendly AI that loves to chat."
        );
    }
}
