use serde::{ Serialize, Deserialize };
use crate::models::chat::{ Role, TranscriptEntry };

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "select_persona")] SelectPersona {
        persona: String,
    },
    #[serde(rename = "custom_persona")] CustomPersona {
        name: String,
        description: String,
    },
    #[serde(rename = "login")] Login {
        name: String,
    },
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "clear")]
    Clear,
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PersonaSummary {
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")] Welcome {
        identity: String,
        personas: Vec<PersonaSummary>,
    },
    #[serde(rename = "persona_selected")] PersonaSelected {
        name: String,
        description: String,
    },
    #[serde(rename = "logged_in")] LoggedIn {
        display_name: String,
    },
    #[serde(rename = "transcript")] Transcript {
        entries: Vec<TranscriptEntry>,
    },
    #[serde(rename = "entry")] Entry {
        role: Role,
        message: String,
        timestamp: i64,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "error")] Error {
        kind: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error { kind: kind.to_string(), message: message.into() }
    }
}
