use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

use crate::models::chat::Persona;
use crate::models::websocket::PersonaSummary;

pub const DEFAULT_PERSONA_KEY: &str = "wise_scholar";

#[derive(Debug)]
pub enum PersonaError {
    PersonaNotFound(String),
    EmptyCatalog,
    DuplicateKey(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PersonaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaError::PersonaNotFound(key) => write!(f, "Persona '{}' not found", key),
            PersonaError::EmptyCatalog => write!(f, "Persona catalog is empty"),
            PersonaError::DuplicateKey(key) => write!(f, "Persona '{}' is defined twice", key),
            PersonaError::IoError(e) => write!(f, "Persona file IO error: {}", e),
            PersonaError::JsonError(e) => write!(f, "Persona JSON parsing error: {}", e),
        }
    }
}

impl std::error::Error for PersonaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersonaError::IoError(e) => Some(e),
            PersonaError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PersonaError {
    fn from(err: std::io::Error) -> Self {
        PersonaError::IoError(err)
    }
}

impl From<serde_json::Error> for PersonaError {
    fn from(err: serde_json::Error) -> Self {
        PersonaError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PersonaDefinition {
    pub key: String,
    #[serde(flatten)]
    pub persona: Persona,
}

/// The fixed set of personas offered by the picker, in display order.
#[derive(Deserialize, Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<PersonaDefinition>,
}

impl PersonaCatalog {
    pub fn builtin() -> Self {
        let entry = |key: &str, name: &str, description: &str, icon: &str| PersonaDefinition {
            key: key.to_string(),
            persona: Persona {
                name: name.to_string(),
                description: description.to_string(),
                icon: icon.to_string(),
            },
        };
        Self {
            personas: vec![
                entry(DEFAULT_PERSONA_KEY, "Professor Wole", "A wise AI with deep insights.", "🧠"),
                entry(
                    "friendly_companion",
                    "BFF",
                    "A warm and friendly AI that loves to chat.",
                    "😊"
                ),
                entry("mysterious_mentor", "GreatOne", "A cryptic AI that speaks in riddles.", "🔮")
            ],
        }
    }

    fn validate(&self) -> Result<(), PersonaError> {
        if self.personas.is_empty() {
            return Err(PersonaError::EmptyCatalog);
        }
        for (i, def) in self.personas.iter().enumerate() {
            if self.personas[..i].iter().any(|p| p.key == def.key) {
                return Err(PersonaError::DuplicateKey(def.key.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Persona, PersonaError> {
        self.personas
            .iter()
            .find(|p| p.key == key)
            .map(|p| &p.persona)
            .ok_or_else(|| PersonaError::PersonaNotFound(key.to_string()))
    }

    /// First persona of the catalog; the picker's initial selection.
    pub fn default_persona(&self) -> &Persona {
        &self.personas[0].persona
    }

    pub fn summaries(&self) -> Vec<PersonaSummary> {
        self.personas
            .iter()
            .map(|p| PersonaSummary {
                key: p.key.clone(),
                name: p.persona.name.clone(),
                description: p.persona.description.clone(),
                icon: p.persona.icon.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

pub fn load_personas<P: AsRef<Path>>(path: P) -> Result<Arc<PersonaCatalog>, PersonaError> {
    let file_content = fs::read_to_string(&path)?;
    let catalog: PersonaCatalog = serde_json::from_str(&file_content)?;
    catalog.validate()?;
    info!("Loaded {} personas from {}", catalog.len(), path.as_ref().display());
    Ok(Arc::new(catalog))
}

pub fn load_personas_or_builtin(path: Option<&str>) -> Result<Arc<PersonaCatalog>, PersonaError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_personas(p),
        _ => {
            info!("No persona file configured, using the built-in catalog.");
            Ok(Arc::new(PersonaCatalog::builtin()))
        }
    }
}
