pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Groq,
    OpenAI,
    Ollama,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(LlmType::Groq),
            "openai" => Ok(LlmType::OpenAI),
            "ollama" => Ok(LlmType::Ollama),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::Groq => write!(f, "groq"),
            LlmType::OpenAI => write!(f, "openai"),
            LlmType::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("llm_type", &self.llm_type)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("completion_model", &self.completion_model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Groq,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

pub fn parse_llm_type(type_str: &str) -> Result<LlmType, String> {
    type_str.parse::<LlmType>().map_err(|_| format!("Unsupported LLM type: {}", type_str))
}
