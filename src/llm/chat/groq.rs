use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};

use super::{first_choice, ChatClient, CompletionResponse};
use crate::error::ChatError;
use crate::llm::LlmConfig;
use crate::models::chat::PromptMessage;

pub struct GroqChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize)]
struct GroqMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct GroqRequest {
    messages: Vec<GroqMessage>,
    model: String,
    temperature: f32,
    #[serde(rename = "max_tokens")]
    max_tokens: u32,
}

#[derive(Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: GroqMessage,
}

impl GroqChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, ChatError> {
        let chat_model = model.unwrap_or_else(|| "mixtral-8x7b-32768".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.groq.com".to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ChatError::Configuration(format!("Invalid API key format: {}", e)))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::Configuration(format!("Failed to build Groq client: {}", e)))?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| ChatError::Configuration("Groq API key is required".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
        )
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn chat(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, ChatError> {
        let url = format!("{}/openai/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let req = GroqRequest {
            messages: messages
                .iter()
                .map(|m| GroqMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            model: self.model.clone(),
            temperature: 0.7,
            max_tokens: 1024,
        };

        debug!("Sending {} messages to Groq model {}", req.messages.len(), self.model);
        let resp = self.http.post(&url)
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<GroqResponse>()
            .await?;

        first_choice(resp.choices, "Groq", |c| c.message.content)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
