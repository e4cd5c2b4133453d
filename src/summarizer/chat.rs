use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::SummaryProvider;
use crate::error::ProviderError;
use crate::settings::Settings;

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 500;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const MISTRAL_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Client for OpenAI-compatible chat-completions APIs (OpenAI, Mistral).
#[derive(Debug)]
pub struct ChatProvider {
    name: &'static str,
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl ChatProvider {
    pub fn new(
        name: &'static str,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(ChatProvider {
            name,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Build a known provider by name, reading its API key from the environment.
    pub fn from_env(name: &str, settings: &Settings) -> Result<Self, ProviderError> {
        let (name, endpoint, key_var, model) = match name.to_lowercase().as_str() {
            "openai" => ("openai", OPENAI_ENDPOINT, "OPENAI_API_KEY", &settings.openai_model),
            "mistral" => ("mistral", MISTRAL_ENDPOINT, "MISTRAL_API_KEY", &settings.mistral_model),
            other => {
                return Err(ProviderError::RequestFailed(format!(
                    "unsupported provider: {}",
                    other
                )))
            }
        };
        let api_key = std::env::var(key_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey(key_var))?;
        let timeout = Duration::from_secs(settings.request_timeout_secs);
        Self::new(name, endpoint, api_key, model.clone(), timeout)
    }
}

/// Environment variable holding the API key of a known provider.
pub fn api_key_var(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        _ => None,
    }
}

#[async_trait]
impl SummaryProvider for ChatProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug!(provider = self.name, model = %self.model, "sending chat completion");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("{} API error ({}): {}", self.name, status, message);
            return Err(status_error(status, message));
        }

        let body: ChatResponse = response.json().await?;
        parse_completion(body)
    }
}

fn status_error(status: StatusCode, message: String) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::Api {
            status_code: status.as_u16(),
            message,
        }
    }
}

fn parse_completion(body: ChatResponse) -> Result<String, ProviderError> {
    let content = body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        Err(ProviderError::EmptyCompletion)
    } else {
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape() {
        let request = ChatRequest {
            model: "mistral-tiny",
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "mistral-tiny");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_first_choice() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  • one\n• two  "}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_completion(body).unwrap(), "• one\n• two");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(parse_completion(body), Err(ProviderError::EmptyCompletion)));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad key".into()),
            ProviderError::Api { status_code: 401, .. }
        ));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(ChatProvider::from_env("llama", &Settings::default()).is_err());
        assert_eq!(api_key_var("OpenAI"), Some("OPENAI_API_KEY"));
        assert_eq!(api_key_var("llama"), None);
    }
}
