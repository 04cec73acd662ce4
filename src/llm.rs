//! Minimal OpenAI-compatible chat completions client.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{ForgeError, Result};

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct ChatClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Build from config, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ForgeError::MissingConfig(format!(
                    "{} environment variable is not set",
                    config.api_key_env
                ))
            })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        if config.base_url.starts_with("http://") {
            tracing::warn!("LLM endpoint uses unencrypted HTTP. The API key will be sent in plain text.");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ForgeError::Config(format!("llm http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// One system + user exchange; returns the first choice's text.
    pub fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!(model = %self.model, prompt_chars = user_prompt.len(), "chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|err| ForgeError::Generation(format!("llm request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ForgeError::Generation(format!(
                "llm HTTP {status}: {}",
                body.chars().take(300).collect::<String>()
            )));
        }

        let response: ChatResponse = response
            .json()
            .map_err(|err| ForgeError::Generation(format!("llm response parse: {err}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ForgeError::Generation("llm returned empty content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> ChatClient {
        let config = LlmConfig {
            base_url: format!("{}/api/v1", server.base_url()),
            model: "test/model".to_string(),
            ..LlmConfig::default()
        };
        ChatClient::new(&config, "secret").unwrap()
    }

    #[test]
    fn returns_first_choice() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/chat/completions")
                .header("authorization", "Bearer secret");
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            }));
        });
        let text = client(&server).complete("sys", "user").unwrap();
        mock.assert();
        assert_eq!(text, "hello");
    }

    #[test]
    fn empty_content_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/chat/completions");
            then.status(200)
                .json_body(json!({"choices": [{"message": {"content": null}}]}));
        });
        let err = client(&server).complete("sys", "user").unwrap_err();
        assert!(matches!(err, ForgeError::Generation(_)));
    }

    #[test]
    fn http_error_carries_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/chat/completions");
            then.status(429).body("rate limited");
        });
        let err = client(&server).complete("sys", "user").unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }
}
