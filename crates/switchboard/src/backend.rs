//! HTTP generation backend for OpenAI-compatible chat-completions servers.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_coordination::swarm::{BackendError, BackendResult, GenerationBackend};
use switchboard_coordination::ContextMap;
use tracing::debug;

use crate::config::BackendConfig;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
}

pub struct HttpBackend {
    http: reqwest::Client,
    config: BackendConfig,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, reqwest::Error> {
        let api_key = config.api_key();
        Ok(Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()?,
            config,
            api_key,
        })
    }

    fn request<'a>(&'a self, agent_id: &str, prompt: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!("You are the {agent_id} agent."),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

/// Answer text of the first choice; reasoning-only replies return the
/// reasoning.
fn extract_content(response: ChatResponse) -> BackendResult<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::InvalidResponse("response has no choices".into()))?;
    match (choice.message.content, choice.message.reasoning_content) {
        (Some(content), _) if !content.trim().is_empty() => Ok(content),
        (_, Some(reasoning)) if !reasoning.trim().is_empty() => Ok(reasoning),
        _ => Err(BackendError::InvalidResponse("empty message content".into())),
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn invoke(
        &self,
        agent_id: &str,
        prompt: &str,
        _context: &ContextMap,
        timeout: Duration,
    ) -> BackendResult<String> {
        debug!(agent = agent_id, url = %self.config.url, "Sending chat completion");
        let mut builder = self
            .http
            .post(&self.config.url)
            .timeout(timeout)
            .json(&self.request(agent_id, prompt));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(timeout)
            } else {
                BackendError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        extract_content(parsed)
    }
}
