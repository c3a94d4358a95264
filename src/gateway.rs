//! Chat-completion gateway: one outbound request per reply.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::GatewayConfig;
use crate::session::{ConversationTurn, Role};

/// Broad category of a failed completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Transport,
    Authentication,
    Provider,
    MalformedResponse,
    EmptyReply,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Anything that can turn a persona plus a conversation into the next reply.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn generate_reply(
        &self,
        history: &[ConversationTurn],
        persona_instructions: &str,
    ) -> Result<String, GatewayError>;
}

// Structures matching the OpenAI-compatible /chat/completions endpoint
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_completion_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

fn build_messages<'a>(history: &'a [ConversationTurn], persona: &'a str) -> Vec<WireMessage<'a>> {
    std::iter::once(WireMessage {
        role: "system",
        content: persona,
    })
    .chain(history.iter().map(|turn| WireMessage {
        role: match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: &turn.content,
    }))
    .collect()
}

/// Gateway backed by Groq's OpenAI-compatible HTTP API.
pub struct GroqGateway {
    client: Client,
    config: GatewayConfig,
}

impl GroqGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionGateway for GroqGateway {
    #[instrument(skip(self, history, persona_instructions), fields(model = %self.config.model, turns = history.len()))]
    async fn generate_reply(
        &self,
        history: &[ConversationTurn],
        persona_instructions: &str,
    ) -> Result<String, GatewayError> {
        let url = self.config.completions_url();
        let request_payload = ChatCompletionRequest {
            model: &self.config.model,
            messages: build_messages(history, persona_instructions),
            temperature: self.config.temperature,
            max_completion_tokens: self.config.max_completion_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request_payload)
            .send()
            .await
            .map_err(|e| {
                GatewayError::new(
                    GatewayErrorKind::Transport,
                    format!("request failed: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "Completion API request failed");
            let kind = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayErrorKind::Authentication,
                _ => GatewayErrorKind::Provider,
            };
            return Err(GatewayError::new(
                kind,
                format!("provider returned {}: {}", status, error_body.trim()),
            ));
        }

        let completion = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| {
                GatewayError::new(
                    GatewayErrorKind::MalformedResponse,
                    format!("could not parse completion response: {}", e),
                )
            })?;

        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                GatewayError::new(GatewayErrorKind::EmptyReply, "provider returned no reply text")
            })?;

        debug!(reply_len = reply.len(), "Received completion");
        Ok(reply)
    }
}
