//! Persona replies from an OpenAI-compatible
//! chat-completions endpoint (Groq by default).
//!
//! Each call is independent: the persona instruction goes in as the system
//! message, followed by whatever `context` the caller passes and the new user
//! message. Nothing is retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use parley_core::types::{LlmConfig, Message, Role};

use crate::error::{Error, Result};

const SERVICE: &str = "language model";

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generate the persona's reply to `user_text`.
    ///
    /// `context` holds earlier turns to resend; it is empty in single-turn mode.
    async fn generate(
        &self,
        instruction: &str,
        context: &[Message],
        user_text: &str,
    ) -> Result<String>;
}

/// Client for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

fn build_messages<'a>(
    instruction: &'a str,
    context: &'a [Message],
    user_text: &'a str,
) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: instruction,
    });
    for m in context {
        messages.push(ChatMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &m.content,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: user_text,
    });
    messages
}

#[async_trait]
impl ResponseGenerator for ChatCompletionsClient {
    async fn generate(
        &self,
        instruction: &str,
        context: &[Message],
        user_text: &str,
    ) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(Error::MissingCredential(SERVICE))?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: build_messages(instruction, context, user_text),
            temperature: self.config.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(
            "llm: POST {} turns={} chars={}",
            self.config.model,
            body.messages.len(),
            user_text.len()
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::from_reqwest(SERVICE, e))?;
        if !status.is_success() {
            warn!("llm: backend error {status}");
            return Err(Error::Http {
                service: SERVICE,
                status,
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(Error::EmptyResponse(SERVICE))
    }
}
