//! Support-message generation from a score.
//!
//! The QR credential is forwarded as the bearer token as-is; its shape is never checked.

mod canned;

use std::time::Duration;

use async_trait::async_trait;
use nageyell_types::{
    config::{GeneratorConfig, GeneratorKind},
    NageError, Result,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use canned::CannedGenerator;

#[async_trait]
pub trait MessageGenerator: Send + Sync {
    /// Produces a short, positive support message for `point`.
    async fn generate(&self, credential: &str, point: i64) -> Result<String>;
}

/// Instruction sent to the model. Positive regardless of score, 10 to 80 characters.
pub fn prompt_for(point: i64) -> String {
    format!(
        "ライブパフォーマーを見たユーザーが、応援メッセージを送信します。\
         簡潔な感想文を1~1000のスコアを指定するので、そのスコアを元に感想文を生成してください。\
         生成文は10~80に収まるようにすること。\
         点が低くてもマイナスな意見は言わずに、ポジティブな回答をお願いします。スコア: {point}"
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible chat-completions client.
pub struct ChatCompletionsGenerator {
    client: Client,
    endpoint: String,
    model: String,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| generation_error(format!("http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }

    fn request_body(&self, point: i64) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt_for(point),
            }],
        }
    }
}

#[async_trait]
impl MessageGenerator for ChatCompletionsGenerator {
    async fn generate(&self, credential: &str, point: i64) -> Result<String> {
        info!("Requesting generated message for score {point}");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(&self.request_body(point))
            .send()
            .await
            .map_err(|err| generation_error(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| generation_error(err.to_string()))?;
        if !status.is_success() {
            return Err(generation_error(format!("HTTP {status}: {body}")));
        }
        debug!("Generation response: {} bytes", body.len());
        extract_message(&body)
    }
}

/// First choice's content, or an error when the service returned nothing usable.
fn extract_message(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|err| generation_error(format!("生成されたデータが不正です: {err}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| generation_error("生成されたデータが不正です。"))
}

/// Generator selected by configuration.
pub enum ConfiguredGenerator {
    Chat(ChatCompletionsGenerator),
    Canned(CannedGenerator),
}

impl ConfiguredGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Ok(match config.kind {
            GeneratorKind::ChatCompletions => Self::Chat(ChatCompletionsGenerator::new(config)?),
            GeneratorKind::Canned => Self::Canned(CannedGenerator::new()),
        })
    }
}

#[async_trait]
impl MessageGenerator for ConfiguredGenerator {
    async fn generate(&self, credential: &str, point: i64) -> Result<String> {
        match self {
            Self::Chat(inner) => inner.generate(credential, point).await,
            Self::Canned(inner) => inner.generate(credential, point).await,
        }
    }
}

pub fn generation_error(message: impl Into<String>) -> NageError {
    NageError::Generation(message.into())
}
