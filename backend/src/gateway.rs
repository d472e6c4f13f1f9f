//! Structured completions: send a conversation to a language model and parse
//! the reply into a fixed response type.

mod groq;
mod llm_canister;

pub use groq::{transform_llm_response, GroqTransport, GROQ_CHAT_URL};
pub use llm_canister::LlmCanisterTransport;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{GatewayConfig, ModelId, Provider};
use crate::entities::{AiksUpdate, PromptMessage, Profession};
use crate::service::errors::GatewayError;

/// A reply shape the model is asked to produce.
pub trait ResponseSchema: DeserializeOwned + JsonSchema {
    const NAME: &'static str;
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct AssessmentResponse {
    pub next_question: String,
    pub analysis: String,
    pub aiks_updates: AiksUpdate,
    pub suggested_options: Vec<String>,
}

impl ResponseSchema for AssessmentResponse {
    const NAME: &'static str = "AssessmentResponse";
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct ProfessionResponse {
    pub professions: Vec<Profession>,
}

impl ResponseSchema for ProfessionResponse {
    const NAME: &'static str = "ProfessionResponse";
}

fn default_tone() -> String {
    "friendly".to_string()
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

impl ResponseSchema for ChatResponse {
    const NAME: &'static str = "ChatResponse";
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: ModelId,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
}

/// Moves one completion request to a model and returns its raw text.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: CompletionRequest) -> Result<String, GatewayError>;
}

pub enum ProviderTransport {
    Groq(GroqTransport),
    LlmCanister(LlmCanisterTransport),
}

impl ProviderTransport {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        match config.provider {
            Provider::Groq => Ok(Self::Groq(GroqTransport::new(
                config.api_key()?,
                config.outcall_cycles,
                config.max_response_bytes,
            ))),
            Provider::LlmCanister => Ok(Self::LlmCanister(LlmCanisterTransport)),
        }
    }
}

impl Transport for ProviderTransport {
    async fn send(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        match self {
            Self::Groq(t) => t.send(request).await,
            Self::LlmCanister(t) => t.send(request).await,
        }
    }
}

pub struct StructuredGateway<T> {
    transport: T,
    temperature: f32,
}

impl StructuredGateway<ProviderTransport> {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(StructuredGateway::new(ProviderTransport::from_config(config)?)
            .with_temperature(config.temperature))
    }
}

impl<T: Transport> StructuredGateway<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            temperature: crate::config::DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `system_prompt` followed by `conversation` and parses the reply
    /// as `R`. The reply is only checked structurally.
    pub async fn complete<R: ResponseSchema>(
        &self,
        model: ModelId,
        system_prompt: &str,
        conversation: &[PromptMessage],
    ) -> Result<R, GatewayError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(PromptMessage::system(schema_instruction::<R>(system_prompt)?));
        messages.extend_from_slice(conversation);
        debug!(
            schema = R::NAME,
            %model,
            messages = messages.len(),
            "sending structured completion"
        );

        let raw = self
            .transport
            .send(CompletionRequest {
                model,
                messages,
                temperature: self.temperature,
            })
            .await?;

        parse_reply::<R>(&raw).inspect_err(|err| {
            warn!(schema = R::NAME, reply_len = raw.len(), %err, "unusable model reply");
        })
    }
}

fn schema_instruction<R: ResponseSchema>(system_prompt: &str) -> Result<String, GatewayError> {
    let schema = serde_json::to_string(&schema_for!(R))
        .map_err(|err| GatewayError::provider(format!("cannot render {} schema: {err}", R::NAME)))?;
    Ok(format!(
        "{}\n\nRespond with exactly one JSON object and nothing else. \
         The object must match this JSON schema:\n{schema}",
        system_prompt.trim()
    ))
}

/// Strict parse of a reply, tolerating only surrounding whitespace and a
/// Markdown code fence.
pub fn parse_reply<R: ResponseSchema>(raw: &str) -> Result<R, GatewayError> {
    let body = strip_code_fence(raw.trim());
    serde_json::from_str(body).map_err(|err| GatewayError::schema_violation(R::NAME, err))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
