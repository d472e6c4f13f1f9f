use std::cell::RefCell;
use std::fmt;

use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::service::errors::GatewayError;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_OUTCALL_CYCLES: u64 = 30_000_000_000;
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 64 * 1024;

/// Models the Groq provider can target.
#[derive(CandidType, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelId {
    #[default]
    Llama32_90bTextPreview,
    Llama32_90bVisionPreview,
    Llama32_11bTextPreview,
    Llama32_11bVisionPreview,
    Llama32_1bPreview,
    Llama32_3bPreview,
    Llama3_70b8192,
    Llama3_8b8192,
}

impl ModelId {
    pub const ALL: [ModelId; 8] = [
        ModelId::Llama32_90bTextPreview,
        ModelId::Llama32_90bVisionPreview,
        ModelId::Llama32_11bTextPreview,
        ModelId::Llama32_11bVisionPreview,
        ModelId::Llama32_1bPreview,
        ModelId::Llama32_3bPreview,
        ModelId::Llama3_70b8192,
        ModelId::Llama3_8b8192,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ModelId::Llama32_90bTextPreview => "llama-3.2-90b-text-preview",
            ModelId::Llama32_90bVisionPreview => "llama-3.2-90b-vision-preview",
            ModelId::Llama32_11bTextPreview => "llama-3.2-11b-text-preview",
            ModelId::Llama32_11bVisionPreview => "llama-3.2-11b-vision-preview",
            ModelId::Llama32_1bPreview => "llama-3.2-1b-preview",
            ModelId::Llama32_3bPreview => "llama-3.2-3b-preview",
            ModelId::Llama3_70b8192 => "llama3-70b-8192",
            ModelId::Llama3_8b8192 => "llama3-8b-8192",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(CandidType, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI-compatible Groq endpoint over HTTPS outcalls.
    #[default]
    Groq,
    /// The on-chain LLM canister; needs no key and ignores the model choice.
    LlmCanister,
}

/// Install/upgrade arguments. Every field falls back to its default.
#[derive(CandidType, Deserialize, Clone, Default)]
pub struct InitArgs {
    pub provider: Option<Provider>,
    pub api_key: Option<String>,
    pub outcall_cycles: Option<u64>,
    pub max_response_bytes: Option<u64>,
    pub temperature: Option<f32>,
}

#[derive(Clone, PartialEq)]
pub struct GatewayConfig {
    pub provider: Provider,
    api_key: Option<String>,
    pub outcall_cycles: u64,
    pub max_response_bytes: u64,
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            api_key: None,
            outcall_cycles: DEFAULT_OUTCALL_CYCLES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

// The key must never reach logs.
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("outcall_cycles", &self.outcall_cycles)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl From<InitArgs> for GatewayConfig {
    fn from(args: InitArgs) -> Self {
        let defaults = GatewayConfig::default();
        let mut config = Self {
            provider: args.provider.unwrap_or(defaults.provider),
            api_key: None,
            outcall_cycles: args.outcall_cycles.unwrap_or(defaults.outcall_cycles),
            max_response_bytes: args
                .max_response_bytes
                .unwrap_or(defaults.max_response_bytes),
            temperature: args.temperature.unwrap_or(defaults.temperature),
        };
        if let Some(key) = args.api_key {
            config.set_api_key(key);
        }
        config
    }
}

impl GatewayConfig {
    /// Stores the key; a blank key clears it.
    pub fn set_api_key(&mut self, key: String) {
        let key = key.trim().to_string();
        self.api_key = (!key.is_empty()).then_some(key);
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn api_key(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or(GatewayError::MissingSecret)
    }

    pub fn current() -> GatewayConfig {
        GATEWAY_CONFIG.with_borrow(|c| c.clone())
    }

    pub fn replace(config: GatewayConfig) {
        GATEWAY_CONFIG.with_borrow_mut(|c| *c = config);
    }

    pub fn update(f: impl FnOnce(&mut GatewayConfig)) {
        GATEWAY_CONFIG.with_borrow_mut(f);
    }
}

thread_local! {
    static GATEWAY_CONFIG: RefCell<GatewayConfig> = RefCell::new(GatewayConfig::default());
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConfigSummary {
    pub provider: Provider,
    pub default_model: ModelId,
    pub models: Vec<String>,
    pub api_key_configured: bool,
    pub temperature: f32,
}

impl From<&GatewayConfig> for ConfigSummary {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            provider: config.provider,
            default_model: ModelId::default(),
            models: ModelId::ALL.iter().map(|m| m.id().to_string()).collect(),
            api_key_configured: config.has_api_key(),
            temperature: config.temperature,
        }
    }
}
