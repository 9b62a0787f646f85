mod google;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ProviderError;

pub use google::{GoogleModel, GoogleModelConfig};

/// Per-agent generation parameters, fixed when the agent is built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
    pub thinking_budget: Option<u32>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
    /// Ground answers with the provider's web search.
    pub google_search: bool,
}

impl GenerationSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn has_response_schema(&self) -> bool {
        self.response_schema.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelMessage {
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ModelToolCall>,
    },
    /// One batch of function responses, answering every call of the
    /// preceding assistant turn.
    ToolResults(Vec<ToolResponse>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// Opaque provider token that must be echoed when the call is replayed
    /// in history (Gemini `thoughtSignature`).
    pub thought_signature: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub payload: ToolPayload,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolPayload {
    Result(Value),
    Error(String),
}

impl ToolPayload {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Result(value) => json!({ "result": value }),
            Self::Error(message) => json!({ "error": message }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelToolChoice {
    Auto,
    None,
}

#[derive(Clone, Copy, Debug)]
pub struct ModelRequest<'a> {
    pub settings: &'a GenerationSettings,
    pub messages: &'a [ModelMessage],
    pub tools: &'a [ModelToolDefinition],
    pub tool_choice: &'a ModelToolChoice,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelCompletion {
    pub text: Option<String>,
    pub thinking: Option<String>,
    pub tool_calls: Vec<ModelToolCall>,
    pub usage: Option<ModelUsage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<ModelCompletion, ProviderError>;
}
