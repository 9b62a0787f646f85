//! Career-coaching agents on top of Gemini.
//!
//! - `Agent`: a tool-calling loop with retries, rollback and an optional
//!   history window
//! - `ToolSpec` / `ToolContext`: tool registry, argument validation and
//!   dependency injection
//! - `GoogleModel`: the Gemini `generateContent` adapter
//! - `coach`: single-shot coaching services and the conversational
//!   `CareerAssistant`

pub mod agent;
pub mod coach;
pub mod config;
pub mod error;
pub mod llm;
pub mod structured;
pub mod tools;

pub use agent::{Agent, AgentBuilder, AgentConfig, AgentEvent, backoff_delay};
pub use coach::{CareerAssistant, CareerCoach, CoachUi, ModelCatalog, ModelTier, ProfileData};
pub use config::Settings;
pub use error::{AgentError, CoachError, ConfigError, ProviderError, SchemaError, ToolError};
pub use llm::{
    ChatModel, GenerationSettings, GoogleModel, GoogleModelConfig, ModelCompletion, ModelMessage,
    ModelToolCall, ModelToolChoice, ModelToolDefinition, ToolPayload, ToolResponse,
};
pub use structured::{extract_json_array, parse_json, strip_code_fences};
pub use tools::{ToolContext, ToolSpec};
