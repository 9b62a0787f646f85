use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("tool schema must be a JSON object")]
    SchemaNotObject,
    #[error("tool schema must declare type=object")]
    RootTypeMustBeObject,
    #[error("required must be an array of strings")]
    InvalidRequired,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool {0} not found.")]
    NotFound(String),
    #[error("invalid tool arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("dependency missing: {0}")]
    MissingDependency(&'static str),
    #[error("{0}")]
    Execution(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Failure categories surfaced by a [`crate::llm::ChatModel`].
///
/// Retry decisions are made on the variant, never on the message text.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("content blocked: {0}")]
    ContentBlocked(String),
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider response invalid: {0}")]
    Response(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::ServiceUnavailable(_)
            | Self::Transport(_)
            | Self::Response(_) => true,
            Self::InvalidRequest(_) | Self::Authentication(_) | Self::ContentBlocked(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Model returned empty response.")]
    EmptyResponse,
    #[error("max iterations reached ({max_iterations})")]
    MaxIterationsReached { max_iterations: u32 },
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("{source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<AgentError>,
    },
    #[error("The AI returned a malformed JSON response. ({excerpt})")]
    MalformedResponse { excerpt: String },
    #[error("agent configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Whether a fresh attempt of the same message may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(err) => err.is_retryable(),
            Self::EmptyResponse | Self::Timeout(_) => true,
            Self::Tool(_)
            | Self::MaxIterationsReached { .. }
            | Self::RetriesExhausted { .. }
            | Self::MalformedResponse { .. }
            | Self::Config(_) => false,
        }
    }

    /// Server-requested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(ProviderError::RateLimited { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }

    /// The innermost error once retry wrappers are peeled off.
    pub fn root(&self) -> &AgentError {
        match self {
            Self::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("no Gemini API key configured (set GEMINI_API_KEY or api_key)")]
    MissingApiKey,
    #[error("failed to build the model client: {0}")]
    Client(#[from] ProviderError),
}

/// Errors from the coaching services layered over the agent.
#[derive(Debug, Error)]
pub enum CoachError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Scraping failed with code: {code}")]
    Scrape { code: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl CoachError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
