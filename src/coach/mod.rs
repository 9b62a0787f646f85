//! Career-coaching services built on [`Agent`].
//!
//! Every service is a single-turn agent with its own system instruction,
//! model tier and optional response schema. [`CareerAssistant`] is the one
//! multi-turn, tool-using agent.

mod analysis;
mod assistant;
mod career;
mod documents;
mod interview;
mod networking;
mod profile;
mod scraper;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::{AgentError, CoachError};
use crate::llm::ChatModel;
use crate::structured::parse_json;
use crate::tools::ToolContext;

pub use analysis::{MentorMatch, NegotiationPrep};
pub use assistant::{CareerAssistant, CareerPathPrompt, CoachUi};
pub use career::{ActionItem, CareerMilestone, CareerPath, YouTubeVideo};
pub use documents::{GeneratedContent, GenerationOptions, GenerationResult};
pub use profile::{
    Achievement, ApplicationAnalysis, CustomSection, DEFAULT_SECTION_ORDER, DocumentGeneration,
    Education, Experience, ExperienceLevel, Language, NamedItem, ProfileData, ProfileUpdate,
    Proficiency, Project, profile_to_markdown,
};
pub use scraper::normalize_job_url;

pub const DEFAULT_PRO_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_FLASH_MODEL: &str = "gemini-2.5-flash";

/// Structured services get this many tries at producing parseable JSON.
const STRUCTURED_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Pro,
    Flash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    pub pro: String,
    pub flash: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            pro: DEFAULT_PRO_MODEL.to_string(),
            flash: DEFAULT_FLASH_MODEL.to_string(),
        }
    }
}

impl ModelCatalog {
    pub fn get(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Pro => &self.pro,
            ModelTier::Flash => &self.flash,
        }
    }
}

/// Entry point for the coaching features. Cheap to clone; all clones share
/// one provider client.
#[derive(Clone)]
pub struct CareerCoach {
    model: Arc<dyn ChatModel>,
    models: ModelCatalog,
    retries: u32,
    attempt_timeout: Option<Duration>,
    history_window: Option<usize>,
}

impl std::fmt::Debug for CareerCoach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CareerCoach")
            .field("models", &self.models)
            .field("retries", &self.retries)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("history_window", &self.history_window)
            .finish()
    }
}

impl CareerCoach {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            models: ModelCatalog::default(),
            retries: 1,
            attempt_timeout: None,
            history_window: None,
        }
    }

    pub fn with_models(mut self, models: ModelCatalog) -> Self {
        self.models = models;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Caps the number of user turns a [`CareerAssistant`] session keeps.
    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = Some(turns);
        self
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    pub(crate) fn shared_model(&self) -> Arc<dyn ChatModel> {
        self.model.clone()
    }

    pub(crate) fn retries(&self) -> u32 {
        self.retries
    }

    pub(crate) fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub(crate) fn history_window(&self) -> Option<usize> {
        self.history_window
    }

    fn agent(&self, prompt: &Prompt) -> Result<Agent, AgentError> {
        let mut builder = Agent::builder()
            .shared_model(self.model.clone())
            .model_name(self.models.get(prompt.tier))
            .system_instruction(prompt.system_instruction.clone())
            .retries(self.retries)
            .google_search(prompt.google_search);

        if let Some(budget) = prompt.thinking_budget {
            builder = builder.thinking_budget(budget);
        }
        if let Some(temperature) = prompt.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(schema) = &prompt.response_schema {
            builder = builder.response_schema(schema.clone());
        }
        if let Some(timeout) = self.attempt_timeout {
            builder = builder.attempt_timeout(timeout);
        }

        builder.build()
    }

    async fn generate(&self, prompt: &Prompt, message: &str) -> Result<String, CoachError> {
        let mut agent = self.agent(prompt)?;
        let text = agent.chat(message, ToolContext::new()).await?;
        Ok(text)
    }

    /// Like [`CareerCoach::generate`], but parses the reply as JSON and asks
    /// again once when the model returns something unparseable.
    async fn generate_json<T>(&self, prompt: &Prompt, message: &str) -> Result<T, CoachError>
    where
        T: DeserializeOwned,
    {
        let mut attempt = 1;
        loop {
            let text = self.generate(prompt, message).await?;
            match parse_json::<T>(&text) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < STRUCTURED_ATTEMPTS => {
                    tracing::warn!(
                        model = %self.models.get(prompt.tier),
                        attempt,
                        error = %err,
                        "structured_output_retry"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Per-service generation setup.
#[derive(Debug, Clone)]
struct Prompt {
    tier: ModelTier,
    system_instruction: String,
    thinking_budget: Option<u32>,
    temperature: Option<f32>,
    response_schema: Option<Value>,
    google_search: bool,
}

impl Prompt {
    fn new(tier: ModelTier, system_instruction: impl Into<String>) -> Self {
        Self {
            tier,
            system_instruction: system_instruction.into(),
            thinking_budget: None,
            temperature: None,
            response_schema: None,
            google_search: false,
        }
    }

    fn thinking(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    fn grounded(mut self) -> Self {
        self.google_search = true;
        self
    }
}

/// Trims `value` and rejects it when empty.
fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, CoachError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoachError::invalid_input(format!("{field} is required.")));
    }
    Ok(trimmed)
}
