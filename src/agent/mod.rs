use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{AgentError, ToolError};
use crate::llm::{
    ChatModel, GenerationSettings, ModelMessage, ModelRequest, ModelToolCall, ModelToolChoice,
    ModelToolDefinition, ToolPayload, ToolResponse,
};
use crate::tools::{ToolContext, ToolSpec};

const BACKOFF_STEP: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub generation: GenerationSettings,
    /// Retries after the first failed attempt when `chat` is called without
    /// an explicit count.
    pub retries: u32,
    /// Upper bound on model turns within one attempt.
    pub max_iterations: u32,
    pub attempt_timeout: Option<Duration>,
    /// Keep at most this many user turns of history, counting the new one.
    pub max_history_turns: Option<usize>,
    /// Reuse successful tool results from a failed attempt instead of
    /// re-running the executor on retry.
    pub replay_completed_tools: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            retries: 1,
            max_iterations: 24,
            attempt_timeout: None,
            max_history_turns: None,
            replay_completed_tools: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Attempt {
        number: u32,
    },
    Status {
        message: String,
    },
    Thinking {
        content: String,
    },
    ToolCall {
        tool: String,
        args_json: Value,
        tool_call_id: String,
    },
    ToolResult {
        tool: String,
        response: Value,
        tool_call_id: String,
        is_error: bool,
        replayed: bool,
    },
    FinalResponse {
        content: String,
    },
}

#[derive(Default)]
pub struct AgentBuilder {
    model: Option<Arc<dyn ChatModel>>,
    tools: Vec<ToolSpec>,
    config: AgentConfig,
    dependencies: ToolContext,
}

impl AgentBuilder {
    pub fn model<M>(mut self, model: M) -> Self
    where
        M: ChatModel + 'static,
    {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn shared_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.config.generation.model = model_name.into();
        self
    }

    pub fn tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_instruction(mut self, system_instruction: impl Into<String>) -> Self {
        self.config.generation.system_instruction = Some(system_instruction.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.generation.temperature = Some(temperature);
        self
    }

    pub fn thinking_budget(mut self, budget: u32) -> Self {
        self.config.generation.thinking_budget = Some(budget);
        self
    }

    pub fn response_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.config.generation.response_mime_type = Some(mime_type.into());
        self
    }

    pub fn response_schema(mut self, schema: Value) -> Self {
        self.config.generation.response_schema = Some(schema);
        self
    }

    pub fn google_search(mut self, enabled: bool) -> Self {
        self.config.generation.google_search = enabled;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout = Some(timeout);
        self
    }

    pub fn max_history_turns(mut self, turns: usize) -> Self {
        self.config.max_history_turns = Some(turns);
        self
    }

    pub fn replay_completed_tools(mut self, replay: bool) -> Self {
        self.config.replay_completed_tools = replay;
        self
    }

    pub fn dependency<T>(mut self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.dependencies.insert(value);
        self
    }

    pub fn dependency_named<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.dependencies.insert_named(key, value);
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let Some(model) = self.model else {
            return Err(AgentError::Config(
                "agent model must be configured via AgentBuilder::model(...)".to_string(),
            ));
        };

        if self.config.generation.model.trim().is_empty() {
            return Err(AgentError::Config(
                "model name must be configured via AgentBuilder::model_name(...)".to_string(),
            ));
        }

        if self.config.max_history_turns == Some(0) {
            return Err(AgentError::Config(
                "max_history_turns must be at least 1".to_string(),
            ));
        }

        let mut tool_map = HashMap::new();
        for tool in &self.tools {
            if tool_map
                .insert(tool.name().to_string(), tool.clone())
                .is_some()
            {
                return Err(AgentError::Config(format!(
                    "duplicate tool registered: {}",
                    tool.name()
                )));
            }
        }

        let tool_definitions = self
            .tools
            .iter()
            .map(|tool| ModelToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.json_schema().clone(),
            })
            .collect();

        Ok(Agent {
            model,
            tool_definitions,
            tool_map,
            config: self.config,
            dependencies: self.dependencies,
            history: Vec::new(),
        })
    }
}

/// A chat session that resolves tool calls until the model answers in text.
///
/// `chat` takes `&mut self`, so calls on one agent are serialized by
/// construction. Conversation history is the only state kept between calls.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tool_definitions: Vec<ModelToolDefinition>,
    tool_map: HashMap<String, ToolSpec>,
    config: AgentConfig,
    dependencies: ToolContext,
    history: Vec<ModelMessage>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.config.generation.model)
            .field(
                "tools",
                &self
                    .tool_definitions
                    .iter()
                    .map(|tool| tool.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn history(&self) -> &[ModelMessage] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Sends `message` with the configured retry count and no step callback.
    pub async fn chat(
        &mut self,
        message: impl Into<String>,
        context: ToolContext,
    ) -> Result<String, AgentError> {
        let retries = self.config.retries;
        self.chat_with_events(message, context, retries, |_| {})
            .await
    }

    /// Sends `message`, reporting human-readable progress through `on_step`.
    pub async fn chat_with_steps<F>(
        &mut self,
        message: impl Into<String>,
        context: ToolContext,
        retries: u32,
        mut on_step: F,
    ) -> Result<String, AgentError>
    where
        F: FnMut(&str) + Send,
    {
        self.chat_with_events(message, context, retries, |event| {
            if let AgentEvent::Status { message } = &event {
                on_step(message);
            }
        })
        .await
    }

    /// Runs one logical turn: up to `retries + 1` attempts, each of which
    /// loops over tool calls until the model returns final text.
    pub async fn chat_with_events<F>(
        &mut self,
        message: impl Into<String>,
        context: ToolContext,
        retries: u32,
        mut observer: F,
    ) -> Result<String, AgentError>
    where
        F: FnMut(AgentEvent) + Send,
    {
        let message = message.into();
        let runtime_context = self.dependencies.layered(&context);
        let attempt_timeout = self.config.attempt_timeout;
        let mut completed = CompletedCalls::default();

        self.enforce_history_window();

        let mut attempt: u32 = 0;
        loop {
            observer(AgentEvent::Attempt {
                number: attempt + 1,
            });

            let checkpoint = self.history.len();
            let run = self.run_attempt(
                &message,
                &runtime_context,
                attempt,
                &mut completed,
                &mut observer,
            );
            let result = match attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, run)
                    .await
                    .unwrap_or(Err(AgentError::Timeout(limit))),
                None => run.await,
            };

            let err = match result {
                Ok(text) => {
                    observer(AgentEvent::FinalResponse {
                        content: text.clone(),
                    });
                    return Ok(text);
                }
                Err(err) => err,
            };

            // A failed attempt leaves no partial turns behind.
            self.history.truncate(checkpoint);

            tracing::warn!(
                model = %self.config.generation.model,
                attempt = attempt + 1,
                max_attempts = retries + 1,
                retryable = err.is_retryable(),
                error = %err,
                "agent_attempt_failed"
            );

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= retries {
                return Err(AgentError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: Box::new(err),
                });
            }

            // Retry-After from a rate limit is a floor on the linear delay.
            let delay = err
                .retry_after()
                .map_or(backoff_delay(attempt), |wait| wait.max(backoff_delay(attempt)));
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn run_attempt<F>(
        &mut self,
        message: &str,
        context: &ToolContext,
        attempt: u32,
        completed: &mut CompletedCalls,
        observer: &mut F,
    ) -> Result<String, AgentError>
    where
        F: FnMut(AgentEvent) + Send,
    {
        self.history.push(ModelMessage::User(message.to_string()));

        let tool_choice = if self.tool_definitions.is_empty() {
            ModelToolChoice::None
        } else {
            ModelToolChoice::Auto
        };

        for _ in 0..self.config.max_iterations {
            let completion = self
                .model
                .invoke(ModelRequest {
                    settings: &self.config.generation,
                    messages: &self.history,
                    tools: &self.tool_definitions,
                    tool_choice: &tool_choice,
                })
                .await?;

            if let Some(thinking) = completion.thinking.clone() {
                observer(AgentEvent::Thinking { content: thinking });
            }

            self.history.push(ModelMessage::Assistant {
                content: completion.text.clone(),
                tool_calls: completion.tool_calls.clone(),
            });

            if completion.tool_calls.is_empty() {
                let text = completion.text.unwrap_or_default();
                if text.is_empty() && !self.config.generation.has_response_schema() {
                    return Err(AgentError::EmptyResponse);
                }
                return Ok(text);
            }

            let mut responses = Vec::with_capacity(completion.tool_calls.len());
            for call in &completion.tool_calls {
                observer(AgentEvent::ToolCall {
                    tool: call.name.clone(),
                    args_json: call.arguments.clone(),
                    tool_call_id: call.id.clone(),
                });

                let (payload, replayed) = self
                    .resolve_call(call, context, attempt, completed, observer)
                    .await;

                observer(AgentEvent::ToolResult {
                    tool: call.name.clone(),
                    response: payload.to_json(),
                    tool_call_id: call.id.clone(),
                    is_error: payload.is_error(),
                    replayed,
                });

                responses.push(ToolResponse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    payload,
                });
            }

            observer(AgentEvent::Status {
                message: "Processing results...".to_string(),
            });
            self.history.push(ModelMessage::ToolResults(responses));
        }

        Err(AgentError::MaxIterationsReached {
            max_iterations: self.config.max_iterations,
        })
    }

    async fn resolve_call<F>(
        &self,
        call: &ModelToolCall,
        context: &ToolContext,
        attempt: u32,
        completed: &mut CompletedCalls,
        observer: &mut F,
    ) -> (ToolPayload, bool)
    where
        F: FnMut(AgentEvent) + Send,
    {
        let Some(tool) = self.tool_map.get(&call.name) else {
            tracing::warn!(tool = %call.name, tool_call_id = %call.id, "agent_unknown_tool");
            return (
                ToolPayload::Error(ToolError::NotFound(call.name.clone()).to_string()),
                false,
            );
        };

        if self.config.replay_completed_tools
            && let Some(result) = completed.replay(call, attempt)
        {
            tracing::debug!(tool = %call.name, tool_call_id = %call.id, "agent_tool_replayed");
            return (ToolPayload::Result(result), true);
        }

        observer(AgentEvent::Status {
            message: format!("Executing action: {}...", call.name),
        });

        match tool.execute(call.arguments.clone(), context).await {
            Ok(result) => {
                completed.record(call, attempt, &result);
                (ToolPayload::Result(result), false)
            }
            Err(err) => {
                tracing::warn!(
                    tool = %call.name,
                    tool_call_id = %call.id,
                    error = %err,
                    "agent_tool_failed"
                );
                (ToolPayload::Error(err.to_string()), false)
            }
        }
    }

    fn enforce_history_window(&mut self) {
        let Some(max_turns) = self.config.max_history_turns else {
            return;
        };
        let keep = max_turns.saturating_sub(1);

        let turn_starts = self
            .history
            .iter()
            .enumerate()
            .filter(|(_, message)| matches!(message, ModelMessage::User(_)))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        if turn_starts.len() <= keep {
            return;
        }

        let cut = if keep == 0 {
            self.history.len()
        } else {
            turn_starts[turn_starts.len() - keep]
        };
        self.history.drain(..cut);

        tracing::debug!(
            dropped_messages = cut,
            kept_turns = keep,
            "agent_history_trimmed"
        );
    }
}

/// Successful tool results of the current `chat` call, keyed by tool name
/// and canonical arguments.
#[derive(Default)]
struct CompletedCalls {
    results: HashMap<String, (u32, Value)>,
}

impl CompletedCalls {
    fn key(call: &ModelToolCall) -> String {
        // serde_json maps are ordered, so this is canonical.
        format!("{}:{}", call.name, call.arguments)
    }

    /// Only results from earlier attempts are replayed.
    fn replay(&self, call: &ModelToolCall, attempt: u32) -> Option<Value> {
        self.results
            .get(&Self::key(call))
            .filter(|(recorded_in, _)| *recorded_in < attempt)
            .map(|(_, value)| value.clone())
    }

    fn record(&mut self, call: &ModelToolCall, attempt: u32, result: &Value) {
        self.results
            .entry(Self::key(call))
            .or_insert_with(|| (attempt, result.clone()));
    }
}

/// Delay before attempt `attempt + 2`: 1s, 2s, 3s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_STEP * (attempt + 1)
}
