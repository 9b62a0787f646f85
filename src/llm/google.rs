use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ProviderError;
use crate::llm::{
    ChatModel, GenerationSettings, ModelCompletion, ModelMessage, ModelRequest, ModelToolCall,
    ModelToolChoice, ModelToolDefinition, ModelUsage,
};

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const JSON_MIME_TYPE: &str = "application/json";

/// Transport-level settings for [`GoogleModel`]. Model id, system
/// instruction and sampling live in [`GenerationSettings`] so that one
/// client can serve many agents.
#[derive(Debug, Clone)]
pub struct GoogleModelConfig {
    pub api_key: String,
    pub api_base_url: Option<String>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub include_thoughts: Option<bool>,
}

impl GoogleModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base_url: None,
            top_p: None,
            max_output_tokens: None,
            include_thoughts: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleModel {
    client: Client,
    config: GoogleModelConfig,
}

impl GoogleModel {
    pub fn new(config: GoogleModelConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                ProviderError::Authentication(
                    "GEMINI_API_KEY (or GOOGLE_API_KEY) is not set".to_string(),
                )
            })?;

        Self::new(GoogleModelConfig::new(api_key))
    }

    fn endpoint(&self, model: &str) -> String {
        let base = self
            .config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/models/{model}:generateContent")
    }
}

#[async_trait]
impl ChatModel for GoogleModel {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<ModelCompletion, ProviderError> {
        let body = build_request(request, &self.config);

        tracing::debug!(
            model = %request.settings.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "gemini_generate_content"
        );

        let response = self
            .client
            .post(self.endpoint(&request.settings.model))
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, retry_after, &body));
        }

        let payload = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| ProviderError::Response(err.to_string()))?;

        normalize_response(payload)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GoogleSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GoogleTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GoogleToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GoogleGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct GoogleContent {
    role: String,
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSystemInstruction {
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<GoogleFunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleToolConfig {
    function_calling_config: GoogleFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleFunctionCallingConfig {
    mode: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<GoogleThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleThinkingConfig {
    thinking_budget: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_thoughts: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct GooglePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GoogleFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GoogleFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl GooglePart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct GoogleFunctionCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: Option<String>,
    args: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct GoogleFunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    prompt_feedback: Option<GooglePromptFeedback>,
    usage_metadata: Option<GoogleUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    thoughts_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleErrorEnvelope {
    error: GoogleApiError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleApiError {
    code: Option<u16>,
    status: Option<String>,
    message: Option<String>,
}

fn build_request(request: ModelRequest<'_>, config: &GoogleModelConfig) -> GenerateContentRequest {
    let settings = request.settings;
    let contents = to_google_contents(request.messages);

    let mut tools = Vec::new();
    let mut tool_config = None;
    if !request.tools.is_empty() {
        let mode = match request.tool_choice {
            ModelToolChoice::Auto => "AUTO",
            ModelToolChoice::None => "NONE",
        };
        tools.push(GoogleTool {
            function_declarations: Some(request.tools.iter().map(to_declaration).collect()),
            google_search: None,
        });
        tool_config = Some(GoogleToolConfig {
            function_calling_config: GoogleFunctionCallingConfig {
                mode: mode.to_string(),
            },
        });
    }
    if settings.google_search {
        tools.push(GoogleTool {
            function_declarations: None,
            google_search: Some(json!({})),
        });
    }

    GenerateContentRequest {
        contents,
        system_instruction: settings
            .system_instruction
            .as_deref()
            .filter(|instruction| !instruction.trim().is_empty())
            .map(|instruction| GoogleSystemInstruction {
                parts: vec![GooglePart::text(instruction)],
            }),
        tools: (!tools.is_empty()).then_some(tools),
        tool_config,
        generation_config: Some(generation_config(settings, config)),
    }
}

fn generation_config(
    settings: &GenerationSettings,
    config: &GoogleModelConfig,
) -> GoogleGenerationConfig {
    let response_schema = settings.response_schema.clone().map(clean_gemini_schema);
    let response_mime_type = settings.response_mime_type.clone().or_else(|| {
        response_schema
            .as_ref()
            .map(|_| JSON_MIME_TYPE.to_string())
    });

    GoogleGenerationConfig {
        temperature: settings.temperature,
        top_p: config.top_p,
        max_output_tokens: config.max_output_tokens,
        response_mime_type,
        response_schema,
        thinking_config: settings
            .thinking_budget
            .map(|budget| GoogleThinkingConfig {
                thinking_budget: budget,
                include_thoughts: config.include_thoughts,
            }),
    }
}

fn to_declaration(tool: &ModelToolDefinition) -> GoogleFunctionDeclaration {
    GoogleFunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: clean_gemini_schema(tool.parameters.clone()),
    }
}

fn to_google_contents(messages: &[ModelMessage]) -> Vec<GoogleContent> {
    let mut contents = Vec::new();

    for message in messages {
        match message {
            ModelMessage::User(content) => {
                if content.is_empty() {
                    continue;
                }
                contents.push(GoogleContent {
                    role: "user".to_string(),
                    parts: vec![GooglePart::text(content.clone())],
                });
            }
            ModelMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts = Vec::new();

                if let Some(text) = content
                    && !text.is_empty()
                {
                    parts.push(GooglePart::text(text.clone()));
                }

                for call in tool_calls {
                    parts.push(GooglePart {
                        function_call: Some(GoogleFunctionCall {
                            id: Some(call.id.clone()),
                            name: Some(call.name.clone()),
                            args: Some(call.arguments.clone()),
                        }),
                        thought_signature: call.thought_signature.clone(),
                        ..GooglePart::default()
                    });
                }

                if !parts.is_empty() {
                    contents.push(GoogleContent {
                        role: "model".to_string(),
                        parts,
                    });
                }
            }
            ModelMessage::ToolResults(responses) => {
                if responses.is_empty() {
                    continue;
                }
                contents.push(GoogleContent {
                    role: "user".to_string(),
                    parts: responses
                        .iter()
                        .map(|response| GooglePart {
                            function_response: Some(GoogleFunctionResponse {
                                id: Some(response.id.clone()),
                                name: response.name.clone(),
                                response: response.payload.to_json(),
                            }),
                            ..GooglePart::default()
                        })
                        .collect(),
                });
            }
        }
    }

    contents
}

fn normalize_response(response: GenerateContentResponse) -> Result<ModelCompletion, ProviderError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(ProviderError::ContentBlocked(format!(
            "prompt blocked: {reason}"
        )));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ProviderError::Response(
            "google response missing candidates".to_string(),
        ));
    };

    if let Some(reason) = candidate.finish_reason.as_deref()
        && matches!(
            reason,
            "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII" | "RECITATION"
        )
    {
        return Err(ProviderError::ContentBlocked(format!(
            "response blocked: {reason}"
        )));
    }

    let mut text_parts = Vec::new();
    let mut thinking_parts = Vec::new();
    let mut tool_calls = Vec::new();

    if let Some(content) = candidate.content {
        for (index, part) in content.parts.into_iter().enumerate() {
            if let Some(text) = part.text {
                if part.thought.unwrap_or(false) {
                    thinking_parts.push(text);
                } else {
                    text_parts.push(text);
                }
            }

            if let Some(function_call) = part.function_call {
                let Some(name) = function_call.name else {
                    return Err(ProviderError::Response(
                        "google functionCall missing name".to_string(),
                    ));
                };

                tool_calls.push(ModelToolCall {
                    id: function_call
                        .id
                        .unwrap_or_else(|| format!("call_{}", index + 1)),
                    name,
                    arguments: function_call.args.unwrap_or_else(|| json!({})),
                    thought_signature: part.thought_signature,
                });
            }
        }
    }

    let usage = response.usage_metadata.map(|usage| ModelUsage {
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage
            .candidates_token_count
            .unwrap_or(0)
            .saturating_add(usage.thoughts_token_count.unwrap_or(0)),
    });

    Ok(ModelCompletion {
        text: (!text_parts.is_empty()).then(|| text_parts.concat()),
        thinking: (!thinking_parts.is_empty()).then(|| thinking_parts.join("\n")),
        tool_calls,
        usage,
    })
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn classify_api_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let (code, status_name, message) = match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(parsed) => (
            parsed.error.code.unwrap_or(status.as_u16()),
            parsed.error.status.unwrap_or_default(),
            parsed
                .error
                .message
                .unwrap_or_else(|| "unknown google api error".to_string()),
        ),
        Err(_) => (
            status.as_u16(),
            String::new(),
            if body.is_empty() {
                format!("google api request failed ({status})")
            } else {
                body.to_string()
            },
        ),
    };

    let detail = if status_name.is_empty() {
        format!("google api error {code}: {message}")
    } else {
        format!("google api error {code} {status_name}: {message}")
    };

    match (code, status_name.as_str()) {
        (429, _) | (_, "RESOURCE_EXHAUSTED") => ProviderError::RateLimited {
            message: detail,
            retry_after,
        },
        (500 | 502 | 503 | 504, _) | (_, "UNAVAILABLE" | "INTERNAL" | "DEADLINE_EXCEEDED") => {
            ProviderError::ServiceUnavailable(detail)
        }
        (401 | 403, _) | (_, "UNAUTHENTICATED" | "PERMISSION_DENIED") => {
            ProviderError::Authentication(detail)
        }
        (400..=499, _) => ProviderError::InvalidRequest(detail),
        _ => ProviderError::Transport(detail),
    }
}

fn clean_gemini_schema(schema: Value) -> Value {
    let mut root = schema;
    let defs = match &mut root {
        Value::Object(map) => map
            .remove("$defs")
            .and_then(|value| match value {
                Value::Object(defs) => Some(defs),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Map::new(),
    };

    let resolved = resolve_schema_refs(root, &defs);
    clean_schema_node(resolved, None)
}

fn resolve_schema_refs(value: Value, defs: &Map<String, Value>) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                let ref_name = reference.rsplit('/').next().unwrap_or("");
                if let Some(definition) = defs.get(ref_name) {
                    let mut resolved = definition.clone();
                    if let Value::Object(ref mut resolved_map) = resolved {
                        for (key, value) in map {
                            if key != "$ref" {
                                resolved_map.insert(key, value);
                            }
                        }
                    }
                    return resolve_schema_refs(resolved, defs);
                }
            }

            Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, resolve_schema_refs(value, defs)))
                    .collect(),
            )
        }
        Value::Array(values) => Value::Array(
            values
                .into_iter()
                .map(|value| resolve_schema_refs(value, defs))
                .collect(),
        ),
        other => other,
    }
}

fn clean_schema_node(value: Value, parent_key: Option<&str>) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = Map::new();

            for (key, value) in map {
                let is_metadata_title = key == "title" && parent_key != Some("properties");
                if key == "additionalProperties" || key == "default" || is_metadata_title {
                    continue;
                }

                cleaned.insert(key.clone(), clean_schema_node(value, Some(&key)));
            }

            let is_object = cleaned
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case("object"));
            let has_empty_properties = cleaned
                .get("properties")
                .and_then(Value::as_object)
                .is_some_and(Map::is_empty);

            // Gemini rejects OBJECT schemas with no properties.
            if is_object && has_empty_properties {
                cleaned.insert(
                    "properties".to_string(),
                    json!({"_placeholder": {"type": "string"}}),
                );
            }

            Value::Object(cleaned)
        }
        Value::Array(values) => Value::Array(
            values
                .into_iter()
                .map(|value| clean_schema_node(value, parent_key))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::llm::{ToolPayload, ToolResponse};

    fn tool_definition() -> ModelToolDefinition {
        ModelToolDefinition {
            name: "updateProfessionalSummary".to_string(),
            description: "Update the summary".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "newSummary": {"type": "string", "default": "x"}
                },
                "required": ["newSummary"],
                "additionalProperties": false,
                "title": "UpdateSummary"
            }),
        }
    }

    #[test]
    fn build_request_serializes_history_tools_and_settings() {
        let messages = vec![
            ModelMessage::User("Rewrite my summary".to_string()),
            ModelMessage::Assistant {
                content: Some("On it".to_string()),
                tool_calls: vec![ModelToolCall {
                    id: "call_1".to_string(),
                    name: "updateProfessionalSummary".to_string(),
                    arguments: json!({"newSummary": "Senior engineer"}),
                    thought_signature: None,
                }],
            },
            ModelMessage::ToolResults(vec![ToolResponse {
                id: "call_1".to_string(),
                name: "updateProfessionalSummary".to_string(),
                payload: ToolPayload::Result(json!("ok")),
            }]),
        ];

        let mut settings = GenerationSettings::new("gemini-3-pro-preview");
        settings.system_instruction = Some("You are a career coach".to_string());
        settings.temperature = Some(0.6);
        settings.thinking_budget = Some(16000);

        let config = GoogleModelConfig::new("key");
        let request = build_request(
            ModelRequest {
                settings: &settings,
                messages: &messages,
                tools: &[tool_definition()],
                tool_choice: &ModelToolChoice::Auto,
            },
            &config,
        );
        let value = serde_json::to_value(request).expect("serializes");

        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "You are a career coach"
        );
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(
            value["contents"][1]["parts"][1]["functionCall"]["name"],
            "updateProfessionalSummary"
        );
        assert_eq!(
            value["contents"][2]["parts"][0]["functionResponse"]["id"],
            "call_1"
        );
        assert_eq!(
            value["contents"][2]["parts"][0]["functionResponse"]["response"]["result"],
            "ok"
        );
        assert_eq!(value["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
        assert_eq!(
            value["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            16000
        );
        let temperature = value["generationConfig"]["temperature"]
            .as_f64()
            .expect("temperature present");
        assert!((temperature - 0.6).abs() < 1e-6);
        assert!(value["generationConfig"].get("responseMimeType").is_none());
        assert!(
            value["tools"][0]["functionDeclarations"][0]["parameters"]
                .get("additionalProperties")
                .is_none()
        );
    }

    #[test]
    fn tool_result_batch_is_one_content_with_a_part_per_call() {
        let messages = vec![ModelMessage::ToolResults(vec![
            ToolResponse {
                id: "a".to_string(),
                name: "first".to_string(),
                payload: ToolPayload::Error("boom".to_string()),
            },
            ToolResponse {
                id: "b".to_string(),
                name: "second".to_string(),
                payload: ToolPayload::Result(json!({"saved": true})),
            },
        ])];

        let contents = to_google_contents(&messages);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].parts.len(), 2);

        let value = serde_json::to_value(&contents[0]).expect("serializes");
        assert_eq!(
            value["parts"][0]["functionResponse"]["response"]["error"],
            "boom"
        );
        assert_eq!(
            value["parts"][1]["functionResponse"]["response"]["result"]["saved"],
            true
        );
    }

    #[test]
    fn response_schema_implies_json_mime_type() {
        let mut settings = GenerationSettings::new("gemini-2.5-flash");
        settings.response_schema = Some(json!({"type": "array", "items": {"type": "string"}}));

        let config = generation_config(&settings, &GoogleModelConfig::new("key"));
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(
            config.response_schema,
            Some(json!({"type": "array", "items": {"type": "string"}}))
        );
    }

    #[test]
    fn google_search_grounding_adds_a_search_tool() {
        let mut settings = GenerationSettings::new("gemini-2.5-flash");
        settings.google_search = true;

        let messages = vec![ModelMessage::User("salary for SRE in Berlin".to_string())];
        let request = build_request(
            ModelRequest {
                settings: &settings,
                messages: &messages,
                tools: &[],
                tool_choice: &ModelToolChoice::None,
            },
            &GoogleModelConfig::new("key"),
        );
        let value = serde_json::to_value(request).expect("serializes");

        assert_eq!(value["tools"], json!([{"googleSearch": {}}]));
        assert!(value.get("toolConfig").is_none());
    }

    #[test]
    fn normalize_response_extracts_text_thinking_tool_calls_and_usage() {
        let response = GenerateContentResponse {
            candidates: vec![GoogleCandidate {
                content: Some(GoogleContent {
                    role: "model".to_string(),
                    parts: vec![
                        GooglePart::text("Updated your "),
                        GooglePart::text("summary!"),
                        GooglePart {
                            text: Some("reasoning".to_string()),
                            thought: Some(true),
                            ..GooglePart::default()
                        },
                        GooglePart {
                            function_call: Some(GoogleFunctionCall {
                                id: None,
                                name: Some("startMockInterview".to_string()),
                                args: Some(json!({"role": "Analyst"})),
                            }),
                            ..GooglePart::default()
                        },
                    ],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
            prompt_feedback: None,
            usage_metadata: Some(GoogleUsageMetadata {
                prompt_token_count: Some(11),
                candidates_token_count: Some(7),
                thoughts_token_count: Some(3),
            }),
        };

        let completion = normalize_response(response).expect("response normalizes");

        assert_eq!(completion.text.as_deref(), Some("Updated your summary!"));
        assert_eq!(completion.thinking.as_deref(), Some("reasoning"));
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_4");
        assert_eq!(
            completion.usage,
            Some(ModelUsage {
                input_tokens: 11,
                output_tokens: 10,
            })
        );
    }

    #[test]
    fn thought_signature_is_echoed_on_replayed_calls() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "id": "call_1",
                            "name": "updateProfessionalSummary",
                            "args": {"newSummary": "x"}
                        },
                        "thoughtSignature": "SIG123"
                    }]
                },
                "finishReason": "STOP"
            }]
        }))
        .expect("response deserializes");

        let completion = normalize_response(response).expect("response normalizes");
        assert_eq!(
            completion.tool_calls[0].thought_signature.as_deref(),
            Some("SIG123")
        );

        let contents = to_google_contents(&[ModelMessage::Assistant {
            content: None,
            tool_calls: completion.tool_calls,
        }]);
        let value = serde_json::to_value(&contents).expect("serializes");

        assert_eq!(value[0]["role"], "model");
        assert_eq!(value[0]["parts"][0]["thoughtSignature"], "SIG123");
        assert_eq!(
            value[0]["parts"][0]["functionCall"]["name"],
            "updateProfessionalSummary"
        );
    }

    #[test]
    fn calls_without_a_signature_serialize_without_one() {
        let contents = to_google_contents(&[ModelMessage::Assistant {
            content: None,
            tool_calls: vec![ModelToolCall {
                id: "call_1".to_string(),
                name: "startMockInterview".to_string(),
                arguments: json!({}),
                thought_signature: None,
            }],
        }]);
        let value = serde_json::to_value(&contents).expect("serializes");
        assert!(value[0]["parts"][0].get("thoughtSignature").is_none());
    }

    #[test]
    fn blocked_prompt_is_content_blocked() {
        let err = normalize_response(GenerateContentResponse {
            candidates: Vec::new(),
            prompt_feedback: Some(GooglePromptFeedback {
                block_reason: Some("SAFETY".to_string()),
            }),
            usage_metadata: None,
        })
        .expect_err("should fail");

        assert!(matches!(err, ProviderError::ContentBlocked(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_candidates_is_a_retryable_response_error() {
        let err = normalize_response(GenerateContentResponse {
            candidates: Vec::new(),
            prompt_feedback: None,
            usage_metadata: None,
        })
        .expect_err("should fail");

        match err {
            ProviderError::Response(ref message) => {
                assert!(message.contains("missing candidates"));
            }
            ref other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn api_errors_are_classified_by_status() {
        let rate_limited = classify_api_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","message":"Quota exceeded"}}"#,
        );
        match rate_limited {
            ProviderError::RateLimited {
                message,
                retry_after,
            } => {
                assert!(message.contains("Quota exceeded"));
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            classify_api_error(StatusCode::SERVICE_UNAVAILABLE, None, ""),
            ProviderError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            classify_api_error(StatusCode::FORBIDDEN, None, "denied"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            classify_api_error(
                StatusCode::BAD_REQUEST,
                None,
                r#"{"error":{"code":400,"status":"INVALID_ARGUMENT","message":"rate limit"}}"#
            ),
            ProviderError::InvalidRequest(_)
        ));
    }

    #[test]
    fn clean_gemini_schema_resolves_refs_and_handles_empty_objects() {
        let schema = json!({
            "$defs": {
                "Milestone": {
                    "type": "object",
                    "properties": {},
                    "additionalProperties": false
                }
            },
            "type": "object",
            "properties": {
                "milestone": {
                    "$ref": "#/$defs/Milestone"
                }
            },
            "additionalProperties": false
        });

        let cleaned = clean_gemini_schema(schema);
        assert!(cleaned.get("$defs").is_none());
        assert!(cleaned.get("additionalProperties").is_none());
        assert_eq!(
            cleaned["properties"]["milestone"]["properties"]["_placeholder"]["type"],
            "string"
        );
    }
}
