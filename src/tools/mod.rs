use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::{SchemaError, ToolError};

type DynValue = Arc<dyn Any + Send + Sync>;
type ToolHandler =
    dyn Fn(Value, &ToolContext) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync;

/// Ambient data handed to every tool executor.
///
/// Values are keyed by type or by name. An agent carries one context for its
/// lifetime and each `chat` call may layer a per-call context on top.
#[derive(Clone, Default)]
pub struct ToolContext {
    typed: HashMap<TypeId, DynValue>,
    named: HashMap<String, DynValue>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("typed", &self.typed.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(mut self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.insert(value);
        self
    }

    pub fn with_named<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.insert_named(key, value);
        self
    }

    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.typed.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn insert_named<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.named.insert(key.into(), Arc::new(value));
    }

    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.typed.get(&TypeId::of::<T>())?.clone();
        Arc::downcast::<T>(value).ok()
    }

    pub fn get_named<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.named.get(key)?.clone();
        Arc::downcast::<T>(value).ok()
    }

    /// Like [`ToolContext::get`], but reports the missing type as a tool error.
    pub fn require<T>(&self) -> Result<Arc<T>, ToolError>
    where
        T: Send + Sync + 'static,
    {
        self.get::<T>()
            .ok_or(ToolError::MissingDependency(std::any::type_name::<T>()))
    }

    pub fn is_empty(&self) -> bool {
        self.typed.is_empty() && self.named.is_empty()
    }

    /// Returns a context where entries of `overrides` shadow entries of `self`.
    pub fn layered(&self, overrides: &ToolContext) -> ToolContext {
        let mut merged = self.clone();
        merged
            .typed
            .extend(overrides.typed.iter().map(|(k, v)| (*k, v.clone())));
        merged
            .named
            .extend(overrides.named.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// A tool declaration paired with its executor.
#[derive(Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    json_schema: Value,
    handler: Arc<ToolHandler>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("json_schema", &self.json_schema)
            .finish()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            json_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
            handler: Arc::new(|_args, _ctx| {
                Box::pin(async {
                    Err(ToolError::Execution(
                        "tool handler not configured".to_string(),
                    ))
                })
            }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Result<Self, SchemaError> {
        validate_schema(&schema)?;
        self.json_schema = schema;
        Ok(self)
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value, &ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.handler = Arc::new(move |args, ctx| Box::pin(handler(args, ctx)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    pub async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        validate_arguments(self.name(), &self.json_schema, &args)?;
        (self.handler)(args, ctx).await
    }
}

/// Reads a required string argument that schema validation has already
/// checked for presence.
pub fn string_arg(args: &Value, field: &str) -> Result<String, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::Execution(format!("{field} missing")))
}

fn validate_schema(schema: &Value) -> Result<(), SchemaError> {
    let schema_obj = schema.as_object().ok_or(SchemaError::SchemaNotObject)?;

    let root_type = schema_obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(SchemaError::RootTypeMustBeObject)?;

    if !root_type.eq_ignore_ascii_case("object") {
        return Err(SchemaError::RootTypeMustBeObject);
    }

    if let Some(required) = schema_obj.get("required") {
        let required_arr = required.as_array().ok_or(SchemaError::InvalidRequired)?;
        if !required_arr.iter().all(Value::is_string) {
            return Err(SchemaError::InvalidRequired);
        }
    }

    Ok(())
}

fn validate_arguments(tool_name: &str, schema: &Value, args: &Value) -> Result<(), ToolError> {
    let invalid = |message: String| ToolError::InvalidArguments {
        tool: tool_name.to_string(),
        message,
    };

    let args_obj = args
        .as_object()
        .ok_or_else(|| invalid("arguments must be a JSON object".to_string()))?;

    let schema_obj = schema
        .as_object()
        .ok_or_else(|| invalid("tool schema must be a JSON object".to_string()))?;

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for field_name in required.iter().filter_map(Value::as_str) {
            if !args_obj.contains_key(field_name) {
                return Err(invalid(format!("missing required field: {field_name}")));
            }
        }
    }

    let empty = serde_json::Map::new();
    let properties = schema_obj
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    if schema_obj
        .get("additionalProperties")
        .and_then(Value::as_bool)
        == Some(false)
    {
        if let Some(key) = args_obj.keys().find(|key| !properties.contains_key(*key)) {
            return Err(invalid(format!("unknown field: {key}")));
        }
    }

    for (key, value) in args_obj {
        let Some(field_schema) = properties.get(key) else {
            continue;
        };

        if let Some(type_name) = field_schema.get("type").and_then(Value::as_str)
            && !value_matches_type(value, type_name)
        {
            return Err(invalid(format!("field '{key}' must be of type {type_name}")));
        }

        if let Some(allowed) = field_schema.get("enum").and_then(Value::as_array)
            && !allowed.contains(value)
        {
            return Err(invalid(format!(
                "field '{key}' must be one of {}",
                Value::Array(allowed.clone())
            )));
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, type_name: &str) -> bool {
    match type_name.to_ascii_lowercase().as_str() {
        "string" => value.is_string(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "number" => value.as_f64().is_some(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn schema_validation_rejects_non_object_root() {
        let result = ToolSpec::new("bad", "bad").with_schema(json!({"type": "string"}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn per_call_context_shadows_agent_context() {
        let base = ToolContext::new().with(1_u32).with_named("page", "home".to_string());
        let per_call = ToolContext::new().with(9_u32);

        let merged = base.layered(&per_call);
        assert_eq!(merged.get::<u32>().as_deref(), Some(&9));
        assert_eq!(
            merged.get_named::<String>("page").as_deref(),
            Some(&"home".to_string())
        );

        let tool = ToolSpec::new("read", "read context")
            .with_handler(|_args, ctx| {
                let value = ctx.get::<u32>().map(|v| *v).unwrap_or(0);
                async move { Ok(json!(value)) }
            });

        let outcome = tool.execute(json!({}), &merged).await.expect("tool executes");
        assert_eq!(outcome, json!(9));
    }

    #[tokio::test]
    async fn argument_validation_reports_missing_required() {
        let tool = ToolSpec::new("updateProfessionalSummary", "update summary")
            .with_schema(json!({
                "type": "object",
                "properties": {"newSummary": {"type": "string"}},
                "required": ["newSummary"],
            }))
            .expect("schema valid")
            .with_handler(|_args, _ctx| async move { Ok(json!("ok")) });

        let err = tool
            .execute(json!({}), &ToolContext::new())
            .await
            .expect_err("should fail");

        assert!(err.to_string().contains("missing required field"));
    }

    #[tokio::test]
    async fn argument_validation_enforces_enums() {
        let tool = ToolSpec::new("navigateToCoffeeChat", "coffee chat")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "mode": {"type": "string", "enum": ["prep", "reach_out"]}
                },
                "required": ["mode"],
            }))
            .expect("schema valid")
            .with_handler(|_args, _ctx| async move { Ok(json!("ok")) });

        let err = tool
            .execute(json!({"mode": "lunch"}), &ToolContext::new())
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("must be one of"));

        let ok = tool
            .execute(json!({"mode": "prep"}), &ToolContext::new())
            .await
            .expect("valid mode");
        assert_eq!(ok, json!("ok"));
    }

    #[test]
    fn require_names_the_missing_type() {
        let err = ToolContext::new().require::<String>().expect_err("missing");
        assert!(err.to_string().contains("String"));
    }
}
