//! Tool System
//!
//! Tools are described to the model by a [`ToolDefinition`] and executed by a
//! [`ToolHandler`]. The [`ToolRegistry`] pairs the two and is the only way the
//! executor reaches a handler.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::AgentContext;
use crate::error::{AgentError, Result};

/// Untyped key-value payload a model passes to a tool
pub type ToolArguments = HashMap<String, Value>;

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-issued or synthesized call ID, unique per call
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a call with a locally generated ID
    pub fn generated(name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self::new(generate_call_id(), name, arguments)
    }

    /// Arguments as a JSON object
    pub fn arguments_json(&self) -> Value {
        Value::Object(self.arguments.clone().into_iter().collect())
    }
}

/// Locally unique call ID for providers that don't issue one
pub fn generate_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Convert a JSON value into tool arguments.
///
/// `null` becomes an empty map; anything other than an object is rejected.
pub fn arguments_from_value(value: Value) -> std::result::Result<ToolArguments, String> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(ToolArguments::new()),
        other => Err(format!("tool arguments must be a JSON object, got {other}")),
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Output text on success
    pub output: String,

    /// Error text on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Text the model sees for this result
    pub fn to_content(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

impl From<AgentError> for ToolResult {
    fn from(err: AgentError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Element type when `param_type` is `array`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
}

impl ParameterSchema {
    pub fn new(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default: None,
            enum_values: None,
            items: None,
        }
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Restrict to a fixed set of string values
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(|v| Value::String(v.into())).collect());
        self
    }

    pub fn with_items(mut self, item_type: impl Into<String>) -> Self {
        self.items = Some(item_type.into());
        self
    }

    fn json_schema(&self) -> Value {
        let mut prop = json!({
            "type": self.param_type,
            "description": self.description,
        });
        if let Some(values) = &self.enum_values {
            prop["enum"] = Value::Array(values.clone());
        }
        if let Some(item_type) = &self.items {
            prop["items"] = json!({ "type": item_type });
        }
        if let Some(default) = &self.default {
            prop["default"] = default.clone();
        }
        prop
    }
}

/// Tool description advertised to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    /// Names of required parameters, in declaration order
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// JSON-schema object describing the parameters
    pub fn json_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
        })
    }

    /// Check required parameters and enum constraints
    pub fn validate(&self, arguments: &ToolArguments) -> Result<()> {
        for param in &self.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                Some(value) => {
                    if let Some(allowed) = &param.enum_values {
                        if !value.is_null() && !allowed.contains(value) {
                            return Err(AgentError::ToolValidation(format!(
                                "Invalid value {} for parameter {}; expected one of {}",
                                value,
                                param.name,
                                Value::Array(allowed.clone())
                            )));
                        }
                    }
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Markdown description of a set of tools, for prompt-embedded tool use
pub fn describe_tools(tools: &[ToolDefinition]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");

    for tool in tools {
        prompt.push_str(&format!("### {}\n", tool.name));
        prompt.push_str(&format!("{}\n", tool.description));

        if !tool.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &tool.parameters {
                let required = if param.required { " (required)" } else { "" };
                prompt.push_str(&format!(
                    "- `{}` ({}){}: {}",
                    param.name, param.param_type, required, param.description
                ));
                if let Some(values) = &param.enum_values {
                    let values: Vec<String> = values.iter().map(ToString::to_string).collect();
                    prompt.push_str(&format!(" [one of: {}]", values.join(", ")));
                }
                prompt.push('\n');
            }
        }
        prompt.push('\n');
    }

    prompt
}

/// Executes one tool. Implementations validate and narrow their own arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &ToolArguments, context: &mut AgentContext) -> Result<ToolResult>;
}

/// A self-describing tool: definition and handler in one type
pub trait Tool: ToolHandler {
    fn definition(&self) -> ToolDefinition;
}

/// Adapts a synchronous closure into a [`ToolHandler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&ToolArguments, &mut AgentContext) -> Result<ToolResult> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(&ToolArguments, &mut AgentContext) -> Result<ToolResult> + Send + Sync,
{
    async fn call(&self, arguments: &ToolArguments, context: &mut AgentContext) -> Result<ToolResult> {
        (self.f)(arguments, context)
    }
}

/// Registry for available tools.
///
/// Read-only once startup registration is done; share it behind an `Arc`
/// between executors.
#[derive(Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces the
    /// earlier one but keeps its position in [`ToolRegistry::list`].
    pub fn register<H: ToolHandler + 'static>(&mut self, definition: ToolDefinition, handler: H) {
        self.register_arc(definition, Arc::new(handler));
    }

    /// Register a shared handler
    pub fn register_arc(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        let name = definition.name.clone();

        if let Some(pos) = self.definitions.iter().position(|d| d.name == name) {
            tracing::warn!(tool = %name, "Tool re-registered; replacing previous definition");
            self.definitions[pos] = definition;
        } else {
            self.definitions.push(definition);
        }

        self.handlers.insert(name, handler);
    }

    /// Register a closure-backed tool
    pub fn register_fn<F>(&mut self, definition: ToolDefinition, f: F)
    where
        F: Fn(&ToolArguments, &mut AgentContext) -> Result<ToolResult> + Send + Sync + 'static,
    {
        self.register(definition, FnHandler::new(f));
    }

    /// Register a self-describing tool
    pub fn register_tool<T: Tool + 'static>(&mut self, tool: T) {
        let definition = tool.definition();
        self.register(definition, tool);
    }

    /// All definitions in registration order
    pub fn list(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Get a definition by name
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Get tool names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.name.clone()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Markdown section describing every registered tool
    pub fn prompt_section(&self) -> String {
        describe_tools(&self.definitions)
    }

    /// Execute a tool by name.
    ///
    /// Never fails: unknown names, invalid arguments, handler errors and
    /// handler panics all come back as a failed [`ToolResult`].
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &ToolArguments,
        context: &mut AgentContext,
    ) -> ToolResult {
        let (Some(definition), Some(handler)) = (self.get(name), self.handlers.get(name)) else {
            tracing::warn!(tool = %name, "Model requested an unknown tool");
            return AgentError::ToolNotFound(name.to_string()).into();
        };

        if let Err(e) = definition.validate(arguments) {
            tracing::debug!(tool = %name, error = %e, "Tool arguments rejected");
            return e.into();
        }

        match AssertUnwindSafe(handler.call(arguments, context)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::debug!(tool = %name, error = %e, "Tool handler failed");
                e.into()
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".into());
                tracing::warn!(tool = %name, reason = %reason, "Tool handler panicked");
                AgentError::ToolExecution(reason).into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip_add_definition() -> ToolDefinition {
        ToolDefinition::new("clip_add", "Add a media file to the timeline")
            .param(ParameterSchema::new("path", "string", "Media file path").required())
            .param(
                ParameterSchema::new("track", "string", "Target track kind")
                    .with_enum(["video", "audio"]),
            )
    }

    struct ProjectOpen;

    #[async_trait]
    impl ToolHandler for ProjectOpen {
        async fn call(&self, arguments: &ToolArguments, context: &mut AgentContext) -> Result<ToolResult> {
            let path = arguments
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| AgentError::ToolValidation("path must be a string".into()))?;
            let resolved = context.resolve(path);
            context.set_project(&resolved);
            Ok(ToolResult::success(format!("Opened {}", resolved.display())))
        }
    }

    impl Tool for ProjectOpen {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("project_open", "Open an existing project")
                .param(ParameterSchema::new("path", "string", "Project file").required())
        }
    }

    fn args(value: Value) -> ToolArguments {
        arguments_from_value(value).unwrap()
    }

    #[test]
    fn test_json_schema_shape() {
        let schema = clip_add_definition().json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["track"]["enum"], json!(["video", "audio"]));
        assert_eq!(schema["required"], json!(["path"]));
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["project_create", "clip_add", "export_render"] {
            registry.register_fn(ToolDefinition::new(name, "test"), |_, _| {
                Ok(ToolResult::success("ok"))
            });
        }
        assert_eq!(registry.names(), vec!["project_create", "clip_add", "export_render"]);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_handler_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register_fn(ToolDefinition::new("a", "first"), |_, _| Ok(ToolResult::success("one")));
        registry.register_fn(ToolDefinition::new("b", "other"), |_, _| Ok(ToolResult::success("b")));
        registry.register_fn(ToolDefinition::new("a", "second"), |_, _| Ok(ToolResult::success("two")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().description, "second");

        let mut ctx = AgentContext::default();
        let result = registry.dispatch("a", &ToolArguments::new(), &mut ctx).await;
        assert_eq!(result.output, "two");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_failed_result() {
        let registry = ToolRegistry::new();
        let mut ctx = AgentContext::new("/work");

        for _ in 0..2 {
            let result = registry.dispatch("timeline_explode", &ToolArguments::new(), &mut ctx).await;
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().contains("Unknown tool"));
        }
        assert_eq!(ctx, AgentContext::new("/work"));
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let mut registry = ToolRegistry::new();
        registry.register_fn(clip_add_definition(), |_, _| Ok(ToolResult::success("added")));
        let mut ctx = AgentContext::default();

        let missing = registry.dispatch("clip_add", &ToolArguments::new(), &mut ctx).await;
        assert!(missing.error.unwrap().contains("Missing required parameter: path"));

        let bad_enum = registry
            .dispatch("clip_add", &args(json!({"path": "a.mp4", "track": "subtitle"})), &mut ctx)
            .await;
        assert!(!bad_enum.success);

        let ok = registry
            .dispatch("clip_add", &args(json!({"path": "a.mp4", "track": "audio"})), &mut ctx)
            .await;
        assert!(ok.success);
    }

    #[tokio::test]
    async fn test_handler_mutates_context() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(ProjectOpen);
        let mut ctx = AgentContext::new("/work");

        let result = registry
            .dispatch("project_open", &args(json!({"path": "demo.json"})), &mut ctx)
            .await;

        assert!(result.success);
        assert_eq!(ctx.project(), Some(std::path::Path::new("/work/demo.json")));
    }

    #[tokio::test]
    async fn test_handler_error_and_panic_are_contained() {
        let mut registry = ToolRegistry::new();
        registry.register_fn(ToolDefinition::new("fails", "x"), |_, _| {
            Err(AgentError::ToolExecution("ffmpeg exited with 1".into()))
        });
        registry.register_fn(ToolDefinition::new("panics", "x"), |_, _| panic!("index out of range"));
        let mut ctx = AgentContext::default();

        let failed = registry.dispatch("fails", &ToolArguments::new(), &mut ctx).await;
        assert_eq!(failed.to_content(), "Error: Tool execution error: ffmpeg exited with 1");

        let panicked = registry.dispatch("panics", &ToolArguments::new(), &mut ctx).await;
        assert!(!panicked.success);
        assert!(panicked.error.unwrap().contains("index out of range"));
    }

    #[test]
    fn test_describe_tools() {
        let text = describe_tools(&[clip_add_definition()]);
        assert!(text.contains("### clip_add"));
        assert!(text.contains("`path` (string) (required)"));
        assert!(text.contains("[one of: \"video\", \"audio\"]"));
    }

    #[test]
    fn test_arguments_from_value() {
        assert!(arguments_from_value(Value::Null).unwrap().is_empty());
        assert!(arguments_from_value(json!([1, 2])).is_err());
        assert_eq!(args(json!({"name": "demo"}))["name"], "demo");
    }
}
