//! Table-driven tool dispatch for capability workers.
//!
//! A capability (mail, calendar, chat, issue tracker, ...) declares each of
//! its tools once: a [`ToolMetadata`] schema plus a handler. The oracle sees
//! the schemas, picks a tool, and the [`ToolTable`] validates the arguments
//! against the declared schema before calling the handler.
//!
//! ```text
//! model tool call → ToolTable::execute(name, args) → validate → handler → ToolResult
//! ```
//!
//! Tool failures are ordinary data here. [`describe_outcome`] renders any
//! outcome, success or failure, as text the completion-check loop can reason
//! about.
//!
//! # Example
//!
//! ```rust
//! use teamledger::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType, ToolResult, ToolTable};
//! use std::sync::Arc;
//!
//! let mut table = ToolTable::new();
//! table.register(
//!     ToolMetadata::new("count_unread", "Count unread mail in a folder")
//!         .with_parameter(
//!             ToolParameter::new("folder", ToolParameterType::String)
//!                 .with_description("Folder name")
//!                 .required(),
//!         ),
//!     Arc::new(|args: serde_json::Value| {
//!         let folder = args["folder"].as_str().unwrap_or("inbox");
//!         Ok(ToolResult::success(serde_json::json!({ "folder": folder, "unread": 3 })))
//!     }),
//! );
//! assert_eq!(table.list().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Represents the result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution was successful
    pub success: bool,
    /// The output data from the tool
    pub output: JsonValue,
    /// Optional error message if execution failed
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: JsonValue) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: JsonValue::Null,
            error: Some(error.into()),
        }
    }
}

/// Defines the type of a tool parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ToolParameterType {
    fn as_str(&self) -> &'static str {
        match self {
            ToolParameterType::String => "string",
            ToolParameterType::Number => "number",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Boolean => "boolean",
            ToolParameterType::Array => "array",
            ToolParameterType::Object => "object",
        }
    }

    fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            ToolParameterType::String => value.is_string(),
            ToolParameterType::Number => value.is_number(),
            ToolParameterType::Integer => value.is_i64() || value.is_u64(),
            ToolParameterType::Boolean => value.is_boolean(),
            ToolParameterType::Array => value.is_array(),
            ToolParameterType::Object => value.is_object(),
        }
    }
}

/// Defines a parameter for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
    /// For array types, the type of the items
    pub items: Option<ToolParameterType>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            items: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_items(mut self, item_type: ToolParameterType) -> Self {
        self.items = Some(item_type);
        self
    }

    fn to_schema(&self) -> JsonValue {
        let mut schema = json!({ "type": self.param_type.as_str() });
        if let Some(description) = &self.description {
            schema["description"] = json!(description);
        }
        if let Some(items) = &self.items {
            schema["items"] = json!({ "type": items.as_str() });
        }
        schema
    }
}

/// Declared interface of one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Render as an OpenAI-style function tool definition.
    pub fn to_function_schema(&self) -> JsonValue {
        let properties: serde_json::Map<String, JsonValue> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }

    /// Check `args` against the declared parameters.
    pub fn validate(&self, args: &JsonValue) -> Result<(), ToolError> {
        let object = args.as_object().ok_or_else(|| {
            ToolError::InvalidParameters(format!("{} expects a JSON object of arguments", self.name))
        })?;
        for param in &self.parameters {
            match object.get(&param.name) {
                None | Some(JsonValue::Null) if param.required => {
                    return Err(ToolError::InvalidParameters(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
                Some(value) if !value.is_null() && !param.param_type.accepts(value) => {
                    return Err(ToolError::InvalidParameters(format!(
                        "parameter '{}' must be of type {}",
                        param.name,
                        param.param_type.as_str()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Error types for tool operations
#[derive(Debug, Clone, PartialEq)]
pub enum ToolError {
    /// Requested tool is not in the table.
    NotFound(String),
    /// The arguments failed schema validation or JSON decoding.
    InvalidParameters(String),
    /// The handler itself reported an error.
    ExecutionFailed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool not found: {}", name),
            ToolError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
            ToolError::ExecutionFailed(msg) => write!(f, "Tool execution failed: {}", msg),
        }
    }
}

impl Error for ToolError {}

/// Synchronous tool handler.
pub type ToolFunction =
    Arc<dyn Fn(JsonValue) -> Result<ToolResult, Box<dyn Error + Send + Sync>> + Send + Sync>;

/// Asynchronous tool handler, for handlers that call out to a service.
pub type AsyncToolFunction = Arc<
    dyn Fn(
            JsonValue,
        ) -> Pin<Box<dyn Future<Output = Result<ToolResult, Box<dyn Error + Send + Sync>>> + Send>>
        + Send
        + Sync,
>;

#[derive(Clone)]
enum Handler {
    Sync(ToolFunction),
    Async(AsyncToolFunction),
}

#[derive(Clone)]
struct ToolEntry {
    metadata: ToolMetadata,
    handler: Handler,
}

/// `tool name → (schema, handler)` dispatch table.
#[derive(Clone, Default)]
pub struct ToolTable {
    tools: HashMap<String, ToolEntry>,
    // registration order, so schemas reach the model in a stable order
    order: Vec<String>,
}

impl ToolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous tool, replacing any tool with the same name.
    pub fn register(&mut self, metadata: ToolMetadata, function: ToolFunction) {
        self.insert(metadata, Handler::Sync(function));
    }

    pub fn register_async(&mut self, metadata: ToolMetadata, function: AsyncToolFunction) {
        self.insert(metadata, Handler::Async(function));
    }

    fn insert(&mut self, metadata: ToolMetadata, handler: Handler) {
        let name = metadata.name.clone();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, ToolEntry { metadata, handler });
    }

    /// Declared schemas in registration order.
    pub fn list(&self) -> Vec<ToolMetadata> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|entry| entry.metadata.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolMetadata> {
        self.tools.get(name).map(|entry| &entry.metadata)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and run a tool.
    pub async fn execute(&self, name: &str, args: JsonValue) -> Result<ToolResult, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        entry.metadata.validate(&args)?;

        let outcome = match &entry.handler {
            Handler::Sync(function) => function(args),
            Handler::Async(function) => function(args).await,
        };
        outcome.map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

/// Render any tool outcome as text for the next oracle turn.
pub fn describe_outcome(name: &str, outcome: &Result<ToolResult, ToolError>) -> String {
    match outcome {
        Ok(result) if result.success => result.output.to_string(),
        Ok(result) => format!(
            "The tool {} reported a failure: {}",
            name,
            result.error.as_deref().unwrap_or("no detail given")
        ),
        Err(ToolError::NotFound(_)) => format!("The tool {} does not exist for this agent.", name),
        Err(err) => format!("The tool {} could not run. {}", name, err),
    }
}
