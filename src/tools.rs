//! # Tool definitions and the tool registry
//!
//! A tool is something the model may ask to call. Each one is described to the
//! server by a [`ToolSpec`] (name, description, JSON Schema for its arguments) and
//! may carry an async handler that executes it locally.
//!
//! ```text
//! 1. Definition:   tool("get_weather", "...").param("city", "string").build(handler)
//! 2. Registration: LlmOptions::builder().tool(weather)       → ToolRegistry
//! 3. Offer:        registry.to_openai_format()               → request "tools"
//! 4. Invocation:   model streams a tool call                 → aggregator
//! 5. Execution:    registry.get(name)?.execute(arguments)    → tool-role message
//! ```
//!
//! Specs without a handler are offered to the model but never executed: their calls
//! are returned to the caller in the [`AggregateResult`](crate::AggregateResult).
//!
//! ## Schema notation
//!
//! Schemas may be written in any of three forms and are normalized to the JSON
//! Schema object the API expects:
//!
//! - **Simple notation**: `{"location": "string", "units": "string"}`
//! - **Typed properties**: `{"limit": {"type": "integer", "optional": true}}`
//! - **Full JSON Schema**: anything with `"type"` and `"properties"` passes through
//!
//! ```rust,no_run
//! use llm_wrapper::tool;
//! use serde_json::json;
//!
//! let weather = tool("get_weather", "Get current weather for a city")
//!     .param("city", "string")
//!     .build(|args| async move {
//!         let city = args["city"].as_str().unwrap_or("Unknown");
//!         Ok(json!({"city": city, "temperature": 22}))
//!     });
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Async tool handler: JSON arguments in, JSON result out.
///
/// ```text
/// Arc<                                      // shared between registry clones
///   dyn Fn(Value)                          // parsed call arguments
///     -> Pin<Box<                           // type-erased future
///       dyn Future<Output = Result<Value>>
///         + Send>>
///     + Send + Sync>
/// ```
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// What the model is told about a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments object
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

impl ToolSpec {
    /// Create a spec, normalizing `parameters` from any supported notation
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: convert_schema_to_openai(parameters),
        }
    }

    /// Function-calling entry for the request `tools` array
    pub fn to_openai_format(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }

    /// Read a spec from either `{"type":"function","function":{..}}` or the bare
    /// `{"name":..,"description":..,"parameters":..}` object.
    pub fn from_openai_format(value: &Value) -> Result<Self> {
        let function = value.get("function").unwrap_or(value);
        if function.get("name").and_then(Value::as_str).is_none() {
            return Err(Error::config("tool definition is missing a string 'name'"));
        }
        let mut spec: ToolSpec = serde_json::from_value(function.clone())?;
        spec.parameters = convert_schema_to_openai(spec.parameters);
        Ok(spec)
    }
}

/// A tool the client can execute on the model's behalf
#[derive(Clone)]
pub struct Tool {
    spec: ToolSpec,
    handler: ToolHandler,
}

impl Tool {
    /// Create a tool from a schema in any supported notation and an async handler.
    ///
    /// ```rust,no_run
    /// use llm_wrapper::Tool;
    /// use serde_json::json;
    ///
    /// let multiply = Tool::new(
    ///     "multiply",
    ///     "Multiply two numbers",
    ///     json!({"a": "number", "b": "number"}),
    ///     |args| async move {
    ///         let a = args["a"].as_f64().unwrap_or(1.0);
    ///         let b = args["b"].as_f64().unwrap_or(1.0);
    ///         Ok(json!({"result": a * b}))
    ///     },
    /// );
    /// ```
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            spec: ToolSpec::new(name, description, input_schema),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Run the handler
    pub async fn execute(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }

    pub fn to_openai_format(&self) -> Value {
        self.spec.to_openai_format()
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.spec.parameters
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.spec.name)
            .field("description", &self.spec.description)
            .field("input_schema", &self.spec.parameters)
            .finish()
    }
}

/// Normalize a schema to `{"type":"object","properties":..,"required":[..]}`.
///
/// Per-property `"optional": true`, `"required": false` or a `"default"` keep a
/// parameter out of `required`; everything else is required.
fn convert_schema_to_openai(schema: Value) -> Value {
    let Value::Object(obj) = schema else {
        return empty_object_schema();
    };
    if obj.contains_key("type") && obj.contains_key("properties") {
        return Value::Object(obj);
    }

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (param_name, param_type) in obj {
        match param_type {
            Value::String(type_str) => {
                properties.insert(param_name.clone(), type_to_json_schema(&type_str));
                required.push(param_name);
            }
            Value::Object(mut prop) => {
                let is_optional = prop
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop.remove("required").and_then(|v| v.as_bool());
                let has_default = prop.contains_key("default");

                properties.insert(param_name.clone(), Value::Object(prop));

                match is_required {
                    Some(true) => required.push(param_name),
                    Some(false) => {}
                    None if is_optional || has_default => {}
                    None => required.push(param_name),
                }
            }
            _ => {}
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// Map shorthand type names to a JSON Schema type; unknown names become `string`
fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        _ => "string",
    };
    json!({ "type": json_type })
}

/// Builder for [`Tool`], started with [`tool()`]
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({}),
        }
    }

    /// Replace the whole schema
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Add one required parameter in simple notation.
    ///
    /// A non-object schema set earlier is discarded.
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        if !self.schema.is_object() {
            self.schema = json!({});
        }
        if let Value::Object(obj) = &mut self.schema {
            obj.insert(name.to_string(), Value::String(type_str.to_string()));
        }
        self
    }

    /// Attach the handler and finish
    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Tool::new(self.name, self.description, self.schema, handler)
    }

    /// Finish without a handler; the model may call it but the caller handles it
    pub fn spec(self) -> ToolSpec {
        ToolSpec::new(self.name, self.description, self.schema)
    }
}

/// Start building a tool
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

/// Tools offered on each request, in registration order, plus the handlers
/// available for automatic execution.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    handlers: HashMap<String, Arc<Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executable tool
    pub fn register_tool(&mut self, tool: Tool) -> Result<()> {
        self.add_spec(tool.spec.clone())?;
        self.handlers
            .insert(tool.spec.name.clone(), Arc::new(tool));
        Ok(())
    }

    /// Register a tool the model may call but that is never executed locally
    pub fn register_spec(&mut self, spec: ToolSpec) -> Result<()> {
        self.add_spec(spec)
    }

    fn add_spec(&mut self, spec: ToolSpec) -> Result<()> {
        validate_tool_name(&spec.name)?;
        if self.specs.iter().any(|s| s.name == spec.name) {
            return Err(Error::config(format!(
                "tool '{}' is registered twice",
                spec.name
            )));
        }
        self.specs.push(spec);
        Ok(())
    }

    /// The executable tool registered under `name`
    pub fn get(&self, name: &str) -> Option<&Arc<Tool>> {
        self.handlers.get(name)
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Entries for the request `tools` array
    pub fn to_openai_format(&self) -> Vec<Value> {
        self.specs.iter().map(ToolSpec::to_openai_format).collect()
    }

    /// Whether any registered tool can run locally
    pub fn has_handlers(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.specs.iter().map(|s| s.name.as_str()).collect();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .field("executable", &self.handlers.len())
            .finish()
    }
}

/// Function names accepted by OpenAI-compatible servers: `[a-zA-Z0-9_-]{1,64}`
fn validate_tool_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("invalid tool name '{}'", name)))
    }
}
