//! Tools a model can ask to run, and the registry that dispatches them.
pub mod agents;
pub mod registry;

use std::fmt;

use serde_json::Value;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{ParamType, ToolDescriptor};

pub use agents::agent_management_tools;
pub use registry::ToolRegistry;

/// A named capability with a fixed parameter schema
pub trait Tool: Send + Sync {
    /// Describes the tool to the model
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run the tool with the arguments the model supplied
    fn invoke(&self, arguments: &Value) -> ToolResult<Value>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

type Handler = Box<dyn Fn(&Value) -> ToolResult<Value> + Send + Sync>;

/// A tool backed by a closure
pub struct FunctionTool {
    descriptor: ToolDescriptor,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F>(descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(&Value) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Tool for FunctionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn invoke(&self, arguments: &Value) -> ToolResult<Value> {
        check_arguments(&self.descriptor, arguments)?;
        (self.handler)(arguments)
    }
}

/// Check that every required input is present and every supplied input has
/// its declared type. Unknown keys are rejected.
pub fn check_arguments(descriptor: &ToolDescriptor, arguments: &Value) -> ToolResult<()> {
    let empty = serde_json::Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ToolError::InvalidParameters(format!(
                "Arguments for '{}' must be an object, got {}",
                descriptor.name, other
            )))
        }
    };

    for key in args.keys() {
        if descriptor.input(key).is_none() {
            return Err(ToolError::InvalidParameters(format!(
                "Unknown parameter '{}' for '{}'",
                key, descriptor.name
            )));
        }
    }

    for (name, input) in descriptor.inputs() {
        match args.get(name) {
            None | Some(Value::Null) if input.nullable => {}
            None | Some(Value::Null) => {
                return Err(ToolError::InvalidParameters(format!(
                    "Missing '{}' parameter",
                    name
                )))
            }
            Some(value) if !matches_type(input.param_type, value) => {
                return Err(ToolError::InvalidParameters(format!(
                    "Parameter '{}' must be of type {}",
                    name,
                    input.param_type.as_str()
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn matches_type(param_type: ParamType, value: &Value) -> bool {
    match param_type {
        ParamType::String | ParamType::Image | ParamType::Audio => value.is_string(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
        ParamType::Null => value.is_null(),
        ParamType::Any => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolInput;
    use serde_json::json;

    fn adder() -> FunctionTool {
        let descriptor = ToolDescriptor::new("add", "Add two integers")
            .with_input("a", ToolInput::required(ParamType::Integer, "left"))
            .with_input("b", ToolInput::optional(ParamType::Integer, "right"));
        FunctionTool::new(descriptor, |args| {
            let a = args["a"].as_i64().unwrap_or_default();
            let b = args.get("b").and_then(Value::as_i64).unwrap_or_default();
            Ok(json!(a + b))
        })
    }

    #[test]
    fn test_function_tool_invoke() {
        let tool = adder();
        assert_eq!(tool.name(), "add");
        assert_eq!(tool.invoke(&json!({"a": 2, "b": 3})).unwrap(), json!(5));
        assert_eq!(tool.invoke(&json!({"a": 2})).unwrap(), json!(2));
    }

    #[test]
    fn test_argument_validation() {
        let tool = adder();
        let cases = [
            json!({}),
            json!({"a": "two"}),
            json!({"a": 1, "c": 3}),
            json!([1, 2]),
        ];
        for args in cases {
            assert!(
                matches!(tool.invoke(&args), Err(ToolError::InvalidParameters(_))),
                "accepted {}",
                args
            );
        }
    }

    #[test]
    fn test_null_arguments_for_tool_without_inputs() {
        let tool = FunctionTool::new(ToolDescriptor::new("ping", "Ping"), |_| Ok(json!("pong")));
        assert_eq!(tool.invoke(&Value::Null).unwrap(), json!("pong"));
    }
}
