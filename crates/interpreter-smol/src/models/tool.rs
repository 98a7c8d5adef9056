use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Boolean,
    Integer,
    Number,
    Image,
    Audio,
    Array,
    Object,
    Any,
    Null,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Image => "image",
            ParamType::Audio => "audio",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
            ParamType::Null => "null",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    /// Nullable inputs are optional; everything else is required.
    #[serde(default)]
    pub nullable: bool,
    /// Element type of an `array` input; string when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParamType>,
}

impl ToolInput {
    pub fn required<D: Into<String>>(param_type: ParamType, description: D) -> Self {
        Self {
            param_type,
            description: description.into(),
            nullable: false,
            items: None,
        }
    }

    pub fn optional<D: Into<String>>(param_type: ParamType, description: D) -> Self {
        Self {
            param_type,
            description: description.into(),
            nullable: true,
            items: None,
        }
    }

    pub fn with_items(mut self, items: ParamType) -> Self {
        self.items = Some(items);
        self
    }
}

/// Describes a tool to a model: its name, purpose and parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    inputs: Vec<(String, ToolInput)>,
}

impl ToolDescriptor {
    pub fn new<N, D>(name: N, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
        }
    }

    /// Add a parameter, replacing any earlier one with the same name in place
    pub fn with_input<N: Into<String>>(mut self, name: N, input: ToolInput) -> Self {
        let name = name.into();
        match self.inputs.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = input,
            None => self.inputs.push((name, input)),
        }
        self
    }

    /// Parameters in declaration order
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &ToolInput)> {
        self.inputs.iter().map(|(name, input)| (name.as_str(), input))
    }

    pub fn input(&self, name: &str) -> Option<&ToolInput> {
        self.inputs
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, input)| input)
    }
}

/// A request from the model to run a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    /// Create an invocation with a freshly generated id
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}
