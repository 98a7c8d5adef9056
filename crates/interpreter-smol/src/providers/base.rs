use serde::{Deserialize, Serialize};

use crate::errors::ModelResult;
use crate::models::message::{ChatMessage, ConversationMessage};
use crate::models::tool::ToolDescriptor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
        total_tokens: Option<u32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    pub fn zero() -> Self {
        Self::new(Some(0), Some(0), Some(0))
    }
}

/// Per-call overrides of the provider's generation defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
}

/// Base trait for model providers
pub trait Provider: Send {
    /// Create a provider instance from environment variables
    fn from_env() -> ModelResult<Self>
    where
        Self: Sized;

    /// Generate the next message for the conversation. When `tools` is supplied
    /// the reply may be a set of tool invocations instead of text.
    fn complete(
        &mut self,
        messages: &[ConversationMessage],
        tools: Option<&[ToolDescriptor]>,
        options: &GenerationOptions,
    ) -> ModelResult<ChatMessage>;

    /// Token counts recorded by the most recent call
    fn last_usage(&self) -> Usage;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_serialization() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let value = serde_json::to_value(usage).unwrap();
        assert_eq!(
            value,
            json!({"input_tokens": 10, "output_tokens": 20, "total_tokens": 30})
        );
        assert_eq!(Usage::default().input_tokens, None);
        assert_eq!(Usage::zero().output_tokens, Some(0));
    }
}
