use std::collections::VecDeque;

use super::base::{GenerationOptions, Provider, Usage};
use crate::errors::{ModelError, ModelResult};
use crate::models::message::{ChatMessage, ConversationMessage};
use crate::models::tool::ToolDescriptor;

/// A provider that replays pre-configured replies and records what it was sent
pub struct MockProvider {
    responses: VecDeque<ModelResult<ChatMessage>>,
    pub calls: Vec<(usize, Vec<String>)>,
    usage: Usage,
}

impl MockProvider {
    pub fn new(responses: Vec<ModelResult<ChatMessage>>) -> Self {
        Self {
            responses: responses.into(),
            calls: Vec::new(),
            usage: Usage::default(),
        }
    }
}

impl Provider for MockProvider {
    fn from_env() -> ModelResult<Self> {
        Ok(Self::new(Vec::new()))
    }

    fn complete(
        &mut self,
        messages: &[ConversationMessage],
        tools: Option<&[ToolDescriptor]>,
        _options: &GenerationOptions,
    ) -> ModelResult<ChatMessage> {
        let tool_names = tools
            .unwrap_or_default()
            .iter()
            .map(|tool| tool.name.clone())
            .collect();
        self.calls.push((messages.len(), tool_names));
        self.usage = Usage::new(Some(messages.len() as u32), Some(1), None);

        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::ResponseParse("no scripted reply left".into())))
    }

    fn last_usage(&self) -> Usage {
        self.usage
    }
}
