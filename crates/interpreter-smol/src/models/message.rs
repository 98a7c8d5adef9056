use serde::{Deserialize, Serialize};

use super::content::ContentPart;
use super::role::Role;
use super::tool::ToolInvocation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single turn of a conversation, as supplied by the caller.
///
/// Messages are immutable once built; use the constructors to create them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    role: Role,
    content: MessageContent,
}

impl ConversationMessage {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self { role, content }
    }

    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, MessageContent::Text(text.into()))
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(text.into()))
    }

    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(Role::System, MessageContent::Text(text.into()))
    }

    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self::new(role, MessageContent::Parts(parts))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Concatenate all text in the message, parts joined by newlines
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// The normalized reply of a provider: prose, or a set of tool calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
}

impl ChatMessage {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_user_message() {
        let message = ConversationMessage::user("abcd");
        assert_eq!(message.role(), Role::User);
        assert_eq!(message.text(), "abcd");
    }

    #[test]
    fn test_parts_message_text() {
        let message = ConversationMessage::with_parts(
            Role::User,
            vec![
                ContentPart::text("look at"),
                ContentPart::image("https://example.com/cat.jpg"),
                ContentPart::text("this cat"),
            ],
        );
        assert_eq!(message.text(), "look at\nthis cat");
    }

    #[test]
    fn test_message_content_untagged() {
        let plain: ConversationMessage =
            serde_json::from_value(json!({"role": "system", "content": "be brief"})).unwrap();
        assert_eq!(plain.role(), Role::System);
        assert_eq!(plain.content(), &MessageContent::Text("be brief".to_string()));

        let parts: ConversationMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "text", "text": "hi"}]
        }))
        .unwrap();
        assert_eq!(
            parts.content(),
            &MessageContent::Parts(vec![ContentPart::text("hi")])
        );
    }

    #[test]
    fn test_chat_message_shapes() {
        let reply = ChatMessage::text("done");
        assert!(!reply.has_tool_calls());
        assert_eq!(reply.text_or_empty(), "done");

        let calls = ChatMessage::tool_calls(vec![ToolInvocation::new(
            "list_agents",
            json!({}),
        )]);
        assert!(calls.has_tool_calls());
        assert_eq!(calls.text_or_empty(), "");

        let value: Value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value.get("tool_calls").is_none());
    }
}
