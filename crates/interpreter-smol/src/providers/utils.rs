use std::collections::{BTreeMap, HashSet};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use super::base::Usage;
use super::types::{
    Blob, Content, FileData, FunctionDeclaration, GenerateContentResponse, ItemSchema, Part,
    PropertySchema, Schema, Tool, IMAGE_MIME_TYPE, ROLE_MODEL, ROLE_USER, SCHEMA_OBJECT,
};
use crate::errors::{ModelError, ModelResult};
use crate::models::content::{ContentPart, ImageSource};
use crate::models::message::{ChatMessage, ConversationMessage, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{ParamType, ToolDescriptor, ToolInvocation};

/// Convert conversation messages to Gemini's content list.
///
/// Gemini only knows two roles, so everything that is not a user turn is sent as
/// the model.
pub fn messages_to_gemini_spec(messages: &[ConversationMessage]) -> ModelResult<Vec<Content>> {
    let mut contents = Vec::with_capacity(messages.len());

    for message in messages {
        let role = match message.role() {
            Role::User => ROLE_USER,
            Role::Assistant | Role::System => ROLE_MODEL,
        };

        let parts = match message.content() {
            MessageContent::Text(text) => vec![Part::text(text.as_str())],
            MessageContent::Parts(items) => items
                .iter()
                .map(content_part_to_gemini)
                .collect::<ModelResult<Vec<_>>>()?,
        };

        contents.push(Content {
            role: Some(role.to_string()),
            parts,
        });
    }

    Ok(contents)
}

fn content_part_to_gemini(part: &ContentPart) -> ModelResult<Part> {
    match part {
        ContentPart::Text(text) => Ok(Part::text(text.text.as_str())),
        ContentPart::Image(image) => match image.source() {
            ImageSource::Embedded(encoded) => {
                let data = STANDARD.decode(encoded.trim()).map_err(|e| {
                    ModelError::InvalidContent(format!("Could not decode embedded image: {}", e))
                })?;
                Ok(Part::inline_data(Blob {
                    mime_type: IMAGE_MIME_TYPE.to_string(),
                    data,
                }))
            }
            // Remote images are referenced, never fetched
            ImageSource::Remote(url) => Ok(Part::file_data(FileData {
                mime_type: IMAGE_MIME_TYPE.to_string(),
                file_uri: url.to_string(),
            })),
        },
    }
}

/// Convert tool descriptors to Gemini function declarations, one tool each.
///
/// Gemini has no `any` type, so those parameters are narrowed to `string`.
pub fn tools_to_gemini_spec(tools: &[ToolDescriptor]) -> ModelResult<Vec<Tool>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::with_capacity(tools.len());

    for tool in tools {
        if !tool_names.insert(tool.name.as_str()) {
            return Err(ModelError::InvalidContent(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for (name, input) in tool.inputs() {
            let property_type = narrow(input.param_type);
            let items = (property_type == ParamType::Array).then(|| ItemSchema {
                item_type: narrow(input.items.unwrap_or(ParamType::String))
                    .as_str()
                    .to_string(),
            });
            properties.insert(
                name.to_string(),
                PropertySchema {
                    property_type: property_type.as_str().to_string(),
                    description: input.description.clone(),
                    items,
                },
            );
            if !input.nullable {
                required.push(name.to_string());
            }
        }

        result.push(Tool {
            function_declarations: vec![FunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: Schema {
                    schema_type: SCHEMA_OBJECT.to_string(),
                    properties,
                    required,
                },
            }],
        });
    }

    Ok(result)
}

fn narrow(param_type: ParamType) -> ParamType {
    match param_type {
        ParamType::Any => ParamType::String,
        other => other,
    }
}

/// Parse a raw response body
pub fn parse_gemini_response(body: &str) -> ModelResult<GenerateContentResponse> {
    serde_json::from_str(body).map_err(|e| ModelError::ResponseParse(e.to_string()))
}

/// Convert a Gemini response to the normalized message format.
///
/// A turn is either prose or tool calls: when tools were supplied and the first
/// candidate holds function calls, any text next to them is dropped.
pub fn gemini_response_to_message(
    response: &GenerateContentResponse,
    tools_supplied: bool,
) -> ModelResult<ChatMessage> {
    if response.text.is_none() && response.candidates.is_empty() {
        let reason = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
            .map(|reason| format!("prompt blocked: {}", reason))
            .unwrap_or_else(|| "response has no text and no candidates".to_string());
        return Err(ModelError::ResponseParse(reason));
    }

    let parts = first_candidate_parts(response);

    if tools_supplied {
        let calls = function_calls(parts);
        if !calls.is_empty() {
            return Ok(ChatMessage::tool_calls(calls));
        }
    }

    let text = match &response.text {
        Some(text) => text.clone(),
        None => parts.iter().filter_map(|part| part.text.as_deref()).collect(),
    };

    Ok(ChatMessage::text(text))
}

fn first_candidate_parts(response: &GenerateContentResponse) -> &[Part] {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| content.parts.as_slice())
        .unwrap_or_default()
}

pub(crate) fn function_calls(parts: &[Part]) -> Vec<ToolInvocation> {
    parts
        .iter()
        .filter_map(|part| part.function_call.as_ref())
        .map(|call| ToolInvocation::new(call.name.as_str(), call.args.clone().unwrap_or(json!({}))))
        .collect()
}

/// Token counts reported by the response, if it carries usage metadata
pub fn extract_usage(response: &GenerateContentResponse) -> Option<Usage> {
    let metadata = response.usage_metadata?;
    let total = metadata.total_token_count.or_else(|| {
        match (metadata.prompt_token_count, metadata.candidates_token_count) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        }
    });
    Some(Usage::new(
        metadata.prompt_token_count,
        metadata.candidates_token_count,
        total,
    ))
}

/// Describe request contents for debug logs without dumping inline image bytes
pub fn summarize_request_contents(contents: &[Content]) -> Value {
    Value::Array(
        contents
            .iter()
            .map(|content| {
                json!({
                    "role": content.role,
                    "parts": content.parts.len(),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolInput;

    const GEMINI_TOOL_USE_RESPONSE: &str = r#"{
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    {"text": "Let me check."},
                    {"functionCall": {"name": "get_agent", "args": {"name": "WebSearcher"}}},
                    {"functionCall": {"name": "list_agents"}}
                ]
            },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 10,
            "candidatesTokenCount": 25,
            "totalTokenCount": 35
        }
    }"#;

    fn search_tool() -> ToolDescriptor {
        ToolDescriptor::new("search", "Search the web")
            .with_input("query", ToolInput::required(ParamType::String, "Search terms"))
            .with_input("filter", ToolInput::required(ParamType::Any, "Free-form filter"))
            .with_input("limit", ToolInput::optional(ParamType::Integer, "Max results"))
    }

    #[test]
    fn test_messages_to_gemini_spec_roles() -> ModelResult<()> {
        let messages = vec![
            ConversationMessage::system("You are terse."),
            ConversationMessage::user("Hello"),
            ConversationMessage::assistant("Hi!"),
        ];
        let spec = messages_to_gemini_spec(&messages)?;

        assert_eq!(spec.len(), 3);
        let roles: Vec<_> = spec.iter().map(|c| c.role.as_deref().unwrap()).collect();
        assert_eq!(roles, vec!["model", "user", "model"]);
        for (content, message) in spec.iter().zip(&messages) {
            assert_eq!(content.parts.len(), 1);
            assert_eq!(content.parts[0].text.as_deref(), Some(message.text().as_str()));
        }
        Ok(())
    }

    #[test]
    fn test_messages_to_gemini_spec_multimodal() -> ModelResult<()> {
        let message = ConversationMessage::with_parts(
            Role::User,
            vec![
                ContentPart::text("Compare these"),
                ContentPart::image("data:image/png;base64,aGVsbG8="),
                ContentPart::image("https://example.com/cat.jpg"),
            ],
        );
        let spec = messages_to_gemini_spec(&[message])?;
        let parts = &spec[0].parts;

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].text.as_deref(), Some("Compare these"));

        let blob = parts[1].inline_data.as_ref().unwrap();
        assert_eq!(blob.mime_type, "image/jpeg");
        assert_eq!(blob.data, b"hello".to_vec());

        let file = parts[2].file_data.as_ref().unwrap();
        assert_eq!(file.file_uri, "https://example.com/cat.jpg");
        assert!(parts[2].inline_data.is_none());
        Ok(())
    }

    #[test]
    fn test_messages_to_gemini_spec_bad_data_url() {
        let message = ConversationMessage::with_parts(
            Role::User,
            vec![ContentPart::image("data:image/png;base64,!!!not base64")],
        );
        let result = messages_to_gemini_spec(&[message]);
        assert!(matches!(result, Err(ModelError::InvalidContent(_))));
    }

    #[test]
    fn test_tools_to_gemini_spec() -> ModelResult<()> {
        let spec = tools_to_gemini_spec(&[search_tool()])?;
        assert_eq!(spec.len(), 1);

        let declaration = &spec[0].function_declarations[0];
        assert_eq!(declaration.name, "search");
        assert_eq!(declaration.parameters.schema_type, "OBJECT");
        assert_eq!(declaration.parameters.properties["filter"].property_type, "string");
        assert_eq!(declaration.parameters.properties["limit"].property_type, "integer");
        assert_eq!(declaration.parameters.required, vec!["query", "filter"]);

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value[0]["functionDeclarations"][0]["parameters"]["properties"]["query"],
            json!({"type": "string", "description": "Search terms"})
        );
        Ok(())
    }

    #[test]
    fn test_array_inputs_declare_items() -> ModelResult<()> {
        let tool = ToolDescriptor::new("create_agent", "Create an agent")
            .with_input("tools", ToolInput::optional(ParamType::Array, "names"))
            .with_input(
                "scores",
                ToolInput::required(ParamType::Array, "per-step scores").with_items(ParamType::Number),
            )
            .with_input(
                "anything",
                ToolInput::required(ParamType::Array, "mixed").with_items(ParamType::Any),
            );

        let value = serde_json::to_value(tools_to_gemini_spec(&[tool])?).unwrap();
        let properties = &value[0]["functionDeclarations"][0]["parameters"]["properties"];
        assert_eq!(
            properties["tools"],
            json!({"type": "array", "description": "names", "items": {"type": "string"}})
        );
        assert_eq!(properties["scores"]["items"], json!({"type": "number"}));
        assert_eq!(properties["anything"]["items"], json!({"type": "string"}));
        Ok(())
    }

    #[test]
    fn test_tools_to_gemini_spec_duplicate() {
        let result = tools_to_gemini_spec(&[search_tool(), search_tool()]);
        assert!(matches!(result, Err(ModelError::InvalidContent(msg)) if msg.contains("Duplicate tool name")));
    }

    #[test]
    fn test_response_prefers_top_level_text() -> ModelResult<()> {
        let response = parse_gemini_response(
            r#"{"text": "top", "candidates": [{"content": {"parts": [{"text": "part"}]}}]}"#,
        )?;
        let message = gemini_response_to_message(&response, false)?;
        assert_eq!(message.content.as_deref(), Some("top"));
        Ok(())
    }

    #[test]
    fn test_response_concatenates_first_candidate_parts() -> ModelResult<()> {
        let response = parse_gemini_response(
            r#"{"candidates": [
                {"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]}"#,
        )?;
        let message = gemini_response_to_message(&response, false)?;
        assert_eq!(message.content.as_deref(), Some("Hello, world"));
        assert!(!message.has_tool_calls());
        Ok(())
    }

    #[test]
    fn test_response_tool_calls_drop_text() -> ModelResult<()> {
        let response = parse_gemini_response(GEMINI_TOOL_USE_RESPONSE)?;
        let message = gemini_response_to_message(&response, true)?;

        assert!(message.content.is_none());
        assert_eq!(message.tool_calls.len(), 2);
        assert_eq!(message.tool_calls[0].name, "get_agent");
        assert_eq!(message.tool_calls[0].arguments, json!({"name": "WebSearcher"}));
        assert_eq!(message.tool_calls[1].arguments, json!({}));
        assert_ne!(message.tool_calls[0].id, message.tool_calls[1].id);
        Ok(())
    }

    #[test]
    fn test_response_function_calls_ignored_without_tools() -> ModelResult<()> {
        let response = parse_gemini_response(GEMINI_TOOL_USE_RESPONSE)?;
        let message = gemini_response_to_message(&response, false)?;
        assert_eq!(message.content.as_deref(), Some("Let me check."));
        assert!(message.tool_calls.is_empty());
        Ok(())
    }

    #[test]
    fn test_response_without_candidates_is_parse_error() -> ModelResult<()> {
        let response = parse_gemini_response(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)?;
        let result = gemini_response_to_message(&response, false);
        assert!(matches!(result, Err(ModelError::ResponseParse(msg)) if msg.contains("SAFETY")));

        assert!(matches!(
            parse_gemini_response("[1, 2]"),
            Err(ModelError::ResponseParse(_))
        ));
        Ok(())
    }

    #[test]
    fn test_extract_usage() -> ModelResult<()> {
        let response = parse_gemini_response(GEMINI_TOOL_USE_RESPONSE)?;
        assert_eq!(
            extract_usage(&response),
            Some(Usage::new(Some(10), Some(25), Some(35)))
        );

        let response = parse_gemini_response(
            r#"{"text": "x", "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6}}"#,
        )?;
        assert_eq!(extract_usage(&response).unwrap().total_tokens, Some(10));

        let response = parse_gemini_response(r#"{"text": "x"}"#)?;
        assert_eq!(extract_usage(&response), None);
        Ok(())
    }
}
