use std::io::{BufRead, BufReader};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::base::{GenerationOptions, Provider, Usage};
use super::configs::{GeminiProviderConfig, ProviderConfig, UsageAccounting};
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Tool,
};
use super::utils::{
    extract_usage, function_calls, gemini_response_to_message, messages_to_gemini_spec,
    parse_gemini_response, summarize_request_contents, tools_to_gemini_spec,
};
use crate::errors::{ModelError, ModelResult};
use crate::models::message::{ChatMessage, ConversationMessage};
use crate::models::tool::ToolDescriptor;

const API_VERSION: &str = "v1beta";

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
    last_usage: Usage,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> ModelResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::Configuration(
                "API key is required. Set GOOGLE_API_KEY or pass an api key.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| ModelError::Configuration(format!("Could not build client: {}", e)))?;

        Ok(Self {
            client,
            config,
            last_usage: Usage::zero(),
        })
    }

    pub fn config(&self) -> &GeminiProviderConfig {
        &self.config
    }

    /// Stream a completion over server-sent events and assemble it into one message.
    ///
    /// The recorded usage starts from zero and takes the last usage metadata seen
    /// on the stream.
    pub fn complete_stream(
        &mut self,
        messages: &[ConversationMessage],
        tools: Option<&[ToolDescriptor]>,
        options: &GenerationOptions,
    ) -> ModelResult<ChatMessage> {
        self.last_usage = Usage::zero();

        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let (chunks, tools_used) =
            self.send_with_tool_fallback(messages, tools, options, |provider, request| {
                provider.stream(&url, request)
            })?;

        if let Some(usage) = chunks.iter().rev().find_map(extract_usage) {
            self.last_usage = usage;
        }

        stream_chunks_to_message(&chunks, tools_used)
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{}/models/{}:{}",
            self.config.host.trim_end_matches('/'),
            API_VERSION,
            self.config.model,
            method
        )
    }

    fn build_request(
        &self,
        contents: Vec<Content>,
        tools: Vec<Tool>,
        options: &GenerationOptions,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents,
            tools,
            generation_config: GenerationConfig {
                temperature: options.temperature.unwrap_or(self.config.temperature),
                top_p: options.top_p.unwrap_or(self.config.top_p),
                top_k: options.top_k.unwrap_or(self.config.top_k),
                max_output_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
                stop_sequences: options.stop_sequences.clone(),
            },
        }
    }

    /// Send the request, and if it fails while tools were attached, send it once more
    /// without them. Returns the result and whether tools were part of the request
    /// that succeeded.
    fn send_with_tool_fallback<T>(
        &self,
        messages: &[ConversationMessage],
        tools: Option<&[ToolDescriptor]>,
        options: &GenerationOptions,
        send: impl Fn(&Self, &GenerateContentRequest) -> ModelResult<T>,
    ) -> ModelResult<(T, bool)> {
        let contents = messages_to_gemini_spec(messages)?;
        let tools_spec = match tools {
            Some(tools) if !tools.is_empty() => tools_to_gemini_spec(tools)?,
            _ => Vec::new(),
        };

        if tools_spec.is_empty() {
            let request = self.build_request(contents, Vec::new(), options);
            return send(self, &request).map(|result| (result, false));
        }

        let request = self.build_request(contents.clone(), tools_spec, options);
        match send(self, &request) {
            Ok(result) => Ok((result, true)),
            Err(err) if err.is_provider_request() => {
                warn!(error = %err, "Gemini request with tools failed, retrying without tools");
                let request = self.build_request(contents, Vec::new(), options);
                send(self, &request).map(|result| (result, false))
            }
            Err(err) => Err(err),
        }
    }

    fn post(&self, url: &str, request: &GenerateContentRequest) -> ModelResult<Response> {
        debug!(
            model = %self.config.model,
            contents = %summarize_request_contents(&request.contents),
            tools = request.tools.len(),
            "Gemini request"
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                let error_text = response.text().unwrap_or_default();
                Err(ModelError::ProviderRequest(format!(
                    "Server error: {} - {}",
                    status, error_text
                )))
            }
            status => {
                let error_text = response.text().unwrap_or_default();
                Err(ModelError::ProviderRequest(format!(
                    "Request failed: {} - {}",
                    status, error_text
                )))
            }
        }
    }

    fn generate(&self, request: &GenerateContentRequest) -> ModelResult<GenerateContentResponse> {
        let response = self.post(&self.endpoint("generateContent"), request)?;
        let body = response.text()?;
        parse_gemini_response(&body)
    }

    fn stream(
        &self,
        url: &str,
        request: &GenerateContentRequest,
    ) -> ModelResult<Vec<GenerateContentResponse>> {
        let response = self.post(url, request)?;
        let reader = BufReader::new(response);

        let mut chunks = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| ModelError::ProviderRequest(e.to_string()))?;
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() || data == "[DONE]" {
                continue;
            }
            chunks.push(parse_gemini_response(data)?);
        }

        Ok(chunks)
    }

    fn record_usage(&mut self, usage: Option<Usage>) {
        match (usage, self.config.usage_accounting) {
            (Some(usage), _) => self.last_usage = usage,
            (None, UsageAccounting::KeepPrevious) => {}
            (None, UsageAccounting::Reset) => self.last_usage = Usage::default(),
        }
    }
}

impl Provider for GeminiProvider {
    fn from_env() -> ModelResult<Self> {
        let config = GeminiProviderConfig::from_env()?;
        Self::new(config)
    }

    fn complete(
        &mut self,
        messages: &[ConversationMessage],
        tools: Option<&[ToolDescriptor]>,
        options: &GenerationOptions,
    ) -> ModelResult<ChatMessage> {
        let (response, tools_used) =
            self.send_with_tool_fallback(messages, tools, options, Self::generate)?;

        self.record_usage(extract_usage(&response));
        gemini_response_to_message(&response, tools_used)
    }

    fn last_usage(&self) -> Usage {
        self.last_usage
    }
}

/// Fold streamed chunks into a single message. Every candidate of every chunk
/// contributes its text; function calls win over text when tools were attached.
fn stream_chunks_to_message(
    chunks: &[GenerateContentResponse],
    tools_supplied: bool,
) -> ModelResult<ChatMessage> {
    if chunks.is_empty() {
        return Err(ModelError::ResponseParse("stream contained no data".to_string()));
    }

    let mut text = String::new();
    let mut calls = Vec::new();

    for chunk in chunks {
        let parts = chunk
            .candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter());

        match &chunk.text {
            Some(chunk_text) => text.push_str(chunk_text),
            None => {
                for part in parts.clone() {
                    if let Some(part_text) = &part.text {
                        text.push_str(part_text);
                    }
                }
            }
        }

        if tools_supplied {
            let chunk_parts: Vec<_> = parts.cloned().collect();
            calls.extend(function_calls(&chunk_parts));
        }
    }

    if calls.is_empty() {
        Ok(ChatMessage::text(text))
    } else {
        Ok(ChatMessage::tool_calls(calls))
    }
}
