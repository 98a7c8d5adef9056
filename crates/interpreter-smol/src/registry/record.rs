use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::providers::configs::GEMINI_DEFAULT_MODEL;

pub const DEFAULT_PROVIDER: &str = "gemini";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_model_id() -> String {
    GEMINI_DEFAULT_MODEL.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    pub fn gemini<S: Into<String>>(model_id: S) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }
}

/// Everything the registry knows about one agent. Stored as one YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub config: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Field values for a new agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAgent {
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub tools: Vec<String>,
    pub model: ModelConfig,
    pub config: Map<String, Value>,
}

impl NewAgent {
    pub fn new<N: Into<String>, P: Into<String>>(name: N, prompt: P) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn into_record(self, created_at: DateTime<Utc>) -> AgentRecord {
        AgentRecord {
            name: self.name,
            description: self.description,
            prompt: self.prompt,
            tools: self.tools,
            model: self.model,
            config: self.config,
            created_at,
            updated_at: None,
        }
    }
}

/// A partial update. Unset fields are left alone; `config` keys are merged
/// into the stored mapping and a `null` value removes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentUpdate {
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub tools: Option<Vec<String>>,
    pub model: Option<ModelConfig>,
    pub config: Option<Map<String, Value>>,
}

impl AgentUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.prompt.is_none()
            && self.tools.is_none()
            && self.model.is_none()
            && self.config.is_none()
    }

    pub(crate) fn apply(self, record: &mut AgentRecord, now: DateTime<Utc>) {
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(prompt) = self.prompt {
            record.prompt = prompt;
        }
        if let Some(tools) = self.tools {
            record.tools = tools;
        }
        if let Some(model) = self.model {
            record.model = model;
        }
        if let Some(config) = self.config {
            for (key, value) in config {
                if value.is_null() {
                    record.config.remove(&key);
                } else {
                    record.config.insert(key, value);
                }
            }
        }
        record.updated_at = Some(now);
    }
}
