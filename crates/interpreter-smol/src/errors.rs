use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a model provider while building a request, calling the
/// API or reading its response.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider request failed: {0}")]
    ProviderRequest(String),

    #[error("Could not parse provider response: {0}")]
    ResponseParse(String),

    #[error("Invalid content: {0}")]
    InvalidContent(String),
}

impl ModelError {
    /// Whether the request may be attempted again without tools attached.
    pub fn is_provider_request(&self) -> bool {
        matches!(self, ModelError::ProviderRequest(_))
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::ProviderRequest(err.to_string())
    }
}

pub type ModelResult<T> = Result<T, ModelError>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Agent already exists: {0}")]
    DuplicateName(String),

    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Invalid agent name '{0}': use 1-64 characters from [A-Za-z0-9_-]")]
    InvalidName(String),

    #[error(
        "Untracked record file already exists at {}; move it away to reuse the name",
        .0.display()
    )]
    UntrackedRecord(PathBuf),

    #[error("Corrupt agent index at {}: {}", .path.display(), .reason)]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
