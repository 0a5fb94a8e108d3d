use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP status details attached to a failed transport call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
}

/// Failure reported by the transport collaborator.
///
/// Mirrors the shape of the errors thrown by typical HTTP clients: an optional
/// machine-readable `code`, an optional error `name`, a message and, when the
/// server answered at all, the response status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportError {
    pub code: Option<String>,
    pub name: Option<String>,
    pub message: String,
    pub response: Option<TransportResponse>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_response(mut self, status: u16, status_text: impl Into<String>) -> Self {
        self.response = Some(TransportResponse {
            status,
            status_text: status_text.into(),
        });
        self
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.response {
            Some(response) => write!(
                f,
                "{} ({} {})",
                self.message, response.status, response.status_text
            ),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Error, Debug, Clone)]
pub enum CrudError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CrudError {
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Name recorded in the lifecycle error bundle.
    pub fn name(&self) -> String {
        match self {
            Self::Transport(err) => err
                .code
                .clone()
                .or_else(|| err.name.clone())
                .unwrap_or_else(|| "TransportError".to_string()),
            Self::Hook { .. } => "HookError".to_string(),
            Self::Validation(_) => "ValidationError".to_string(),
            Self::Config(_) => "ConfigError".to_string(),
            Self::Storage(_) => "StorageError".to_string(),
            Self::Serialization(_) => "SerializationError".to_string(),
        }
    }

    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrudError>;

impl From<serde_json::Error> for CrudError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CrudError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for CrudError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Storage(format!("lock poisoned: {}", err))
    }
}
