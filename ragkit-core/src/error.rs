//! Error types for the ragkit core library.
//!
//! Uses `thiserror` for public API error types. The top-level [`RagError`]
//! wraps one enum per failure domain: configuration, lookups, external
//! services, structured-output decoding, and evaluation judging.

use std::path::PathBuf;

/// Top-level error type for the ragkit core library.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Judgment error: {0}")]
    Judgment(#[from] JudgmentError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    NotFound,
    Service,
    Schema,
    Judgment,
    InvalidInput,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "CONFIG_ERROR"),
            ErrorKind::NotFound => write!(f, "NOT_FOUND"),
            ErrorKind::Service => write!(f, "SERVICE_ERROR"),
            ErrorKind::Schema => write!(f, "SCHEMA_ERROR"),
            ErrorKind::Judgment => write!(f, "JUDGMENT_ERROR"),
            ErrorKind::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorKind::Io => write!(f, "IO_ERROR"),
        }
    }
}

impl RagError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Config(_) => ErrorKind::Config,
            RagError::NotFound(_) => ErrorKind::NotFound,
            RagError::Service(_) => ErrorKind::Service,
            RagError::Schema(_) => ErrorKind::Schema,
            RagError::Judgment(_) => ErrorKind::Judgment,
            RagError::InvalidInput { .. } => ErrorKind::InvalidInput,
            RagError::Io(_) | RagError::Serialization(_) => ErrorKind::Io,
        }
    }
}

/// Errors from the configuration system and static input files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Prompt directory not found: {path}")]
    PromptDirMissing { path: PathBuf },

    #[error("Malformed prompt definition {path}: {message}")]
    MalformedPrompt { path: PathBuf, message: String },

    #[error("Failed to read corpus {path}: {message}")]
    CorpusUnreadable { path: PathBuf, message: String },

    #[error("Malformed corpus {path}: {message}")]
    MalformedCorpus { path: PathBuf, message: String },
}

/// Lookups that found nothing.
#[derive(Debug, thiserror::Error)]
pub enum NotFoundError {
    #[error("No prompt found with name: {name}")]
    Prompt { name: String },

    #[error("Version {version} not found for '{name}'. Available: [{}]", .available.join(", "))]
    PromptVersion {
        name: String,
        version: String,
        available: Vec<String>,
    },

    #[error("Collection '{name}' does not exist (run ingestion first)")]
    Collection { name: String },
}

/// Failures at the embedding, vector-store, or chat-completion boundary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Vector store error: {message}")]
    Store { message: String },
}

impl ServiceError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::store(err.to_string())
    }
}

impl From<rusqlite::Error> for RagError {
    fn from(err: rusqlite::Error) -> Self {
        RagError::Service(err.into())
    }
}

/// The chat model's structured answer did not match the declared schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Model did not call the '{tool}' function")]
    MissingToolCall { tool: String },

    #[error("Function arguments are not valid JSON: {message}")]
    InvalidEncoding { message: String },

    #[error("Function arguments must be a JSON object, got {found}")]
    NotAnObject { found: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// The evaluation judge's verdict could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum JudgmentError {
    #[error("Judge returned an empty response")]
    EmptyResponse,

    #[error("Judge output is not a valid verdict ({message}): {raw}")]
    Unparseable { raw: String, message: String },
}

/// A type alias for results using the top-level `RagError`.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_service() {
        let err = RagError::Service(ServiceError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "Service error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_prompt_version_lists_available() {
        let err = RagError::NotFound(NotFoundError::PromptVersion {
            name: "customer_support".into(),
            version: "3.0".into(),
            available: vec!["1.0".into(), "1.1".into()],
        });
        assert_eq!(
            err.to_string(),
            "Not found: Version 3.0 not found for 'customer_support'. Available: [1.0, 1.1]"
        );
    }

    #[test]
    fn test_error_display_schema() {
        let err = RagError::Schema(SchemaError::MissingField {
            field: "confidence".into(),
        });
        assert_eq!(
            err.to_string(),
            "Schema error: Missing required field: confidence"
        );
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            RagError::from(ConfigError::Invalid {
                message: "x".into()
            })
            .kind(),
            ErrorKind::Config
        );
        assert_eq!(
            RagError::from(NotFoundError::Collection {
                name: "knowledge_base".into()
            })
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RagError::from(ServiceError::Timeout { timeout_secs: 5 }).kind(),
            ErrorKind::Service
        );
        assert_eq!(
            RagError::from(JudgmentError::EmptyResponse).kind(),
            ErrorKind::Judgment
        );
        assert_eq!(RagError::invalid_input("empty").kind(), ErrorKind::InvalidInput);
        assert_eq!(ErrorKind::Schema.to_string(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RagError = io_err.into();
        assert!(matches!(err, RagError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: RagError = serde_err.into();
        assert!(matches!(err, RagError::Serialization(_)));
    }

    #[test]
    fn test_error_from_sqlite_is_service() {
        let err: RagError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, RagError::Service(ServiceError::Store { .. })));
    }

    #[test]
    fn test_service_error_variants() {
        let err = ServiceError::RateLimited {
            retry_after_secs: 60,
        };
        assert_eq!(err.to_string(), "Rate limited by provider, retry after 60s");

        let err = ServiceError::Timeout { timeout_secs: 30 };
        assert_eq!(err.to_string(), "Request timed out after 30s");
    }
}
