//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Provider answered with a non-success status
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unreachable (connect failure, dropped connection)
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// Tool arguments failed validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Adapter call or tool dispatch exceeded its time bound
    #[error("{operation} timed out after {}s", .after.as_secs_f32())]
    Timeout { operation: String, after: Duration },

    /// Provider response could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Build a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        AgentError::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::Timeout { .. }
                | AgentError::Io(_)
        )
    }

    /// Whether this error aborts the current request.
    ///
    /// Tool-level failures are absorbed into the conversation instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::ToolValidation(_)
                | AgentError::ToolExecution(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            AgentError::ToolExecution(msg) => format!("Tool error: {msg}"),
            AgentError::Timeout { operation, .. } => format!("The {operation} took too long and was abandoned."),
            AgentError::Parse(_) => "The AI service returned a response that could not be understood.".into(),
            AgentError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            AgentError::Auth(_) => "Authentication failed. Please check your API key.".into(),
            AgentError::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AgentError::Provider("500".into()).is_fatal());
        assert!(AgentError::Parse("bad json".into()).is_fatal());
        assert!(AgentError::timeout("adapter call", Duration::from_secs(5)).is_fatal());
        assert!(!AgentError::ToolNotFound("nope".into()).is_fatal());
        assert!(!AgentError::ToolExecution("boom".into()).is_fatal());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AgentError::RateLimited("slow down".into()).is_retryable());
        assert!(AgentError::ProviderUnavailable("refused".into()).is_retryable());
        assert!(AgentError::timeout("openai request", Duration::from_secs(1)).is_retryable());
        assert!(!AgentError::Auth("bad key".into()).is_retryable());
        assert!(!AgentError::Parse("truncated".into()).is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let timeout = AgentError::timeout("tool 'export_render'", Duration::from_secs(300));
        assert_eq!(timeout.user_message(), "The tool 'export_render' took too long and was abandoned.");
        assert_eq!(
            AgentError::ToolNotFound("clip_warp".into()).user_message(),
            "The tool 'clip_warp' is not available."
        );
        assert_eq!(AgentError::Other("boom".into()).user_message(), "An unexpected error occurred.");
    }

    #[test]
    fn test_timeout_display() {
        let err = AgentError::timeout("tool dispatch", Duration::from_secs(2));
        assert_eq!(err.to_string(), "tool dispatch timed out after 2s");
    }
}
