//! Error taxonomy shared by every task-facing operation.

use thiserror::Error;

/// Result alias used across the core crate.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Failures surfaced by configuration, the remote task API, and record conversion.
///
/// Every variant is cheap to clone so the store can keep the last failure around
/// for the error panel or a transient notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cannot connect to task API at {url}: {message}")]
    Network { url: String, message: String },

    #[error("Task API {operation} failed (status {status})")]
    Api {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Invalid task data{}: {message}", record_suffix(.id))]
    InvalidTaskData { id: Option<String>, message: String },

    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

/// Coarse classification used by presentation code to pick an error surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Network,
    Api,
    InvalidTaskData,
    Local,
}

impl TaskError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn api(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn invalid_data(id: Option<String>, message: impl Into<String>) -> Self {
        Self::InvalidTaskData {
            id,
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Configuration { .. } => ErrorKind::Configuration,
            TaskError::Network { .. } => ErrorKind::Network,
            TaskError::Api { .. } => ErrorKind::Api,
            TaskError::InvalidTaskData { .. } => ErrorKind::InvalidTaskData,
            TaskError::TaskNotFound { .. } | TaskError::Validation { .. } => ErrorKind::Local,
        }
    }

    /// Whether re-invoking the failed fetch can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Api)
    }
}

fn record_suffix(id: &Option<String>) -> String {
    id.as_deref()
        .map(|id| format!(" for task {id}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_not_retryable() {
        let err = TaskError::configuration("TASKDECK_API_URL is not set");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Configuration error: TASKDECK_API_URL is not set"
        );
    }

    #[test]
    fn api_and_network_errors_are_retryable() {
        assert!(TaskError::api("GET /tasks", 503, "").is_retryable());
        assert!(TaskError::network("http://localhost:1", "refused").is_retryable());
    }

    #[test]
    fn invalid_data_mentions_record_id_when_known() {
        let with_id = TaskError::invalid_data(Some("7".into()), "bad dueDate");
        let without_id = TaskError::invalid_data(None, "not an object");
        assert_eq!(with_id.to_string(), "Invalid task data for task 7: bad dueDate");
        assert_eq!(without_id.to_string(), "Invalid task data: not an object");
    }
}
