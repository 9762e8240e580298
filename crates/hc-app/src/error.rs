//! Error types for the hc-app service layer.

use std::path::PathBuf;

/// Application error wrapping the backend crates' errors for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Control not found: {0}")]
    ControlNotFound(String),

    #[error("Failed to build control '{control}': {message}")]
    Build { control: String, message: String },

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Control error: {0}")]
    Control(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to write run record: {path}")]
    RecordWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hc-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<hc_project::ProjectError> for AppError {
    fn from(err: hc_project::ProjectError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<hc_project::ValidationError> for AppError {
    fn from(err: hc_project::ValidationError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<hc_signals::SignalError> for AppError {
    fn from(err: hc_signals::SignalError) -> Self {
        AppError::Signal(err.to_string())
    }
}

impl From<hc_control::ControlError> for AppError {
    fn from(err: hc_control::ControlError) -> Self {
        AppError::Control(err.to_string())
    }
}

impl From<hc_transport::TransportError> for AppError {
    fn from(err: hc_transport::TransportError) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
