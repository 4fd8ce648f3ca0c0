use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing CI context: {0}")]
    MissingContext(String),

    #[error("Gate '{gate}' rejected execution: {reason}")]
    GateRejected { gate: String, reason: String },

    #[error("Command start failed: {0}")]
    ProcessStart(String),

    #[error("Failed to capture command output: {0}")]
    StreamCapture(String),

    #[error("Command execution failed with exit code {code}")]
    ToolExecution { code: i32 },

    #[error("Failed to post merge request comment: {0}")]
    Notification(String),

    #[error("{failure} (failure comment not posted: {notification})")]
    FailureNotNotified {
        failure: Box<AppError>,
        notification: Box<AppError>,
    },

    #[error("GitLab API error: {0}")]
    ReviewApi(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
