use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum DiagError {
    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Command `{program}` failed: {message}")]
    CommandFailed {
        program: String,
        message: String,
    },

    #[error("Command `{0}` timed out")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Test execution error: {0}")]
    TestExecutionError(String),

    #[error("Interrupted by operator")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, DiagError>;
