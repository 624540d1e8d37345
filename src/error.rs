use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    #[error("Destination already exists: {path}")]
    DestinationExists { path: String },

    #[error("Watched root is no longer available: {path}")]
    RootUnavailable { path: String },

    #[error("Unsupported file: {path} ({reason})")]
    UnsupportedFile { path: String, reason: String },

    #[error("AI service error: {message}")]
    AiError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Operation timed out: {message}")]
    Timeout { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    NotifyError(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let error_response = ErrorResponse {
            error_type: self.error_type(),
            message: self.user_message(),
            recoverable: self.is_recoverable(),
        };

        error_response.serialize(serializer)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error_type: String,
    message: String,
    recoverable: bool,
}

impl AppError {
    /// Returns a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { path } => format!("Source path does not exist: {}", path),
            Self::InvalidPath { message } => message.clone(),
            Self::DestinationExists { path } => {
                format!("Destination already exists and will not be overwritten: {}", path)
            }
            Self::RootUnavailable { path } => format!("Watched directory is gone: {}", path),
            Self::UnsupportedFile { path, .. } => format!("Cannot summarize {}", path),
            Self::AiError { .. } => "Classification service is temporarily unavailable".to_string(),
            Self::ConfigError { .. } => "Configuration is invalid".to_string(),
            Self::ParseError { .. } => "The classifier returned a malformed response".to_string(),
            Self::Timeout { message } => message.clone(),
            Self::Cancelled => "Operation was cancelled".to_string(),
            Self::InvalidInput { message } => message.clone(),
            Self::InvalidOperation { message } => message.clone(),
            Self::Io(e) => format!("File operation failed: {}", e),
            Self::SerdeJson(_) => "Data processing error".to_string(),
            Self::NotifyError(_) => "File watching error occurred".to_string(),
            Self::Other(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Returns the error type for client-side handling
    pub fn error_type(&self) -> String {
        match self {
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::DestinationExists { .. } => "DESTINATION_EXISTS",
            Self::RootUnavailable { .. } => "ROOT_UNAVAILABLE",
            Self::UnsupportedFile { .. } => "UNSUPPORTED_FILE",
            Self::AiError { .. } => "AI_ERROR",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidOperation { .. } => "INVALID_OPERATION",
            Self::Io(_) => "IO_ERROR",
            Self::SerdeJson(_) => "PARSE_ERROR",
            Self::NotifyError(_) => "FILE_WATCHER_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
        .to_string()
    }

    /// Indicates if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::RootUnavailable { .. } | Self::ConfigError { .. } | Self::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
