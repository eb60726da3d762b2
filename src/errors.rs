use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// The OS randomness source or key derivation failed.
    KeyDerivation(String),
    /// Error interacting with the monkey API.
    ExternalApiError(String),
    /// The monkey API answered with a non-success status.
    UnexpectedStatus(u16),
    /// A response or record could not be decoded.
    Decode(String),
    /// SVG parsing or rasterization failed.
    ImageConversion(String),
    /// Filesystem error while persisting a match.
    Io(std::io::Error),
    /// Invalid configuration supplied at startup.
    Config(String),
    /// A pipeline task panicked or was aborted.
    TaskFailed(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::KeyDerivation(msg) => write!(f, "Key derivation failed: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::UnexpectedStatus(code) => write!(f, "Monkey API returned status {}", code),
            AppError::Decode(msg) => write!(f, "Decode error: {}", msg),
            AppError::ImageConversion(msg) => write!(f, "Image conversion error: {}", msg),
            AppError::Io(e) => write!(f, "I/O error: {}", e),
            AppError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            AppError::TaskFailed(msg) => write!(f, "Task failed: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Io(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl AppError {
    /// Returns true for errors the producer loop absorbs and retries.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::ExternalApiError(_) | AppError::UnexpectedStatus(_) | AppError::Decode(_) => {
                true
            }
            AppError::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Decode(err.to_string())
        } else {
            AppError::ExternalApiError(err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::TaskFailed(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: f(),
        })
    }
}
