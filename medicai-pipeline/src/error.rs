use thiserror::Error;

/// Message shown when a request never received a response.
pub const CONNECTIVITY_MESSAGE: &str =
    "No response from server. Please check your internet connection.";

/// Failures surfaced by the API client.
///
/// Every variant carries a display-ready message; callers that only need to show the
/// failure can use [`ApiError::user_message`] without matching.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{msg} ({0})", msg = CONNECTIVITY_MESSAGE)]
    Network(String),

    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Application error with an explicit message, e.g. from an `error` payload field.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Api {
            status: None,
            message: message.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => CONNECTIVITY_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => *status,
            _ => None,
        }
    }
}

/// Failures surfaced by the upload orchestrator.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select at least one file to upload")]
    NoFiles,

    #[error("An upload is already in progress")]
    AlreadyInFlight,

    #[error("Failed to read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error processing server response")]
    ResponseUnreadable(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Network error during file upload")]
    Transport(String),

    #[error("File upload was aborted")]
    Aborted,

    #[error("Failed to store session ID: {0}")]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// Whether the failure should be shown as a warning rather than an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, UploadError::NoFiles | UploadError::Aborted)
    }
}

/// Failures of the persistent key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while assembling the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, StorageError>;
