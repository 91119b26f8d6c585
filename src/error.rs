// Failure taxonomy for a single fetch against the transit API
use thiserror::Error;

/// Every variant is terminal for the fetch that produced it; nothing here is retried.
#[derive(Debug, Error)]
pub enum TransitError {
    /// Malformed top-level JSON, or a request we could not build
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
    #[error("Server error: {0}")]
    HttpError(u16),
    /// The stops payload was valid but neither dialect held a usable stop
    #[error("No stops found for this operator")]
    NoStopsFound,
    #[error("API key not set")]
    MissingCredential,
    #[error("Unable to reach transit API: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<serde_json::Error> for TransitError {
    fn from(err: serde_json::Error) -> Self {
        TransitError::InvalidResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransitError>;
