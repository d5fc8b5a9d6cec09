//! Error type shared by the client. Expected negative device answers are not
//! errors and never show up here; see `scalarweb::ErrorDisposition`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScalarError>;

#[derive(Debug, Error)]
pub enum ScalarError {
    /// A required argument was missing or empty. Raised before any network call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The device could not be reached or answered with an unrecognized HTTP status
    #[error("Communication error ({status}): {body}")]
    Communication { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScalarError {
    pub(crate) fn invalid(what: &str) -> Self {
        ScalarError::InvalidArgument(format!("{} cannot be empty", what))
    }
}

/// Fail fast on an empty required string argument
pub(crate) fn require_non_empty(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ScalarError::invalid(what));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("system", "service").is_ok());
        assert!(require_non_empty("", "service").is_err());
        assert!(require_non_empty("   ", "service").is_err());
    }

    #[test]
    fn test_error_display() {
        let err = ScalarError::Communication {
            status: 404,
            body: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "Communication error (404): Not Found");

        let err = ScalarError::invalid("method");
        assert_eq!(err.to_string(), "Invalid argument: method cannot be empty");
    }
}
