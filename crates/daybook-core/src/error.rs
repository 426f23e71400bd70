//! Error types for daybook.

use thiserror::Error;

/// Result type alias using daybook's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for daybook operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entry not found
    #[error("Entry not found: {0}")]
    EntryNotFound(uuid::Uuid),

    /// Invalid input (bad calendar date, malformed parameters)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Media store (upload/stream) failure
    #[error("Media error: {0}")]
    Media(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_entry_not_found() {
        let id = Uuid::nil();
        let err = Error::EntryNotFound(id);
        assert_eq!(err.to_string(), format!("Entry not found: {}", id));
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("day out of range".to_string());
        assert_eq!(err.to_string(), "Invalid input: day out of range");
    }

    #[test]
    fn test_error_display_media() {
        let err = Error::Media("upstream returned 502".to_string());
        assert_eq!(err.to_string(), "Media error: upstream returned 502");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("invalid token".to_string());
        assert_eq!(err.to_string(), "Unauthorized: invalid token");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_entry_not_found_with_random_uuid() {
        let id = Uuid::new_v4();
        let err = Error::EntryNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
