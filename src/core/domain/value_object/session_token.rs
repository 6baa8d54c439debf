use crate::core::domain::error::ValidationError;
use std::time::{Duration, SystemTime};

/// Name of the header that carries the session identifier.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// An API session identifier issued by `POST /api/session`.
#[derive(Debug, Clone)]
pub struct SessionToken {
    value: String,
    created_at: SystemTime,
}

impl SessionToken {
    /// Creates a new token without validation.
    pub(crate) fn new_unchecked(value: String) -> Self {
        Self {
            value,
            created_at: SystemTime::now(),
        }
    }

    /// Returns the session identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the creation time.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Checks if the session is expired based on a given lifetime.
    #[must_use]
    pub fn is_expired(&self, lifetime: Duration) -> bool {
        self.created_at
            .elapsed()
            .map(|age| age > lifetime)
            .unwrap_or(true)
    }
}

/// Validates the format of a session identifier.
pub(crate) fn validate_session_token(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::Field {
            field: "session".to_string(),
            message: "Session identifier cannot be empty".to_string(),
        });
    }
    if !token.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::Format(
            "Session identifier must be printable ASCII".to_string(),
        ));
    }
    Ok(())
}
