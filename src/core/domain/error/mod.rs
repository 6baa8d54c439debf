use thiserror::Error;

/// The main error type for vCenter inventory operations.
///
/// Only conditions that abort a whole invocation are represented here:
/// transport and session failures, malformed responses, invalid input and
/// process-level interrupts. Problems that concern a single object of a batch
/// (ambiguous matches, precondition violations, failed remote tasks) are
/// reported as [`Outcome`](crate::Outcome) values instead.
#[derive(Error, Debug)]
pub enum VcliError {
    /// Represents errors that occur while talking to the vCenter endpoint
    ///
    /// # Fields
    /// * `0` - A description of what went wrong during the request
    #[error("Connection error: {0}")]
    Connection(String),

    /// Represents session establishment or session expiry failures
    ///
    /// # Fields
    /// * `0` - A description of the authentication failure
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Represents validation failures with detailed context
    ///
    /// # Fields
    /// * `source` - The underlying validation error
    #[error("Validation error: {source}")]
    Validation { source: ValidationError },

    /// A non-success HTTP status that has no more specific mapping
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A managed object or task referenced by the caller does not exist remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// The endpoint answered with a body that could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local I/O failure (token files, configuration)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The invocation was interrupted by the operator
    #[error("Interrupted")]
    Interrupted,
}

impl VcliError {
    /// Returns `true` when the error must terminate the whole invocation.
    ///
    /// Transport, session, I/O and interrupt failures are fatal. A rejected or
    /// missing remote object can be treated as a per-object condition.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VcliError::Connection(_)
                | VcliError::Authentication(_)
                | VcliError::Io(_)
                | VcliError::Interrupted
        )
    }

    /// Process exit status a dispatcher should use for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            VcliError::Interrupted => 9,
            VcliError::Io(_) => 8,
            VcliError::Authentication(_) => 1,
            _ => 4,
        }
    }
}

impl From<ValidationError> for VcliError {
    fn from(error: ValidationError) -> Self {
        VcliError::Validation { source: error }
    }
}

impl From<reqwest::Error> for VcliError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            VcliError::Connection(format!("HTTP timeout: {}", error))
        } else if error.is_decode() {
            VcliError::Parse(error.to_string())
        } else {
            VcliError::Connection(format!("HTTP request failed: {}", error))
        }
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    ///
    /// # Fields
    /// * `0` - Description of the format violation
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    ///
    /// # Fields
    /// * `0` - Description of the constraint violation
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Type alias for Results that may fail with a VcliError
pub type VcliResult<T> = Result<T, VcliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(VcliError::Interrupted.exit_code(), 9);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(VcliError::from(io).exit_code(), 8);
        assert_eq!(VcliError::Authentication("denied".into()).exit_code(), 1);
        assert_eq!(VcliError::Connection("refused".into()).exit_code(), 4);
    }

    #[test]
    fn test_per_object_errors_are_not_fatal() {
        assert!(!VcliError::NotFound("vm-1".into()).is_fatal());
        assert!(
            !VcliError::Api {
                status: 400,
                message: "already attached".into()
            }
            .is_fatal()
        );
        assert!(VcliError::Connection("reset".into()).is_fatal());
        assert!(VcliError::Interrupted.is_fatal());
    }

    #[test]
    fn test_validation_conversion() {
        let err: VcliError = ValidationError::Format("bad".into()).into();
        assert!(matches!(err, VcliError::Validation { .. }));
        assert!(err.to_string().contains("bad"));
    }
}
