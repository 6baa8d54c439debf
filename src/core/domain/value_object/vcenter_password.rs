use crate::core::domain::error::ValidationError;
use zxcvbn::zxcvbn;

/// A vCenter password (plaintext, only held for the lifetime of the session).
#[derive(Clone)]
pub struct VcenterPassword(String);

impl VcenterPassword {
    /// Creates a new password without validation.
    pub(crate) fn new_unchecked(password: String) -> Self {
        Self(password)
    }

    /// Returns the password as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for VcenterPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VcenterPassword(****)")
    }
}

/// Validates a password according to the configuration.
///
/// Strength scoring only applies when `min_score` is set; directory-backed
/// vCenter accounts are frequently outside the operator's control.
pub(crate) fn validate_password(
    password: &str,
    min_score: Option<zxcvbn::Score>,
) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Field {
            field: "password".to_string(),
            message: "Password cannot be empty".to_string(),
        });
    }
    if password.len() > 256 {
        return Err(ValidationError::Format(
            "Password cannot exceed 256 characters".to_string(),
        ));
    }
    if let Some(min_score) = min_score {
        let entropy = zxcvbn(password, &[]);
        if entropy.score() < min_score {
            return Err(ValidationError::ConstraintViolation(
                "Password is too weak (increase complexity)".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            validate_password("", None),
            Err(ValidationError::Field { .. })
        ));
    }

    #[test]
    fn test_short_password_allowed_without_score() {
        assert!(validate_password("vmware", None).is_ok());
    }

    #[test]
    fn test_weak_password_rejected_with_score() {
        let result = validate_password("password", Some(zxcvbn::Score::Three));
        assert!(matches!(
            result,
            Err(ValidationError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let password = VcenterPassword::new_unchecked("s3cr3t!".to_string());
        assert!(!format!("{:?}", password).contains("s3cr3t"));
        assert_eq!(password.as_str(), "s3cr3t!");
    }
}
