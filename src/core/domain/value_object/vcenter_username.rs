use crate::core::domain::error::ValidationError;

/// A vCenter login name.
///
/// Accepts the three forms SSO understands: `user`, `user@domain` and
/// `DOMAIN\user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcenterUsername(String);

impl VcenterUsername {
    /// Creates a new username without validation.
    pub(crate) fn new_unchecked(username: String) -> Self {
        Self(username)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The account part, without any SSO domain.
    #[must_use]
    pub fn short_name(&self) -> &str {
        let name = self.0.rsplit('\\').next().unwrap_or(&self.0);
        name.split('@').next().unwrap_or(name)
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::Field {
            field: "username".to_string(),
            message: "Username cannot be empty".to_string(),
        });
    }
    if username.len() > 256 {
        return Err(ValidationError::Format(
            "Username cannot exceed 256 characters".to_string(),
        ));
    }
    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::Format(
            "Username cannot contain whitespace".to_string(),
        ));
    }
    if username.matches('@').count() > 1 {
        return Err(ValidationError::Format(
            "Username can contain at most one '@'".to_string(),
        ));
    }
    if username.starts_with('@') || username.ends_with('@') || username.ends_with('\\') {
        return Err(ValidationError::Format(
            "Username has an empty account or domain part".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("administrator@vsphere.local").is_ok());
        assert!(validate_username("CORP\\jdoe").is_ok());
        assert!(validate_username("root").is_ok());
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(validate_username("").is_err());
        assert!(validate_username("john doe").is_err());
        assert!(validate_username("a@b@c").is_err());
        assert!(validate_username("@vsphere.local").is_err());
        assert!(validate_username("CORP\\").is_err());
    }

    #[test]
    fn test_short_name() {
        let upn = VcenterUsername::new_unchecked("jdoe@vsphere.local".to_string());
        assert_eq!(upn.short_name(), "jdoe");
        let down_level = VcenterUsername::new_unchecked("CORP\\jdoe".to_string());
        assert_eq!(down_level.short_name(), "jdoe");
    }
}
