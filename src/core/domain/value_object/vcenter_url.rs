use crate::core::domain::{
    error::ValidationError,
    value_object::{VcenterHost, VcenterPort},
};
use url::Url;

const MAX_URL_LENGTH: usize = 2083;

/// Base URL of the vCenter API endpoint (`https://host:port/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcenterUrl(String);

impl VcenterUrl {
    /// Builds the endpoint URL from a validated host and port.
    pub fn from_parts(host: &VcenterHost, port: &VcenterPort, secure: bool) -> Self {
        let scheme = if secure { "https" } else { "http" };
        let host = if host.as_str().contains(':') {
            format!("[{}]", host.as_str())
        } else {
            host.as_str().to_string()
        };
        Self(format!("{}://{}:{}/", scheme, host, port.get()))
    }

    /// Creates a URL without validation.
    pub(crate) fn new_unchecked(url: String) -> Self {
        Self(url)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins an API path onto the base URL.
    pub fn join(&self, path: &str) -> Result<Url, ValidationError> {
        let base = Url::parse(&self.0)
            .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
        base.join(path.trim_start_matches('/'))
            .map_err(|e| ValidationError::Format(format!("Invalid API path '{}': {}", path, e)))
    }
}

/// Validates an endpoint URL.
pub(crate) fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::Field {
            field: "url".to_string(),
            message: "URL cannot be empty".to_string(),
        });
    }

    if url.len() > MAX_URL_LENGTH {
        return Err(ValidationError::Format(format!(
            "URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        )));
    }

    let parsed =
        Url::parse(url).map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;

    if !matches!(parsed.scheme(), "https" | "http") {
        return Err(ValidationError::ConstraintViolation(
            "Invalid scheme. Must be one of: https, http".to_string(),
        ));
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::ConstraintViolation(
            "URL must contain a host".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        let host = VcenterHost::new_unchecked("vc.example.com".to_string());
        let port = VcenterPort::new_unchecked(443);
        let url = VcenterUrl::from_parts(&host, &port, true);
        assert_eq!(url.as_str(), "https://vc.example.com:443/");
        assert!(validate_url(url.as_str()).is_ok());
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let host = VcenterHost::new_unchecked("fe80::1".to_string());
        let url = VcenterUrl::from_parts(&host, &VcenterPort::default(), true);
        assert_eq!(url.as_str(), "https://[fe80::1]:443/");
    }

    #[test]
    fn test_join_keeps_base() {
        let url = VcenterUrl::new_unchecked("http://127.0.0.1:8080/".to_string());
        let joined = url.join("/api/session").unwrap();
        assert_eq!(joined.as_str(), "http://127.0.0.1:8080/api/session");
    }

    #[test]
    fn test_invalid_urls() {
        assert!(validate_url("").is_err());
        assert!(validate_url("ftp://vc.example.com/").is_err());
        assert!(validate_url("not a url").is_err());
    }
}
