//! Client configuration.
//!
//! Every field is always present and defaulted, so behaviour branches on
//! values and never on whether an option happens to exist.

use crate::{VcliResult, core::domain::error::ValidationError};
use std::{env, fmt, time::Duration};

/// Client-side request throttling, applied to every call to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub requests_per_second: u32,
    /// Requests allowed in a burst before throttling starts.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 20,
            burst_size: 40,
        }
    }
}

/// How long the task supervisor waits for each kind of remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBudgets {
    /// Generic reconfigure/power/snapshot operations.
    pub default: Duration,
    /// Full clones, which copy every disk.
    pub clone: Duration,
    /// Storage relocation.
    pub relocate: Duration,
    /// Guest shutdown until the VM reports powered off.
    pub shutdown: Duration,
}

impl Default for WaitBudgets {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(42),
            clone: Duration::from_secs(1200),
            relocate: Duration::from_secs(300),
            shutdown: Duration::from_secs(120),
        }
    }
}

/// Configuration shared by the session layer and every engine.
#[derive(Debug, Clone)]
pub struct VcliConfig {
    pub wait: WaitBudgets,
    /// Interval between two task polls.
    pub poll_interval: Duration,
    /// A session older than this is re-established before the next request.
    pub session_lifetime: Duration,
    pub rate_limit: Option<RateLimitConfig>,
    /// Minimum zxcvbn score demanded of the password, if any.
    pub password_min_score: Option<zxcvbn::Score>,
    /// vCenter appliances ship with self-signed certificates.
    pub accept_invalid_certs: bool,
    /// Recorded as snapshot creator and in backup clone names.
    pub operator: String,
}

impl Default for VcliConfig {
    fn default() -> Self {
        Self {
            wait: WaitBudgets::default(),
            poll_interval: Duration::from_secs(1),
            session_lifetime: Duration::from_secs(2 * 60 * 60),
            rate_limit: None,
            password_min_score: None,
            accept_invalid_certs: true,
            operator: "unknown".to_string(),
        }
    }
}

/// Endpoint and credentials, before validation.
#[derive(Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
}

impl ConnectionSettings {
    /// Reads `VCLI_HOST`, `VCLI_PORT`, `VCLI_USERNAME` and `VCLI_PASSWORD`.
    ///
    /// `VCLI_PORT` is optional.
    ///
    /// # Errors
    /// Returns `VcliError::Validation` when a required variable is unset or
    /// the port is not a number.
    pub fn from_env() -> VcliResult<Self> {
        let port = match env::var("VCLI_PORT") {
            Ok(port) => Some(port.parse::<u16>().map_err(|_| ValidationError::Field {
                field: "VCLI_PORT".to_string(),
                message: format!("'{}' is not a port number", port),
            })?),
            Err(_) => None,
        };
        Ok(Self {
            host: required_var("VCLI_HOST")?,
            port,
            username: required_var("VCLI_USERNAME")?,
            password: required_var("VCLI_PASSWORD")?,
        })
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

fn required_var(name: &str) -> Result<String, ValidationError> {
    env::var(name).map_err(|_| ValidationError::Field {
        field: name.to_string(),
        message: "environment variable is not set".to_string(),
    })
}
