use crate::core::domain::error::ValidationError;

/// Default HTTPS port of the vCenter API endpoint.
pub const DEFAULT_VCENTER_PORT: u16 = 443;

/// A validated vCenter port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcenterPort(u16);

impl VcenterPort {
    /// Creates a new port without validation.
    pub(crate) fn new_unchecked(port: u16) -> Self {
        Self(port)
    }

    /// Returns the port number.
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl Default for VcenterPort {
    fn default() -> Self {
        Self(DEFAULT_VCENTER_PORT)
    }
}

/// Validates a port number.
pub(crate) fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::Field {
            field: "port".to_string(),
            message: "Port cannot be 0".to_string(),
        });
    }
    Ok(())
}
