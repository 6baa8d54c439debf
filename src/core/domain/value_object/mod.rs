mod session_token;
mod vcenter_host;
mod vcenter_password;
mod vcenter_port;
mod vcenter_url;
mod vcenter_username;

pub use session_token::{SESSION_HEADER, SessionToken};
pub use vcenter_host::VcenterHost;
pub use vcenter_password::VcenterPassword;
pub use vcenter_port::{DEFAULT_VCENTER_PORT, VcenterPort};
pub use vcenter_url::VcenterUrl;
pub use vcenter_username::VcenterUsername;

// Re-export validation functions for internal use
pub(crate) use session_token::validate_session_token;
pub(crate) use vcenter_host::validate_host;
pub(crate) use vcenter_password::validate_password;
pub(crate) use vcenter_port::validate_port;
pub(crate) use vcenter_url::validate_url;
pub(crate) use vcenter_username::validate_username;
