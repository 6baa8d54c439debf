use crate::core::domain::value_object::{
    VcenterHost, VcenterPassword, VcenterPort, VcenterUrl, VcenterUsername,
};

/// Endpoint and credentials of one vCenter, validated.
#[derive(Debug, Clone)]
pub struct VcenterConnection {
    host: VcenterHost,
    port: VcenterPort,
    username: VcenterUsername,
    password: VcenterPassword,
    accept_invalid_certs: bool,
    url: VcenterUrl,
}

impl VcenterConnection {
    /// Builds a connection to `https://host:port/`.
    pub fn new(
        host: VcenterHost,
        port: VcenterPort,
        username: VcenterUsername,
        password: VcenterPassword,
        accept_invalid_certs: bool,
    ) -> Self {
        let url = VcenterUrl::from_parts(&host, &port, true);
        Self::with_url(host, port, username, password, accept_invalid_certs, url)
    }

    /// Builds a connection with an explicit base URL (plain HTTP test servers).
    pub(crate) fn with_url(
        host: VcenterHost,
        port: VcenterPort,
        username: VcenterUsername,
        password: VcenterPassword,
        accept_invalid_certs: bool,
        url: VcenterUrl,
    ) -> Self {
        Self {
            host,
            port,
            username,
            password,
            accept_invalid_certs,
            url,
        }
    }

    pub fn host(&self) -> &VcenterHost {
        &self.host
    }

    pub fn port(&self) -> &VcenterPort {
        &self.port
    }

    pub fn username(&self) -> &VcenterUsername {
        &self.username
    }

    pub fn password(&self) -> &VcenterPassword {
        &self.password
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn url(&self) -> &VcenterUrl {
        &self.url
    }
}
