use crate::{
    VcenterConnection, VcliError, VcliResult,
    auth::application::response::session_response::SessionResponse,
    core::domain::value_object::{SESSION_HEADER, SessionToken, validate_session_token},
};

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use tracing::debug;

const SESSION_PATH: &str = "/api/session";

/// Establishes and terminates API sessions.
pub struct SessionService {
    default_headers: HeaderMap,
}

impl SessionService {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self { default_headers }
    }

    /// Logs in with basic authentication and returns the session identifier.
    ///
    /// # Errors
    /// Returns `VcliError::Authentication` when the credentials are refused and
    /// `VcliError::Connection` when the endpoint cannot be reached.
    pub async fn execute(&self, connection: &VcenterConnection) -> VcliResult<SessionToken> {
        let http_client = Self::http_client(connection)?;
        let url = connection.url().join(SESSION_PATH)?;
        debug!(url = %url, user = connection.username().as_str(), "creating session");

        let response = http_client
            .post(url)
            .headers(self.default_headers.clone())
            .basic_auth(
                connection.username().as_str(),
                Some(connection.password().as_str()),
            )
            .send()
            .await
            .map_err(|e| VcliError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => self.handle_successful_login(response).await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VcliError::Authentication(
                "Invalid credentials provided".to_string(),
            )),
            StatusCode::NOT_FOUND => Err(VcliError::Connection(
                "Session endpoint not found".to_string(),
            )),
            StatusCode::SERVICE_UNAVAILABLE => Err(VcliError::Connection(
                "vCenter service is currently unavailable".to_string(),
            )),
            status => Err(VcliError::Connection(format!(
                "Unexpected response status: {}",
                status
            ))),
        }
    }

    /// Invalidates a session. A session the server no longer knows is not an error.
    pub async fn terminate(
        &self,
        connection: &VcenterConnection,
        token: &SessionToken,
    ) -> VcliResult<()> {
        let http_client = Self::http_client(connection)?;
        let url = connection.url().join(SESSION_PATH)?;
        let response = http_client
            .delete(url)
            .headers(self.default_headers.clone())
            .header(SESSION_HEADER, token.as_str())
            .send()
            .await
            .map_err(|e| VcliError::Connection(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Ok(()),
            status => Err(VcliError::Api {
                status: status.as_u16(),
                message: "Failed to terminate session".to_string(),
            }),
        }
    }

    fn http_client(connection: &VcenterConnection) -> VcliResult<Client> {
        Client::builder()
            .danger_accept_invalid_certs(connection.accept_invalid_certs())
            .build()
            .map_err(|e| VcliError::Connection(e.to_string()))
    }

    async fn handle_successful_login(&self, response: reqwest::Response) -> VcliResult<SessionToken> {
        let body = response.json::<SessionResponse>().await.map_err(|e| {
            VcliError::Parse(format!("Failed to parse session response: {}", e))
        })?;

        let session_id = body.into_session_id();
        validate_session_token(&session_id)?;
        Ok(SessionToken::new_unchecked(session_id))
    }
}

impl Default for SessionService {
    fn default() -> Self {
        Self::new()
    }
}
