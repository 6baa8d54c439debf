//! HTTP implementation of [`InventoryClient`] with automatic session refresh.

use crate::{
    VcenterConnection, VcliConfig, VcliError, VcliResult,
    auth::application::service::session_service::SessionService,
    core::{
        domain::{
            error::ValidationError,
            model::{
                event::MigrationEvent,
                inventory_object::{InventoryObject, ManagedObjectRef, ObjectKind},
                operation::OperationSpec,
                tag::{Category, DynamicId, Tag},
                task::{TaskHandle, TaskInfo},
            },
            value_object::{SESSION_HEADER, SessionToken},
        },
        infrastructure::inventory_client::InventoryClient,
    },
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// HTTP client for the vCenter REST endpoints.
///
/// Every request carries the `vmware-api-session-id` header. A missing or
/// expired session is established before the request is sent; a `401`
/// answer triggers exactly one re-login and one retry.
#[derive(Debug)]
pub struct ApiClient {
    http_client: Client,
    connection: Arc<VcenterConnection>,
    session: Arc<RwLock<Option<SessionToken>>>,
    config: Arc<VcliConfig>,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    /// Creates a new `ApiClient`. The client starts without a session.
    ///
    /// # Errors
    /// Returns `VcliError::Connection` if the HTTP client cannot be built and
    /// `VcliError::Validation` for a rate limit of zero.
    pub fn new(connection: VcenterConnection, config: VcliConfig) -> VcliResult<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(connection.accept_invalid_certs())
            .build()
            .map_err(|e| VcliError::Connection(e.to_string()))?;

        let rate_limiter = match config.rate_limit {
            Some(rl) => {
                let per_second = non_zero(rl.requests_per_second, "requests_per_second")?;
                let burst = non_zero(rl.burst_size, "burst_size")?;
                let quota = Quota::per_second(per_second).allow_burst(burst);
                Some(Arc::new(DefaultDirectRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            http_client,
            connection: Arc::new(connection),
            session: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
            rate_limiter,
        })
    }

    /// Returns a reference to the underlying connection details.
    pub fn connection(&self) -> &VcenterConnection {
        &self.connection
    }

    /// Sets the session (used after a successful login or when restoring one).
    pub async fn set_session(&self, token: SessionToken) {
        let mut lock = self.session.write().await;
        *lock = Some(token);
    }

    /// Returns the current session, if any.
    pub async fn session(&self) -> Option<SessionToken> {
        self.session.read().await.clone()
    }

    /// Returns `true` if there is a non-expired session.
    pub async fn is_authenticated(&self) -> bool {
        let lock = self.session.read().await;
        lock.as_ref()
            .map(|s| !s.is_expired(self.config.session_lifetime))
            .unwrap_or(false)
    }

    /// Establishes a new session with the stored credentials.
    pub async fn login(&self) -> VcliResult<()> {
        self.refresh_session().await
    }

    /// Terminates the current session, if any.
    pub async fn logout(&self) -> VcliResult<()> {
        let token = self.session.write().await.take();
        match token {
            Some(token) => SessionService::new().terminate(&self.connection, &token).await,
            None => Ok(()),
        }
    }

    /// Performs an authenticated GET request.
    pub async fn get<T>(&self, url: Url) -> VcliResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute_request(Method::GET, url, None::<&()>).await
    }

    /// Performs an authenticated POST request with a JSON body.
    pub async fn post<B, T>(&self, url: Url, body: &B) -> VcliResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.execute_request(Method::POST, url, Some(body)).await
    }

    /// Builds an endpoint URL from path segments and query pairs.
    ///
    /// Segments are percent-encoded, so identifiers such as tag URNs can be
    /// passed verbatim.
    pub fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> VcliResult<Url> {
        let mut url = self.connection.url().join("")?;
        url.path_segments_mut()
            .map_err(|_| {
                VcliError::from(ValidationError::Format(format!(
                    "Base URL '{}' cannot carry a path",
                    self.connection.url().as_str()
                )))
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Core request execution method. It ensures a session, sends the request,
    /// handles 401 by re-authenticating once, and parses the response.
    async fn execute_request<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> VcliResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.ensure_authenticated().await?;

        let response = self.send(method.clone(), url.clone(), body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("session rejected, logging in again");
            self.refresh_session().await?;
            return self.retry_request(method, url, body).await;
        }

        parse_response(response).await
    }

    /// Retry a request after a successful re-login. Never recurses.
    async fn retry_request<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> VcliResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = self.send(method, url, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(VcliError::Authentication(
                "Session rejected after re-login".to_string(),
            ));
        }
        parse_response(response).await
    }

    async fn send<B>(&self, method: Method, url: Url, body: Option<&B>) -> VcliResult<reqwest::Response>
    where
        B: Serialize,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        debug!(%method, %url, "request");
        let mut req_builder = self.http_client.request(method, url);

        {
            let session_guard = self.session.read().await;
            if let Some(session) = session_guard.as_ref() {
                req_builder = req_builder.header(SESSION_HEADER, session.as_str());
            }
        }

        if let Some(body) = body {
            req_builder = req_builder.json(body);
        }

        req_builder
            .send()
            .await
            .map_err(|e| VcliError::Connection(format!("HTTP request failed: {}", e)))
    }

    /// Ensures that we have a non-expired session. If not, logs in.
    async fn ensure_authenticated(&self) -> VcliResult<()> {
        let need_refresh = {
            let session_guard = self.session.read().await;
            match session_guard.as_ref() {
                Some(session) => session.is_expired(self.config.session_lifetime),
                None => true,
            }
        };

        if need_refresh {
            self.refresh_session().await?;
        }
        Ok(())
    }

    async fn refresh_session(&self) -> VcliResult<()> {
        let service = SessionService::new();
        let token = service.execute(&self.connection).await?;
        let mut lock = self.session.write().await;
        *lock = Some(token);
        Ok(())
    }

    fn object_endpoint(&self, reference: &ManagedObjectRef, rest: &[&str]) -> VcliResult<Url> {
        let mut segments = vec![
            "api",
            "vcli",
            "objects",
            reference.object_type.as_str(),
            reference.value.as_str(),
        ];
        segments.extend_from_slice(rest);
        self.endpoint(&segments, &[])
    }
}

fn non_zero(value: u32, field: &str) -> VcliResult<NonZeroU32> {
    NonZeroU32::new(value).ok_or_else(|| {
        VcliError::from(ValidationError::Field {
            field: field.to_string(),
            message: "Rate limit values must be greater than zero".to_string(),
        })
    })
}

/// Maps the status code and decodes the body. An empty body decodes as `null`.
async fn parse_response<T>(response: reqwest::Response) -> VcliResult<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| VcliError::Connection(format!("Failed to read response: {}", e)))?;

    if !status.is_success() {
        return Err(match status {
            StatusCode::UNAUTHORIZED => VcliError::Authentication(text),
            StatusCode::NOT_FOUND => VcliError::NotFound(text),
            _ => VcliError::Api {
                status: status.as_u16(),
                message: if text.is_empty() {
                    status.to_string()
                } else {
                    text
                },
            },
        });
    }

    let text = if text.trim().is_empty() { "null" } else { text.as_str() };
    serde_json::from_str(text)
        .map_err(|e| VcliError::Parse(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl InventoryClient for ApiClient {
    async fn list_objects(
        &self,
        kind: ObjectKind,
        properties: &[String],
    ) -> VcliResult<Vec<InventoryObject>> {
        let properties = properties.join(",");
        let url = self.endpoint(
            &["api", "vcli", "objects"],
            &[("type", kind.type_name()), ("properties", &properties)],
        )?;
        self.get(url).await
    }

    async fn fetch_object(
        &self,
        reference: &ManagedObjectRef,
        properties: &[String],
    ) -> VcliResult<InventoryObject> {
        let mut url = self.object_endpoint(reference, &[])?;
        url.query_pairs_mut()
            .append_pair("properties", &properties.join(","));
        self.get(url).await
    }

    async fn submit_operation(
        &self,
        reference: &ManagedObjectRef,
        operation: OperationSpec,
    ) -> VcliResult<TaskHandle> {
        debug!(object = %reference, operation = operation.name(), "submitting");
        let url = self.object_endpoint(reference, &["tasks"])?;
        self.post(url, &operation).await
    }

    async fn poll_task(&self, handle: &TaskHandle) -> VcliResult<TaskInfo> {
        let url = self.endpoint(&["api", "cis", "tasks", handle.as_str()], &[])?;
        self.get(url).await
    }

    async fn fetch_events_for_entity(
        &self,
        reference: &ManagedObjectRef,
        event_types: &[String],
    ) -> VcliResult<Vec<MigrationEvent>> {
        let url = self.object_endpoint(reference, &["events"])?;
        self.post(url, &json!({ "eventTypeIds": event_types })).await
    }

    async fn list_categories(&self) -> VcliResult<Vec<Category>> {
        let url = self.endpoint(&["api", "cis", "tagging", "category"], &[])?;
        let ids: Vec<String> = self.get(url).await?;
        let mut categories = Vec::with_capacity(ids.len());
        for id in &ids {
            let url = self.endpoint(&["api", "cis", "tagging", "category", id], &[])?;
            categories.push(self.get(url).await?);
        }
        Ok(categories)
    }

    async fn list_tags(&self) -> VcliResult<Vec<Tag>> {
        let url = self.endpoint(&["api", "cis", "tagging", "tag"], &[])?;
        let ids: Vec<String> = self.get(url).await?;
        let mut tags = Vec::with_capacity(ids.len());
        for id in &ids {
            let url = self.endpoint(&["api", "cis", "tagging", "tag", id], &[])?;
            tags.push(self.get(url).await?);
        }
        Ok(tags)
    }

    async fn list_attached_tags(&self, reference: &ManagedObjectRef) -> VcliResult<Vec<String>> {
        let url = self.endpoint(
            &["api", "cis", "tagging", "tag-association"],
            &[("action", "list-attached-tags")],
        )?;
        self.post(url, &json!({ "object_id": DynamicId::from(reference) }))
            .await
    }

    async fn list_attached_objects(&self, tag_id: &str) -> VcliResult<Vec<DynamicId>> {
        let url = self.endpoint(
            &["api", "cis", "tagging", "tag-association", tag_id],
            &[("action", "list-attached-objects")],
        )?;
        self.post(url, &json!({})).await
    }

    async fn attach_tag(&self, tag_id: &str, reference: &ManagedObjectRef) -> VcliResult<()> {
        let url = self.endpoint(
            &["api", "cis", "tagging", "tag-association", tag_id],
            &[("action", "attach")],
        )?;
        self.post(url, &json!({ "object_id": DynamicId::from(reference) }))
            .await
    }

    async fn detach_tag(&self, tag_id: &str, reference: &ManagedObjectRef) -> VcliResult<()> {
        let url = self.endpoint(
            &["api", "cis", "tagging", "tag-association", tag_id],
            &[("action", "detach")],
        )?;
        self.post(url, &json!({ "object_id": DynamicId::from(reference) }))
            .await
    }
}
