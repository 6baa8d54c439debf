//! Inventory-aware automation for VMware vCenter.
//!
//! The crate resolves names to inventory objects, turns requested changes
//! into operation specs, submits them as remote tasks and supervises those
//! tasks to completion. Every mutating intent yields one [`ObjectOutcome`]
//! per object, so a batch never stops at the first skipped VM.

mod auth;
pub mod command;
mod config;
mod context;
mod core;
pub mod inventory;
mod task;

#[cfg(test)]
mod tests;

pub use crate::{
    command::{Dispatcher, Intent, IntentResult, SnapshotAction},
    config::{ConnectionSettings, RateLimitConfig, VcliConfig, WaitBudgets},
    context::VcliContext,
    core::{
        domain::{
            error::{ValidationError, VcliError, VcliResult},
            model::{
                connection::VcenterConnection,
                delta::{
                    ComputeDelta, ComputeMode, DiskAction, DiskDelta, NicDelta, NicMode, NicTarget,
                    Provisioning, ResourceDelta, TagDelta, TagMode,
                },
                inventory_object::{InventoryObject, ManagedObjectRef, ObjectKind, PowerState},
                lifecycle::{
                    ChangeRequest, CloneOptions, HardwareUpgrade, MigrateTarget, NameChange,
                    OfflineChanges, PowerAction, ShutdownMode, TemplateChange,
                },
                outcome::{ObjectOutcome, Outcome, SkipReason},
                report::{ListTarget, Listing, VmInfo},
                selection::{MatchMode, OsFamily, SelectionCriteria, VmFilters, parse_tokens},
                task::{TaskReport, TaskState, TaskStatus},
            },
        },
        infrastructure::{api_client::ApiClient, inventory_client::InventoryClient},
    },
};

use crate::core::domain::value_object::{
    DEFAULT_VCENTER_PORT, VcenterHost, VcenterPassword, VcenterPort, VcenterUsername,
    validate_host, validate_password, validate_port, validate_username,
};
use std::sync::Arc;
use tracing::info;

/// A client for one vCenter.
///
/// # Examples
///
/// ```no_run
/// use vcli::{Intent, MatchMode, PowerAction, SelectionCriteria, VcliClient, VcliResult};
///
/// #[tokio::main]
/// async fn main() -> VcliResult<()> {
///     let client = VcliClient::builder()
///         .host("vcenter.example.com")?
///         .credentials("administrator@vsphere.local", "password")?
///         .operator("jdoe")
///         .build()
///         .await?;
///
///     client.login().await?;
///     let result = client
///         .execute(Intent::Power {
///             criteria: SelectionCriteria::named(["web01"], MatchMode::Exact),
///             action: PowerAction::On,
///         })
///         .await?;
///     for outcome in result.outcomes() {
///         println!("{} {}: {:?}", outcome.object, outcome.action, outcome.outcome);
///     }
///     client.logout().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct VcliClient {
    api: Arc<ApiClient>,
    ctx: VcliContext,
}

/// Builder for [`VcliClient`].
#[derive(Debug, Default)]
pub struct VcliClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    config: VcliConfig,
}

fn required(field: &str) -> VcliError {
    VcliError::from(ValidationError::Field {
        field: field.to_string(),
        message: format!("{} is required", field),
    })
}

impl VcliClientBuilder {
    pub fn host(mut self, host: impl Into<String>) -> VcliResult<Self> {
        self.host = Some(host.into());
        Ok(self)
    }

    pub fn port(mut self, port: u16) -> VcliResult<Self> {
        self.port = Some(port);
        Ok(self)
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> VcliResult<Self> {
        self.username = Some(username.into());
        self.password = Some(password.into());
        Ok(self)
    }

    /// Takes host, port and credentials from `settings`.
    pub fn settings(mut self, settings: ConnectionSettings) -> Self {
        self.host = Some(settings.host);
        self.port = settings.port;
        self.username = Some(settings.username);
        self.password = Some(settings.password);
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.accept_invalid_certs = accept;
        self
    }

    /// Minimum zxcvbn score the password must reach.
    pub fn password_min_score(mut self, score: zxcvbn::Score) -> Self {
        self.config.password_min_score = Some(score);
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = Some(rate_limit);
        self
    }

    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.config.operator = operator.into();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: VcliConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the settings and builds the client. No request is sent.
    ///
    /// # Errors
    /// Returns `VcliError::Validation` for missing or malformed settings.
    pub async fn build(self) -> VcliResult<VcliClient> {
        let host = self.host.ok_or_else(|| required("host"))?;
        validate_host(&host)?;
        let port = self.port.unwrap_or(DEFAULT_VCENTER_PORT);
        validate_port(port)?;
        let username = self.username.ok_or_else(|| required("username"))?;
        validate_username(&username)?;
        let password = self.password.ok_or_else(|| required("password"))?;
        validate_password(&password, self.config.password_min_score)?;

        let connection = VcenterConnection::new(
            VcenterHost::new_unchecked(host),
            VcenterPort::new_unchecked(port),
            VcenterUsername::new_unchecked(username),
            VcenterPassword::new_unchecked(password),
            self.config.accept_invalid_certs,
        );
        VcliClient::with_connection(connection, self.config)
    }
}

impl VcliClient {
    pub fn builder() -> VcliClientBuilder {
        VcliClientBuilder::default()
    }

    pub(crate) fn with_connection(
        connection: VcenterConnection,
        config: VcliConfig,
    ) -> VcliResult<Self> {
        let api = Arc::new(ApiClient::new(connection, config.clone())?);
        let ctx = VcliContext::new(api.clone(), config);
        Ok(Self { api, ctx })
    }

    /// Establishes a session. Requests also log in on demand.
    pub async fn login(&self) -> VcliResult<()> {
        self.api.login().await?;
        info!(host = self.api.connection().host().as_str(), "Connected to vCenter");
        Ok(())
    }

    pub async fn logout(&self) -> VcliResult<()> {
        self.api.logout().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.api.is_authenticated().await
    }

    pub fn config(&self) -> &VcliConfig {
        self.ctx.config()
    }

    /// The shared context, for driving the inventory services directly.
    pub fn context(&self) -> &VcliContext {
        &self.ctx
    }

    pub async fn execute(&self, intent: Intent) -> VcliResult<IntentResult> {
        Dispatcher::new(&self.ctx).execute(intent).await
    }
}
