use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event types that describe a VM moving between hosts or datastores.
pub const MIGRATION_EVENT_TYPES: &[&str] =
    &["VmRelocatedEvent", "DrsVmMigratedEvent", "VmMigratedEvent"];

/// A past migration of a VM, as reported by the event manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationEvent {
    #[serde(rename = "_type")]
    pub event_type: String,
    pub created_time: DateTime<Utc>,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_datastore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
}

impl MigrationEvent {
    /// DRS moves are recorded without a user.
    pub fn initiator(&self) -> &str {
        if self.user_name.is_empty() {
            "DRS"
        } else {
            &self.user_name
        }
    }
}
