//! Requests that change a VM's power state, placement or identity.

use crate::core::domain::model::delta::ComputeDelta;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    /// Power on a VM that is off.
    On,
    /// Power on a VM that is suspended.
    Resume,
    Off,
    Suspend,
    /// Hard reset, whatever the current state.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    Shutdown,
    /// Shut down, apply the offline changes, then power on.
    Reboot,
}

/// Virtual hardware upgrade target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HardwareUpgrade {
    /// Highest version the host supports.
    Latest,
    Version(u32),
}

impl HardwareUpgrade {
    /// The `vmx-NN` key, or `None` for the latest version.
    pub fn version_key(&self) -> Option<String> {
        match self {
            HardwareUpgrade::Latest => None,
            HardwareUpgrade::Version(version) => Some(format!("vmx-{:02}", version)),
        }
    }
}

/// Changes applied while the VM is down during a shutdown or reboot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OfflineChanges {
    pub hot_add: bool,
    pub upgrade: Option<HardwareUpgrade>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CloneOptions {
    /// Place clones in this cluster's root resource pool instead of the source's pool.
    pub cluster: Option<String>,
    pub cpu: Option<u32>,
    pub memory_mb: Option<u64>,
    pub annotation: Option<String>,
    /// Attach the source's tags to each clone.
    pub copy_tags: bool,
}

/// Destination of a migration; at least one of host or datastore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MigrateTarget {
    pub host: Option<String>,
    pub datastore: Option<String>,
    /// Convert disks to thin provisioning when changing datastore.
    pub thin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NameChange {
    Rename(String),
    /// Appends `.suffix` to the current name.
    Append(String),
}

impl NameChange {
    pub fn apply(&self, current: &str) -> String {
        match self {
            NameChange::Rename(name) => name.clone(),
            NameChange::Append(suffix) => format!("{}.{}", current, suffix),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateChange {
    ToTemplate,
    ToVirtualMachine,
}

/// Attribute changes for the change intent; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChangeRequest {
    pub name: Option<NameChange>,
    pub annotation: Option<String>,
    pub resource_pool: Option<String>,
    pub template: Option<TemplateChange>,
    /// Applied in `set` mode.
    pub compute: Option<ComputeDelta>,
    /// Only on a powered-off VM.
    pub hot_add: bool,
    /// Only on a powered-off VM.
    pub upgrade: Option<HardwareUpgrade>,
}
