//! Mutating requests submitted against a managed object.
//!
//! Each variant maps to one remote task. The body is sent as JSON with an
//! `operation` discriminator, e.g. `{"operation": "powerOn"}`.

use crate::core::domain::model::{device::VirtualDevice, inventory_object::ManagedObjectRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceOperation {
    Add,
    Edit,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FileOperation {
    Create,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceChange {
    pub operation: DeviceOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_operation: Option<FileOperation>,
    pub device: VirtualDevice,
}

/// Partial VM configuration; only the fields that are set are changed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cpus: Option<u32>,
    #[serde(rename = "memoryMB", default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_hot_add_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_hot_add_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_change: Vec<DeviceChange>,
}

impl ConfigSpec {
    /// Enables CPU and memory hot-add.
    pub fn hot_add() -> Self {
        Self {
            cpu_hot_add_enabled: Some(true),
            memory_hot_add_enabled: Some(true),
            ..Default::default()
        }
    }
}

/// Per-disk placement override used when converting disks on relocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskLocator {
    pub disk_id: i32,
    pub datastore: ManagedObjectRef,
    pub thin_provisioned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ManagedObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<ManagedObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<ManagedObjectRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disk: Vec<DiskLocator>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneSpec {
    pub name: String,
    pub location: RelocateSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSpec>,
    pub power_on: bool,
    pub template: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum OperationSpec {
    Reconfigure(ConfigSpec),
    #[serde(rename_all = "camelCase")]
    Rename {
        new_name: String,
    },
    PowerOn,
    PowerOff,
    Suspend,
    Reset,
    ShutdownGuest,
    Destroy,
    MarkAsTemplate,
    MarkAsVirtualMachine {
        pool: ManagedObjectRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host: Option<ManagedObjectRef>,
    },
    /// Upgrade virtual hardware; `None` means the latest the host supports.
    UpgradeVm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    Clone(CloneSpec),
    Relocate(RelocateSpec),
    /// Move a VM into another resource pool without changing its host.
    MoveIntoPool {
        pool: ManagedObjectRef,
    },
    CreateSnapshot {
        name: String,
        description: String,
        memory: bool,
        quiesce: bool,
    },
    /// Issued against a snapshot reference.
    #[serde(rename_all = "camelCase")]
    RemoveSnapshot {
        remove_children: bool,
    },
    RemoveAllSnapshots,
    /// Issued against a snapshot reference.
    RevertToSnapshot,
    RevertToCurrentSnapshot,
    ConsolidateDisks,
}

impl OperationSpec {
    /// Short action name used in logs and outcome lists.
    pub fn name(&self) -> &'static str {
        match self {
            OperationSpec::Reconfigure(_) => "reconfigure",
            OperationSpec::Rename { .. } => "rename",
            OperationSpec::PowerOn => "power-on",
            OperationSpec::PowerOff => "power-off",
            OperationSpec::Suspend => "suspend",
            OperationSpec::Reset => "reset",
            OperationSpec::ShutdownGuest => "shutdown",
            OperationSpec::Destroy => "destroy",
            OperationSpec::MarkAsTemplate => "mark-as-template",
            OperationSpec::MarkAsVirtualMachine { .. } => "mark-as-vm",
            OperationSpec::UpgradeVm { .. } => "upgrade",
            OperationSpec::Clone(_) => "clone",
            OperationSpec::Relocate(_) => "relocate",
            OperationSpec::MoveIntoPool { .. } => "move",
            OperationSpec::CreateSnapshot { .. } => "snapshot-create",
            OperationSpec::RemoveSnapshot { .. } => "snapshot-remove",
            OperationSpec::RemoveAllSnapshots => "snapshot-remove-all",
            OperationSpec::RevertToSnapshot => "snapshot-revert",
            OperationSpec::RevertToCurrentSnapshot => "snapshot-revert-current",
            OperationSpec::ConsolidateDisks => "consolidate",
        }
    }
}
