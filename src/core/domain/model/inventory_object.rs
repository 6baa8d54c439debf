//! Managed objects as returned by the property collector.
//!
//! An [`InventoryObject`] is a remote reference plus a read-once snapshot of
//! the properties that were requested for its kind. It is never refreshed
//! in place: once an operation against it completes, callers must fetch the
//! object again before trusting any mutated field.

use crate::core::domain::model::{
    device::{VirtualController, VirtualDevice, VirtualDisk, VirtualEthernetCard},
    snapshot::{SnapshotChain, SnapshotInfo},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The managed entity types the resolver knows how to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ObjectKind {
    #[serde(rename = "ClusterComputeResource")]
    Cluster,
    Datacenter,
    Datastore,
    #[serde(rename = "DistributedVirtualPortgroup")]
    PortGroup,
    #[serde(rename = "HostSystem")]
    Host,
    Network,
    ResourcePool,
    StoragePod,
    VirtualMachine,
}

const VM_PROPERTIES: &[&str] = &[
    "name",
    "rootSnapshot",
    "snapshot",
    "config.template",
    "config.guestId",
    "config.annotation",
    "config.version",
    "config.hardware.device",
    "runtime.powerState",
    "runtime.consolidationNeeded",
    "runtime.host",
    "summary.config.memorySizeMB",
    "summary.config.numCpu",
    "guest.toolsVersion",
    "guest.ipAddress",
];

const HOST_PROPERTIES: &[&str] = &["name", "parent", "resourcePool", "summary.hardware", "vm"];

const CLUSTER_PROPERTIES: &[&str] = &["name", "resourcePool", "host"];

const DATASTORE_PROPERTIES: &[&str] = &["name", "summary.capacity", "summary.freeSpace", "vm"];

const NETWORK_PROPERTIES: &[&str] = &[
    "name",
    "key",
    "config.defaultPortConfig.vlan.vlanId",
    "config.distributedVirtualSwitch.uuid",
    "vm",
    "host",
];

const POOL_PROPERTIES: &[&str] = &["name", "owner", "vm"];

const NAME_ONLY: &[&str] = &["name"];

impl ObjectKind {
    /// Type name used on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Cluster => "ClusterComputeResource",
            ObjectKind::Datacenter => "Datacenter",
            ObjectKind::Datastore => "Datastore",
            ObjectKind::PortGroup => "DistributedVirtualPortgroup",
            ObjectKind::Host => "HostSystem",
            ObjectKind::Network => "Network",
            ObjectKind::ResourcePool => "ResourcePool",
            ObjectKind::StoragePod => "StoragePod",
            ObjectKind::VirtualMachine => "VirtualMachine",
        }
    }

    /// The fixed property set collected for this kind.
    pub fn properties(&self) -> &'static [&'static str] {
        match self {
            ObjectKind::VirtualMachine => VM_PROPERTIES,
            ObjectKind::Host => HOST_PROPERTIES,
            ObjectKind::Cluster => CLUSTER_PROPERTIES,
            ObjectKind::Datastore => DATASTORE_PROPERTIES,
            ObjectKind::Network | ObjectKind::PortGroup => NETWORK_PROPERTIES,
            ObjectKind::ResourcePool => POOL_PROPERTIES,
            ObjectKind::Datacenter | ObjectKind::StoragePod => NAME_ONLY,
        }
    }

    /// Owned copy of [`properties`](Self::properties) for client calls.
    pub fn property_set(&self) -> Vec<String> {
        self.properties().iter().map(|p| p.to_string()).collect()
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    /// Accepts both the operator shorthand (`vm`, `rp`, `dvs`, ...) and the API type name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cluster" | "clu" | "ClusterComputeResource" => Ok(ObjectKind::Cluster),
            "datacenter" | "dc" | "Datacenter" => Ok(ObjectKind::Datacenter),
            "datastore" | "ds" | "Datastore" => Ok(ObjectKind::Datastore),
            "dvs" | "DistributedVirtualPortgroup" => Ok(ObjectKind::PortGroup),
            "host" | "HostSystem" => Ok(ObjectKind::Host),
            "network" | "net" | "nw" | "Network" => Ok(ObjectKind::Network),
            "rp" | "pool" | "respool" | "resource-pool" | "ResourcePool" => {
                Ok(ObjectKind::ResourcePool)
            }
            "pod" | "storage" | "StoragePod" => Ok(ObjectKind::StoragePod),
            "vm" | "virtual-machine" | "VirtualMachine" => Ok(ObjectKind::VirtualMachine),
            other => Err(format!("Unsupported object type '{}'", other)),
        }
    }
}

/// A reference to a remote managed object (`{"type": "VirtualMachine", "value": "vm-42"}`).
///
/// This is the identity of an object; its name may change at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ManagedObjectRef {
    #[serde(rename = "type")]
    pub object_type: String,
    pub value: String,
}

impl ManagedObjectRef {
    pub fn new(kind: ObjectKind, value: impl Into<String>) -> Self {
        Self {
            object_type: kind.type_name().to_string(),
            value: value.into(),
        }
    }

    pub fn snapshot(value: impl Into<String>) -> Self {
        Self {
            object_type: "VirtualMachineSnapshot".to_string(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.value)
    }
}

/// Runtime power state of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::PoweredOn => "on",
            PowerState::PoweredOff => "off",
            PowerState::Suspended => "suspended",
        })
    }
}

/// Where a VM is currently running, denormalised by the collector.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPlacement {
    /// The ESXi host.
    pub host: ManagedObjectRef,
    /// The host's name.
    pub name: String,
    /// Name of the cluster (the host's parent), if the host is clustered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Root resource pool of the host's compute resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<ManagedObjectRef>,
}

/// Hardware summary of an ESXi host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostHardware {
    pub num_cpu_pkgs: u32,
    pub num_cpu_cores: u32,
    pub num_cpu_threads: u32,
    /// Physical memory in bytes.
    pub memory_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
}

/// Property snapshot of a managed object, keyed by property path on the wire.
///
/// Every field is optional because only the kind-specific subset is collected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ObjectProperties {
    #[serde(rename = "runtime.powerState", default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<PowerState>,
    #[serde(rename = "runtime.consolidationNeeded", default, skip_serializing_if = "Option::is_none")]
    pub consolidation_needed: Option<bool>,
    #[serde(rename = "runtime.host", default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostPlacement>,
    #[serde(rename = "summary.config.numCpu", default, skip_serializing_if = "Option::is_none")]
    pub num_cpu: Option<u32>,
    #[serde(rename = "summary.config.memorySizeMB", default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(rename = "config.guestId", default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    #[serde(rename = "config.annotation", default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(rename = "config.template", default, skip_serializing_if = "Option::is_none")]
    pub template: Option<bool>,
    /// Virtual hardware version, e.g. `vmx-13`.
    #[serde(rename = "config.version", default, skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<String>,
    #[serde(rename = "config.hardware.device", default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<VirtualDevice>>,
    #[serde(rename = "guest.toolsVersion", default, skip_serializing_if = "Option::is_none")]
    pub tools_version: Option<String>,
    #[serde(rename = "guest.ipAddress", default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Root snapshots; empty or absent when the VM has no snapshot.
    #[serde(rename = "rootSnapshot", default, skip_serializing_if = "Option::is_none")]
    pub root_snapshot: Option<Vec<ManagedObjectRef>>,
    #[serde(rename = "snapshot", default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotInfo>,

    /// Name of the parent entity (the cluster, for a host).
    #[serde(rename = "parent", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(rename = "summary.hardware", default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HostHardware>,
    /// Root resource pool of a cluster, or of the compute resource a host belongs to.
    #[serde(rename = "resourcePool", default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<ManagedObjectRef>,
    #[serde(rename = "owner", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(rename = "summary.capacity", default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    #[serde(rename = "summary.freeSpace", default, skip_serializing_if = "Option::is_none")]
    pub free_space: Option<u64>,

    /// Distributed port group key.
    #[serde(rename = "key", default, skip_serializing_if = "Option::is_none")]
    pub portgroup_key: Option<String>,
    #[serde(rename = "config.defaultPortConfig.vlan.vlanId", default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u32>,
    #[serde(rename = "config.distributedVirtualSwitch.uuid", default, skip_serializing_if = "Option::is_none")]
    pub switch_uuid: Option<String>,

    #[serde(rename = "vm", default, skip_serializing_if = "Option::is_none")]
    pub vms: Option<Vec<ManagedObjectRef>>,
    #[serde(rename = "host", default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<ManagedObjectRef>>,
}

/// A resolved managed object with its property snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InventoryObject {
    #[serde(rename = "obj")]
    pub reference: ManagedObjectRef,
    pub name: String,
    #[serde(rename = "propSet", default)]
    pub properties: ObjectProperties,
}

impl InventoryObject {
    pub fn is_powered_on(&self) -> bool {
        self.properties.power_state == Some(PowerState::PoweredOn)
    }

    pub fn is_template(&self) -> bool {
        self.properties.template.unwrap_or(false)
    }

    pub fn has_snapshots(&self) -> bool {
        self.properties
            .root_snapshot
            .as_ref()
            .is_some_and(|roots| !roots.is_empty())
    }

    /// Number of vCPUs and memory size in MB, as last collected.
    pub fn compute(&self) -> (u32, u64) {
        (
            self.properties.num_cpu.unwrap_or(0),
            self.properties.memory_mb.unwrap_or(0),
        )
    }

    pub fn devices(&self) -> &[VirtualDevice] {
        self.properties.devices.as_deref().unwrap_or(&[])
    }

    pub fn disks(&self) -> impl Iterator<Item = &VirtualDisk> {
        self.devices().iter().filter_map(VirtualDevice::as_disk)
    }

    pub fn nics(&self) -> impl Iterator<Item = &VirtualEthernetCard> {
        self.devices().iter().filter_map(VirtualDevice::as_nic)
    }

    pub fn scsi_controllers(&self) -> impl Iterator<Item = &VirtualController> {
        self.devices().iter().filter_map(VirtualDevice::as_scsi_controller)
    }

    pub fn host_name(&self) -> Option<&str> {
        self.properties.host.as_ref().map(|h| h.name.as_str())
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.properties
            .host
            .as_ref()
            .and_then(|h| h.cluster.as_deref())
    }

    /// The snapshot history as a first-child chain.
    pub fn snapshot_chain(&self) -> SnapshotChain {
        self.properties
            .snapshot
            .as_ref()
            .map(|info| SnapshotChain::from_tree(&info.root_snapshot_list))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_vm_properties() {
        let object: InventoryObject = serde_json::from_value(serde_json::json!({
            "obj": {"type": "VirtualMachine", "value": "vm-42"},
            "name": "web01",
            "propSet": {
                "runtime.powerState": "poweredOn",
                "runtime.consolidationNeeded": false,
                "summary.config.numCpu": 2,
                "summary.config.memorySizeMB": 4096,
                "config.guestId": "rhel7_64Guest",
                "config.template": false,
                "config.version": "vmx-13",
                "runtime.host": {
                    "host": {"type": "HostSystem", "value": "host-9"},
                    "name": "esx01.example.com",
                    "cluster": "Prod"
                }
            }
        }))
        .unwrap();

        assert_eq!(object.reference, ManagedObjectRef::new(ObjectKind::VirtualMachine, "vm-42"));
        assert!(object.is_powered_on());
        assert!(!object.is_template());
        assert!(!object.has_snapshots());
        assert_eq!(object.compute(), (2, 4096));
        assert_eq!(object.host_name(), Some("esx01.example.com"));
        assert_eq!(object.cluster_name(), Some("Prod"));
        assert_eq!(object.devices().len(), 0);
        assert!(object.snapshot_chain().is_empty());
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!("vm".parse::<ObjectKind>(), Ok(ObjectKind::VirtualMachine));
        assert_eq!("rp".parse::<ObjectKind>(), Ok(ObjectKind::ResourcePool));
        assert_eq!("HostSystem".parse::<ObjectKind>(), Ok(ObjectKind::Host));
        assert!("folder".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn test_vm_property_set_includes_filters() {
        let props = ObjectKind::VirtualMachine.properties();
        for required in [
            "runtime.powerState",
            "rootSnapshot",
            "runtime.consolidationNeeded",
            "config.guestId",
            "config.version",
            "config.template",
        ] {
            assert!(props.contains(&required), "missing {}", required);
        }
    }
}
