//! Typed rows for informational intents. Rendering is left to the caller.

use crate::core::domain::model::{
    device::{DiskMode, VirtualDisk, VirtualEthernetCard},
    event::MigrationEvent,
    inventory_object::{InventoryObject, ManagedObjectRef, PowerState},
    snapshot::SnapshotNode,
    tag::{Category, DynamicId, ResolvedTag},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmSummary {
    pub name: String,
    pub reference: ManagedObjectRef,
    pub power_state: Option<PowerState>,
    pub cpu: u32,
    pub memory_mb: u64,
    /// Sum of all virtual disk capacities.
    pub disk_gb: u64,
    pub ip_address: Option<String>,
    pub host: Option<String>,
    pub cluster: Option<String>,
    pub guest_id: Option<String>,
    pub hardware_version: Option<String>,
    pub tools_version: Option<String>,
    pub annotation: Option<String>,
    pub template: bool,
    pub has_snapshots: bool,
}

impl From<&InventoryObject> for VmSummary {
    fn from(vm: &InventoryObject) -> Self {
        let (cpu, memory_mb) = vm.compute();
        let props = &vm.properties;
        Self {
            name: vm.name.clone(),
            reference: vm.reference.clone(),
            power_state: props.power_state,
            cpu,
            memory_mb,
            disk_gb: vm.disks().map(VirtualDisk::capacity_gb).sum(),
            ip_address: props.ip_address.clone(),
            host: vm.host_name().map(str::to_string),
            cluster: vm.cluster_name().map(str::to_string),
            guest_id: props.guest_id.clone(),
            hardware_version: props.hardware_version.clone(),
            tools_version: props.tools_version.clone(),
            annotation: props.annotation.clone(),
            template: vm.is_template(),
            has_snapshots: vm.has_snapshots(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskRow {
    pub vm: String,
    pub label: String,
    pub index: Option<u32>,
    /// `bus:unit` on its SCSI controller, when the controller is known.
    pub locator: Option<String>,
    pub capacity_gb: u64,
    pub thin: bool,
    pub mode: DiskMode,
    pub file_name: String,
}

impl DiskRow {
    pub fn new(vm: &InventoryObject, disk: &VirtualDisk) -> Self {
        let locator = vm
            .scsi_controllers()
            .find(|c| c.key == disk.controller_key)
            .map(|c| format!("{}:{}", c.bus_number, disk.unit_number));
        Self {
            vm: vm.name.clone(),
            label: disk.device_info.label.clone(),
            index: disk.index(),
            locator,
            capacity_gb: disk.capacity_gb(),
            thin: disk.is_thin(),
            mode: disk.backing.disk_mode,
            file_name: disk.backing.file_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NicRow {
    pub vm: String,
    pub label: String,
    pub index: Option<u32>,
    pub adapter_type: String,
    pub mac_address: Option<String>,
    pub portgroup_key: Option<String>,
    /// Port group name and VLAN, when the port group could be looked up.
    pub network: Option<String>,
    pub vlan: Option<u32>,
}

impl NicRow {
    pub fn new(vm: &InventoryObject, nic: &VirtualEthernetCard) -> Self {
        Self {
            vm: vm.name.clone(),
            label: nic.device_info.label.clone(),
            index: nic.index(),
            adapter_type: nic.adapter_type.clone(),
            mac_address: nic.mac_address.clone(),
            portgroup_key: nic.portgroup_key().map(str::to_string),
            network: nic.backing.device_name.clone(),
            vlan: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    pub vm: String,
    pub id: i64,
    pub created: DateTime<Utc>,
    pub creator: String,
    pub description: String,
}

impl SnapshotRow {
    pub fn new(vm: &InventoryObject, node: &SnapshotNode) -> Self {
        Self {
            vm: vm.name.clone(),
            id: node.id,
            created: node.created,
            creator: node.creator.clone(),
            description: node.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRow {
    pub name: String,
    pub cluster: Option<String>,
    pub cpu_cores: Option<u32>,
    pub memory_gb: Option<u64>,
    pub model: Option<String>,
    pub vms: usize,
}

impl From<&InventoryObject> for HostRow {
    fn from(host: &InventoryObject) -> Self {
        let hardware = host.properties.hardware.as_ref();
        Self {
            name: host.name.clone(),
            cluster: host.properties.parent.clone(),
            cpu_cores: hardware.map(|h| h.num_cpu_cores),
            memory_gb: hardware.map(|h| h.memory_size / BYTES_PER_GB),
            model: hardware.and_then(|h| h.model.clone()),
            vms: host.properties.vms.as_ref().map_or(0, Vec::len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatastoreRow {
    pub name: String,
    pub capacity_gb: u64,
    pub free_gb: u64,
    pub vms: usize,
}

impl From<&InventoryObject> for DatastoreRow {
    fn from(datastore: &InventoryObject) -> Self {
        let props = &datastore.properties;
        Self {
            name: datastore.name.clone(),
            capacity_gb: props.capacity.unwrap_or(0) / BYTES_PER_GB,
            free_gb: props.free_space.unwrap_or(0) / BYTES_PER_GB,
            vms: props.vms.as_ref().map_or(0, Vec::len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkRow {
    pub name: String,
    pub vlan: Option<u32>,
    pub vms: usize,
}

impl From<&InventoryObject> for NetworkRow {
    fn from(network: &InventoryObject) -> Self {
        Self {
            name: network.name.clone(),
            vlan: network.properties.vlan_id,
            vms: network.properties.vms.as_ref().map_or(0, Vec::len),
        }
    }
}

/// Name plus member count, for clusters, datacenters and resource pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedRow {
    pub name: String,
    pub reference: ManagedObjectRef,
    pub members: usize,
}

impl From<&InventoryObject> for NamedRow {
    fn from(object: &InventoryObject) -> Self {
        let props = &object.properties;
        let members = props
            .hosts
            .as_ref()
            .or(props.vms.as_ref())
            .map_or(0, Vec::len);
        Self {
            name: object.name.clone(),
            reference: object.reference.clone(),
            members,
        }
    }
}

/// What a listing enumerates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListTarget {
    Clusters,
    Datacenters,
    Datastores,
    /// Hosts, optionally only those in clusters matching this substring.
    Hosts { cluster: Option<String> },
    Networks,
    ResourcePools,
    Templates,
    Vms { max: Option<usize> },
    VmDisks { disk: Option<u32> },
    VmNics { adapter: Option<u32> },
    VmSnapshots,
    /// Tags by name, category (either direction) and associable type.
    Tags {
        category: Option<String>,
        object_type: Option<String>,
    },
    Categories { object_type: Option<String> },
    VmTags,
    /// Objects carrying the named tag.
    TaggedObjects { tag: String, category: Option<String> },
}

/// Everything the info intent reports for one VM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmInfo {
    pub summary: VmSummary,
    pub snapshots: Vec<SnapshotRow>,
    pub disks: Vec<DiskRow>,
    pub nics: Vec<NicRow>,
    pub migrations: Vec<MigrationEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "camelCase")]
pub enum Listing {
    Clusters(Vec<NamedRow>),
    Datacenters(Vec<NamedRow>),
    Datastores(Vec<DatastoreRow>),
    Hosts(Vec<HostRow>),
    Networks(Vec<NetworkRow>),
    ResourcePools(Vec<NamedRow>),
    Vms(Vec<VmSummary>),
    Templates(Vec<VmSummary>),
    VmDisks(Vec<DiskRow>),
    VmNics(Vec<NicRow>),
    VmSnapshots(Vec<SnapshotRow>),
    Tags(Vec<ResolvedTag>),
    Categories(Vec<Category>),
    /// Attached tags per VM name.
    VmTags(Vec<(String, Vec<ResolvedTag>)>),
    TaggedObjects(Vec<DynamicId>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Clusters(rows) | Listing::Datacenters(rows) | Listing::ResourcePools(rows) => {
                rows.len()
            }
            Listing::Datastores(rows) => rows.len(),
            Listing::Hosts(rows) => rows.len(),
            Listing::Networks(rows) => rows.len(),
            Listing::Vms(rows) | Listing::Templates(rows) => rows.len(),
            Listing::VmDisks(rows) => rows.len(),
            Listing::VmNics(rows) => rows.len(),
            Listing::VmSnapshots(rows) => rows.len(),
            Listing::Tags(rows) => rows.len(),
            Listing::Categories(rows) => rows.len(),
            Listing::VmTags(rows) => rows.len(),
            Listing::TaggedObjects(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
