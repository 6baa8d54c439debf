//! Virtual hardware devices attached to a VM.
//!
//! The same types describe devices read from `config.hardware.device` and
//! devices sent back in a reconfiguration's `deviceChange` list.

use crate::core::domain::model::inventory_object::ManagedObjectRef;
use serde::{Deserialize, Serialize};

/// Label prefix of virtual disks (`Hard disk 1`, `Hard disk 2`, ...).
pub const DISK_LABEL_PREFIX: &str = "Hard disk";
/// Label prefix of network adapters (`Network adapter 1`, ...).
pub const NIC_LABEL_PREFIX: &str = "Network adapter";
/// Unit number 7 on a SCSI bus belongs to the controller itself.
pub const RESERVED_SCSI_UNIT: i32 = 7;
/// A SCSI bus addresses units 0..=15.
pub const MAX_SCSI_UNITS: i32 = 16;

/// Returns the 1-based ordinal encoded in a device label, if it carries `prefix`.
///
/// `Hard disk 3` yields 3 for the disk prefix and nothing for the adapter prefix.
pub fn label_index(label: &str, prefix: &str) -> Option<u32> {
    label
        .strip_prefix(prefix)
        .and_then(|rest| rest.trim().parse().ok())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceInfo {
    pub label: String,
    #[serde(default)]
    pub summary: String,
}

impl DeviceInfo {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            summary: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskMode {
    Persistent,
    IndependentPersistent,
    IndependentNonpersistent,
    Nonpersistent,
}

/// Flat VMDK backing of a virtual disk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskBacking {
    /// `[datastore] folder/disk.vmdk`; empty for a disk about to be created.
    #[serde(default)]
    pub file_name: String,
    pub disk_mode: DiskMode,
    #[serde(default)]
    pub thin_provisioned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eagerly_scrub: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<ManagedObjectRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDisk {
    pub key: i32,
    pub device_info: DeviceInfo,
    pub controller_key: i32,
    pub unit_number: i32,
    #[serde(rename = "capacityInKB")]
    pub capacity_in_kb: u64,
    pub backing: DiskBacking,
}

impl VirtualDisk {
    /// Ordinal from the `Hard disk N` label.
    pub fn index(&self) -> Option<u32> {
        label_index(&self.device_info.label, DISK_LABEL_PREFIX)
    }

    pub fn capacity_gb(&self) -> u64 {
        self.capacity_in_kb / (1024 * 1024)
    }

    pub fn is_thin(&self) -> bool {
        self.backing.thin_provisioned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualController {
    pub key: i32,
    pub device_info: DeviceInfo,
    pub bus_number: u32,
    /// Keys of the devices attached to this controller.
    #[serde(default)]
    pub device: Vec<i32>,
}

/// Distributed switch port a NIC is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortConnection {
    pub portgroup_key: String,
    pub switch_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NicBacking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortConnection>,
    /// Standard switch network name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectInfo {
    pub start_connected: bool,
    pub allow_guest_control: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualEthernetCard {
    pub key: i32,
    pub device_info: DeviceInfo,
    /// Emulated adapter model (`Vmxnet3`, `E1000e`, ...).
    pub adapter_type: String,
    pub backing: NicBacking,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectable: Option<ConnectInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake_on_lan_enabled: Option<bool>,
}

impl VirtualEthernetCard {
    /// Ordinal from the `Network adapter N` label.
    pub fn index(&self) -> Option<u32> {
        label_index(&self.device_info.label, NIC_LABEL_PREFIX)
    }

    pub fn portgroup_key(&self) -> Option<&str> {
        self.backing.port.as_ref().map(|p| p.portgroup_key.as_str())
    }
}

/// A device from a VM's hardware list, tagged by its API type.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "_type")]
pub enum VirtualDevice {
    #[serde(rename = "VirtualDisk")]
    Disk(VirtualDisk),
    #[serde(rename = "VirtualEthernetCard")]
    EthernetCard(VirtualEthernetCard),
    #[serde(rename = "VirtualSCSIController")]
    ScsiController(VirtualController),
    /// Any device the engine does not manipulate (CD-ROM, video card, ...).
    #[serde(other)]
    Other,
}

impl VirtualDevice {
    pub fn as_disk(&self) -> Option<&VirtualDisk> {
        match self {
            VirtualDevice::Disk(disk) => Some(disk),
            _ => None,
        }
    }

    pub fn as_nic(&self) -> Option<&VirtualEthernetCard> {
        match self {
            VirtualDevice::EthernetCard(nic) => Some(nic),
            _ => None,
        }
    }

    pub fn as_scsi_controller(&self) -> Option<&VirtualController> {
        match self {
            VirtualDevice::ScsiController(controller) => Some(controller),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_index() {
        assert_eq!(label_index("Hard disk 12", DISK_LABEL_PREFIX), Some(12));
        assert_eq!(label_index("Network adapter 2", NIC_LABEL_PREFIX), Some(2));
        assert_eq!(label_index("Hard disk", DISK_LABEL_PREFIX), None);
        assert_eq!(label_index("CD/DVD drive 1", DISK_LABEL_PREFIX), None);
    }

    #[test]
    fn test_unknown_devices_are_kept_as_other() {
        let devices: Vec<VirtualDevice> = serde_json::from_value(serde_json::json!([
            {"_type": "VirtualCdrom", "key": 3002},
            {
                "_type": "VirtualDisk",
                "key": 2000,
                "deviceInfo": {"label": "Hard disk 1", "summary": "62,914,560 KB"},
                "controllerKey": 1000,
                "unitNumber": 0,
                "capacityInKB": 62914560,
                "backing": {"fileName": "[ds1] web01/web01.vmdk", "diskMode": "persistent", "thinProvisioned": true}
            }
        ]))
        .unwrap();

        assert_eq!(devices[0], VirtualDevice::Other);
        let disk = devices[1].as_disk().unwrap();
        assert_eq!(disk.index(), Some(1));
        assert_eq!(disk.capacity_gb(), 60);
        assert!(disk.is_thin());
    }
}
