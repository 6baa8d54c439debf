//! Fixtures shared by the unit and module tests.

use crate::{
    VcenterConnection, VcliConfig, VcliContext,
    core::{
        domain::{
            model::{
                device::{
                    DeviceInfo, DiskBacking, DiskMode, NicBacking, PortConnection, VirtualController,
                    VirtualDevice, VirtualDisk, VirtualEthernetCard,
                },
                inventory_object::{
                    HostPlacement, InventoryObject, ManagedObjectRef, ObjectKind, ObjectProperties,
                    PowerState,
                },
                snapshot::{SnapshotInfo, SnapshotTreeNode},
            },
            value_object::{VcenterHost, VcenterPassword, VcenterPort, VcenterUrl, VcenterUsername},
        },
        infrastructure::inventory_client::MockInventoryClient,
    },
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;

pub const SCSI_KEY: i32 = 1000;

pub fn test_connection(server_url: &str) -> VcenterConnection {
    let host = VcenterHost::new_unchecked(
        server_url
            .trim_start_matches("http://")
            .split(':')
            .next()
            .unwrap_or("127.0.0.1")
            .to_string(),
    );
    let port = VcenterPort::new_unchecked(443);
    let username = VcenterUsername::new_unchecked("administrator@vsphere.local".to_string());
    let password = VcenterPassword::new_unchecked("Vmware1!Vmware1!".to_string());
    let url = VcenterUrl::new_unchecked(format!("{}/", server_url.trim_end_matches('/')));
    VcenterConnection::with_url(host, port, username, password, true, url)
}

pub fn context(mock: MockInventoryClient) -> VcliContext {
    VcliContext::new(Arc::new(mock), VcliConfig::default())
}

pub fn vm_ref(id: &str) -> ManagedObjectRef {
    ManagedObjectRef::new(ObjectKind::VirtualMachine, id)
}

pub fn scsi_controller(bus: u32, key: i32) -> VirtualDevice {
    VirtualDevice::ScsiController(VirtualController {
        key,
        device_info: DeviceInfo::new(format!("SCSI controller {}", bus)),
        bus_number: bus,
        device: Vec::new(),
    })
}

pub fn disk(index: u32, unit: i32, size_gb: u64, thin: bool) -> VirtualDevice {
    VirtualDevice::Disk(VirtualDisk {
        key: 2000 + index as i32,
        device_info: DeviceInfo::new(format!("Hard disk {}", index)),
        controller_key: SCSI_KEY,
        unit_number: unit,
        capacity_in_kb: size_gb * 1024 * 1024,
        backing: DiskBacking {
            file_name: format!("[ds1] vm/vm_{}.vmdk", index),
            disk_mode: DiskMode::Persistent,
            thin_provisioned: thin,
            eagerly_scrub: None,
            datastore: None,
        },
    })
}

pub fn nic(index: u32, portgroup_key: &str) -> VirtualDevice {
    VirtualDevice::EthernetCard(VirtualEthernetCard {
        key: 4000 + index as i32,
        device_info: DeviceInfo::new(format!("Network adapter {}", index)),
        adapter_type: "Vmxnet3".to_string(),
        backing: NicBacking {
            port: Some(PortConnection {
                portgroup_key: portgroup_key.to_string(),
                switch_uuid: "50 2e 6b 1c".to_string(),
            }),
            device_name: None,
        },
        mac_address: Some(format!("00:50:56:00:00:0{}", index)),
        connectable: None,
        wake_on_lan_enabled: None,
    })
}

/// A powered-on Linux VM with one 60 GB thin disk and one NIC on `dvportgroup-1`.
pub fn vm(id: &str, name: &str, cpu: u32, memory_mb: u64) -> InventoryObject {
    InventoryObject {
        reference: vm_ref(id),
        name: name.to_string(),
        properties: ObjectProperties {
            power_state: Some(PowerState::PoweredOn),
            consolidation_needed: Some(false),
            num_cpu: Some(cpu),
            memory_mb: Some(memory_mb),
            guest_id: Some("rhel7_64Guest".to_string()),
            template: Some(false),
            hardware_version: Some("vmx-13".to_string()),
            annotation: Some(String::new()),
            devices: Some(vec![
                scsi_controller(0, SCSI_KEY),
                disk(1, 0, 60, true),
                nic(1, "dvportgroup-1"),
            ]),
            host: Some(HostPlacement {
                host: ManagedObjectRef::new(ObjectKind::Host, "host-1"),
                name: "esx01.lab.local".to_string(),
                cluster: Some("Prod".to_string()),
                resource_pool: Some(ManagedObjectRef::new(ObjectKind::ResourcePool, "resgroup-8")),
            }),
            root_snapshot: Some(Vec::new()),
            ..Default::default()
        },
    }
}

pub fn powered_off(mut object: InventoryObject) -> InventoryObject {
    object.properties.power_state = Some(PowerState::PoweredOff);
    object
}

pub fn network(id: &str, name: &str, vlan: u32) -> InventoryObject {
    InventoryObject {
        reference: ManagedObjectRef::new(ObjectKind::PortGroup, id),
        name: name.to_string(),
        properties: ObjectProperties {
            portgroup_key: Some(id.to_string()),
            vlan_id: Some(vlan),
            switch_uuid: Some("50 2e 6b 1c".to_string()),
            ..Default::default()
        },
    }
}

pub fn object(kind: ObjectKind, id: &str, name: &str) -> InventoryObject {
    InventoryObject {
        reference: ManagedObjectRef::new(kind, id),
        name: name.to_string(),
        properties: ObjectProperties::default(),
    }
}

pub fn snapshot_node(id: i64, children: Vec<SnapshotTreeNode>) -> SnapshotTreeNode {
    SnapshotTreeNode {
        snapshot: ManagedObjectRef::snapshot(format!("snapshot-{}", id)),
        id,
        name: "jdoe".to_string(),
        description: format!("before change {}", id),
        create_time: Utc
            .with_ymd_and_hms(2024, 3, id as u32, 8, 30, 0)
            .single()
            .unwrap_or_default(),
        child_snapshot_list: children,
    }
}

/// Attaches a linear chain of snapshots with the given ids.
pub fn with_snapshots(mut object: InventoryObject, ids: &[i64]) -> InventoryObject {
    let chain = ids
        .iter()
        .rev()
        .fold(Vec::new(), |children, id| vec![snapshot_node(*id, children)]);
    object.properties.root_snapshot = chain.first().map(|root| vec![root.snapshot.clone()]);
    object.properties.snapshot = Some(SnapshotInfo {
        current_snapshot: ids
            .last()
            .map(|id| ManagedObjectRef::snapshot(format!("snapshot-{}", id))),
        root_snapshot_list: chain,
    });
    object
}
