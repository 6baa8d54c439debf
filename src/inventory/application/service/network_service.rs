//! Network adapter changes.

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        delta::{NicDelta, NicMode, NicTarget},
        device::{ConnectInfo, DeviceInfo, NicBacking, PortConnection, VirtualDevice, VirtualEthernetCard},
        inventory_object::{InventoryObject, ObjectKind},
        operation::{ConfigSpec, DeviceChange, DeviceOperation, OperationSpec},
        outcome::{Outcome, SkipReason},
        selection::SelectionCriteria,
    },
    inventory::application::service::resolver_service::ResolverService,
    task::application::service::task_supervisor::TaskSupervisor,
};
use std::collections::HashMap;
use tracing::{info, warn};

const DEFAULT_ADAPTER_TYPE: &str = "Vmxnet3";

/// A new adapter on the distributed port group `portgroup`.
pub fn new_adapter(portgroup: &InventoryObject) -> Result<VirtualEthernetCard, SkipReason> {
    let (Some(portgroup_key), Some(switch_uuid)) = (
        portgroup.properties.portgroup_key.clone(),
        portgroup.properties.switch_uuid.clone(),
    ) else {
        return Err(SkipReason::Resolution(format!(
            "{} is not a distributed port group",
            portgroup.name
        )));
    };

    Ok(VirtualEthernetCard {
        key: -1,
        device_info: DeviceInfo::new(format!("New network adapter on {}", portgroup.name)),
        adapter_type: DEFAULT_ADAPTER_TYPE.to_string(),
        backing: NicBacking {
            port: Some(PortConnection {
                portgroup_key,
                switch_uuid,
            }),
            device_name: None,
        },
        mac_address: None,
        connectable: Some(ConnectInfo {
            start_connected: true,
            allow_guest_control: true,
            connected: false,
        }),
        wake_on_lan_enabled: Some(true),
    })
}

/// First adapter connected to a port group carrying `vlan`.
///
/// `vlans` maps port group keys to their VLAN id.
pub fn find_adapter_on_vlan<'v>(
    vm: &'v InventoryObject,
    vlans: &HashMap<String, u32>,
    vlan: u32,
) -> Option<&'v VirtualEthernetCard> {
    vm.nics().find(|nic| {
        nic.portgroup_key()
            .and_then(|key| vlans.get(key))
            .is_some_and(|id| *id == vlan)
    })
}

pub struct NetworkService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> NetworkService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    pub async fn apply(&self, vm: &InventoryObject, delta: &NicDelta) -> VcliResult<Outcome> {
        let change = match delta.mode {
            NicMode::Add => self.plan_add(&delta.target).await?,
            NicMode::Remove => self.plan_remove(vm, &delta.target).await?,
        };
        let change = match change {
            Ok(change) => change,
            Err(reason) => {
                warn!(vm = %vm.name, "{}", reason);
                return Ok(Outcome::Skipped(reason));
            }
        };

        info!(vm = %vm.name, operation = ?change.operation, "Changing network adapter");
        let spec = ConfigSpec {
            device_change: vec![change],
            ..Default::default()
        };
        let report = TaskSupervisor::new(self.ctx)
            .run(
                &vm.reference,
                OperationSpec::Reconfigure(spec),
                self.ctx.config().wait.default,
            )
            .await?;
        Ok(Outcome::Submitted(report))
    }

    async fn plan_add(&self, target: &NicTarget) -> VcliResult<Result<DeviceChange, SkipReason>> {
        let portgroup = match target {
            NicTarget::Network(name) => {
                ResolverService::new(self.ctx)
                    .resolve_one_broadening(ObjectKind::PortGroup, name)
                    .await?
            }
            NicTarget::Vlan(vlan) => self.portgroup_on_vlan(*vlan).await?,
            NicTarget::Adapter(_) => {
                return Ok(Err(SkipReason::Resolution(
                    "A new adapter needs a port group name or VLAN".to_string(),
                )));
            }
        };
        Ok(portgroup.and_then(|pg| new_adapter(&pg)).map(|nic| DeviceChange {
            operation: DeviceOperation::Add,
            file_operation: None,
            device: VirtualDevice::EthernetCard(nic),
        }))
    }

    /// The single port group carrying `vlan`.
    async fn portgroup_on_vlan(&self, vlan: u32) -> VcliResult<Result<InventoryObject, SkipReason>> {
        let mut carrying: Vec<InventoryObject> = ResolverService::new(self.ctx)
            .resolve(ObjectKind::PortGroup, &SelectionCriteria::all())
            .await?
            .into_values()
            .filter(|pg| pg.properties.vlan_id == Some(vlan))
            .collect();
        Ok(match carrying.len() {
            1 => Ok(carrying.remove(0)),
            0 => Err(SkipReason::Resolution(format!("No port group carries VLAN {}", vlan))),
            n => Err(SkipReason::Resolution(format!(
                "{} port groups carry VLAN {}, name one instead",
                n, vlan
            ))),
        })
    }

    async fn plan_remove(
        &self,
        vm: &InventoryObject,
        target: &NicTarget,
    ) -> VcliResult<Result<DeviceChange, SkipReason>> {
        let nic = match target {
            NicTarget::Adapter(index) => vm.nics().find(|nic| nic.index() == Some(*index)),
            NicTarget::Vlan(vlan) => {
                let vlans = self.vlan_map().await?;
                find_adapter_on_vlan(vm, &vlans, *vlan)
            }
            NicTarget::Network(name) => {
                let portgroup = match ResolverService::new(self.ctx)
                    .resolve_one_broadening(ObjectKind::PortGroup, name)
                    .await?
                {
                    Ok(portgroup) => portgroup,
                    Err(reason) => return Ok(Err(reason)),
                };
                match portgroup.properties.vlan_id {
                    Some(vlan) => {
                        let vlans = self.vlan_map().await?;
                        find_adapter_on_vlan(vm, &vlans, vlan)
                    }
                    None => None,
                }
            }
        };

        Ok(nic
            .map(|nic| DeviceChange {
                operation: DeviceOperation::Remove,
                file_operation: None,
                device: VirtualDevice::EthernetCard(nic.clone()),
            })
            .ok_or_else(|| {
                SkipReason::Resolution(format!("No network adapter on {} matches {:?}", vm.name, target))
            }))
    }

    async fn vlan_map(&self) -> VcliResult<HashMap<String, u32>> {
        let portgroups = ResolverService::new(self.ctx)
            .resolve(ObjectKind::PortGroup, &SelectionCriteria::all())
            .await?;
        Ok(portgroups
            .into_values()
            .filter_map(|pg| Some((pg.properties.portgroup_key?, pg.properties.vlan_id?)))
            .collect())
    }
}
