//! Virtual disk creation, growth and removal.

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        delta::{DiskAction, DiskDelta, Provisioning},
        device::{
            DeviceInfo, DiskBacking, DiskMode, MAX_SCSI_UNITS, RESERVED_SCSI_UNIT, VirtualDevice,
            VirtualDisk,
        },
        inventory_object::InventoryObject,
        operation::{ConfigSpec, DeviceChange, DeviceOperation, FileOperation, OperationSpec},
        outcome::{Outcome, SkipReason},
    },
    task::application::service::task_supervisor::TaskSupervisor,
};
use tracing::{info, warn};

const KB_PER_GB: u64 = 1024 * 1024;

/// A validated device change plus what to report once it succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskPlan {
    pub change: DeviceChange,
    pub description: String,
    /// `bus:unit` of a newly created disk.
    pub locator: Option<String>,
}

/// Plans a new disk on the SCSI controller with bus number `bus`.
pub fn plan_new_disk(
    vm: &InventoryObject,
    bus: u32,
    size_gb: i64,
    provisioning: Provisioning,
    independent: bool,
) -> Result<DiskPlan, SkipReason> {
    let size_gb = u64::try_from(size_gb)
        .ok()
        .filter(|size| *size > 0)
        .ok_or_else(|| SkipReason::Precondition(format!("Invalid disk size {} GB", size_gb)))?;

    let controller = vm
        .scsi_controllers()
        .find(|c| c.bus_number == bus)
        .ok_or_else(|| SkipReason::Resolution(format!("Cannot find controller {}", bus)))?;

    let mut unit = vm
        .disks()
        .filter(|d| d.controller_key == controller.key)
        .map(|d| d.unit_number + 1)
        .max()
        .unwrap_or(0);
    if unit == RESERVED_SCSI_UNIT {
        unit += 1;
    }
    if unit >= MAX_SCSI_UNITS {
        return Err(SkipReason::Precondition(format!(
            "SCSI controller {} has no free unit left",
            bus
        )));
    }

    let disk = VirtualDisk {
        key: -1,
        device_info: DeviceInfo::new(format!("New hard disk {}:{}", bus, unit)),
        controller_key: controller.key,
        unit_number: unit,
        capacity_in_kb: size_gb * KB_PER_GB,
        backing: DiskBacking {
            file_name: String::new(),
            disk_mode: if independent {
                DiskMode::IndependentPersistent
            } else {
                DiskMode::Persistent
            },
            thin_provisioned: provisioning == Provisioning::Thin,
            eagerly_scrub: Some(independent),
            datastore: None,
        },
    };

    Ok(DiskPlan {
        change: DeviceChange {
            operation: DeviceOperation::Add,
            file_operation: Some(FileOperation::Create),
            device: VirtualDevice::Disk(disk),
        },
        description: format!("Adding {} GB disk to {}", size_gb, vm.name),
        locator: Some(format!("{}:{}", controller.bus_number, unit)),
    })
}

/// Picks `Hard disk N`, or the highest-numbered disk when `index` is `None`.
pub fn find_disk(vm: &InventoryObject, index: Option<u32>) -> Option<&VirtualDisk> {
    match index {
        Some(index) => vm.disks().find(|d| d.index() == Some(index)),
        None => vm.disks().max_by_key(|d| d.index().unwrap_or(0)),
    }
}

/// Plans growing an existing disk by `size_gb`. Shrinking is not supported.
pub fn plan_grow(
    vm: &InventoryObject,
    index: Option<u32>,
    size_gb: i64,
    allow_thick: bool,
) -> Result<DiskPlan, SkipReason> {
    if size_gb == 0 {
        return Err(SkipReason::NoChange(
            "Disk capacity is the same, no change needed".to_string(),
        ));
    }
    if size_gb < 0 {
        return Err(SkipReason::Precondition(
            "Reducing virtual disk size is not supported".to_string(),
        ));
    }

    let disk = find_disk(vm, index).ok_or_else(|| {
        SkipReason::Resolution(match index {
            Some(index) => format!("Hard disk {} not found on {}", index, vm.name),
            None => format!("{} has no disk", vm.name),
        })
    })?;

    if !disk.is_thin() && !allow_thick {
        return Err(SkipReason::Precondition(format!(
            "Cannot add storage to thick provisioned {}",
            disk.device_info.label
        )));
    }

    let grown = VirtualDisk {
        capacity_in_kb: disk.capacity_in_kb + size_gb.unsigned_abs() * KB_PER_GB,
        ..disk.clone()
    };
    let description = format!(
        "Extending {} to {} GB",
        disk.device_info.label,
        grown.capacity_gb()
    );

    Ok(DiskPlan {
        change: DeviceChange {
            operation: DeviceOperation::Edit,
            file_operation: None,
            device: VirtualDevice::Disk(grown),
        },
        description,
        locator: None,
    })
}

/// Plans detaching `Hard disk N`. The backing file is kept.
pub fn plan_remove_disk(vm: &InventoryObject, index: u32) -> Result<DiskPlan, SkipReason> {
    let disk = find_disk(vm, Some(index)).ok_or_else(|| {
        SkipReason::Resolution(format!("Hard disk {} not found on {}", index, vm.name))
    })?;
    Ok(DiskPlan {
        change: DeviceChange {
            operation: DeviceOperation::Remove,
            file_operation: None,
            device: VirtualDevice::Disk(disk.clone()),
        },
        description: format!("Removing {} from {}", disk.device_info.label, vm.name),
        locator: None,
    })
}

pub struct StorageService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> StorageService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    pub async fn apply(&self, vm: &InventoryObject, delta: &DiskDelta) -> VcliResult<Outcome> {
        let plan = match delta.action {
            DiskAction::AddNew { bus } => {
                plan_new_disk(vm, bus, delta.size_gb, delta.provisioning, delta.independent)
            }
            DiskAction::Grow { disk, allow_thick } => plan_grow(vm, disk, delta.size_gb, allow_thick),
            DiskAction::Remove { disk } => plan_remove_disk(vm, disk),
        };
        match plan {
            Ok(plan) => self.submit(vm, plan).await,
            Err(reason) => {
                warn!(vm = %vm.name, "{}", reason);
                Ok(Outcome::Skipped(reason))
            }
        }
    }

    async fn submit(&self, vm: &InventoryObject, plan: DiskPlan) -> VcliResult<Outcome> {
        info!(vm = %vm.name, "{}", plan.description);
        let spec = ConfigSpec {
            device_change: vec![plan.change],
            ..Default::default()
        };
        let mut report = TaskSupervisor::new(self.ctx)
            .run(
                &vm.reference,
                OperationSpec::Reconfigure(spec),
                self.ctx.config().wait.default,
            )
            .await?;
        if let Some(locator) = plan.locator {
            report = report.with_payload(locator);
        }
        Ok(Outcome::Submitted(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            domain::model::task::{TaskHandle, TaskInfo, TaskState},
            infrastructure::inventory_client::MockInventoryClient,
        },
        tests::support::{SCSI_KEY, context, disk, scsi_controller, vm},
    };

    fn grown_capacity(plan: &DiskPlan) -> u64 {
        match &plan.change.device {
            VirtualDevice::Disk(disk) => disk.capacity_gb(),
            other => panic!("unexpected device {:?}", other),
        }
    }

    #[test]
    fn test_grow_rules() {
        let object = vm("vm-1", "web01", 2, 4096);

        let shrink = plan_grow(&object, Some(1), -5, false);
        assert!(matches!(shrink, Err(SkipReason::Precondition(_))));

        let grow = plan_grow(&object, Some(1), 10, false).unwrap();
        assert_eq!(grown_capacity(&grow), 70);
        assert_eq!(grow.change.operation, DeviceOperation::Edit);

        let zero = plan_grow(&object, Some(1), 0, false);
        assert!(matches!(zero, Err(SkipReason::NoChange(_))));
    }

    #[test]
    fn test_thick_disk_needs_override() {
        let mut object = vm("vm-1", "web01", 2, 4096);
        object.properties.devices = Some(vec![scsi_controller(0, SCSI_KEY), disk(1, 0, 60, false)]);

        let refused = plan_grow(&object, None, 10, false);
        assert!(matches!(refused, Err(SkipReason::Precondition(_))));
        let allowed = plan_grow(&object, None, 10, true).unwrap();
        assert_eq!(grown_capacity(&allowed), 70);
    }

    #[test]
    fn test_grow_defaults_to_highest_disk() {
        let mut object = vm("vm-1", "web01", 2, 4096);
        object.properties.devices = Some(vec![
            scsi_controller(0, SCSI_KEY),
            disk(2, 1, 100, true),
            disk(1, 0, 60, true),
        ]);
        let plan = plan_grow(&object, None, 5, false).unwrap();
        assert_eq!(grown_capacity(&plan), 105);
        assert!(matches!(
            plan_grow(&object, Some(3), 5, false),
            Err(SkipReason::Resolution(_))
        ));
    }

    #[test]
    fn test_new_disk_unit_skips_reserved_slot() {
        let mut object = vm("vm-1", "web01", 2, 4096);
        let mut devices = vec![scsi_controller(0, SCSI_KEY)];
        devices.extend((0..7).map(|unit| disk(unit as u32 + 1, unit, 10, true)));
        object.properties.devices = Some(devices);

        let plan = plan_new_disk(&object, 0, 20, Provisioning::Thin, false).unwrap();
        assert_eq!(plan.locator.as_deref(), Some("0:8"));
        match &plan.change.device {
            VirtualDevice::Disk(disk) => {
                assert_eq!(disk.unit_number, 8);
                assert_eq!(disk.capacity_in_kb, 20 * 1024 * 1024);
                assert!(disk.backing.thin_provisioned);
                assert_eq!(disk.backing.disk_mode, DiskMode::Persistent);
            }
            other => panic!("unexpected device {:?}", other),
        }
        assert_eq!(plan.change.file_operation, Some(FileOperation::Create));
    }

    #[test]
    fn test_new_disk_rejects_full_bus_and_missing_controller() {
        let mut object = vm("vm-1", "web01", 2, 4096);
        object.properties.devices = Some(vec![scsi_controller(0, SCSI_KEY), disk(15, 15, 10, true)]);
        assert!(matches!(
            plan_new_disk(&object, 0, 20, Provisioning::Thin, false),
            Err(SkipReason::Precondition(_))
        ));
        assert!(matches!(
            plan_new_disk(&object, 1, 20, Provisioning::Thin, false),
            Err(SkipReason::Resolution(_))
        ));
    }

    #[test]
    fn test_independent_disk_mode() {
        let object = vm("vm-1", "web01", 2, 4096);
        let plan = plan_new_disk(&object, 0, 20, Provisioning::Thick, true).unwrap();
        assert_eq!(plan.locator.as_deref(), Some("0:1"));
        match &plan.change.device {
            VirtualDevice::Disk(disk) => {
                assert_eq!(disk.backing.disk_mode, DiskMode::IndependentPersistent);
                assert!(!disk.backing.thin_provisioned);
            }
            other => panic!("unexpected device {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_thin_grow_submits_one_reconfigure() {
        let mut mock = MockInventoryClient::new();
        mock.expect_submit_operation()
            .withf(|_, operation| {
                matches!(operation, OperationSpec::Reconfigure(spec) if spec.device_change.len() == 1)
            })
            .times(1)
            .returning(|_, _| Ok(TaskHandle::new("task-1")));
        mock.expect_poll_task()
            .returning(|_| Ok(TaskInfo::new(TaskState::Success)));
        let ctx = context(mock);

        let outcome = StorageService::new(&ctx)
            .apply(&vm("vm-1", "web01", 2, 4096), &DiskDelta::grow(Some(1), 10, false))
            .await
            .unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_disk_reports_locator() {
        let mut mock = MockInventoryClient::new();
        mock.expect_submit_operation()
            .times(1)
            .returning(|_, _| Ok(TaskHandle::new("task-1")));
        mock.expect_poll_task()
            .returning(|_| Ok(TaskInfo::new(TaskState::Success)));
        let ctx = context(mock);

        let outcome = StorageService::new(&ctx)
            .apply(
                &vm("vm-1", "web01", 2, 4096),
                &DiskDelta::add_new(0, 20, Provisioning::Thin, false),
            )
            .await
            .unwrap();
        assert_eq!(outcome.report().and_then(|r| r.payload.as_deref()), Some("0:1"));
    }
}
