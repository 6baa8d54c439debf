//! CPU and memory reconfiguration.

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        delta::{ComputeDelta, ComputeMode},
        inventory_object::InventoryObject,
        operation::{ConfigSpec, OperationSpec},
        outcome::{Outcome, SkipReason},
    },
    task::application::service::task_supervisor::TaskSupervisor,
};
use tracing::{info, warn};

/// New CPU and memory allocation for a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputePlan {
    pub cpu: (u32, u32),
    pub memory_mb: (u64, u64),
}

impl ComputePlan {
    pub fn into_spec(self) -> ConfigSpec {
        ConfigSpec {
            num_cpus: (self.cpu.0 != self.cpu.1).then_some(self.cpu.1),
            memory_mb: (self.memory_mb.0 != self.memory_mb.1).then_some(self.memory_mb.1),
            ..ConfigSpec::hot_add()
        }
    }
}

/// Computes the new allocation, or why nothing should be submitted.
///
/// Reductions are refused while the VM is powered on, and so is removing at
/// least as much as is currently allocated.
pub fn plan_compute(vm: &InventoryObject, delta: &ComputeDelta) -> Result<ComputePlan, SkipReason> {
    let (cpu, memory) = vm.compute();
    let new_cpu = apply(u64::from(cpu), delta.cpu.map(u64::from), delta.mode, "vCPU")?;
    let new_memory = apply(memory, delta.memory_mb, delta.mode, "MB of memory")?;
    let new_cpu = u32::try_from(new_cpu)
        .map_err(|_| SkipReason::Precondition(format!("{} vCPUs is out of range", new_cpu)))?;

    if vm.is_powered_on() {
        if new_cpu < cpu {
            return Err(SkipReason::Precondition(format!(
                "Cannot reduce CPU from {} to {} while {} is powered on",
                cpu, new_cpu, vm.name
            )));
        }
        if new_memory < memory {
            return Err(SkipReason::Precondition(format!(
                "Cannot reduce memory from {} MB to {} MB while {} is powered on",
                memory, new_memory, vm.name
            )));
        }
    }

    if new_cpu == cpu && new_memory == memory {
        return Err(SkipReason::NoChange(
            "No CPU or memory change requested".to_string(),
        ));
    }

    Ok(ComputePlan {
        cpu: (cpu, new_cpu),
        memory_mb: (memory, new_memory),
    })
}

fn apply(current: u64, delta: Option<u64>, mode: ComputeMode, unit: &str) -> Result<u64, SkipReason> {
    let delta = delta.unwrap_or(0);
    match mode {
        ComputeMode::Set if delta > 0 => Ok(delta),
        ComputeMode::Set => Ok(current),
        ComputeMode::Add => current
            .checked_add(delta)
            .ok_or_else(|| SkipReason::Precondition(format!("Adding {} {} overflows", delta, unit))),
        ComputeMode::Remove if delta == 0 => Ok(current),
        ComputeMode::Remove if delta >= current => Err(SkipReason::Precondition(format!(
            "Cannot remove {} {} from {} allocated",
            delta, unit, current
        ))),
        ComputeMode::Remove => Ok(current - delta),
    }
}

pub struct ComputeService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> ComputeService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    /// Applies `delta` to `vm`; submits at most one reconfiguration.
    pub async fn apply(&self, vm: &InventoryObject, delta: &ComputeDelta) -> VcliResult<Outcome> {
        let plan = match plan_compute(vm, delta) {
            Ok(plan) => plan,
            Err(reason) => {
                warn!(vm = %vm.name, "{}", reason);
                return Ok(Outcome::Skipped(reason));
            }
        };

        info!(
            vm = %vm.name,
            "Changing compute resources, CPU: {} -> {}, memory: {} MB -> {} MB",
            plan.cpu.0, plan.cpu.1, plan.memory_mb.0, plan.memory_mb.1
        );
        let report = TaskSupervisor::new(self.ctx)
            .run(
                &vm.reference,
                OperationSpec::Reconfigure(plan.into_spec()),
                self.ctx.config().wait.default,
            )
            .await?;
        Ok(Outcome::Submitted(report))
    }
}
