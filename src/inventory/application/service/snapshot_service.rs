//! Snapshot lifecycle over a VM's first-child snapshot chain.

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        inventory_object::{InventoryObject, ManagedObjectRef},
        operation::OperationSpec,
        outcome::Outcome,
        snapshot::{SnapshotChain, SnapshotNode},
    },
    task::application::service::task_supervisor::TaskSupervisor,
};
use tracing::{info, warn};

pub struct SnapshotService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> SnapshotService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    /// The snapshot chain, oldest first. Sibling branches are not followed.
    pub fn list(&self, vm: &InventoryObject) -> SnapshotChain {
        let chain = vm.snapshot_chain();
        if chain.ignored_branches() > 0 {
            warn!(
                vm = %vm.name,
                ignored = chain.ignored_branches(),
                "Snapshot tree has branches, only the first child of each snapshot is shown"
            );
        }
        chain
    }

    pub fn find_by_id(&self, vm: &InventoryObject, id: i64) -> Option<SnapshotNode> {
        self.list(vm).find_by_id(id).cloned()
    }

    /// Takes a snapshot without memory or quiescing, recorded under the operator's name.
    pub async fn create(&self, vm: &InventoryObject, description: &str) -> VcliResult<Outcome> {
        info!(vm = %vm.name, "Creating snapshot");
        let operation = OperationSpec::CreateSnapshot {
            name: self.ctx.config().operator.clone(),
            description: description.to_string(),
            memory: false,
            quiesce: false,
        };
        self.run(&vm.reference, operation).await
    }

    pub async fn remove_all(&self, vm: &InventoryObject) -> VcliResult<Outcome> {
        if !vm.has_snapshots() {
            return Ok(Outcome::no_change(format!("{} has no snapshots", vm.name)));
        }
        info!(vm = %vm.name, "Removing all snapshots");
        self.run(&vm.reference, OperationSpec::RemoveAllSnapshots).await
    }

    /// Removes snapshot `id` and its children, or the whole history when `id` is absent.
    pub async fn remove_by_id(&self, vm: &InventoryObject, id: i64) -> VcliResult<Outcome> {
        match self.find_by_id(vm, id) {
            Some(node) => {
                info!(vm = %vm.name, snapshot = id, "Removing snapshot");
                let operation = OperationSpec::RemoveSnapshot {
                    remove_children: true,
                };
                self.run(&node.reference, operation).await
            }
            None => {
                warn!(vm = %vm.name, snapshot = id, "Snapshot not found, removing all snapshots");
                self.remove_all(vm).await
            }
        }
    }

    pub async fn revert_latest(&self, vm: &InventoryObject) -> VcliResult<Outcome> {
        if !vm.has_snapshots() {
            return Ok(Outcome::no_change(format!("{} has no snapshots", vm.name)));
        }
        info!(vm = %vm.name, "Reverting to current snapshot");
        self.run(&vm.reference, OperationSpec::RevertToCurrentSnapshot)
            .await
    }

    /// Reverts to snapshot `id`, or to the current snapshot when `id` is absent.
    pub async fn revert_by_id(&self, vm: &InventoryObject, id: i64) -> VcliResult<Outcome> {
        match self.find_by_id(vm, id) {
            Some(node) => {
                info!(vm = %vm.name, snapshot = id, "Reverting to snapshot");
                self.run(&node.reference, OperationSpec::RevertToSnapshot)
                    .await
            }
            None => {
                warn!(vm = %vm.name, snapshot = id, "Snapshot not found, reverting to current snapshot");
                self.revert_latest(vm).await
            }
        }
    }

    pub async fn consolidate(&self, vm: &InventoryObject) -> VcliResult<Outcome> {
        info!(vm = %vm.name, "Consolidating disks");
        self.run(&vm.reference, OperationSpec::ConsolidateDisks).await
    }

    async fn run(&self, reference: &ManagedObjectRef, operation: OperationSpec) -> VcliResult<Outcome> {
        let report = TaskSupervisor::new(self.ctx)
            .run(reference, operation, self.ctx.config().wait.default)
            .await?;
        Ok(Outcome::Submitted(report))
    }
}
