//! Routes an [`Intent`] to the engines and collects per-object outcomes.

use crate::{
    VcliContext, VcliError, VcliResult,
    command::intent::{Intent, IntentResult, SnapshotAction, is_additive},
    core::domain::{
        error::ValidationError,
        model::{
            delta::ResourceDelta,
            inventory_object::InventoryObject,
            lifecycle::{PowerAction, TemplateChange},
            outcome::{ObjectOutcome, Outcome},
            selection::{MatchMode, SelectionCriteria},
        },
    },
    inventory::application::service::{
        compute_service::ComputeService,
        lifecycle_service::LifecycleService,
        network_service::NetworkService,
        report_service::ReportService,
        resolver_service::{ResolvedObjects, ResolverService},
        snapshot_service::SnapshotService,
        storage_service::StorageService,
        tag_service::TagService,
    },
};
use tracing::{debug, warn};

fn exact(criteria: SelectionCriteria) -> SelectionCriteria {
    criteria.with_match_mode(MatchMode::Exact)
}

fn power_action_name(action: PowerAction) -> &'static str {
    match action {
        PowerAction::On => "power-on",
        PowerAction::Resume => "resume",
        PowerAction::Off => "power-off",
        PowerAction::Suspend => "suspend",
        PowerAction::Reset => "reset",
    }
}

/// Turns a per-object error into a `Failed` outcome unless it must end the batch.
fn settle(vm: &InventoryObject, action: &str, result: VcliResult<Outcome>) -> VcliResult<ObjectOutcome> {
    let outcome = Outcome::settle(result)?;
    Ok(ObjectOutcome::new(&vm.name, Some(vm.reference.clone()), action, outcome))
}

pub struct Dispatcher<'a> {
    ctx: &'a VcliContext,
}

impl<'a> Dispatcher<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    /// Executes one intent.
    ///
    /// # Errors
    /// Only invocation-wide failures are returned as `Err`: transport and
    /// session errors, and a delta that does not fit the intent. Everything
    /// that concerns a single object is an [`ObjectOutcome`].
    pub async fn execute(&self, intent: Intent) -> VcliResult<IntentResult> {
        let lifecycle = LifecycleService::new(self.ctx);
        match intent {
            Intent::List { target, criteria } => {
                let listing = ReportService::new(self.ctx).list(&target, &criteria).await?;
                Ok(IntentResult::Listing(listing))
            }
            Intent::Info { criteria } => {
                let info = ReportService::new(self.ctx).info(&exact(criteria)).await?;
                Ok(IntentResult::Info(info))
            }
            Intent::Add { criteria, delta } => self.resource(criteria, delta, true).await,
            Intent::Remove { criteria, delta } => self.resource(criteria, delta, false).await,
            Intent::Change { criteria, request } => {
                let mut criteria = exact(criteria);
                if request.template == Some(TemplateChange::ToVirtualMachine) {
                    criteria.filters.template = Some(true);
                }
                let vms = self.resolve(&criteria).await?;
                let mut outcomes = Vec::new();
                for vm in vms.values() {
                    outcomes.extend(lifecycle.change(vm, &request).await?);
                }
                Ok(IntentResult::Outcomes(outcomes))
            }
            Intent::Clone {
                source,
                names,
                options,
            } => {
                let outcomes = lifecycle.clone_from(&source, &names, &options).await?;
                Ok(IntentResult::Outcomes(outcomes))
            }
            Intent::Backup { criteria } => {
                let vms = self.resolve(&criteria).await?;
                Ok(IntentResult::Outcomes(lifecycle.backup(vms.values()).await?))
            }
            Intent::Destroy { criteria } => {
                let vms = self.resolve(&exact(criteria)).await?;
                let mut outcomes = Vec::with_capacity(vms.len());
                for vm in vms.values() {
                    outcomes.push(settle(vm, "destroy", lifecycle.destroy(vm).await)?);
                }
                Ok(IntentResult::Outcomes(outcomes))
            }
            Intent::Migrate { criteria, target } => {
                let vms = self.resolve(&exact(criteria)).await?;
                let mut outcomes = Vec::with_capacity(vms.len());
                for vm in vms.values() {
                    outcomes.push(settle(vm, "migrate", lifecycle.migrate(vm, &target).await)?);
                }
                Ok(IntentResult::Outcomes(outcomes))
            }
            Intent::Power { criteria, action } => {
                let vms = self.resolve(&exact(criteria)).await?;
                let name = power_action_name(action);
                let mut outcomes = Vec::with_capacity(vms.len());
                for vm in vms.values() {
                    outcomes.push(settle(vm, name, lifecycle.power(vm, action).await)?);
                }
                Ok(IntentResult::Outcomes(outcomes))
            }
            Intent::Shutdown {
                criteria,
                mode,
                changes,
            } => {
                let vms = self.resolve(&exact(criteria)).await?;
                let mut outcomes = Vec::new();
                for vm in vms.values() {
                    outcomes.extend(lifecycle.shutdown(vm, mode, changes).await?);
                }
                Ok(IntentResult::Outcomes(outcomes))
            }
            Intent::Snapshot { criteria, action } => self.snapshot(criteria, action).await,
        }
    }

    async fn resource(
        &self,
        criteria: SelectionCriteria,
        delta: ResourceDelta,
        adding: bool,
    ) -> VcliResult<IntentResult> {
        if is_additive(&delta) != Some(adding) {
            let intent = if adding { "add" } else { "remove" };
            return Err(VcliError::from(ValidationError::ConstraintViolation(format!(
                "{:?} cannot be applied by the {} intent",
                delta, intent
            ))));
        }

        let vms = self.resolve(&exact(criteria)).await?;
        let mut outcomes = Vec::with_capacity(vms.len());
        match &delta {
            ResourceDelta::Tag(tags) => {
                outcomes = TagService::new(self.ctx).apply(vms.values(), tags).await?;
            }
            ResourceDelta::Compute(compute) => {
                let service = ComputeService::new(self.ctx);
                for vm in vms.values() {
                    outcomes.push(settle(vm, "compute", service.apply(vm, compute).await)?);
                }
            }
            ResourceDelta::Disk(disk) => {
                let service = StorageService::new(self.ctx);
                for vm in vms.values() {
                    outcomes.push(settle(vm, "disk", service.apply(vm, disk).await)?);
                }
            }
            ResourceDelta::Nic(nic) => {
                let service = NetworkService::new(self.ctx);
                for vm in vms.values() {
                    outcomes.push(settle(vm, "nic", service.apply(vm, nic).await)?);
                }
            }
        }
        Ok(IntentResult::Outcomes(outcomes))
    }

    async fn snapshot(
        &self,
        criteria: SelectionCriteria,
        action: SnapshotAction,
    ) -> VcliResult<IntentResult> {
        let criteria = match action {
            SnapshotAction::Create { .. } => criteria,
            SnapshotAction::Remove { .. } | SnapshotAction::Revert { .. } => {
                let mut criteria = exact(criteria);
                criteria.filters.has_snapshot = Some(true);
                criteria
            }
            SnapshotAction::Consolidate => {
                let mut criteria = criteria;
                criteria.filters.consolidation_needed = Some(true);
                criteria
            }
        };

        let vms = self.resolve(&criteria).await?;
        let service = SnapshotService::new(self.ctx);
        let name = action.name();
        let mut outcomes = Vec::with_capacity(vms.len());
        for vm in vms.values() {
            let result = match &action {
                SnapshotAction::Create { description } => service.create(vm, description).await,
                SnapshotAction::Remove { id: Some(id) } => service.remove_by_id(vm, *id).await,
                SnapshotAction::Remove { id: None } => service.remove_all(vm).await,
                SnapshotAction::Revert { id: Some(id) } => service.revert_by_id(vm, *id).await,
                SnapshotAction::Revert { id: None } => service.revert_latest(vm).await,
                SnapshotAction::Consolidate => service.consolidate(vm).await,
            };
            outcomes.push(settle(vm, name, result)?);
        }
        Ok(IntentResult::Outcomes(outcomes))
    }

    async fn resolve(&self, criteria: &SelectionCriteria) -> VcliResult<ResolvedObjects> {
        let vms = ResolverService::new(self.ctx).resolve_vms(criteria).await?;
        if vms.is_empty() {
            warn!(tokens = ?criteria.tokens, "No virtual machine matched");
        } else {
            debug!(count = vms.len(), "virtual machines selected");
        }
        Ok(vms)
    }
}
