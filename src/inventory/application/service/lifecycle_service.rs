//! Power transitions, guest shutdown, cloning, destruction, migration and
//! attribute changes.

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        delta::{ComputeDelta, ComputeMode},
        inventory_object::{InventoryObject, ManagedObjectRef, ObjectKind, PowerState},
        lifecycle::{
            ChangeRequest, CloneOptions, MigrateTarget, OfflineChanges, PowerAction, ShutdownMode,
            TemplateChange,
        },
        operation::{CloneSpec, ConfigSpec, DiskLocator, OperationSpec, RelocateSpec},
        outcome::{ObjectOutcome, Outcome, SkipReason},
        selection::{MatchMode, SelectionCriteria, VmFilters},
    },
    inventory::application::service::{
        compute_service::ComputeService, resolver_service::ResolverService,
        tag_service::TagService,
    },
    task::application::service::task_supervisor::TaskSupervisor,
};
use chrono::Local;
use std::{collections::HashSet, time::Duration};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

/// The operation a power action maps to, if the VM's state allows it.
pub fn power_operation(action: PowerAction, state: Option<PowerState>) -> Option<OperationSpec> {
    match (action, state) {
        (PowerAction::On, Some(PowerState::PoweredOff)) => Some(OperationSpec::PowerOn),
        (PowerAction::Resume, Some(PowerState::Suspended)) => Some(OperationSpec::PowerOn),
        (PowerAction::Off, Some(PowerState::PoweredOn)) => Some(OperationSpec::PowerOff),
        (PowerAction::Suspend, Some(PowerState::PoweredOn)) => Some(OperationSpec::Suspend),
        (PowerAction::Reset, _) => Some(OperationSpec::Reset),
        _ => None,
    }
}

/// Name of the powered-off copy made by a backup, e.g. `web01.cloned.by.jdoe.20240301`.
pub fn backup_name(vm: &str, operator: &str, stamp: &str) -> String {
    format!("{}.cloned.by.{}.{}", vm, operator, stamp)
}

fn placement_pool(vm: &InventoryObject) -> Result<ManagedObjectRef, SkipReason> {
    vm.properties
        .host
        .as_ref()
        .and_then(|placement| placement.resource_pool.clone())
        .ok_or_else(|| {
            SkipReason::Resolution(format!("Cannot determine the resource pool of {}", vm.name))
        })
}

fn clone_config(options: &CloneOptions) -> Option<ConfigSpec> {
    let compute = options.cpu.is_some() || options.memory_mb.is_some();
    if !compute && options.annotation.is_none() {
        return None;
    }
    let base = if compute {
        ConfigSpec::hot_add()
    } else {
        ConfigSpec::default()
    };
    Some(ConfigSpec {
        num_cpus: options.cpu,
        memory_mb: options.memory_mb,
        annotation: options.annotation.clone(),
        ..base
    })
}

fn any_vm_named<I, S>(names: I) -> SelectionCriteria
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    SelectionCriteria::named(names, MatchMode::Exact).with_filters(VmFilters::any())
}

fn outcome_for(vm: &InventoryObject, action: &str, outcome: Outcome) -> ObjectOutcome {
    ObjectOutcome::new(&vm.name, Some(vm.reference.clone()), action, outcome)
}

pub struct LifecycleService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> LifecycleService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    /// Applies a power action when the VM's current state allows it.
    pub async fn power(&self, vm: &InventoryObject, action: PowerAction) -> VcliResult<Outcome> {
        let Some(operation) = power_operation(action, vm.properties.power_state) else {
            let state = vm
                .properties
                .power_state
                .map_or_else(|| "in an unknown power state".to_string(), |s| format!("powered {}", s));
            return Ok(Outcome::no_change(format!("{} is {}", vm.name, state)));
        };
        info!(vm = %vm.name, action = operation.name(), "Changing power state");
        self.run(&vm.reference, operation, self.ctx.config().wait.default)
            .await
    }

    /// Shuts the guest down, applies offline changes and, for a reboot, powers it on again.
    pub async fn shutdown(
        &self,
        vm: &InventoryObject,
        mode: ShutdownMode,
        changes: OfflineChanges,
    ) -> VcliResult<Vec<ObjectOutcome>> {
        let wait = &self.ctx.config().wait;
        if !vm.is_powered_on() {
            warn!(vm = %vm.name, "Shutdown skipped, VM is not powered on");
            return Ok(vec![outcome_for(
                vm,
                "shutdown",
                Outcome::no_change(format!("{} is not powered on", vm.name)),
            )]);
        }

        info!(vm = %vm.name, "Shutting down guest");
        let mut outcomes = vec![self.step(vm, OperationSpec::ShutdownGuest, wait.default).await?];
        if !outcomes[0].outcome.is_success() {
            return Ok(outcomes);
        }

        let powered_off = match self.wait_for_power_off(vm, wait.shutdown).await {
            Ok(powered_off) => powered_off,
            Err(error) => {
                outcomes.push(outcome_for(vm, "shutdown", Outcome::settle(Err(error))?));
                return Ok(outcomes);
            }
        };
        if !powered_off {
            warn!(vm = %vm.name, "Unable to shutdown VM");
            outcomes.push(outcome_for(
                vm,
                "shutdown",
                Outcome::precondition(format!(
                    "Unable to shutdown {} within {} seconds",
                    vm.name,
                    wait.shutdown.as_secs()
                )),
            ));
            return Ok(outcomes);
        }
        info!(vm = %vm.name, "VM shutdown successful");

        let mut steps = Vec::new();
        if changes.hot_add {
            steps.push(OperationSpec::Reconfigure(ConfigSpec::hot_add()));
        }
        if let Some(upgrade) = changes.upgrade {
            steps.push(OperationSpec::UpgradeVm {
                version: upgrade.version_key(),
            });
        }
        if mode == ShutdownMode::Reboot {
            steps.push(OperationSpec::PowerOn);
        }
        for operation in steps {
            let budget = if operation == OperationSpec::PowerOn {
                wait.shutdown
            } else {
                wait.default
            };
            let outcome = self.step(vm, operation, budget).await?;
            let failed = !outcome.outcome.is_success();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Destroys a VM that is not powered on.
    pub async fn destroy(&self, vm: &InventoryObject) -> VcliResult<Outcome> {
        if vm.is_powered_on() {
            warn!(vm = %vm.name, "Remove VM failed, VM is powered on");
            return Ok(Outcome::precondition(format!("{} is powered on", vm.name)));
        }
        info!(vm = %vm.name, "Destroying VM");
        self.run(&vm.reference, OperationSpec::Destroy, self.ctx.config().wait.default)
            .await
    }

    /// Clones `source` to each of `names` and powers the clones on.
    pub async fn clone_from(
        &self,
        source: &str,
        names: &[String],
        options: &CloneOptions,
    ) -> VcliResult<Vec<ObjectOutcome>> {
        let resolver = ResolverService::new(self.ctx);
        let source_vm = match resolver
            .resolve_exactly_one(ObjectKind::VirtualMachine, &any_vm_named([source]), source)
            .await?
        {
            Ok(vm) => vm,
            Err(reason) => {
                warn!(source, "{}", reason);
                return Ok(vec![ObjectOutcome::new(source, None, "clone", Outcome::Skipped(reason))]);
            }
        };

        let pool = match &options.cluster {
            Some(cluster) => resolver
                .resolve_one(ObjectKind::Cluster, cluster)
                .await?
                .and_then(|c| {
                    c.properties.resource_pool.clone().ok_or_else(|| {
                        SkipReason::Resolution(format!("Cluster {} has no resource pool", c.name))
                    })
                }),
            None => placement_pool(&source_vm),
        };
        let pool = match pool {
            Ok(pool) => pool,
            Err(reason) => {
                warn!(source, "{}", reason);
                return Ok(vec![outcome_for(&source_vm, "clone", Outcome::Skipped(reason))]);
            }
        };

        let existing = self.existing_names(names).await?;
        let config = clone_config(options);
        let mut outcomes = Vec::new();
        for name in names {
            if existing.contains(&name.to_lowercase()) {
                warn!(name = %name, "Cannot clone, VM exists");
                outcomes.push(ObjectOutcome::new(
                    name,
                    None,
                    "clone",
                    Outcome::no_change(format!("{} already exists", name)),
                ));
                continue;
            }
            outcomes.extend(
                self.clone_one(&source_vm, name, &pool, config.clone(), true, options.copy_tags)
                    .await?,
            );
        }
        Ok(outcomes)
    }

    /// Clones each VM to a dated, powered-off copy.
    pub async fn backup<'o, I>(&self, vms: I) -> VcliResult<Vec<ObjectOutcome>>
    where
        I: IntoIterator<Item = &'o InventoryObject>,
    {
        let stamp = Local::now().format("%Y%m%d").to_string();
        let operator = &self.ctx.config().operator;
        let mut outcomes = Vec::new();
        for vm in vms {
            let name = backup_name(&vm.name, operator, &stamp);
            let existing = match self.existing_names(std::slice::from_ref(&name)).await {
                Ok(existing) => existing,
                Err(error) => {
                    outcomes.push(outcome_for(vm, "backup", Outcome::settle(Err(error))?));
                    continue;
                }
            };
            if !existing.is_empty() {
                outcomes.push(outcome_for(
                    vm,
                    "backup",
                    Outcome::no_change(format!("{} already exists", name)),
                ));
                continue;
            }
            let pool = match placement_pool(vm) {
                Ok(pool) => pool,
                Err(reason) => {
                    outcomes.push(outcome_for(vm, "backup", Outcome::Skipped(reason)));
                    continue;
                }
            };
            outcomes.extend(self.clone_one(vm, &name, &pool, None, false, false).await?);
        }
        Ok(outcomes)
    }

    /// Relocates a VM to exactly one host and/or exactly one datastore.
    pub async fn migrate(&self, vm: &InventoryObject, target: &MigrateTarget) -> VcliResult<Outcome> {
        if target.host.is_none() && target.datastore.is_none() {
            return Ok(Outcome::precondition(
                "A destination host or datastore is required",
            ));
        }
        let resolver = ResolverService::new(self.ctx);
        let mut spec = RelocateSpec::default();

        if let Some(host) = &target.host {
            let host = match resolver.resolve_one(ObjectKind::Host, host).await? {
                Ok(host) => host,
                Err(reason) => return Ok(Outcome::Skipped(reason)),
            };
            info!(vm = %vm.name, "Migrating to host {}", host.name);
            spec.pool = host.properties.resource_pool.clone();
            spec.host = Some(host.reference);
        }

        if let Some(datastore) = &target.datastore {
            let datastore = match resolver.resolve_one(ObjectKind::Datastore, datastore).await? {
                Ok(datastore) => datastore,
                Err(reason) => return Ok(Outcome::Skipped(reason)),
            };
            info!(vm = %vm.name, thin = target.thin, "Migrating to datastore {}", datastore.name);
            if spec.pool.is_none() {
                spec.pool = placement_pool(vm).ok();
            }
            if target.thin {
                spec.disk = vm
                    .disks()
                    .map(|disk| DiskLocator {
                        disk_id: disk.key,
                        datastore: datastore.reference.clone(),
                        thin_provisioned: true,
                    })
                    .collect();
            }
            spec.datastore = Some(datastore.reference);
        }

        self.run(
            &vm.reference,
            OperationSpec::Relocate(spec),
            self.ctx.config().wait.relocate,
        )
        .await
    }

    /// Applies every requested attribute change; the rename comes last.
    pub async fn change(
        &self,
        vm: &InventoryObject,
        request: &ChangeRequest,
    ) -> VcliResult<Vec<ObjectOutcome>> {
        let default = self.ctx.config().wait.default;
        let mut outcomes = Vec::new();

        if let Some(delta) = request.compute {
            let delta = ComputeDelta {
                mode: ComputeMode::Set,
                ..delta
            };
            let outcome = Outcome::settle(ComputeService::new(self.ctx).apply(vm, &delta).await)?;
            outcomes.push(outcome_for(vm, "reconfigure", outcome));
        }

        if let Some(annotation) = &request.annotation {
            let spec = ConfigSpec {
                annotation: Some(annotation.clone()),
                ..Default::default()
            };
            outcomes.push(self.step(vm, OperationSpec::Reconfigure(spec), default).await?);
        }

        if request.hot_add {
            outcomes.push(if vm.is_powered_on() {
                outcome_for(
                    vm,
                    "reconfigure",
                    Outcome::precondition("Enabling hot-add requires the VM to be powered off"),
                )
            } else {
                self.step(vm, OperationSpec::Reconfigure(ConfigSpec::hot_add()), default)
                    .await?
            });
        }

        if let Some(upgrade) = request.upgrade {
            outcomes.push(if vm.is_powered_on() {
                outcome_for(
                    vm,
                    "upgrade",
                    Outcome::precondition("Upgrading hardware requires the VM to be powered off"),
                )
            } else {
                let operation = OperationSpec::UpgradeVm {
                    version: upgrade.version_key(),
                };
                self.step(vm, operation, default).await?
            });
        }

        if let Some(pool) = &request.resource_pool {
            let outcome = match ResolverService::new(self.ctx)
                .resolve_one(ObjectKind::ResourcePool, pool)
                .await
            {
                Err(error) => outcome_for(vm, "move", Outcome::settle(Err(error))?),
                Ok(Ok(pool)) => {
                    info!(vm = %vm.name, "Moving to resource pool {}", pool.name);
                    let operation = OperationSpec::MoveIntoPool {
                        pool: pool.reference,
                    };
                    self.step(vm, operation, default).await?
                }
                Ok(Err(reason)) => outcome_for(vm, "move", Outcome::Skipped(reason)),
            };
            outcomes.push(outcome);
        }

        if let Some(template) = request.template {
            outcomes.push(self.change_template(vm, template).await?);
        }

        if let Some(change) = &request.name {
            let new_name = change.apply(&vm.name);
            outcomes.push(if new_name == vm.name {
                outcome_for(vm, "rename", Outcome::no_change("Name is unchanged"))
            } else {
                info!(vm = %vm.name, "Renaming to {}", new_name);
                self.step(vm, OperationSpec::Rename { new_name }, default)
                    .await?
            });
        }

        if outcomes.is_empty() {
            outcomes.push(outcome_for(vm, "change", Outcome::no_change("Nothing to change")));
        }
        Ok(outcomes)
    }

    async fn change_template(
        &self,
        vm: &InventoryObject,
        change: TemplateChange,
    ) -> VcliResult<ObjectOutcome> {
        let default = self.ctx.config().wait.default;
        match change {
            TemplateChange::ToTemplate if vm.is_template() => Ok(outcome_for(
                vm,
                "mark-as-template",
                Outcome::no_change(format!("{} is already a template", vm.name)),
            )),
            TemplateChange::ToTemplate if vm.is_powered_on() => Ok(outcome_for(
                vm,
                "mark-as-template",
                Outcome::precondition(format!("{} is powered on", vm.name)),
            )),
            TemplateChange::ToTemplate => self.step(vm, OperationSpec::MarkAsTemplate, default).await,
            TemplateChange::ToVirtualMachine if !vm.is_template() => Ok(outcome_for(
                vm,
                "mark-as-vm",
                Outcome::no_change(format!("{} is not a template", vm.name)),
            )),
            TemplateChange::ToVirtualMachine => match placement_pool(vm) {
                Ok(pool) => {
                    let operation = OperationSpec::MarkAsVirtualMachine {
                        pool,
                        host: vm.properties.host.as_ref().map(|p| p.host.clone()),
                    };
                    self.step(vm, operation, default).await
                }
                Err(reason) => Ok(outcome_for(vm, "mark-as-vm", Outcome::Skipped(reason))),
            },
        }
    }

    async fn clone_one(
        &self,
        source: &InventoryObject,
        name: &str,
        pool: &ManagedObjectRef,
        config: Option<ConfigSpec>,
        power_on: bool,
        copy_tags: bool,
    ) -> VcliResult<Vec<ObjectOutcome>> {
        info!(source = %source.name, "Cloning {} to {}", source.name, name);
        let spec = CloneSpec {
            name: name.to_string(),
            location: RelocateSpec {
                pool: Some(pool.clone()),
                ..Default::default()
            },
            config,
            power_on: false,
            template: false,
        };
        let outcome = self
            .run(
                &source.reference,
                OperationSpec::Clone(spec),
                self.ctx.config().wait.clone,
            )
            .await?;
        let cloned = outcome.is_success();
        let mut outcomes = vec![ObjectOutcome::new(name, None, "clone", outcome)];
        if !cloned || !(power_on || copy_tags) {
            return Ok(outcomes);
        }

        // The clone only exists remotely; look it up again.
        let clone = match ResolverService::new(self.ctx)
            .resolve_exactly_one(ObjectKind::VirtualMachine, &any_vm_named([name]), name)
            .await
        {
            Ok(Ok(clone)) => clone,
            Ok(Err(reason)) => {
                warn!(name, "Cannot find clone: {}", reason);
                outcomes.push(ObjectOutcome::new(name, None, "power-on", Outcome::Skipped(reason)));
                return Ok(outcomes);
            }
            Err(error) => {
                let outcome = Outcome::settle(Err(error))?;
                outcomes.push(ObjectOutcome::new(name, None, "power-on", outcome));
                return Ok(outcomes);
            }
        };

        if copy_tags {
            match TagService::new(self.ctx).copy_tags(&source.reference, &clone).await {
                Ok(copied) => outcomes.extend(copied),
                Err(error) => {
                    let outcome = Outcome::settle(Err(error))?;
                    outcomes.push(outcome_for(&clone, "attach-tag", outcome));
                }
            }
        }
        if power_on {
            info!(vm = %clone.name, "Powering on cloned VM");
            outcomes.push(
                self.step(&clone, OperationSpec::PowerOn, self.ctx.config().wait.default)
                    .await?,
            );
        }
        Ok(outcomes)
    }

    /// Lowercased names among `names` that already exist, templates included.
    async fn existing_names(&self, names: &[String]) -> VcliResult<HashSet<String>> {
        let resolved = ResolverService::new(self.ctx)
            .resolve(ObjectKind::VirtualMachine, &any_vm_named(names))
            .await?;
        Ok(resolved.into_keys().map(|name| name.to_lowercase()).collect())
    }

    /// Re-reads the power state every poll interval until the VM is off or `budget` runs out.
    async fn wait_for_power_off(&self, vm: &InventoryObject, budget: Duration) -> VcliResult<bool> {
        let interval = self.ctx.config().poll_interval;
        let deadline = Instant::now() + budget;
        let properties = ObjectKind::VirtualMachine.property_set();
        loop {
            let current = self
                .ctx
                .client()
                .fetch_object(&vm.reference, &properties)
                .await?;
            if !current.is_powered_on() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(interval).await;
        }
    }

    async fn step(
        &self,
        vm: &InventoryObject,
        operation: OperationSpec,
        budget: Duration,
    ) -> VcliResult<ObjectOutcome> {
        let action = operation.name();
        let outcome = self.run(&vm.reference, operation, budget).await?;
        Ok(outcome_for(vm, action, outcome))
    }

    async fn run(
        &self,
        reference: &ManagedObjectRef,
        operation: OperationSpec,
        budget: Duration,
    ) -> VcliResult<Outcome> {
        let result = TaskSupervisor::new(self.ctx)
            .run(reference, operation, budget)
            .await;
        Outcome::settle(result.map(Outcome::Submitted))
    }
}
