//! Informational intents: VM details and inventory listings.

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        event::MIGRATION_EVENT_TYPES,
        inventory_object::{InventoryObject, ObjectKind},
        report::{
            DiskRow, HostRow, ListTarget, Listing, NicRow, SnapshotRow, VmInfo, VmSummary,
        },
        selection::{SelectionCriteria, VmFilters},
    },
    inventory::application::service::{
        resolver_service::ResolverService, snapshot_service::SnapshotService,
        tag_service::TagService,
    },
};
use std::collections::HashMap;
use tracing::debug;

/// Port group key to name and VLAN.
type PortGroupIndex = HashMap<String, (String, Option<u32>)>;

pub struct ReportService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> ReportService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    /// Details of every VM matching `criteria`, including its migration history.
    pub async fn info(&self, criteria: &SelectionCriteria) -> VcliResult<Vec<VmInfo>> {
        let vms = ResolverService::new(self.ctx).resolve_vms(criteria).await?;
        if vms.is_empty() {
            return Ok(Vec::new());
        }
        let portgroups = self.portgroup_index().await?;
        let event_types: Vec<String> = MIGRATION_EVENT_TYPES.iter().map(|t| t.to_string()).collect();
        let snapshots = SnapshotService::new(self.ctx);

        let mut details = Vec::with_capacity(vms.len());
        for vm in vms.values() {
            let mut migrations = self
                .ctx
                .client()
                .fetch_events_for_entity(&vm.reference, &event_types)
                .await?;
            migrations.sort_by_key(|event| event.created_time);
            debug!(vm = %vm.name, events = migrations.len(), "migration history");

            details.push(VmInfo {
                summary: VmSummary::from(vm),
                snapshots: snapshots
                    .list(vm)
                    .iter()
                    .map(|node| SnapshotRow::new(vm, node))
                    .collect(),
                disks: vm.disks().map(|disk| DiskRow::new(vm, disk)).collect(),
                nics: nic_rows(vm, None, &portgroups),
                migrations,
            });
        }
        Ok(details)
    }

    /// Lists `target` objects matching `criteria`.
    pub async fn list(&self, target: &ListTarget, criteria: &SelectionCriteria) -> VcliResult<Listing> {
        let resolver = ResolverService::new(self.ctx);
        let listing = match target {
            ListTarget::Clusters => Listing::Clusters(
                self.rows(ObjectKind::Cluster, criteria).await?,
            ),
            ListTarget::Datacenters => Listing::Datacenters(
                self.rows(ObjectKind::Datacenter, criteria).await?,
            ),
            ListTarget::Datastores => Listing::Datastores(
                self.rows(ObjectKind::Datastore, criteria).await?,
            ),
            ListTarget::Hosts { cluster } => {
                let mut hosts: Vec<HostRow> = self.rows(ObjectKind::Host, criteria).await?;
                if let Some(cluster) = cluster {
                    let cluster = cluster.to_lowercase();
                    hosts.retain(|host| {
                        host.cluster
                            .as_deref()
                            .is_some_and(|name| name.to_lowercase().contains(&cluster))
                    });
                }
                Listing::Hosts(hosts)
            }
            ListTarget::Networks => Listing::Networks(
                self.rows(ObjectKind::Network, criteria).await?,
            ),
            ListTarget::ResourcePools => Listing::ResourcePools(
                self.rows(ObjectKind::ResourcePool, criteria).await?,
            ),
            ListTarget::Templates => {
                let templates = criteria.clone().with_filters(VmFilters {
                    template: Some(true),
                    ..criteria.filters.clone()
                });
                let vms = resolver.resolve_vms(&templates).await?;
                Listing::Templates(vms.values().map(VmSummary::from).collect())
            }
            ListTarget::Vms { max } => {
                let vms = resolver.resolve_vms(criteria).await?;
                Listing::Vms(
                    vms.values()
                        .take(max.unwrap_or(usize::MAX))
                        .map(VmSummary::from)
                        .collect(),
                )
            }
            ListTarget::VmDisks { disk } => {
                let vms = resolver.resolve_vms(criteria).await?;
                Listing::VmDisks(
                    vms.values()
                        .flat_map(|vm| {
                            vm.disks()
                                .filter(|d| disk.is_none() || d.index() == *disk)
                                .map(|d| DiskRow::new(vm, d))
                                .collect::<Vec<_>>()
                        })
                        .collect(),
                )
            }
            ListTarget::VmNics { adapter } => {
                let vms = resolver.resolve_vms(criteria).await?;
                let portgroups = self.portgroup_index().await?;
                Listing::VmNics(
                    vms.values()
                        .flat_map(|vm| nic_rows(vm, *adapter, &portgroups))
                        .collect(),
                )
            }
            ListTarget::VmSnapshots => {
                let vms = resolver.resolve_vms(criteria).await?;
                let snapshots = SnapshotService::new(self.ctx);
                Listing::VmSnapshots(
                    vms.values()
                        .flat_map(|vm| {
                            snapshots
                                .list(vm)
                                .iter()
                                .map(|node| SnapshotRow::new(vm, node))
                                .collect::<Vec<_>>()
                        })
                        .collect(),
                )
            }
            ListTarget::Tags {
                category,
                object_type,
            } => Listing::Tags(
                TagService::new(self.ctx)
                    .list_for_category(
                        criteria.tokens.as_deref(),
                        category.as_deref(),
                        object_type.as_deref(),
                    )
                    .await?,
            ),
            ListTarget::Categories { object_type } => Listing::Categories(
                TagService::new(self.ctx)
                    .list_categories(criteria.tokens.as_deref(), object_type.as_deref())
                    .await?,
            ),
            ListTarget::VmTags => {
                let vms = resolver.resolve_vms(criteria).await?;
                let tags = TagService::new(self.ctx);
                let catalog = tags.catalog().await?;
                let mut rows = Vec::with_capacity(vms.len());
                for vm in vms.values() {
                    rows.push((vm.name.clone(), tags.attached_tags(&catalog, &vm.reference).await?));
                }
                Listing::VmTags(rows)
            }
            ListTarget::TaggedObjects { tag, category } => Listing::TaggedObjects(
                TagService::new(self.ctx)
                    .tagged_objects(tag, category.as_deref())
                    .await?,
            ),
        };
        debug!(?target, rows = listing.len(), "listing");
        Ok(listing)
    }

    async fn rows<T>(&self, kind: ObjectKind, criteria: &SelectionCriteria) -> VcliResult<Vec<T>>
    where
        T: for<'o> From<&'o InventoryObject>,
    {
        let objects = ResolverService::new(self.ctx).resolve(kind, criteria).await?;
        Ok(objects.values().map(T::from).collect())
    }

    async fn portgroup_index(&self) -> VcliResult<PortGroupIndex> {
        let portgroups = ResolverService::new(self.ctx)
            .resolve(ObjectKind::PortGroup, &SelectionCriteria::all())
            .await?;
        Ok(portgroups
            .into_values()
            .filter_map(|pg| {
                let key = pg.properties.portgroup_key?;
                Some((key, (pg.name, pg.properties.vlan_id)))
            })
            .collect())
    }
}

fn nic_rows(vm: &InventoryObject, adapter: Option<u32>, portgroups: &PortGroupIndex) -> Vec<NicRow> {
    vm.nics()
        .filter(|nic| adapter.is_none() || nic.index() == adapter)
        .map(|nic| {
            let mut row = NicRow::new(vm, nic);
            if let Some((name, vlan)) = nic.portgroup_key().and_then(|key| portgroups.get(key)) {
                row.network = Some(name.clone());
                row.vlan = *vlan;
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            domain::model::{event::MigrationEvent, selection::MatchMode},
            infrastructure::inventory_client::MockInventoryClient,
        },
        tests::support::{context, network, vm, with_snapshots},
    };
    use chrono::{TimeZone, Utc};

    fn inventory_mock() -> MockInventoryClient {
        let mut mock = MockInventoryClient::new();
        mock.expect_list_objects().returning(|kind, _| {
            Ok(match kind {
                ObjectKind::VirtualMachine => vec![
                    with_snapshots(vm("vm-1", "web01", 2, 4096), &[1, 2]),
                    vm("vm-2", "web02", 2, 4096),
                    vm("vm-3", "db01", 4, 8192),
                ],
                ObjectKind::PortGroup => vec![network("dvportgroup-1", "VLAN100-App", 100)],
                _ => Vec::new(),
            })
        });
        mock
    }

    #[tokio::test]
    async fn test_info_collects_migrations_and_networks() {
        let mut mock = inventory_mock();
        mock.expect_fetch_events_for_entity()
            .withf(|reference, types| reference.value == "vm-1" && types.len() == 3)
            .times(1)
            .returning(|_, _| {
                Ok(vec![MigrationEvent {
                    event_type: "DrsVmMigratedEvent".to_string(),
                    created_time: Utc.with_ymd_and_hms(2024, 3, 2, 4, 0, 0).unwrap(),
                    user_name: String::new(),
                    source_host: Some("esx02.lab.local".to_string()),
                    host: Some("esx01.lab.local".to_string()),
                    source_datastore: None,
                    datastore: None,
                }])
            });
        let ctx = context(mock);

        let info = ReportService::new(&ctx)
            .info(&SelectionCriteria::named(["web01"], MatchMode::Exact))
            .await
            .unwrap();

        assert_eq!(info.len(), 1);
        let web01 = &info[0];
        assert_eq!(web01.snapshots.len(), 2);
        assert_eq!(web01.nics[0].network.as_deref(), Some("VLAN100-App"));
        assert_eq!(web01.nics[0].vlan, Some(100));
        assert_eq!(web01.migrations[0].initiator(), "DRS");
    }

    #[tokio::test]
    async fn test_list_vms_respects_max() {
        let ctx = context(inventory_mock());
        let listing = ReportService::new(&ctx)
            .list(&ListTarget::Vms { max: Some(2) }, &SelectionCriteria::all())
            .await
            .unwrap();
        match listing {
            Listing::Vms(rows) => {
                let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
                assert_eq!(names, vec!["db01", "web01"]);
            }
            other => panic!("unexpected listing {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_snapshots_and_disks() {
        let ctx = context(inventory_mock());
        let service = ReportService::new(&ctx);

        let snapshots = service
            .list(&ListTarget::VmSnapshots, &SelectionCriteria::all())
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 2);

        let disks = service
            .list(&ListTarget::VmDisks { disk: Some(2) }, &SelectionCriteria::all())
            .await
            .unwrap();
        assert!(disks.is_empty());
    }
}
