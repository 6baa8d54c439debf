//! Turns selection criteria into concrete inventory objects.

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        inventory_object::{InventoryObject, ObjectKind},
        outcome::SkipReason,
        selection::{MatchMode, SelectionCriteria},
    },
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Resolved objects keyed by name.
///
/// Names are not unique in vCenter; a later object with the same name
/// replaces an earlier one.
pub type ResolvedObjects = BTreeMap<String, InventoryObject>;

pub struct ResolverService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> ResolverService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    /// Fetches every object of `kind` and keeps the ones matching `criteria`.
    ///
    /// VM attribute predicates only apply to [`ObjectKind::VirtualMachine`].
    /// Nothing matching is an empty map, not an error.
    pub async fn resolve(
        &self,
        kind: ObjectKind,
        criteria: &SelectionCriteria,
    ) -> VcliResult<ResolvedObjects> {
        let objects = self
            .ctx
            .client()
            .list_objects(kind, &kind.property_set())
            .await?;
        let fetched = objects.len();

        let mut resolved = ResolvedObjects::new();
        for object in objects {
            if !criteria.matches_name(&object) {
                continue;
            }
            if kind == ObjectKind::VirtualMachine && !criteria.filters.matches(&object) {
                continue;
            }
            if let Some(previous) = resolved.insert(object.name.clone(), object) {
                warn!(name = %previous.name, replaced = %previous.reference, "duplicate name, keeping the last object");
            }
        }

        debug!(%kind, fetched, matched = resolved.len(), "resolved");
        Ok(resolved)
    }

    pub async fn resolve_vms(&self, criteria: &SelectionCriteria) -> VcliResult<ResolvedObjects> {
        self.resolve(ObjectKind::VirtualMachine, criteria).await
    }

    /// Resolves `name` to exactly one object of `kind`, by exact name or identifier.
    ///
    /// Zero or several matches are reported as a [`SkipReason::Resolution`].
    pub async fn resolve_one(
        &self,
        kind: ObjectKind,
        name: &str,
    ) -> VcliResult<Result<InventoryObject, SkipReason>> {
        let criteria = SelectionCriteria::named([name], MatchMode::Exact);
        self.resolve_exactly_one(kind, &criteria, name).await
    }

    /// Resolves `criteria` and requires a single match; `label` names the
    /// target in the skip message.
    pub async fn resolve_exactly_one(
        &self,
        kind: ObjectKind,
        criteria: &SelectionCriteria,
        label: &str,
    ) -> VcliResult<Result<InventoryObject, SkipReason>> {
        let resolved = self.resolve(kind, criteria).await?;
        Ok(exactly_one(resolved, kind, label))
    }

    /// Like [`resolve_one`](Self::resolve_one), but retries as a substring
    /// match when no object has exactly that name.
    pub async fn resolve_one_broadening(
        &self,
        kind: ObjectKind,
        name: &str,
    ) -> VcliResult<Result<InventoryObject, SkipReason>> {
        let exact = SelectionCriteria::named([name], MatchMode::Exact);
        let mut resolved = self.resolve(kind, &exact).await?;
        if resolved.is_empty() {
            debug!(%kind, name, "no exact match, retrying with substring search");
            let broad = exact.with_match_mode(MatchMode::Substring);
            resolved = self.resolve(kind, &broad).await?;
        }
        Ok(exactly_one(resolved, kind, name))
    }
}

fn exactly_one(
    resolved: ResolvedObjects,
    kind: ObjectKind,
    name: &str,
) -> Result<InventoryObject, SkipReason> {
    match resolved.len() {
        1 => resolved
            .into_values()
            .next()
            .ok_or_else(|| SkipReason::Resolution(format!("{} {} not found", kind, name))),
        0 => Err(SkipReason::Resolution(format!("{} {} not found", kind, name))),
        n => Err(SkipReason::Resolution(format!(
            "Ambiguous {} name, found {} objects matching {}",
            kind, n, name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        VcliConfig,
        core::{
            domain::model::{inventory_object::PowerState, selection::VmFilters},
            infrastructure::inventory_client::MockInventoryClient,
        },
        tests::support::{network, vm},
    };
    use std::sync::Arc;

    fn inventory() -> Vec<InventoryObject> {
        let mut db = vm("vm-3", "db01", 4, 8192);
        db.properties.power_state = Some(PowerState::PoweredOff);
        vec![vm("vm-1", "web01", 2, 4096), vm("vm-2", "web02", 2, 4096), db]
    }

    fn context_with(objects: Vec<InventoryObject>) -> VcliContext {
        let mut mock = MockInventoryClient::new();
        mock.expect_list_objects()
            .returning(move |_, _| Ok(objects.clone()));
        VcliContext::new(Arc::new(mock), VcliConfig::default())
    }

    fn names(resolved: &ResolvedObjects) -> Vec<&str> {
        resolved.keys().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn test_substring_results_grow_with_tokens() {
        let ctx = context_with(inventory());
        let resolver = ResolverService::new(&ctx);

        let small = resolver
            .resolve_vms(&SelectionCriteria::named(["web01"], MatchMode::Substring))
            .await
            .unwrap();
        let large = resolver
            .resolve_vms(&SelectionCriteria::named(["web01", "db"], MatchMode::Substring))
            .await
            .unwrap();

        assert_eq!(names(&small), vec!["web01"]);
        assert_eq!(names(&large), vec!["db01", "web01"]);
        assert!(small.keys().all(|k| large.contains_key(k)));
    }

    #[tokio::test]
    async fn test_exact_by_name_or_identifier_is_same_singleton() {
        let ctx = context_with(inventory());
        let resolver = ResolverService::new(&ctx);

        let by_name = resolver
            .resolve_vms(&SelectionCriteria::named(["WEB02"], MatchMode::Exact))
            .await
            .unwrap();
        let by_id = resolver
            .resolve_vms(&SelectionCriteria::named(["vm-2"], MatchMode::Exact))
            .await
            .unwrap();

        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name, by_id);
    }

    #[tokio::test]
    async fn test_filters_apply_without_names() {
        let ctx = context_with(inventory());
        let filters = VmFilters {
            powered_on: Some(false),
            ..Default::default()
        };
        let resolved = ResolverService::new(&ctx)
            .resolve_vms(&SelectionCriteria::all().with_filters(filters))
            .await
            .unwrap();
        assert_eq!(names(&resolved), vec!["db01"]);
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let ctx = context_with(inventory());
        let resolved = ResolverService::new(&ctx)
            .resolve_vms(&SelectionCriteria::named(["nothing"], MatchMode::Exact))
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_one_broadens_then_checks_ambiguity() {
        let ctx = context_with(vec![
            network("dvportgroup-1", "VLAN100-App", 100),
            network("dvportgroup-2", "VLAN200-App", 200),
            network("dvportgroup-3", "VLAN300-Db", 300),
        ]);
        let resolver = ResolverService::new(&ctx);

        let single = resolver
            .resolve_one_broadening(ObjectKind::PortGroup, "vlan300")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(single.name, "VLAN300-Db");

        let ambiguous = resolver
            .resolve_one_broadening(ObjectKind::PortGroup, "app")
            .await
            .unwrap();
        assert!(matches!(ambiguous, Err(SkipReason::Resolution(_))));

        let exact_only = resolver
            .resolve_one(ObjectKind::PortGroup, "vlan300")
            .await
            .unwrap();
        assert!(exact_only.is_err());
    }
}
