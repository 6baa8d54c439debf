//! Tag resolution and association.
//!
//! A single-cardinality category allows one of its tags per object. The
//! remote store does not enforce that, so attaching a tag first detaches any
//! other tag of the same category.

use crate::{
    VcliContext, VcliError, VcliResult,
    core::domain::model::{
        delta::{TagDelta, TagMode},
        inventory_object::{InventoryObject, ManagedObjectRef},
        outcome::{ObjectOutcome, Outcome},
        tag::{Category, DynamicId, ResolvedTag, Tag, category_matches},
    },
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Outcome of resolving tag tokens against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagResolution {
    /// Keyed by `hint.tag` when a category hint was given, else by tag name.
    pub resolved: BTreeMap<String, ResolvedTag>,
    /// Keys that matched more than one tag.
    pub ambiguous: BTreeSet<String>,
    /// Tokens that matched no tag at all.
    pub missing: Vec<String>,
}

/// Every category and tag known to the tagging service.
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    categories: HashMap<String, Category>,
    tags: Vec<Tag>,
}

impl TagCatalog {
    pub fn new(categories: Vec<Category>, tags: Vec<Tag>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(|category| (category.id.clone(), category))
                .collect(),
            tags,
        }
    }

    /// Tags whose category is known.
    pub fn iter(&self) -> impl Iterator<Item = ResolvedTag> + '_ {
        self.tags.iter().filter_map(|tag| {
            self.categories.get(&tag.category_id).map(|category| ResolvedTag {
                tag: tag.clone(),
                category: category.clone(),
            })
        })
    }

    pub fn by_id(&self, tag_id: &str) -> Option<ResolvedTag> {
        self.iter().find(|resolved| resolved.tag.id == tag_id)
    }

    /// Matches `tokens` against tag names, case-insensitively, optionally
    /// narrowed to categories matching `hint`.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S], hint: Option<&str>) -> TagResolution {
        let wanted: Vec<String> = tokens.iter().map(|t| t.as_ref().to_lowercase()).collect();
        let mut resolution = TagResolution::default();
        let mut seen = BTreeSet::new();

        for candidate in self.iter() {
            let name = candidate.tag.name.to_lowercase();
            if !wanted.contains(&name) {
                continue;
            }
            if let Some(hint) = hint
                && !category_matches(&candidate.category.name, hint)
            {
                continue;
            }
            seen.insert(name.clone());

            let key = match hint {
                Some(hint) => format!("{}.{}", hint.to_lowercase(), name),
                None => name,
            };
            if resolution.ambiguous.contains(&key) {
                continue;
            }
            if resolution.resolved.remove(&key).is_some() {
                resolution.ambiguous.insert(key);
            } else {
                resolution.resolved.insert(key, candidate);
            }
        }

        resolution.missing = wanted.into_iter().filter(|t| !seen.contains(t)).collect();
        resolution
    }
}

pub struct TagService<'a> {
    ctx: &'a VcliContext,
}

impl<'a> TagService<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    pub async fn catalog(&self) -> VcliResult<TagCatalog> {
        let categories = self.ctx.client().list_categories().await?;
        let tags = self.ctx.client().list_tags().await?;
        debug!(categories = categories.len(), tags = tags.len(), "tag catalog loaded");
        Ok(TagCatalog::new(categories, tags))
    }

    /// Tags filtered by name substring, category (either direction) and associable type.
    pub async fn list_for_category(
        &self,
        tokens: Option<&[String]>,
        category: Option<&str>,
        object_type: Option<&str>,
    ) -> VcliResult<Vec<ResolvedTag>> {
        let catalog = self.catalog().await?;
        let mut tags: Vec<ResolvedTag> = catalog
            .iter()
            .filter(|t| matches_any(&t.tag.name, tokens))
            .filter(|t| category.is_none_or(|hint| category_matches(&t.category.name, hint)))
            .filter(|t| object_type.is_none_or(|kind| t.applies_to(kind)))
            .collect();
        tags.sort_by(|a, b| a.qualified_name().cmp(&b.qualified_name()));
        Ok(tags)
    }

    pub async fn list_categories(
        &self,
        tokens: Option<&[String]>,
        object_type: Option<&str>,
    ) -> VcliResult<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .ctx
            .client()
            .list_categories()
            .await?
            .into_iter()
            .filter(|c| matches_any(&c.name, tokens))
            .filter(|c| {
                object_type.is_none_or(|kind| {
                    c.associable_types.is_empty()
                        || c.associable_types.iter().any(|t| t.eq_ignore_ascii_case(kind))
                })
            })
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    /// Objects carrying any tag named `name`, optionally narrowed by category.
    pub async fn tagged_objects(
        &self,
        name: &str,
        category: Option<&str>,
    ) -> VcliResult<Vec<DynamicId>> {
        let resolution = self.catalog().await?.resolve(&[name], category);
        if resolution.resolved.is_empty() {
            warn!(tag = name, "Tag not found or ambiguous");
        }
        let mut objects = Vec::new();
        for tag in resolution.resolved.values() {
            objects.extend(self.ctx.client().list_attached_objects(&tag.tag.id).await?);
        }
        Ok(objects)
    }

    /// Attaches or detaches the tags of `delta` on every object.
    ///
    /// Attach tokens are resolved once against the whole catalog. Detach
    /// tokens are resolved per object against the tags it carries, so a name
    /// is only ambiguous when two attached tags share it.
    pub async fn apply<'o, I>(&self, objects: I, delta: &TagDelta) -> VcliResult<Vec<ObjectOutcome>>
    where
        I: IntoIterator<Item = &'o InventoryObject>,
    {
        let catalog = self.catalog().await?;
        let hint = delta.category.as_deref();
        let resolution = catalog.resolve(&delta.tags, hint);
        for token in &resolution.missing {
            warn!(tag = %token, "Tag not found");
        }
        if delta.mode == TagMode::Attach {
            for key in &resolution.ambiguous {
                warn!(tag = %key, "Ambiguous tag name, specify a category; skipping");
            }
        }

        let mut outcomes = Vec::new();
        for object in objects {
            let action = match delta.mode {
                TagMode::Attach => "attach-tag",
                TagMode::Detach => "detach-tag",
            };
            for token in &resolution.missing {
                outcomes.push(outcome_for(
                    object,
                    action,
                    Outcome::resolution(format!("Tag {} not found", token)),
                ));
            }
            match delta.mode {
                TagMode::Attach => {
                    for key in &resolution.ambiguous {
                        outcomes.push(outcome_for(
                            object,
                            action,
                            Outcome::resolution(format!("Tag {} is ambiguous", key)),
                        ));
                    }
                    for tag in resolution.resolved.values() {
                        let outcome = self.attach(&catalog, object, tag).await?;
                        outcomes.push(outcome_for(object, action, outcome));
                    }
                }
                TagMode::Detach => {
                    let tokens: Vec<&String> = delta
                        .tags
                        .iter()
                        .filter(|t| !resolution.missing.contains(&t.to_lowercase()))
                        .collect();
                    outcomes.extend(self.detach_matching(&catalog, object, &tokens, hint).await?);
                }
            }
        }
        Ok(outcomes)
    }

    /// Attaches `tag`, first detaching a different tag of the same single-cardinality category.
    pub async fn attach(
        &self,
        catalog: &TagCatalog,
        object: &InventoryObject,
        tag: &ResolvedTag,
    ) -> VcliResult<Outcome> {
        if tag.is_exclusive() {
            let attached = match self.attached_tags(catalog, &object.reference).await {
                Ok(attached) => attached,
                Err(error) => return rejected(error),
            };
            if let Some(rival) = attached
                .iter()
                .find(|t| t.category.id == tag.category.id && t.tag.id != tag.tag.id)
            {
                info!(
                    object = %object.name,
                    "Detaching {} before attaching {}",
                    rival.qualified_name(),
                    tag.qualified_name()
                );
                if let Err(error) = self
                    .ctx
                    .client()
                    .detach_tag(&rival.tag.id, &object.reference)
                    .await
                {
                    return rejected(error);
                }
            }
        }

        info!(object = %object.name, "Attaching tag {}", tag.qualified_name());
        match self.ctx.client().attach_tag(&tag.tag.id, &object.reference).await {
            Ok(()) => Ok(Outcome::Applied(format!("Attached {}", tag.qualified_name()))),
            Err(error) => rejected(error),
        }
    }

    /// Detaches the tags among `tokens` that `object` carries.
    async fn detach_matching(
        &self,
        catalog: &TagCatalog,
        object: &InventoryObject,
        tokens: &[&String],
        hint: Option<&str>,
    ) -> VcliResult<Vec<ObjectOutcome>> {
        let action = "detach-tag";
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let attached = match self.attached_tags(catalog, &object.reference).await {
            Ok(attached) => attached,
            Err(error) => return Ok(vec![outcome_for(object, action, rejected(error)?)]),
        };
        let carried = TagCatalog::new(
            attached.iter().map(|t| t.category.clone()).collect(),
            attached.into_iter().map(|t| t.tag).collect(),
        );
        let resolution = carried.resolve(tokens, hint);

        let mut outcomes = Vec::new();
        for key in &resolution.ambiguous {
            warn!(object = %object.name, tag = %key, "Ambiguous tag name, specify a category; skipping");
            outcomes.push(outcome_for(
                object,
                action,
                Outcome::resolution(format!("Tag {} is ambiguous", key)),
            ));
        }
        for token in &resolution.missing {
            outcomes.push(outcome_for(
                object,
                action,
                Outcome::no_change(format!("{} is not tagged {}", object.name, token)),
            ));
        }
        for tag in resolution.resolved.values() {
            let outcome = self.detach(object, tag).await?;
            outcomes.push(outcome_for(object, action, outcome));
        }
        Ok(outcomes)
    }

    /// Detaches `tag`, which `object` is known to carry.
    pub async fn detach(&self, object: &InventoryObject, tag: &ResolvedTag) -> VcliResult<Outcome> {
        info!(object = %object.name, "Detaching tag {}", tag.qualified_name());
        match self.ctx.client().detach_tag(&tag.tag.id, &object.reference).await {
            Ok(()) => Ok(Outcome::Applied(format!("Detached {}", tag.qualified_name()))),
            Err(error) => rejected(error),
        }
    }

    /// Attaches every tag of `source` to `target`.
    pub async fn copy_tags(
        &self,
        source: &ManagedObjectRef,
        target: &InventoryObject,
    ) -> VcliResult<Vec<ObjectOutcome>> {
        let catalog = self.catalog().await?;
        let mut outcomes = Vec::new();
        for tag in self.attached_tags(&catalog, source).await? {
            let outcome = self.attach(&catalog, target, &tag).await?;
            outcomes.push(outcome_for(target, "attach-tag", outcome));
        }
        Ok(outcomes)
    }

    /// Tags attached to `reference`, looked up in `catalog`.
    pub async fn attached_tags(
        &self,
        catalog: &TagCatalog,
        reference: &ManagedObjectRef,
    ) -> VcliResult<Vec<ResolvedTag>> {
        let ids = self.ctx.client().list_attached_tags(reference).await?;
        Ok(ids.iter().filter_map(|id| catalog.by_id(id)).collect())
    }
}

fn matches_any(name: &str, tokens: Option<&[String]>) -> bool {
    let name = name.to_lowercase();
    tokens.is_none_or(|tokens| tokens.iter().any(|t| name.contains(&t.to_lowercase())))
}

fn outcome_for(object: &InventoryObject, action: &str, outcome: Outcome) -> ObjectOutcome {
    ObjectOutcome::new(&object.name, Some(object.reference.clone()), action, outcome)
}

fn rejected(error: VcliError) -> VcliResult<Outcome> {
    Outcome::settle(Err(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            domain::model::{outcome::SkipReason, tag::Cardinality},
            infrastructure::inventory_client::MockInventoryClient,
        },
        tests::support::{context, vm},
    };
    use mockall::Sequence;

    fn category(id: &str, name: &str, cardinality: Cardinality) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            cardinality,
            associable_types: vec!["VirtualMachine".to_string()],
        }
    }

    fn tag(id: &str, name: &str, category_id: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            category_id: category_id.to_string(),
        }
    }

    fn catalog_mock() -> MockInventoryClient {
        let mut mock = MockInventoryClient::new();
        mock.expect_list_categories().returning(|| {
            Ok(vec![
                category("cat-backup", "Backup", Cardinality::Single),
                category("cat-owner", "Owner", Cardinality::Multiple),
                category("cat-legacy", "Legacy", Cardinality::Multiple),
            ])
        });
        mock.expect_list_tags().returning(|| {
            Ok(vec![
                tag("tag-p1", "policy1", "cat-backup"),
                tag("tag-p2", "policy2", "cat-backup"),
                tag("tag-ops", "ops", "cat-owner"),
                tag("tag-ops-old", "ops", "cat-legacy"),
            ])
        });
        mock
    }

    fn delta(mode: TagMode, tags: &[&str], category: Option<&str>) -> TagDelta {
        TagDelta {
            mode,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn test_resolve_keys_and_ambiguity() {
        let catalog = TagCatalog::new(
            vec![
                category("cat-owner", "Owner", Cardinality::Multiple),
                category("cat-legacy", "Legacy", Cardinality::Multiple),
            ],
            vec![tag("tag-ops", "ops", "cat-owner"), tag("tag-ops-old", "ops", "cat-legacy")],
        );

        let bare = catalog.resolve(&["OPS"], None);
        assert!(bare.resolved.is_empty());
        assert!(bare.ambiguous.contains("ops"));

        let hinted = catalog.resolve(&["ops", "nothing"], Some("own"));
        assert_eq!(hinted.resolved["own.ops"].tag.id, "tag-ops");
        assert_eq!(hinted.missing, vec!["nothing".to_string()]);
    }

    #[tokio::test]
    async fn test_highlander_detaches_then_attaches() {
        let mut mock = catalog_mock();
        let mut seq = Sequence::new();
        mock.expect_list_attached_tags()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec!["tag-p1".to_string()]));
        mock.expect_detach_tag()
            .withf(|tag_id, _| tag_id == "tag-p1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_attach_tag()
            .withf(|tag_id, _| tag_id == "tag-p2")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let ctx = context(mock);

        let object = vm("vm-1", "web01", 2, 4096);
        let outcomes = TagService::new(&ctx)
            .apply([&object], &delta(TagMode::Attach, &["policy2"], Some("backup")))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].outcome.is_success());
    }

    #[tokio::test]
    async fn test_same_tag_is_reattached_without_detach() {
        let mut mock = catalog_mock();
        mock.expect_list_attached_tags()
            .returning(|_| Ok(vec!["tag-p2".to_string()]));
        mock.expect_detach_tag().never();
        mock.expect_attach_tag().times(1).returning(|_, _| Ok(()));
        let ctx = context(mock);

        let object = vm("vm-1", "web01", 2, 4096);
        let outcomes = TagService::new(&ctx)
            .apply([&object], &delta(TagMode::Attach, &["policy2"], None))
            .await
            .unwrap();
        assert!(outcomes[0].outcome.is_success());
    }

    #[tokio::test]
    async fn test_detach_is_ambiguous_only_among_attached_tags() {
        let mut mock = catalog_mock();
        mock.expect_list_attached_tags()
            .returning(|_| Ok(vec!["tag-ops".to_string(), "tag-ops-old".to_string()]));
        mock.expect_detach_tag().never();
        let ctx = context(mock);

        let object = vm("vm-1", "web01", 2, 4096);
        let outcomes = TagService::new(&ctx)
            .apply([&object], &delta(TagMode::Detach, &["ops"], None))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0].outcome.skip_reason(),
            Some(SkipReason::Resolution(_))
        ));
    }

    #[tokio::test]
    async fn test_detach_shared_name_carried_once() {
        let mut mock = catalog_mock();
        mock.expect_list_attached_tags()
            .returning(|_| Ok(vec!["tag-ops".to_string()]));
        mock.expect_detach_tag()
            .withf(|tag_id, reference| tag_id == "tag-ops" && reference.value == "vm-1")
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = context(mock);

        let object = vm("vm-1", "web01", 2, 4096);
        let outcomes = TagService::new(&ctx)
            .apply([&object], &delta(TagMode::Detach, &["ops"], None))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].outcome, Outcome::Applied(_)));
    }

    #[tokio::test]
    async fn test_vanished_object_does_not_stop_tagging() {
        let mut mock = catalog_mock();
        mock.expect_list_attached_tags().returning(|reference| {
            if reference.value == "vm-1" {
                Err(VcliError::NotFound("vm-1".to_string()))
            } else {
                Ok(Vec::new())
            }
        });
        mock.expect_attach_tag()
            .withf(|tag_id, reference| tag_id == "tag-p1" && reference.value == "vm-2")
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = context(mock);

        let web01 = vm("vm-1", "web01", 2, 4096);
        let web02 = vm("vm-2", "web02", 2, 4096);
        let outcomes = TagService::new(&ctx)
            .apply([&web01, &web02], &delta(TagMode::Attach, &["policy1"], None))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].outcome, Outcome::Failed(_)));
        assert_eq!(outcomes[1].object, "web02");
        assert!(outcomes[1].outcome.is_success());
    }

    #[tokio::test]
    async fn test_fatal_error_while_tagging_is_raised() {
        let mut mock = catalog_mock();
        mock.expect_list_attached_tags()
            .returning(|_| Err(VcliError::Connection("connection reset".to_string())));
        mock.expect_detach_tag().never();
        let ctx = context(mock);

        let object = vm("vm-1", "web01", 2, 4096);
        let result = TagService::new(&ctx)
            .apply([&object], &delta(TagMode::Detach, &["ops"], Some("owner")))
            .await;
        assert!(matches!(result, Err(VcliError::Connection(_))));
    }

    #[tokio::test]
    async fn test_detach_only_attached_tags() {
        let mut mock = catalog_mock();
        mock.expect_list_attached_tags()
            .returning(|_| Ok(vec!["tag-ops".to_string()]));
        mock.expect_detach_tag()
            .withf(|tag_id, _| tag_id == "tag-ops")
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = context(mock);

        let web = vm("vm-1", "web01", 2, 4096);
        let outcomes = TagService::new(&ctx)
            .apply([&web], &delta(TagMode::Detach, &["ops", "policy1"], Some("o")))
            .await
            .unwrap();

        let applied: Vec<_> = outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Applied(_)))
            .collect();
        assert_eq!(applied.len(), 1);
        assert!(outcomes.iter().any(|o| matches!(
            o.outcome.skip_reason(),
            Some(SkipReason::NoChange(_)) | Some(SkipReason::Resolution(_))
        )));
    }

    #[tokio::test]
    async fn test_rejected_attach_is_reported_not_raised() {
        let mut mock = catalog_mock();
        mock.expect_attach_tag().returning(|_, _| {
            Err(VcliError::Api {
                status: 400,
                message: "not associable".to_string(),
            })
        });
        let ctx = context(mock);

        let object = vm("vm-1", "web01", 2, 4096);
        let outcomes = TagService::new(&ctx)
            .apply([&object], &delta(TagMode::Attach, &["ops"], Some("owner")))
            .await
            .unwrap();
        assert!(matches!(outcomes[0].outcome, Outcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_tagged_objects_by_hinted_name() {
        let mut mock = catalog_mock();
        mock.expect_list_attached_objects()
            .withf(|tag_id| tag_id == "tag-ops-old")
            .times(1)
            .returning(|_| {
                Ok(vec![DynamicId {
                    object_type: "VirtualMachine".to_string(),
                    id: "vm-7".to_string(),
                }])
            });
        let ctx = context(mock);

        let objects = TagService::new(&ctx)
            .tagged_objects("ops", Some("legacy"))
            .await
            .unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id, "vm-7");
    }

    #[tokio::test]
    async fn test_list_for_category_either_direction() {
        let ctx = context(catalog_mock());
        let tags = TagService::new(&ctx)
            .list_for_category(None, Some("backup-policies"), Some("VirtualMachine"))
            .await
            .unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.tag.name.as_str()).collect();
        assert_eq!(names, vec!["policy1", "policy2"]);
    }
}
