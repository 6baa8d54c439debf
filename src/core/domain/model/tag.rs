//! Tagging model: categories, tags and the object identifiers they attach to.

use crate::core::domain::model::inventory_object::ManagedObjectRef;
use serde::{Deserialize, Serialize};

/// How many tags of one category an object may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    Single,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cardinality: Cardinality,
    /// Object types this category's tags may be attached to; empty means all.
    #[serde(default)]
    pub associable_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: String,
}

/// A tag together with the category it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTag {
    pub tag: Tag,
    pub category: Category,
}

impl ResolvedTag {
    /// `category/tag`, for logs and outcome messages.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.category.name, self.tag.name)
    }

    pub fn is_exclusive(&self) -> bool {
        self.category.cardinality == Cardinality::Single
    }

    /// True when tags of this category may be attached to `object_type`.
    pub fn applies_to(&self, object_type: &str) -> bool {
        self.category.associable_types.is_empty()
            || self
                .category
                .associable_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(object_type))
    }
}

/// Object identifier as the tagging service spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct DynamicId {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
}

impl From<&ManagedObjectRef> for DynamicId {
    fn from(reference: &ManagedObjectRef) -> Self {
        Self {
            object_type: reference.object_type.clone(),
            id: reference.value.clone(),
        }
    }
}

/// Case-insensitive substring match in either direction.
///
/// A hint of `prod` matches category `Production`, and a hint of
/// `backup-policy` matches category `backup`.
pub fn category_matches(category: &str, hint: &str) -> bool {
    let category = category.to_lowercase();
    let hint = hint.to_lowercase();
    category.contains(&hint) || hint.contains(&category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_wire_format() {
        let category: Category = serde_json::from_value(serde_json::json!({
            "id": "urn:vmomi:InventoryServiceCategory:1",
            "name": "Backup",
            "cardinality": "SINGLE",
            "associable_types": ["VirtualMachine"]
        }))
        .unwrap();
        assert_eq!(category.cardinality, Cardinality::Single);
        assert_eq!(category.description, "");
    }

    #[test]
    fn test_category_matches_either_direction() {
        assert!(category_matches("Backup", "back"));
        assert!(category_matches("back", "Backup"));
        assert!(!category_matches("Backup", "owner"));
    }
}
