//! Snapshot history of a virtual machine.
//!
//! The remote side stores snapshots as a tree. This crate only ever follows
//! the first child at each level, so the history is modelled as a singly
//! linked [`SnapshotChain`]. Branches beyond the first child are not visited;
//! the chain records how many were dropped so callers can flag them.

use crate::core::domain::model::inventory_object::ManagedObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node of the remote snapshot tree (`snapshot.rootSnapshotList`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTreeNode {
    pub snapshot: ManagedObjectRef,
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub child_snapshot_list: Vec<SnapshotTreeNode>,
}

/// The `snapshot` property of a VM.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_snapshot: Option<ManagedObjectRef>,
    #[serde(default)]
    pub root_snapshot_list: Vec<SnapshotTreeNode>,
}

/// One snapshot in the chain. Owns the next (younger) snapshot, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotNode {
    pub reference: ManagedObjectRef,
    pub id: i64,
    pub created: DateTime<Utc>,
    /// Snapshots are named after the operator that took them.
    pub creator: String,
    pub description: String,
    child: Option<Box<SnapshotNode>>,
}

impl SnapshotNode {
    pub fn child(&self) -> Option<&SnapshotNode> {
        self.child.as_deref()
    }

    fn from_tree_node(node: &SnapshotTreeNode) -> Self {
        Self {
            reference: node.snapshot.clone(),
            id: node.id,
            created: node.create_time,
            creator: node.name.clone(),
            description: node.description.clone(),
            child: None,
        }
    }
}

/// Linear snapshot history, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotChain {
    head: Option<Box<SnapshotNode>>,
    ignored_branches: usize,
}

impl SnapshotChain {
    /// Builds the chain from the remote tree by following the first child.
    pub fn from_tree(roots: &[SnapshotTreeNode]) -> Self {
        let mut ignored_branches = roots.len().saturating_sub(1);
        let mut path = Vec::new();
        let mut cursor = roots.first();
        while let Some(node) = cursor {
            path.push(SnapshotNode::from_tree_node(node));
            ignored_branches += node.child_snapshot_list.len().saturating_sub(1);
            cursor = node.child_snapshot_list.first();
        }

        // Link from the tail back to the head.
        let head = path.into_iter().rev().fold(None, |child, mut node| {
            node.child = child;
            Some(Box::new(node))
        });

        Self {
            head,
            ignored_branches,
        }
    }

    pub fn head(&self) -> Option<&SnapshotNode> {
        self.head.as_deref()
    }

    /// Walks the chain front to back.
    pub fn iter(&self) -> SnapshotIter<'_> {
        SnapshotIter {
            next: self.head.as_deref(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First node whose id matches; `None` after reaching the end of the chain.
    pub fn find_by_id(&self, id: i64) -> Option<&SnapshotNode> {
        self.iter().find(|node| node.id == id)
    }

    /// Youngest snapshot on the chain.
    pub fn last(&self) -> Option<&SnapshotNode> {
        self.iter().last()
    }

    /// Number of sibling snapshots that were not followed while building the chain.
    pub fn ignored_branches(&self) -> usize {
        self.ignored_branches
    }
}

impl<'a> IntoIterator for &'a SnapshotChain {
    type Item = &'a SnapshotNode;
    type IntoIter = SnapshotIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct SnapshotIter<'a> {
    next: Option<&'a SnapshotNode>,
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = &'a SnapshotNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.child();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tree_node(id: i64, children: Vec<SnapshotTreeNode>) -> SnapshotTreeNode {
        SnapshotTreeNode {
            snapshot: ManagedObjectRef::snapshot(format!("snapshot-{}", id)),
            id,
            name: "jdoe".to_string(),
            description: format!("snap {}", id),
            create_time: Utc.with_ymd_and_hms(2024, 1, id as u32, 12, 0, 0).unwrap(),
            child_snapshot_list: children,
        }
    }

    fn three_deep() -> Vec<SnapshotTreeNode> {
        vec![tree_node(1, vec![tree_node(2, vec![tree_node(3, vec![])])])]
    }

    #[test]
    fn test_chain_is_ordered_oldest_first() {
        let chain = SnapshotChain::from_tree(&three_deep());
        let ids: Vec<i64> = chain.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.last().map(|n| n.id), Some(3));
        assert_eq!(chain.ignored_branches(), 0);
    }

    #[test]
    fn test_find_by_id() {
        let chain = SnapshotChain::from_tree(&three_deep());
        let second = chain.find_by_id(2).unwrap();
        assert_eq!(second.description, "snap 2");
        assert_eq!(second.reference.value, "snapshot-2");
        assert!(chain.find_by_id(9).is_none());
    }

    #[test]
    fn test_siblings_are_not_followed() {
        let roots = vec![tree_node(1, vec![tree_node(2, vec![]), tree_node(5, vec![])])];
        let chain = SnapshotChain::from_tree(&roots);
        assert_eq!(chain.len(), 2);
        assert!(chain.find_by_id(5).is_none());
        assert_eq!(chain.ignored_branches(), 1);
    }

    #[test]
    fn test_empty_tree() {
        let chain = SnapshotChain::from_tree(&[]);
        assert!(chain.is_empty());
        assert!(chain.head().is_none());
        assert_eq!(chain.len(), 0);
    }
}
