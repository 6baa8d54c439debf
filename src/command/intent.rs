use crate::core::domain::model::{
    delta::{ComputeMode, DiskAction, NicMode, ResourceDelta, TagMode},
    lifecycle::{ChangeRequest, CloneOptions, MigrateTarget, OfflineChanges, PowerAction, ShutdownMode},
    outcome::ObjectOutcome,
    report::{ListTarget, Listing, VmInfo},
    selection::SelectionCriteria,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotAction {
    Create { description: String },
    /// Removes the snapshot with this id and its children, or the whole history.
    Remove { id: Option<i64> },
    /// Reverts to the snapshot with this id, or to the current one.
    Revert { id: Option<i64> },
    Consolidate,
}

impl SnapshotAction {
    pub fn name(&self) -> &'static str {
        match self {
            SnapshotAction::Create { .. } => "snapshot-create",
            SnapshotAction::Remove { .. } => "snapshot-remove",
            SnapshotAction::Revert { .. } => "snapshot-revert",
            SnapshotAction::Consolidate => "consolidate",
        }
    }
}

/// Everything the library can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "intent", rename_all = "camelCase")]
pub enum Intent {
    List {
        target: ListTarget,
        criteria: SelectionCriteria,
    },
    Info {
        criteria: SelectionCriteria,
    },
    /// Adds capacity, a disk, an adapter or tags.
    Add {
        criteria: SelectionCriteria,
        delta: ResourceDelta,
    },
    /// Removes capacity, a disk, an adapter or tags.
    Remove {
        criteria: SelectionCriteria,
        delta: ResourceDelta,
    },
    Change {
        criteria: SelectionCriteria,
        request: ChangeRequest,
    },
    Clone {
        source: String,
        names: Vec<String>,
        options: CloneOptions,
    },
    Backup {
        criteria: SelectionCriteria,
    },
    Destroy {
        criteria: SelectionCriteria,
    },
    Migrate {
        criteria: SelectionCriteria,
        target: MigrateTarget,
    },
    Power {
        criteria: SelectionCriteria,
        action: PowerAction,
    },
    Shutdown {
        criteria: SelectionCriteria,
        mode: ShutdownMode,
        changes: OfflineChanges,
    },
    Snapshot {
        criteria: SelectionCriteria,
        action: SnapshotAction,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntentResult {
    Listing(Listing),
    Info(Vec<VmInfo>),
    Outcomes(Vec<ObjectOutcome>),
}

impl IntentResult {
    /// Per-object outcomes, empty for informational intents.
    pub fn outcomes(&self) -> &[ObjectOutcome] {
        match self {
            IntentResult::Outcomes(outcomes) => outcomes,
            IntentResult::Listing(_) | IntentResult::Info(_) => &[],
        }
    }
}

/// `true` when `delta` adds to the VM, `false` when it takes away.
///
/// A compute delta in `set` mode belongs to neither direction.
pub(crate) fn is_additive(delta: &ResourceDelta) -> Option<bool> {
    match delta {
        ResourceDelta::Compute(compute) => match compute.mode {
            ComputeMode::Add => Some(true),
            ComputeMode::Remove => Some(false),
            ComputeMode::Set => None,
        },
        ResourceDelta::Disk(disk) => Some(!matches!(disk.action, DiskAction::Remove { .. })),
        ResourceDelta::Nic(nic) => Some(nic.mode == NicMode::Add),
        ResourceDelta::Tag(tag) => Some(tag.mode == TagMode::Attach),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::model::delta::{ComputeDelta, DiskDelta, NicDelta, NicTarget, TagDelta};

    #[test]
    fn test_delta_direction() {
        assert_eq!(is_additive(&ResourceDelta::Disk(DiskDelta::grow(None, 10, false))), Some(true));
        assert_eq!(is_additive(&ResourceDelta::Disk(DiskDelta::remove(2))), Some(false));
        assert_eq!(
            is_additive(&ResourceDelta::Nic(NicDelta {
                mode: NicMode::Remove,
                target: NicTarget::Vlan(100),
            })),
            Some(false)
        );
        assert_eq!(
            is_additive(&ResourceDelta::Tag(TagDelta {
                mode: TagMode::Attach,
                tags: vec!["prod".into()],
                category: None,
            })),
            Some(true)
        );
        assert_eq!(
            is_additive(&ResourceDelta::Compute(ComputeDelta::new(ComputeMode::Set).cpu(4))),
            None
        );
    }

    #[test]
    fn test_intent_wire_format() {
        let intent: Intent = serde_json::from_value(serde_json::json!({
            "intent": "power",
            "criteria": {
                "tokens": ["web01"],
                "match_mode": "exact",
                "filters": {}
            },
            "action": "on"
        }))
        .unwrap();
        assert!(matches!(
            intent,
            Intent::Power {
                action: PowerAction::On,
                ..
            }
        ));
    }
}
