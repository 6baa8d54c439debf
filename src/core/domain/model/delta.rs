//! Desired-state changes requested against a VM.

use serde::{Deserialize, Serialize};

/// How a compute delta combines with the current allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeMode {
    /// Replace the current value; a zero or absent delta keeps it.
    #[default]
    Set,
    Add,
    Remove,
}

/// CPU and memory change. Either dimension may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ComputeDelta {
    pub cpu: Option<u32>,
    pub memory_mb: Option<u64>,
    pub mode: ComputeMode,
}

impl ComputeDelta {
    pub fn new(mode: ComputeMode) -> Self {
        Self {
            cpu: None,
            memory_mb: None,
            mode,
        }
    }

    pub fn cpu(mut self, cpu: u32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.unwrap_or(0) == 0 && self.memory_mb.unwrap_or(0) == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provisioning {
    #[default]
    Thin,
    Thick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiskAction {
    /// Create a new disk on the SCSI controller with this bus number.
    AddNew { bus: u32 },
    /// Grow an existing disk, by its `Hard disk N` ordinal or the highest one.
    Grow {
        disk: Option<u32>,
        /// Growing a thick-provisioned disk must be asked for explicitly.
        allow_thick: bool,
    },
    /// Detach `Hard disk N`, keeping its backing file.
    Remove { disk: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiskDelta {
    pub action: DiskAction,
    /// Size of the new disk, or the amount to grow by.
    pub size_gb: i64,
    pub provisioning: Provisioning,
    /// Independent disks are excluded from snapshots.
    pub independent: bool,
}

impl DiskDelta {
    pub fn add_new(bus: u32, size_gb: i64, provisioning: Provisioning, independent: bool) -> Self {
        Self {
            action: DiskAction::AddNew { bus },
            size_gb,
            provisioning,
            independent,
        }
    }

    pub fn grow(disk: Option<u32>, size_gb: i64, allow_thick: bool) -> Self {
        Self {
            action: DiskAction::Grow { disk, allow_thick },
            size_gb,
            provisioning: Provisioning::Thin,
            independent: false,
        }
    }

    pub fn remove(disk: u32) -> Self {
        Self {
            action: DiskAction::Remove { disk },
            size_gb: 0,
            provisioning: Provisioning::Thin,
            independent: false,
        }
    }
}

/// What a NIC change points at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NicTarget {
    /// Port group name, matched exactly then as a substring.
    Network(String),
    /// VLAN id of the adapter's port group.
    Vlan(u32),
    /// `Network adapter N` ordinal.
    Adapter(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NicMode {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NicDelta {
    pub mode: NicMode,
    pub target: NicTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    Attach,
    Detach,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TagDelta {
    pub mode: TagMode,
    /// Tag names; matched case-insensitively.
    pub tags: Vec<String>,
    /// Narrows tag resolution by category name, matched as a substring either way.
    pub category: Option<String>,
}

/// One resource change to apply to every selected VM.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceDelta {
    Compute(ComputeDelta),
    Disk(DiskDelta),
    Nic(NicDelta),
    Tag(TagDelta),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_builder() {
        let delta = ComputeDelta::new(ComputeMode::Add).cpu(2);
        assert_eq!(delta.cpu, Some(2));
        assert_eq!(delta.memory_mb, None);
        assert!(!delta.is_empty());
        assert!(ComputeDelta::new(ComputeMode::Set).cpu(0).is_empty());
    }

    #[test]
    fn test_grow_defaults() {
        let delta = DiskDelta::grow(None, 10, false);
        assert_eq!(
            delta.action,
            DiskAction::Grow {
                disk: None,
                allow_thick: false
            }
        );
        assert!(!delta.independent);
    }
}
