//! Selection criteria: which objects of an inventory an intent applies to.

use crate::core::domain::{
    error::VcliResult,
    model::inventory_object::{InventoryObject, PowerState},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How name tokens are compared with object names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The lowercased name or the raw identifier equals a token.
    Exact,
    /// A token is contained in the lowercased name, or equals the identifier.
    #[default]
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Windows,
}

impl OsFamily {
    /// Windows guest ids all contain `win` (`windows9_64Guest`, `win2000ServGuest`).
    pub fn matches(&self, guest_id: &str) -> bool {
        let windows = guest_id.to_lowercase().contains("win");
        match self {
            OsFamily::Windows => windows,
            OsFamily::Linux => !windows,
        }
    }
}

/// Attribute predicates applied to virtual machines after name matching.
///
/// Each `None` disables the predicate. `template` defaults to `Some(false)`
/// so templates are only selected when asked for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VmFilters {
    pub os: Option<OsFamily>,
    pub template: Option<bool>,
    /// Virtual hardware version number, compared as `vmx-NN`.
    pub hardware_version: Option<u32>,
    pub has_snapshot: Option<bool>,
    pub consolidation_needed: Option<bool>,
    /// `true` keeps everything not powered off, `false` everything not powered on.
    pub powered_on: Option<bool>,
    /// Substring of the cluster the VM's host belongs to.
    pub cluster: Option<String>,
    /// Substring of the VM's current host name.
    pub host: Option<String>,
}

impl Default for VmFilters {
    fn default() -> Self {
        Self {
            os: None,
            template: Some(false),
            hardware_version: None,
            has_snapshot: None,
            consolidation_needed: None,
            powered_on: None,
            cluster: None,
            host: None,
        }
    }
}

impl VmFilters {
    /// No predicate at all, templates included.
    pub fn any() -> Self {
        Self {
            template: None,
            ..Default::default()
        }
    }

    /// Returns `true` when `vm` passes every active predicate.
    ///
    /// VMs without a guest id are inaccessible or orphaned and never match.
    pub fn matches(&self, vm: &InventoryObject) -> bool {
        let props = &vm.properties;
        let Some(guest_id) = props.guest_id.as_deref() else {
            return false;
        };

        if let Some(os) = self.os
            && !os.matches(guest_id)
        {
            return false;
        }
        if let Some(template) = self.template
            && vm.is_template() != template
        {
            return false;
        }
        if let Some(version) = self.hardware_version
            && props.hardware_version.as_deref() != Some(format!("vmx-{:02}", version).as_str())
        {
            return false;
        }
        if let Some(has_snapshot) = self.has_snapshot
            && vm.has_snapshots() != has_snapshot
        {
            return false;
        }
        if let Some(consolidation) = self.consolidation_needed
            && props.consolidation_needed.unwrap_or(false) != consolidation
        {
            return false;
        }
        match (self.powered_on, props.power_state) {
            (Some(true), Some(PowerState::PoweredOff)) => return false,
            (Some(false), Some(PowerState::PoweredOn)) => return false,
            _ => {}
        }
        if let Some(cluster) = &self.cluster {
            let cluster = cluster.to_lowercase();
            let in_cluster = vm
                .cluster_name()
                .is_some_and(|name| name.to_lowercase().contains(&cluster));
            if !in_cluster {
                return false;
            }
        }
        if let Some(host) = &self.host {
            let host = host.to_lowercase();
            // No placement information means the host cannot be checked.
            let on_host = vm
                .host_name()
                .is_some_and(|name| name.to_lowercase().contains(&host));
            if !on_host {
                return false;
            }
        }
        true
    }
}

/// Names plus match mode plus attribute predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionCriteria {
    /// Lowercased tokens; `None` selects every object.
    pub tokens: Option<Vec<String>>,
    pub match_mode: MatchMode,
    pub filters: VmFilters,
}

impl SelectionCriteria {
    /// Selects every object.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds criteria from already expanded tokens.
    pub fn named<I, S>(tokens: I, match_mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            tokens: (!tokens.is_empty()).then_some(tokens),
            match_mode,
            filters: VmFilters::default(),
        }
    }

    pub fn with_filters(mut self, filters: VmFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    /// Name matching only; attribute predicates are applied separately.
    pub fn matches_name(&self, object: &InventoryObject) -> bool {
        let Some(tokens) = &self.tokens else {
            return true;
        };
        let name = object.name.to_lowercase();
        let id = object.reference.value.to_lowercase();
        match self.match_mode {
            MatchMode::Exact => tokens.iter().any(|t| *t == name || *t == id),
            MatchMode::Substring => tokens.iter().any(|t| name.contains(t.as_str()) || *t == id),
        }
    }
}

/// Flattens raw name arguments into a lowercased token list.
///
/// Every argument is split on commas and whitespace. A token naming an
/// existing file is replaced by the first word of each of its lines, skipping
/// blank lines and lines starting with `#`. Returns `None` when no token is
/// left.
///
/// # Errors
/// Returns `VcliError::Io` if a token names a file that cannot be read.
pub async fn parse_tokens<S: AsRef<str>>(raw: &[S]) -> VcliResult<Option<Vec<String>>> {
    let mut tokens = Vec::new();
    for argument in raw {
        for token in argument
            .as_ref()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if is_file(token).await {
                let content = tokio::fs::read_to_string(token).await?;
                tokens.extend(
                    content
                        .lines()
                        .filter(|line| !line.starts_with('#'))
                        .filter_map(|line| line.split_whitespace().next())
                        .map(str::to_lowercase),
                );
            } else {
                tokens.push(token.to_lowercase());
            }
        }
    }
    Ok((!tokens.is_empty()).then_some(tokens))
}

async fn is_file(token: &str) -> bool {
    tokio::fs::metadata(Path::new(token))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
