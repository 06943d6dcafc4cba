//! Plan computation: compare declared configuration with recorded state

use crate::resource::Resource;
use crate::types::ChangeAction;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The planned action for one resource instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Type of the resource, e.g. `utilities_extract_zip`
    pub resource_type: String,
    /// Instance name within its type
    pub name: String,
    pub action: ChangeAction,
}

impl ResourceDiff {
    /// `<type>.<name>`, the key used in state and on the command line
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Ordered list of planned actions for one resource type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub diffs: Vec<ResourceDiff>,
}

impl Plan {
    /// Diffs that change something
    pub fn changes(&self) -> impl Iterator<Item = &ResourceDiff> {
        self.diffs.iter().filter(|d| d.action.is_change())
    }

    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }

    /// Keep only the instances whose address or name is listed
    ///
    /// An empty target list keeps everything.
    pub fn retain_targets(&mut self, targets: &[String]) {
        if targets.is_empty() {
            return;
        }
        self.diffs
            .retain(|d| targets.iter().any(|t| *t == d.address() || *t == d.name));
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diffs(&self.diffs)
    }

    pub fn merge(&mut self, other: Plan) {
        self.diffs.extend(other.diffs);
    }
}

/// Compute the plan for one resource type
///
/// Every declared configuration is validated first, so a bad block fails
/// the whole plan before any instance is touched.
pub fn compute_plan<R: Resource>(
    resource: &R,
    desired: &BTreeMap<String, R::Config>,
    state: &BTreeMap<String, R::State>,
) -> Result<Plan> {
    let type_name = resource.type_name();

    for (name, config) in desired {
        resource
            .validate(config)
            .with_context(|| format!("Invalid configuration for {type_name}.{name}"))?;
    }

    let mut diffs = Vec::new();
    for (name, config) in desired {
        let action = match state.get(name) {
            None => ChangeAction::Create,
            Some(prior) => {
                if resource
                    .needs_update(config, prior)
                    .with_context(|| format!("Failed to plan {type_name}.{name}"))?
                {
                    ChangeAction::Update
                } else {
                    ChangeAction::NoOp
                }
            }
        };
        diffs.push(ResourceDiff {
            resource_type: type_name.to_string(),
            name: name.clone(),
            action,
        });
    }

    for name in state.keys().filter(|name| !desired.contains_key(*name)) {
        diffs.push(ResourceDiff {
            resource_type: type_name.to_string(),
            name: name.clone(),
            action: ChangeAction::Delete,
        });
    }

    Ok(Plan { diffs })
}

/// Plan that deletes every recorded instance
pub fn compute_destroy_plan<R: Resource>(resource: &R, state: &BTreeMap<String, R::State>) -> Plan {
    let diffs = state
        .keys()
        .map(|name| ResourceDiff {
            resource_type: resource.type_name().to_string(),
            name: name.clone(),
            action: ChangeAction::Delete,
        })
        .collect();
    Plan { diffs }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of instances to create
    pub additions: usize,
    /// Number of instances to delete
    pub removals: usize,
    /// Number of instances to update
    pub modifications: usize,
    /// Number of instances already up to date
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action {
                ChangeAction::Create => summary.additions += 1,
                ChangeAction::Delete => summary.removals += 1,
                ChangeAction::Update => summary.modifications += 1,
                ChangeAction::NoOp => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
