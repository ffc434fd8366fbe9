//! Availability signal
//!
//! Summarizes whether every live target got a cluster module, and renders
//! that as the `ClusterModulesAvailable` condition on the VSphereCluster.

use crate::crd::{Condition, ConditionStatus};

/// Condition type reporting cluster module availability
pub const CLUSTER_MODULES_AVAILABLE_CONDITION: &str = "ClusterModulesAvailable";

/// Reason used when every target has a module
pub const CLUSTER_MODULES_AVAILABLE_REASON: &str = "ClusterModulesAvailable";

/// Reason used when at least one target could not get a module
pub const CLUSTER_MODULE_SETUP_FAILED_REASON: &str = "ClusterModuleSetupFailed";

/// Reason used when vCenter is too old for cluster modules
pub const VCENTER_VERSION_INCOMPATIBLE_REASON: &str = "VCenterVersionIncompatible";

/// Whether all targets have cluster modules, and which ones do not
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvailabilitySignal {
    satisfied: bool,
    failed_targets: Vec<String>,
}

impl AvailabilitySignal {
    /// Build a signal from a finished pass
    pub fn new(satisfied: bool, failed_targets: Vec<String>) -> Self {
        let mut signal = Self::default();
        signal.set(satisfied, failed_targets);
        signal
    }

    /// Replace the signal; names are kept only while unsatisfied
    pub fn set(&mut self, satisfied: bool, failed_targets: Vec<String>) {
        self.satisfied = satisfied;
        self.failed_targets = if satisfied { Vec::new() } else { failed_targets };
    }

    /// True when every target has a module
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    /// Names of the targets without a module, in processing order
    pub fn failed_targets(&self) -> &[String] {
        &self.failed_targets
    }

    /// Render as the `ClusterModulesAvailable` condition
    pub fn to_condition(&self) -> Condition {
        if self.satisfied {
            Condition::new(
                CLUSTER_MODULES_AVAILABLE_CONDITION,
                ConditionStatus::True,
                CLUSTER_MODULES_AVAILABLE_REASON,
                "",
            )
        } else {
            Condition::new(
                CLUSTER_MODULES_AVAILABLE_CONDITION,
                ConditionStatus::False,
                CLUSTER_MODULE_SETUP_FAILED_REASON,
                format!(
                    "failed to create cluster modules for: {}",
                    self.failed_targets.join(", ")
                ),
            )
        }
    }
}

/// Condition reported when vCenter cannot host cluster modules
pub fn version_incompatible_condition(version: &str) -> Condition {
    Condition::new(
        CLUSTER_MODULES_AVAILABLE_CONDITION,
        ConditionStatus::False,
        VCENTER_VERSION_INCOMPATIBLE_REASON,
        format!("vCenter version {version} does not support cluster modules"),
    )
}
