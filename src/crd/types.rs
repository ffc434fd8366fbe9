//! Supporting types for the VSphereCluster resource

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clustermodule::target_key;

/// Association between a Cluster API target object and its vSphere cluster module
///
/// Records are immutable once written: a module that has to change is removed
/// and a new record is appended on a later pass.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterModule {
    /// True when the target is the cluster's control plane
    #[serde(default)]
    pub control_plane: bool,

    /// Name of the KubeadmControlPlane or MachineDeployment
    pub target_object_name: String,

    /// Module UUID assigned by vCenter
    #[serde(rename = "moduleUUID")]
    pub module_uuid: String,
}

impl ClusterModule {
    /// Create a record for a target and the module vCenter assigned to it
    pub fn new(
        target_object_name: impl Into<String>,
        control_plane: bool,
        module_uuid: impl Into<String>,
    ) -> Self {
        Self {
            control_plane,
            target_object_name: target_object_name.into(),
            module_uuid: module_uuid.into(),
        }
    }

    /// Lookup key matching [`crate::clustermodule::TargetDescriptor::key`]
    pub fn key(&self) -> String {
        target_key(&self.target_object_name, self.control_plane)
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., ClusterModulesAvailable)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// True if status, reason and message match, ignoring the timestamp
    pub fn same_state(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Replace the condition of the same type, keeping its transition time when
/// the status did not flip
///
/// Returns true when the list changed.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.same_state(&condition) {
                return false;
            }
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
            true
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn condition_at(status: ConditionStatus, message: &str, secs: i64) -> Condition {
        Condition {
            type_: "ClusterModulesAvailable".to_string(),
            status,
            reason: "Test".to_string(),
            message: message.to_string(),
            last_transition_time: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn record_key_separates_control_plane_from_worker_pool() {
        let kcp = ClusterModule::new("foo", true, "uuid-1");
        let md = ClusterModule::new("foo", false, "uuid-2");
        assert_ne!(kcp.key(), md.key());
        assert_eq!(md.key(), "foo");
    }

    #[test]
    fn record_serializes_with_upstream_field_names() {
        let json = serde_json::to_value(ClusterModule::new("kcp", true, "abc")).unwrap();
        assert_eq!(json["controlPlane"], true);
        assert_eq!(json["targetObjectName"], "kcp");
        assert_eq!(json["moduleUUID"], "abc");
    }

    #[test]
    fn record_defaults_control_plane_to_false() {
        let record: ClusterModule =
            serde_json::from_str(r#"{"targetObjectName":"md","moduleUUID":"x"}"#).unwrap();
        assert!(!record.control_plane);
    }

    #[test]
    fn set_condition_appends_new_type() {
        let mut conditions = vec![];
        assert!(set_condition(
            &mut conditions,
            condition_at(ConditionStatus::True, "", 10)
        ));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn set_condition_is_noop_for_same_state() {
        let mut conditions = vec![condition_at(ConditionStatus::True, "", 10)];
        assert!(!set_condition(
            &mut conditions,
            condition_at(ConditionStatus::True, "", 99)
        ));
        assert_eq!(conditions[0].last_transition_time.timestamp(), 10);
    }

    #[test]
    fn set_condition_keeps_transition_time_when_only_message_changes() {
        let mut conditions = vec![condition_at(ConditionStatus::False, "md-0", 10)];
        assert!(set_condition(
            &mut conditions,
            condition_at(ConditionStatus::False, "md-0, md-1", 99)
        ));
        assert_eq!(conditions[0].message, "md-0, md-1");
        assert_eq!(conditions[0].last_transition_time.timestamp(), 10);
    }

    #[test]
    fn set_condition_updates_transition_time_on_flip() {
        let mut conditions = vec![condition_at(ConditionStatus::False, "md-0", 10)];
        assert!(set_condition(
            &mut conditions,
            condition_at(ConditionStatus::True, "", 99)
        ));
        assert_eq!(conditions[0].last_transition_time.timestamp(), 99);
    }
}
