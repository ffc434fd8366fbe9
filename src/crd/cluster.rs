//! VSphereCluster resource
//!
//! Only the fields this controller reads or writes are modeled. Writes are
//! merge patches of `spec.clusterModules` and `status.conditions`, so fields
//! owned by the infrastructure provider are left untouched on the server.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterModule, Condition};
use crate::{CAPI_GROUP, CLUSTER_NAME_LABEL, PAUSED_ANNOTATION};

/// Specification for a VSphereCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "VSphereCluster",
    plural = "vsphereclusters",
    status = "VSphereClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VSphereClusterSpec {
    /// vCenter server address (hostname or URL)
    #[serde(default)]
    pub server: String,

    /// Managed object ID of the vSphere compute cluster hosting the VMs (e.g. `domain-c8`)
    ///
    /// Cluster modules are created in this compute cluster. When unset, module
    /// creation is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_cluster: Option<String>,

    /// Cluster modules created for the cluster's control plane and machine deployments
    #[serde(default)]
    pub cluster_modules: Vec<ClusterModule>,
}

/// Status for a VSphereCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VSphereClusterStatus {
    /// Conditions representing the cluster state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// vCenter API version reported by the infrastructure provider (e.g. "7.0.3")
    #[serde(
        rename = "vCenterVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vcenter_version: Option<String>,
}

impl VSphereCluster {
    /// Name of the Cluster API `Cluster` that owns this object
    ///
    /// Prefers the owner reference set by the Cluster controller and falls
    /// back to the cluster-name label.
    pub fn owner_cluster_name(&self) -> Option<String> {
        let from_owner = self.owner_references().iter().find_map(|owner| {
            let group = owner.api_version.split('/').next().unwrap_or_default();
            (owner.kind == "Cluster" && group == CAPI_GROUP).then(|| owner.name.clone())
        });
        from_owner.or_else(|| self.labels().get(CLUSTER_NAME_LABEL).cloned())
    }

    /// Returns true if reconciliation is paused via annotation
    pub fn is_paused(&self) -> bool {
        self.annotations().contains_key(PAUSED_ANNOTATION)
    }

    /// Current conditions, empty when status is unset
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions().iter().find(|c| c.type_ == type_)
    }

    /// vCenter version from status, if reported
    pub fn vcenter_version(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.vcenter_version.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;

    fn owner(api_version: &str, kind: &str, name: &str) -> OwnerReference {
        OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: "uid".to_string(),
            ..Default::default()
        }
    }

    fn cluster_with_meta(metadata: ObjectMeta) -> VSphereCluster {
        VSphereCluster {
            metadata,
            spec: VSphereClusterSpec::default(),
            status: None,
        }
    }

    #[test]
    fn owner_cluster_comes_from_owner_reference() {
        let vc = cluster_with_meta(ObjectMeta {
            name: Some("prod-abcde".to_string()),
            owner_references: Some(vec![
                owner("v1", "ConfigMap", "unrelated"),
                owner("cluster.x-k8s.io/v1beta1", "Cluster", "prod"),
            ]),
            ..Default::default()
        });
        assert_eq!(vc.owner_cluster_name().as_deref(), Some("prod"));
    }

    #[test]
    fn owner_cluster_ignores_foreign_cluster_kinds() {
        let vc = cluster_with_meta(ObjectMeta {
            owner_references: Some(vec![owner("example.com/v1", "Cluster", "other")]),
            ..Default::default()
        });
        assert_eq!(vc.owner_cluster_name(), None);
    }

    #[test]
    fn owner_cluster_falls_back_to_label() {
        let vc = cluster_with_meta(ObjectMeta {
            labels: Some(BTreeMap::from([(
                CLUSTER_NAME_LABEL.to_string(),
                "staging".to_string(),
            )])),
            ..Default::default()
        });
        assert_eq!(vc.owner_cluster_name().as_deref(), Some("staging"));
    }

    #[test]
    fn paused_annotation_is_detected() {
        let vc = cluster_with_meta(ObjectMeta {
            annotations: Some(BTreeMap::from([(
                PAUSED_ANNOTATION.to_string(),
                String::new(),
            )])),
            ..Default::default()
        });
        assert!(vc.is_paused());
        assert!(!cluster_with_meta(ObjectMeta::default()).is_paused());
    }

    #[test]
    fn status_deserializes_vcenter_version() {
        let status: VSphereClusterStatus =
            serde_json::from_str(r#"{"ready":true,"vCenterVersion":"7.0.3"}"#).unwrap();
        assert_eq!(status.vcenter_version.as_deref(), Some("7.0.3"));
        assert!(status.conditions.is_empty());
    }

    #[test]
    fn spec_ignores_provider_owned_fields() {
        let spec: VSphereClusterSpec = serde_json::from_value(serde_json::json!({
            "server": "vcenter.example.com",
            "identityRef": {"kind": "Secret", "name": "creds"},
            "thumbprint": "AB:CD",
            "controlPlaneEndpoint": {"host": "10.0.0.1", "port": 6443},
            "clusterModules": [
                {"controlPlane": true, "targetObjectName": "kcp", "moduleUUID": "u1"}
            ]
        }))
        .unwrap();
        assert_eq!(spec.server, "vcenter.example.com");
        assert_eq!(spec.cluster_modules, vec![ClusterModule::new("kcp", true, "u1")]);
    }
}
