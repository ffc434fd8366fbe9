//! Target descriptors
//!
//! A target is a Cluster API object whose machines share one cluster module:
//! the cluster's control plane or one of its machine deployments.

use std::fmt;

/// Suffix appended to control plane names to build their lookup key
///
/// `/` is not allowed in Kubernetes object names, so a control plane key can
/// never collide with a machine deployment of the same name.
pub const CONTROL_PLANE_KEY_SUFFIX: &str = "/control-plane";

/// Build the lookup key for a target name
pub fn target_key(name: &str, control_plane: bool) -> String {
    if control_plane {
        format!("{name}{CONTROL_PLANE_KEY_SUFFIX}")
    } else {
        name.to_string()
    }
}

/// Kind of object a cluster module is created for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// The cluster's KubeadmControlPlane
    ControlPlane,
    /// A MachineDeployment (worker pool)
    WorkerPool,
}

impl TargetKind {
    /// Cluster API kind name for this target
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ControlPlane => "KubeadmControlPlane",
            Self::WorkerPool => "MachineDeployment",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// A control plane or machine deployment that may own a cluster module
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    /// What kind of object this is
    pub kind: TargetKind,
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
}

impl TargetDescriptor {
    /// Descriptor for a control plane
    pub fn control_plane(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::ControlPlane,
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Descriptor for a worker pool
    pub fn worker_pool(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::WorkerPool,
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Returns true for the control plane target
    pub fn is_control_plane(&self) -> bool {
        self.kind == TargetKind::ControlPlane
    }

    /// Lookup key, unique among the targets of one cluster
    pub fn key(&self) -> String {
        target_key(&self.name, self.is_control_plane())
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}
