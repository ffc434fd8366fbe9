//! Resource types read and written by the cluster module controller

mod cluster;
mod types;

pub use cluster::{VSphereCluster, VSphereClusterSpec, VSphereClusterStatus};
pub use types::{set_condition, ClusterModule, Condition, ConditionStatus};
