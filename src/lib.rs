//! cluster-modules - keeps vSphere cluster modules in sync with Cluster API topology
//!
//! vSphere cluster modules are vCenter's anti-affinity construct: every VM placed
//! in the same module is spread across ESXi hosts. This crate runs a controller
//! that gives each `KubeadmControlPlane` and each `MachineDeployment` of a
//! Cluster API cluster its own module, and records the module IDs on the
//! owning `VSphereCluster`.
//!
//! # Modules
//!
//! - [`crd`] - `VSphereCluster` resource types (association records, conditions)
//! - [`clustermodule`] - Target descriptors and the cluster module service (vCenter REST)
//! - [`controller`] - Target discovery, the reconciliation pass, and the availability signal
//! - [`config`] - Controller and vCenter configuration
//! - [`retry`] - Exponential backoff for transient failures
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types for the controller

#![deny(missing_docs)]

pub mod clustermodule;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Cluster API Conventions
// =============================================================================

/// Label Cluster API sets on every object that belongs to a cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Annotation that pauses reconciliation of a Cluster API object
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";

/// API group of the Cluster API core types (Cluster, MachineDeployment)
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";

/// Field manager used for every write this controller makes
pub const FIELD_MANAGER: &str = "cluster-modules-controller";
