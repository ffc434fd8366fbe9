//! Cluster module targets and the service that manages modules in vCenter

mod compat;
mod service;
mod target;
pub mod vcenter;

pub use compat::{check_version, VersionSupport, MIN_VCENTER_MAJOR_VERSION};
pub use service::{ClusterModuleService, ClusterModuleServiceProvider, ServiceError};
pub use target::{target_key, TargetDescriptor, TargetKind, CONTROL_PLANE_KEY_SUFFIX};
pub use vcenter::{VCenterClient, VCenterModuleService, VCenterServiceProvider};

#[cfg(test)]
pub use service::{MockClusterModuleService, MockClusterModuleServiceProvider};
