//! Cluster module service abstraction
//!
//! The reconciler only needs three operations from vCenter. Keeping them
//! behind a trait lets the production REST client and the test mocks share
//! one seam.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::target::TargetDescriptor;
use crate::crd::VSphereCluster;
use crate::Error;

/// Errors returned by a cluster module service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The target's compute resource cannot host cluster modules
    ///
    /// Expected for resource pools owned by a standalone host. Recorded on the
    /// availability condition but never escalated.
    #[error("incompatible owner: {reason}")]
    IncompatibleOwner {
        /// Why the owner cannot host a module
        reason: String,
    },

    /// Authentication against vCenter failed
    #[error("session error: {0}")]
    Session(String),

    /// The request could not be sent or its response could not be read
    #[error("request error: {0}")]
    Request(String),

    /// vCenter answered with an unexpected HTTP status
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },
}

impl ServiceError {
    /// Create an incompatible-owner error with the given reason
    pub fn incompatible_owner(reason: impl Into<String>) -> Self {
        Self::IncompatibleOwner {
            reason: reason.into(),
        }
    }

    /// Create a request error with the given message
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Returns true for the incompatible-owner case
    pub fn is_incompatible_owner(&self) -> bool {
        matches!(self, Self::IncompatibleOwner { .. })
    }
}

/// Operations on vSphere cluster modules
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterModuleService: Send + Sync {
    /// Check whether the module recorded for a target still exists
    async fn exists(
        &self,
        target: &TargetDescriptor,
        module_uuid: &str,
    ) -> Result<bool, ServiceError>;

    /// Create a module for a target
    ///
    /// Returns `Ok(None)` when creation was deliberately skipped (for example
    /// because no compute cluster is configured).
    async fn create(&self, target: &TargetDescriptor) -> Result<Option<String>, ServiceError>;

    /// Remove a module
    async fn remove(&self, module_uuid: &str) -> Result<(), ServiceError>;
}

/// Hands out the cluster module service for a VSphereCluster
///
/// Each VSphereCluster may point at a different vCenter, so the service is
/// resolved per reconcile.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterModuleServiceProvider: Send + Sync {
    /// Get a service bound to the cluster's vCenter
    async fn service_for(
        &self,
        cluster: &VSphereCluster,
    ) -> Result<Arc<dyn ClusterModuleService>, Error>;
}
