//! Error types for the cluster module controller

use std::fmt;

use thiserror::Error;

use crate::clustermodule::ServiceError;

/// Cluster module operation that failed during a reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleOperation {
    /// Checking that a recorded module still exists
    Verify,
    /// Creating a module for a target
    Create,
    /// Removing a module whose target is gone
    Remove,
}

impl fmt::Display for ModuleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verify => write!(f, "verify"),
            Self::Create => write!(f, "create"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Main error type for cluster module operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Invalid or incomplete object
    #[error("validation error: {0}")]
    Validation(String),

    /// More than one live control plane belongs to the same cluster
    #[error("cluster {cluster} has multiple control planes: {}", .names.join(", "))]
    MultipleControlPlanes {
        /// Name of the Cluster API cluster
        cluster: String,
        /// Names of the control plane objects found
        names: Vec<String>,
    },

    /// A cluster module service call failed
    #[error("failed to {operation} cluster module for {target}: {source}")]
    ModuleOperation {
        /// Which operation failed
        operation: ModuleOperation,
        /// Name of the target object (or module UUID for removals)
        target: String,
        /// The underlying service error
        #[source]
        source: ServiceError,
    },

    /// Invalid controller configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Several independent failures collected during one pass
    #[error("{}", join_errors(.0))]
    Aggregate(Vec<Error>),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wrap a service error with the operation and target it belongs to
    pub fn module(
        operation: ModuleOperation,
        target: impl Into<String>,
        source: ServiceError,
    ) -> Self {
        Self::ModuleOperation {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Collapse a list of pass errors into a single error
    ///
    /// Returns `None` for an empty list and the error itself when there is
    /// only one, so single failures keep their own variant.
    pub fn aggregate(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Aggregate(errors)),
        }
    }
}
