//! Shared controller context

use std::sync::Arc;

use kube::Client;

use super::discovery::{KubeTargetLister, TargetLister};
use super::state::{ClusterStateClient, KubeClusterState};
use crate::clustermodule::{ClusterModuleServiceProvider, VCenterServiceProvider};
use crate::config::{ControllerConfig, VCenterConfig};

/// Shared context for the cluster module controller
///
/// Holds the collaborators every reconcile needs. Use [`ContextBuilder`] to
/// construct instances:
///
/// ```text
/// let ctx = Context::builder(client, vcenter_config)
///     .config(controller_config)
///     .build();
/// ```
pub struct Context {
    /// Lists control planes and machine deployments
    pub lister: Arc<dyn TargetLister>,
    /// Writes records and conditions back to the VSphereCluster
    pub state: Arc<dyn ClusterStateClient>,
    /// Resolves the cluster module service for a VSphereCluster
    pub modules: Arc<dyn ClusterModuleServiceProvider>,
    /// Loop settings
    pub config: ControllerConfig,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client, vcenter: VCenterConfig) -> ContextBuilder {
        ContextBuilder::new(client, vcenter)
    }

    /// Create a context from explicit collaborators
    ///
    /// Used by tests and by callers that bring their own implementations.
    pub fn from_parts(
        lister: Arc<dyn TargetLister>,
        state: Arc<dyn ClusterStateClient>,
        modules: Arc<dyn ClusterModuleServiceProvider>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            lister,
            state,
            modules,
            config,
        }
    }

    /// Create a context for testing with mock collaborators and default settings
    #[cfg(test)]
    pub fn for_testing(
        lister: Arc<dyn TargetLister>,
        state: Arc<dyn ClusterStateClient>,
        modules: Arc<dyn ClusterModuleServiceProvider>,
    ) -> Self {
        Self::from_parts(lister, state, modules, ControllerConfig::default())
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    vcenter: VCenterConfig,
    config: ControllerConfig,
}

impl ContextBuilder {
    fn new(client: Client, vcenter: VCenterConfig) -> Self {
        Self {
            client,
            vcenter,
            config: ControllerConfig::default(),
        }
    }

    /// Set the loop settings
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            lister: Arc::new(KubeTargetLister::new(self.client.clone())),
            state: Arc::new(KubeClusterState::new(self.client)),
            modules: Arc::new(VCenterServiceProvider::new(self.vcenter)),
            config: self.config,
        }
    }
}
