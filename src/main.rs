//! cluster-modules controller binary

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use cluster_modules::config::{ControllerConfig, VCenterConfig, DEFAULT_WATCH_TIMEOUT_SECS};
use cluster_modules::controller::discovery::{control_plane_resource, worker_pool_resource};
use cluster_modules::controller::{clusters_for_target, error_policy, reconcile, Context};
use cluster_modules::crd::VSphereCluster;
use cluster_modules::telemetry::{init_tracing, LogFormat};

/// Keeps vSphere cluster modules in sync with Cluster API control planes and machine deployments
#[derive(Parser, Debug)]
#[command(name = "cluster-modules", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: ControllerArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller (default mode)
    ///
    /// Watches VSphereClusters together with the KubeadmControlPlanes and
    /// MachineDeployments of their clusters, and keeps one vSphere cluster
    /// module per control plane and machine deployment.
    Controller,
}

/// Controller arguments
#[derive(Args, Debug)]
struct ControllerArgs {
    /// Only watch objects in this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Seconds between passes over a settled cluster
    #[arg(long, default_value = "300", global = true)]
    resync_interval_secs: u64,

    /// Seconds before retrying a failed pass
    #[arg(long, default_value = "15", global = true)]
    error_requeue_secs: u64,

    /// vCenter user name
    #[arg(long, env = "VSPHERE_USERNAME", global = true)]
    vsphere_username: Option<String>,

    /// vCenter password
    #[arg(long, env = "VSPHERE_PASSWORD", hide_env_values = true, global = true)]
    vsphere_password: Option<String>,

    /// Accept self-signed vCenter certificates
    #[arg(long, global = true)]
    insecure_skip_tls_verify: bool,

    /// Timeout for a single vCenter request in seconds
    #[arg(long, default_value = "30", global = true)]
    request_timeout_secs: u64,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,
}

impl ControllerArgs {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            namespace: self.namespace.clone(),
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            error_requeue: Duration::from_secs(self.error_requeue_secs),
            watch_timeout_secs: DEFAULT_WATCH_TIMEOUT_SECS,
        }
    }

    fn vcenter_config(&self) -> VCenterConfig {
        let mut config = VCenterConfig::new(
            self.vsphere_username.clone().unwrap_or_default(),
            self.vsphere_password.clone().unwrap_or_default(),
        );
        config.insecure_skip_tls_verify = self.insecure_skip_tls_verify;
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.args.log_format)?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.args).await,
    }
}

/// Run in controller mode
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let config = args.controller_config();
    config.validate()?;
    let vcenter = args.vcenter_config();
    vcenter.validate()?;

    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        resync_interval = ?config.resync_interval,
        "cluster-modules controller starting"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let kcp_resource = control_plane_resource();
    let md_resource = worker_pool_resource();

    let (clusters, control_planes, worker_pools): (
        Api<VSphereCluster>,
        Api<DynamicObject>,
        Api<DynamicObject>,
    ) = match config.namespace.as_deref() {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced_with(client.clone(), ns, &kcp_resource),
            Api::namespaced_with(client.clone(), ns, &md_resource),
        ),
        None => (
            Api::all(client.clone()),
            Api::all_with(client.clone(), &kcp_resource),
            Api::all_with(client.clone(), &md_resource),
        ),
    };

    let watcher_config = WatcherConfig::default().timeout(config.watch_timeout_secs);
    let ctx = Arc::new(
        Context::builder(client, vcenter)
            .config(config.clone())
            .build(),
    );

    let controller = Controller::new(clusters, watcher_config.clone());
    let kcp_store = controller.store();
    let md_store = kcp_store.clone();

    controller
        .watches_with(
            control_planes,
            kcp_resource,
            watcher_config.clone(),
            move |kcp| clusters_for_target(&kcp, &kcp_store.state()),
        )
        .watches_with(
            worker_pools,
            md_resource,
            watcher_config,
            move |md| clusters_for_target(&md, &md_store.state()),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "VSphereCluster reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "VSphereCluster reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("cluster-modules controller stopped");
    Ok(())
}
