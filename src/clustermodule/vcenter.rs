//! vCenter REST implementation of the cluster module service
//!
//! Talks to the vSphere Automation API:
//! - `POST /api/session` - basic auth login, returns a session token
//! - `GET /api/vcenter/cluster-modules` - list module summaries
//! - `POST /api/vcenter/cluster-modules` - create a module in a compute cluster
//! - `DELETE /api/vcenter/cluster-modules/{module}` - delete a module
//!
//! One [`VCenterClient`] is kept per vCenter and shared by every VSphereCluster
//! pointing at it. Sessions are created lazily and renewed once when vCenter
//! answers 401.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use kube::ResourceExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::service::{ClusterModuleService, ClusterModuleServiceProvider, ServiceError};
use super::target::TargetDescriptor;
use crate::config::VCenterConfig;
use crate::crd::VSphereCluster;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::Error;

/// Header carrying the vCenter session token
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// Managed object ID prefix of a ClusterComputeResource
///
/// Standalone hosts are `domain-s*` and cannot hold cluster modules.
const CLUSTER_COMPUTE_RESOURCE_PREFIX: &str = "domain-c";

const CLUSTER_MODULES_PATH: &str = "/api/vcenter/cluster-modules";
const SESSION_PATH: &str = "/api/session";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct ModuleSummary {
    module: String,
}

/// Normalize a VSphereCluster server field into a base URL
pub fn base_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("https://") || server.starts_with("http://") {
        server.to_string()
    } else {
        format!("https://{server}")
    }
}

/// Authenticated client for one vCenter
pub struct VCenterClient {
    http: reqwest::Client,
    base_url: String,
    config: VCenterConfig,
    session: Mutex<Option<String>>,
}

impl VCenterClient {
    /// Create a client for the given vCenter base URL
    pub fn new(base_url: impl Into<String>, config: VCenterConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            config,
            session: Mutex::new(None),
        })
    }

    async fn login(&self) -> Result<String, ServiceError> {
        let url = format!("{}{}", self.base_url, SESSION_PATH);
        let url = url.as_str();
        let this = self;

        retry_with_backoff(
            &RetryConfig::default(),
            "vcenter_login",
            |e: &ServiceError| !matches!(e, ServiceError::Session(_)),
            || async move {
                let resp = this
                    .http
                    .post(url)
                    .basic_auth(&this.config.username, Some(&this.config.password))
                    .send()
                    .await
                    .map_err(|e| {
                        ServiceError::request(format!("login to {}: {e}", this.base_url))
                    })?;

                match resp.status() {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceError::Session(
                        format!("vCenter {} rejected credentials", this.base_url),
                    )),
                    s if s.is_success() => resp
                        .json::<String>()
                        .await
                        .map_err(|e| ServiceError::request(format!("invalid session token: {e}"))),
                    _ => Err(unexpected(resp).await),
                }
            },
        )
        .await
    }

    async fn token(&self, renew: bool) -> Result<String, ServiceError> {
        // Held across login: concurrent callers wait for one session instead of each logging in
        let mut session = self.session.lock().await;
        if !renew {
            if let Some(token) = session.as_ref() {
                return Ok(token.clone());
            }
        }
        let token = self.login().await?;
        debug!(vcenter = %self.base_url, "vCenter session established");
        *session = Some(token.clone());
        Ok(token)
    }

    /// Send an authenticated request, renewing the session once on 401
    async fn send<F>(&self, method: Method, path: &str, build: F) -> Result<Response, ServiceError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut renew = false;

        loop {
            let token = self.token(renew).await?;
            let resp = build(self.http.request(method.clone(), &url).header(SESSION_HEADER, token))
                .send()
                .await
                .map_err(|e| ServiceError::request(format!("{method} {path}: {e}")))?;

            if resp.status() == StatusCode::UNAUTHORIZED && !renew {
                debug!(vcenter = %self.base_url, "session expired, logging in again");
                renew = true;
                continue;
            }
            return Ok(resp);
        }
    }

    /// List the UUIDs of all cluster modules
    pub async fn list_modules(&self) -> Result<Vec<String>, ServiceError> {
        let resp = self.send(Method::GET, CLUSTER_MODULES_PATH, |r| r).await?;
        if !resp.status().is_success() {
            return Err(unexpected(resp).await);
        }
        let summaries: Vec<ModuleSummary> = resp
            .json()
            .await
            .map_err(|e| ServiceError::request(format!("invalid module list: {e}")))?;
        Ok(summaries.into_iter().map(|s| s.module).collect())
    }

    /// Create a module in a compute cluster and return its UUID
    pub async fn create_module(&self, compute_cluster: &str) -> Result<String, ServiceError> {
        let body = serde_json::json!({ "cluster": compute_cluster });
        let resp = self
            .send(Method::POST, CLUSTER_MODULES_PATH, |r| r.json(&body))
            .await?;
        if !resp.status().is_success() {
            return Err(unexpected(resp).await);
        }
        resp.json::<String>()
            .await
            .map_err(|e| ServiceError::request(format!("invalid module id: {e}")))
    }

    /// Delete a module; a module that is already gone counts as deleted
    pub async fn delete_module(&self, module_uuid: &str) -> Result<(), ServiceError> {
        let path = format!("{CLUSTER_MODULES_PATH}/{module_uuid}");
        let resp = self.send(Method::DELETE, &path, |r| r).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                debug!(module_uuid = %module_uuid, "cluster module already deleted");
                Ok(())
            }
            s if s.is_success() => Ok(()),
            _ => Err(unexpected(resp).await),
        }
    }
}

async fn unexpected(resp: Response) -> ServiceError {
    let status = resp.status().as_u16();
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    ServiceError::UnexpectedStatus { status, body }
}

/// Cluster module service bound to one VSphereCluster
pub struct VCenterModuleService {
    client: Arc<VCenterClient>,
    compute_cluster: Option<String>,
}

impl VCenterModuleService {
    /// Create a service that places modules in `compute_cluster`
    pub fn new(client: Arc<VCenterClient>, compute_cluster: Option<String>) -> Self {
        Self {
            client,
            compute_cluster,
        }
    }
}

#[async_trait]
impl ClusterModuleService for VCenterModuleService {
    async fn exists(
        &self,
        target: &TargetDescriptor,
        module_uuid: &str,
    ) -> Result<bool, ServiceError> {
        let modules = self.client.list_modules().await?;
        let found = modules.iter().any(|m| m == module_uuid);
        debug!(target = %target, module_uuid = %module_uuid, found, "checked cluster module");
        Ok(found)
    }

    async fn create(&self, target: &TargetDescriptor) -> Result<Option<String>, ServiceError> {
        let Some(compute_cluster) = self.compute_cluster.as_deref() else {
            debug!(target = %target, "no compute cluster configured, skipping module creation");
            return Ok(None);
        };

        if !compute_cluster.starts_with(CLUSTER_COMPUTE_RESOURCE_PREFIX) {
            return Err(ServiceError::incompatible_owner(format!(
                "{compute_cluster} is not a cluster compute resource"
            )));
        }

        let module_uuid = self.client.create_module(compute_cluster).await?;
        info!(
            target = %target,
            compute_cluster = %compute_cluster,
            module_uuid = %module_uuid,
            "created cluster module"
        );
        Ok(Some(module_uuid))
    }

    async fn remove(&self, module_uuid: &str) -> Result<(), ServiceError> {
        self.client.delete_module(module_uuid).await?;
        info!(module_uuid = %module_uuid, "removed cluster module");
        Ok(())
    }
}

/// Provider caching one [`VCenterClient`] per vCenter
pub struct VCenterServiceProvider {
    config: VCenterConfig,
    clients: DashMap<String, Arc<VCenterClient>>,
}

impl VCenterServiceProvider {
    /// Create a provider that logs in with the given credentials
    pub fn new(config: VCenterConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    fn client_for(&self, server: &str) -> Result<Arc<VCenterClient>, Error> {
        let url = base_url(server);
        if let Some(client) = self.clients.get(&url) {
            return Ok(client.clone());
        }
        let client = Arc::new(VCenterClient::new(url.clone(), self.config.clone())?);
        Ok(self.clients.entry(url).or_insert(client).clone())
    }
}

#[async_trait]
impl ClusterModuleServiceProvider for VCenterServiceProvider {
    async fn service_for(
        &self,
        cluster: &VSphereCluster,
    ) -> Result<Arc<dyn ClusterModuleService>, Error> {
        if cluster.spec.server.trim().is_empty() {
            return Err(Error::validation(format!(
                "VSphereCluster {} has no vCenter server",
                cluster.name_any()
            )));
        }
        let client = self.client_for(&cluster.spec.server)?;
        Ok(Arc::new(VCenterModuleService::new(
            client,
            cluster.spec.compute_cluster.clone(),
        )))
    }
}
