//! Controller configuration
//!
//! Populated from command-line flags and environment variables by the binary.

use std::time::Duration;

use crate::Error;

/// Default requeue interval after a clean pass
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Default requeue interval after a failed pass
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(15);

/// Default timeout for a single vCenter request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Watch timeout in seconds; must stay below the client read timeout (30s)
/// so idle watches are closed by the API server first.
pub const DEFAULT_WATCH_TIMEOUT_SECS: u32 = 25;

/// Connection settings for vCenter
#[derive(Clone)]
pub struct VCenterConfig {
    /// vCenter user name
    pub username: String,
    /// vCenter password
    pub password: String,
    /// Accept self-signed vCenter certificates
    pub insecure_skip_tls_verify: bool,
    /// Timeout for a single request
    pub request_timeout: Duration,
}

impl std::fmt::Debug for VCenterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VCenterConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl VCenterConfig {
    /// Create a config with default TLS and timeout settings
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            insecure_skip_tls_verify: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Validate the vCenter settings
    pub fn validate(&self) -> Result<(), Error> {
        if self.username.is_empty() {
            return Err(Error::configuration("vSphere username cannot be empty"));
        }
        if self.password.is_empty() {
            return Err(Error::configuration("vSphere password cannot be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::configuration("request timeout must be positive"));
        }
        Ok(())
    }
}

/// Settings for the reconcile loop
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Only watch objects in this namespace (all namespaces when None)
    pub namespace: Option<String>,
    /// Requeue interval after a clean pass
    pub resync_interval: Duration,
    /// Requeue interval after a failed pass
    pub error_requeue: Duration,
    /// Server-side watch timeout in seconds
    pub watch_timeout_secs: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            error_requeue: DEFAULT_ERROR_REQUEUE,
            watch_timeout_secs: DEFAULT_WATCH_TIMEOUT_SECS,
        }
    }
}

impl ControllerConfig {
    /// Validate the loop settings
    pub fn validate(&self) -> Result<(), Error> {
        if self.resync_interval.is_zero() {
            return Err(Error::configuration("resync interval must be positive"));
        }
        if self.error_requeue.is_zero() {
            return Err(Error::configuration("error requeue interval must be positive"));
        }
        if self.watch_timeout_secs == 0 || self.watch_timeout_secs >= 30 {
            return Err(Error::configuration(
                "watch timeout must be between 1 and 29 seconds",
            ));
        }
        if matches!(self.namespace.as_deref(), Some("")) {
            return Err(Error::configuration("namespace cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_resync_is_rejected() {
        let config = ControllerConfig {
            resync_interval: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("resync interval"));
    }

    #[test]
    fn watch_timeout_must_stay_below_read_timeout() {
        let config = ControllerConfig {
            watch_timeout_secs: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_namespace_is_rejected() {
        let config = ControllerConfig {
            namespace: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn vcenter_credentials_are_required() {
        assert!(VCenterConfig::new("", "secret").validate().is_err());
        assert!(VCenterConfig::new("admin", "").validate().is_err());
        assert!(VCenterConfig::new("admin", "secret").validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", VCenterConfig::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
