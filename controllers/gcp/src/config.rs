//! Controller configuration
//!
//! All settings come from environment variables. Unset variables fall back
//! to defaults; a variable that is set but cannot be parsed is an error.

use crate::error::ControllerError;
use gcp_client::GcpEndpoints;
use managed::ReconcilerConfig;
use std::time::Duration;

/// Runtime configuration of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Namespace to watch, all namespaces when `None`
    pub namespace: Option<String>,
    /// Poll interval of an up-to-date resource
    pub poll_interval: Duration,
    /// Wait after a change or a failed cycle
    pub short_wait: Duration,
    /// Wait after a missing ProviderConfig or credentials
    pub config_error_wait: Duration,
    /// Wait after an external name conflict
    pub conflict_wait: Duration,
    /// Deadline of one reconcile cycle
    pub reconcile_timeout: Duration,
    /// Concurrent reconciles per kind
    pub max_concurrent_reconciliations: u16,
    /// Port of the metrics and probes server
    pub metrics_port: u16,
    /// GCP API base URLs
    pub endpoints: GcpEndpoints,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            poll_interval: Duration::from_secs(60),
            short_wait: Duration::from_secs(30),
            config_error_wait: Duration::from_secs(300),
            conflict_wait: Duration::from_secs(300),
            reconcile_timeout: Duration::from_secs(60),
            max_concurrent_reconciliations: 3,
            metrics_port: 5000,
            endpoints: GcpEndpoints::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| -> Result<Duration, ControllerError> {
            Ok(parse(&lookup, key)?.map_or(default, Duration::from_secs))
        };

        let mut endpoints = defaults.endpoints.clone();
        if let Some(dns) = lookup("GCP_DNS_ENDPOINT") {
            endpoints.dns = dns;
        }
        if let Some(sqladmin) = lookup("GCP_SQLADMIN_ENDPOINT") {
            endpoints.sqladmin = sqladmin;
        }

        let config = Self {
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            poll_interval: secs("POLL_INTERVAL_SECS", defaults.poll_interval)?,
            short_wait: secs("SHORT_WAIT_SECS", defaults.short_wait)?,
            config_error_wait: secs("CONFIG_ERROR_WAIT_SECS", defaults.config_error_wait)?,
            conflict_wait: secs("CONFLICT_WAIT_SECS", defaults.conflict_wait)?,
            reconcile_timeout: secs("RECONCILE_TIMEOUT_SECS", defaults.reconcile_timeout)?,
            max_concurrent_reconciliations: parse(&lookup, "MAX_CONCURRENT_RECONCILIATIONS")?
                .unwrap_or(defaults.max_concurrent_reconciliations),
            metrics_port: parse(&lookup, "METRICS_PORT")?.unwrap_or(defaults.metrics_port),
            endpoints,
        };

        if config.reconcile_timeout.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if config.max_concurrent_reconciliations == 0 {
            return Err(ControllerError::InvalidConfig(
                "MAX_CONCURRENT_RECONCILIATIONS must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    /// Requeue intervals for the managed reconcilers
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            short_wait: self.short_wait,
            long_wait: self.poll_interval,
            config_error_wait: self.config_error_wait,
            conflict_wait: self.conflict_wait,
            timeout: self.reconcile_timeout,
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ControllerError> {
    lookup(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| {
                ControllerError::InvalidConfig(format!("{} has invalid value '{}'", key, value))
            })
        })
        .transpose()
}
