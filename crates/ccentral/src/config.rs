// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client configuration.
//!
//! Values can be built in code (starting from [`ClientConfig::default`]) or
//! derived from `CCENTRAL_*` environment variables. Either way, call
//! [`ClientConfig::validate`] before handing the config to the client; the
//! constructors in [`crate::client`] do so.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::ClientError;
use crate::store::{EtcdStoreConfig, StorePaths, DEFAULT_NAMESPACE, INSTANCE_TTL, SERVICE_INFO_TTL};

const ENV_SERVICE_ID: &str = "CCENTRAL_SERVICE_ID";
const ENV_NAMESPACE: &str = "CCENTRAL_NAMESPACE";
/// Seconds between config pulls; zero or negative pulls on every call.
const ENV_CONFIG_CHECK_INTERVAL: &str = "CCENTRAL_CONFIG_CHECK_INTERVAL";
const ENV_METRICS_INTERVAL: &str = "CCENTRAL_METRICS_INTERVAL";
const ENV_REQUEST_TIMEOUT: &str = "CCENTRAL_REQUEST_TIMEOUT";
/// Comma-separated etcd base URLs.
const ENV_ETCD_HOSTS: &str = "CCENTRAL_ETCD_HOSTS";
const ENV_LOG_LEVEL: &str = "CCENTRAL_LOG_LEVEL";

pub const DEFAULT_CONFIG_CHECK_INTERVAL: Duration = Duration::from_secs(40);
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(40);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Version of the wire contract with the administration UI.
pub const API_VERSION: &str = "1";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings for a [`crate::CCentral`] instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service this process belongs to; part of every store path.
    pub service_id: String,
    /// Root of the key space, `ccentral` by default.
    pub namespace: String,
    /// Minimum time between config pulls. `Duration::ZERO` pulls on every call.
    pub config_check_interval: Duration,
    /// Minimum time between client-data uploads.
    pub metrics_interval: Duration,
    /// Upper bound on each store round-trip.
    pub request_timeout: Duration,
    /// TTL of this instance's client-data entry.
    pub instance_ttl: Duration,
    /// TTL of service info entries.
    pub service_info_ttl: Duration,
    /// Reported as `cv`.
    pub client_version: String,
    /// Reported as `lv`.
    pub runtime_version: String,
    /// etcd base URLs, used by [`ClientConfig::etcd_store_config`].
    pub etcd_endpoints: Vec<String>,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            config_check_interval: DEFAULT_CONFIG_CHECK_INTERVAL,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            instance_ttl: INSTANCE_TTL,
            service_info_ttl: SERVICE_INFO_TTL,
            client_version: format!("rust_etcd-{}", env!("CARGO_PKG_VERSION")),
            runtime_version: format!("rust/{}", env::consts::ARCH),
            etcd_endpoints: vec!["http://127.0.0.1:2379".to_string()],
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Config for `service_id` with every other setting at its default.
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            ..Self::default()
        }
    }

    /// Reads `CCENTRAL_*` variables from the process environment and validates the result.
    pub fn from_env() -> Result<Self, ClientError> {
        let config = Self::from_env_iter(env::vars());
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from key/value pairs (typically for tests). Unset or
    /// unparsable values keep their defaults.
    pub fn from_env_iter<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut config = Self::default();

        if let Some(service_id) = non_empty(&map, ENV_SERVICE_ID) {
            config.service_id = service_id;
        }
        if let Some(namespace) = non_empty(&map, ENV_NAMESPACE) {
            config.namespace = namespace;
        }
        if let Some(secs) = map
            .get(ENV_CONFIG_CHECK_INTERVAL)
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            // Negative intervals mean "always due", same as zero.
            config.config_check_interval = Duration::from_secs(secs.max(0).unsigned_abs());
        }
        if let Some(secs) = map
            .get(ENV_METRICS_INTERVAL)
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.metrics_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = map
            .get(ENV_REQUEST_TIMEOUT)
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(hosts) = map.get(ENV_ETCD_HOSTS) {
            let endpoints: Vec<String> = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect();
            if !endpoints.is_empty() {
                config.etcd_endpoints = endpoints;
            }
        }
        if let Some(level) = non_empty(&map, ENV_LOG_LEVEL) {
            config.log_level = level.to_lowercase();
        }
        config
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.service_id.trim().is_empty() {
            return Err(ClientError::InvalidConfig(format!(
                "{ENV_SERVICE_ID} cannot be empty"
            )));
        }
        if self.service_id.contains('/') {
            return Err(ClientError::InvalidConfig(format!(
                "service id '{}' must not contain '/'",
                self.service_id
            )));
        }
        if self.namespace.trim_matches('/').is_empty() {
            return Err(ClientError::InvalidConfig(
                "namespace cannot be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        if self.instance_ttl.as_secs() == 0 || self.service_info_ttl.as_secs() == 0 {
            return Err(ClientError::InvalidConfig(
                "store TTLs must be at least one second".to_string(),
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ClientError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn paths(&self) -> StorePaths {
        StorePaths::new(self.namespace.clone())
    }

    /// Settings for an [`crate::store::EtcdStore`] matching this config.
    pub fn etcd_store_config(&self) -> EtcdStoreConfig {
        EtcdStoreConfig {
            endpoints: self.etcd_endpoints.clone(),
            timeout: self.request_timeout,
            paths: self.paths(),
        }
    }
}

fn non_empty(map: &HashMap<String, String>, key: &str) -> Option<String> {
    map.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_needs_service_id() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::new("svc").validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("svc");
        assert_eq!(config.namespace, "ccentral");
        assert_eq!(config.config_check_interval, Duration::from_secs(40));
        assert_eq!(config.metrics_interval, Duration::from_secs(40));
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.instance_ttl, Duration::from_secs(180));
        assert_eq!(config.service_info_ttl, Duration::from_secs(26 * 3600));
        assert!(config.client_version.starts_with("rust_etcd-"));
    }

    #[test]
    fn test_from_env_iter() {
        let config = ClientConfig::from_env_iter(vec![
            ("CCENTRAL_SERVICE_ID", "billing"),
            ("CCENTRAL_NAMESPACE", "cc"),
            ("CCENTRAL_CONFIG_CHECK_INTERVAL", "-1"),
            ("CCENTRAL_METRICS_INTERVAL", "60"),
            ("CCENTRAL_ETCD_HOSTS", "http://a:2379, http://b:2379,"),
            ("CCENTRAL_LOG_LEVEL", "DEBUG"),
        ]);
        assert_eq!(config.service_id, "billing");
        assert_eq!(config.namespace, "cc");
        assert_eq!(config.config_check_interval, Duration::ZERO);
        assert_eq!(config.metrics_interval, Duration::from_secs(60));
        assert_eq!(config.etcd_endpoints, vec!["http://a:2379", "http://b:2379"]);
        assert_eq!(config.log_level, "debug");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.etcd_store_config().paths.config("billing"),
            "/cc/services/billing/config"
        );
    }

    #[test]
    fn test_unparsable_values_keep_defaults() {
        let config = ClientConfig::from_env_iter(vec![
            ("CCENTRAL_SERVICE_ID", "svc"),
            ("CCENTRAL_METRICS_INTERVAL", "soon"),
            ("CCENTRAL_ETCD_HOSTS", " , "),
        ]);
        assert_eq!(config.metrics_interval, DEFAULT_METRICS_INTERVAL);
        assert_eq!(config.etcd_endpoints, vec!["http://127.0.0.1:2379"]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ClientConfig {
            log_level: "loud".to_string(),
            ..ClientConfig::new("svc")
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            request_timeout: Duration::ZERO,
            ..ClientConfig::new("svc")
        };
        assert!(config.validate().is_err());

        let config = ClientConfig::new("a/b");
        assert!(config.validate().is_err());

        let config = ClientConfig {
            namespace: "/".to_string(),
            ..ClientConfig::new("svc")
        };
        assert!(config.validate().is_err());
    }
}
