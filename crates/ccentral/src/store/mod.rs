// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Key-value store access.
//!
//! The refresh engine only needs four operations, captured by [`StoreClient`].
//! [`EtcdStore`] implements them against the etcd v2 keys API and
//! [`MemoryStore`] keeps everything in-process.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

mod etcd;
mod memory;

pub use etcd::{EtcdStore, EtcdStoreConfig};
pub use memory::{MemoryStore, StoredValue};

/// Default root of every key written by the client.
pub const DEFAULT_NAMESPACE: &str = "ccentral";
/// Lifetime of an instance's client-data entry; it disappears when the process stops reporting.
pub const INSTANCE_TTL: Duration = Duration::from_secs(3 * 60);
/// Lifetime of a service info entry.
pub const SERVICE_INFO_TTL: Duration = Duration::from_secs(26 * 60 * 60);

/// Operations the client performs against the store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Writes the serialized schema of `service_id`.
    async fn put_schema(&self, service_id: &str, schema_json: &str) -> Result<(), StoreError>;

    /// Reads the operator-supplied config document; `None` if nothing was stored yet.
    async fn get_config(&self, service_id: &str) -> Result<Option<String>, StoreError>;

    async fn put_client_info(
        &self,
        service_id: &str,
        client_id: &str,
        json: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn put_service_info(
        &self,
        service_id: &str,
        info_key: &str,
        data: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;
}

/// Path layout `/<namespace>/services/<service>/{schema|config|clients/<id>|info/<key>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    namespace: String,
}

impl StorePaths {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: namespace.trim_matches('/').to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn service(&self, service_id: &str) -> String {
        format!("/{}/services/{}", self.namespace, service_id)
    }

    pub fn schema(&self, service_id: &str) -> String {
        format!("{}/schema", self.service(service_id))
    }

    pub fn config(&self, service_id: &str) -> String {
        format!("{}/config", self.service(service_id))
    }

    pub fn client(&self, service_id: &str, client_id: &str) -> String {
        format!("{}/clients/{}", self.service(service_id), client_id)
    }

    pub fn service_info(&self, service_id: &str, info_key: &str) -> String {
        format!("{}/info/{}", self.service(service_id), info_key)
    }
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let paths = StorePaths::default();
        assert_eq!(paths.schema("svc"), "/ccentral/services/svc/schema");
        assert_eq!(paths.config("svc"), "/ccentral/services/svc/config");
        assert_eq!(
            paths.client("svc", "abc"),
            "/ccentral/services/svc/clients/abc"
        );
        assert_eq!(
            paths.service_info("svc", "owner"),
            "/ccentral/services/svc/info/owner"
        );
    }

    #[test]
    fn test_namespace_slashes_trimmed() {
        let paths = StorePaths::new("/custom/");
        assert_eq!(paths.namespace(), "custom");
        assert_eq!(paths.config("svc"), "/custom/services/svc/config");
    }
}
