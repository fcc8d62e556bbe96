// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{StoreClient, StorePaths};
use crate::error::StoreError;

/// A value written to the [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub ttl: Option<Duration>,
}

/// In-process store. Keeps every write in order and never expires anything.
///
/// Handy for tests and for running the client without an etcd cluster.
#[derive(Debug, Default)]
pub struct MemoryStore {
    paths: StorePaths,
    values: Mutex<HashMap<String, StoredValue>>,
    writes: Mutex<Vec<(String, StoredValue)>>,
    failing: AtomicBool,
    schema_puts: AtomicU64,
    config_gets: AtomicU64,
    client_puts: AtomicU64,
    service_info_puts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: StorePaths) -> Self {
        Self {
            paths,
            ..Self::default()
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Replaces the config document served to `service_id`.
    pub fn set_config(&self, service_id: &str, json: impl Into<String>) {
        let path = self.paths.config(service_id);
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(
            path,
            StoredValue {
                value: json.into(),
                ttl: None,
            },
        );
    }

    /// When set, every operation fails with a transport-like error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, path: &str) -> Option<StoredValue> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(path).cloned()
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<(String, StoredValue)> {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Values written to `path`, oldest first.
    pub fn writes_to(&self, path: &str) -> Vec<StoredValue> {
        self.writes()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn schema_puts(&self) -> u64 {
        self.schema_puts.load(Ordering::SeqCst)
    }

    pub fn config_gets(&self) -> u64 {
        self.config_gets.load(Ordering::SeqCst)
    }

    pub fn client_puts(&self) -> u64 {
        self.client_puts.load(Ordering::SeqCst)
    }

    pub fn service_info_puts(&self) -> u64 {
        self.service_info_puts.load(Ordering::SeqCst)
    }

    fn check_available(&self, path: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 503,
                url: path.to_string(),
                body: "memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn put(&self, path: String, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check_available(&path)?;
        let stored = StoredValue {
            value: value.to_string(),
            ttl,
        };
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((path.clone(), stored.clone()));
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, stored);
        Ok(())
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn put_schema(&self, service_id: &str, schema_json: &str) -> Result<(), StoreError> {
        self.schema_puts.fetch_add(1, Ordering::SeqCst);
        self.put(self.paths.schema(service_id), schema_json, None)
    }

    async fn get_config(&self, service_id: &str) -> Result<Option<String>, StoreError> {
        self.config_gets.fetch_add(1, Ordering::SeqCst);
        let path = self.paths.config(service_id);
        self.check_available(&path)?;
        Ok(self.get(&path).map(|stored| stored.value))
    }

    async fn put_client_info(
        &self,
        service_id: &str,
        client_id: &str,
        json: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.client_puts.fetch_add(1, Ordering::SeqCst);
        self.put(self.paths.client(service_id, client_id), json, Some(ttl))
    }

    async fn put_service_info(
        &self,
        service_id: &str,
        info_key: &str,
        data: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.service_info_puts.fetch_add(1, Ordering::SeqCst);
        self.put(self.paths.service_info(service_id, info_key), data, Some(ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_config() {
        let store = MemoryStore::new();
        assert_eq!(store.get_config("svc").await.unwrap(), None);
        store.set_config("svc", r#"{"a": {"value": "1"}}"#);
        assert_eq!(
            store.get_config("svc").await.unwrap().as_deref(),
            Some(r#"{"a": {"value": "1"}}"#)
        );
        assert_eq!(store.config_gets(), 2);
    }

    #[tokio::test]
    async fn test_writes_are_recorded_with_ttl() {
        let store = MemoryStore::new();
        store
            .put_client_info("svc", "id", "{}", Duration::from_secs(180))
            .await
            .unwrap();
        let writes = store.writes_to("/ccentral/services/svc/clients/id");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].ttl, Some(Duration::from_secs(180)));
    }

    #[tokio::test]
    async fn test_custom_namespace_paths() {
        let store = MemoryStore::with_paths(StorePaths::new("custom"));
        store
            .put_service_info("svc", "build", "42", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.service_info_puts(), 1);
        assert!(store.get("/custom/services/svc/info/build").is_some());
        assert!(store.get("/ccentral/services/svc/info/build").is_none());
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.put_schema("svc", "{}").await.is_err());
        assert!(store.get_config("svc").await.is_err());
        assert!(store.writes().is_empty());
        assert_eq!(store.schema_puts(), 1);
    }
}
