// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Refresh orchestration.
//!
//! Every public client call runs [`RefreshEngine::tick`], which checks three
//! independent timers and performs whichever actions are due, in order:
//!
//! 1. schema push, once on the very first tick;
//! 2. config pull, diff, and listener dispatch, every `config_check_interval`;
//! 3. client-data upload, every `metrics_interval`.
//!
//! Timers are stamped before the store call, and store failures are logged
//! and counted but never returned: a failing store leaves the host with stale
//! config and missing metrics until the next interval, nothing worse. The
//! tick is single-flight per engine; concurrent callers wait on the timer
//! lock and then find nothing due.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info, warn};

use crate::client_data::{self, ClientFacts, InstanceMetrics};
use crate::clock::{elapsed_between, epoch_seconds, Clock};
use crate::config::{ClientConfig, API_VERSION};
use crate::error::StoreError;
use crate::schema::{FieldType, SchemaRegistry};
use crate::store::StoreClient;
use crate::sync::ConfigSyncState;
use crate::telemetry::EngineCounters;

/// Key of the built-in schema version field.
pub const VERSION_FIELD: &str = "v";

/// Last firing time of each timed action; `None` means never fired.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTimers {
    pub last_schema_push: Option<SystemTime>,
    pub last_config_pull: Option<SystemTime>,
    pub last_metrics_push: Option<SystemTime>,
}

/// Actions a tick has to perform.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DueActions {
    pub push_schema: bool,
    pub pull_config: bool,
    pub push_metrics: bool,
}

impl RefreshTimers {
    pub fn schema_pushed(&self) -> bool {
        self.last_schema_push.is_some()
    }

    pub fn due(
        &self,
        now: SystemTime,
        config_check_interval: Duration,
        metrics_interval: Duration,
    ) -> DueActions {
        DueActions {
            push_schema: self.last_schema_push.is_none(),
            pull_config: is_due(self.last_config_pull, now, config_check_interval),
            push_metrics: is_due(self.last_metrics_push, now, metrics_interval),
        }
    }
}

fn is_due(last: Option<SystemTime>, now: SystemTime, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) => interval.is_zero() || elapsed_between(last, now) >= interval,
    }
}

/// Declared schema and resolved values, guarded together so a pull always
/// diffs against a consistent schema.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) schema: SchemaRegistry,
    pub(crate) values: ConfigSyncState,
}

/// Shared state and store plumbing behind a [`crate::CCentral`] handle.
pub struct RefreshEngine {
    config: ClientConfig,
    store: Arc<dyn StoreClient>,
    clock: Arc<dyn Clock>,
    client_id: String,
    facts: ClientFacts,
    registry: Mutex<Registry>,
    metrics: Mutex<InstanceMetrics>,
    timers: TokioMutex<RefreshTimers>,
    counters: EngineCounters,
}

impl std::fmt::Debug for RefreshEngine {
    /// Keeps debug output concise by only printing identity and static config.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshEngine")
            .field("client_id", &self.client_id)
            .field("config", &self.config)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RefreshEngine {
    pub(crate) fn new(
        config: ClientConfig,
        store: Arc<dyn StoreClient>,
        clock: Arc<dyn Clock>,
        client_id: String,
    ) -> Self {
        let facts = ClientFacts {
            client_version: config.client_version.clone(),
            api_version: API_VERSION.to_string(),
            runtime_version: config.runtime_version.clone(),
            hostname: client_data::hostname(),
            started: epoch_seconds(clock.now()),
        };
        let mut registry = Registry::default();
        registry.schema.declare(
            VERSION_FIELD,
            "Version",
            "Schema version for tracking instances",
            "0",
            FieldType::Integer,
        );
        Self {
            config,
            store,
            clock,
            client_id,
            facts,
            registry: Mutex::new(registry),
            metrics: Mutex::new(InstanceMetrics::default()),
            timers: TokioMutex::new(RefreshTimers::default()),
            counters: EngineCounters::default(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    pub(crate) fn now(&self) -> SystemTime {
        self.clock.now()
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    pub(crate) fn metrics(&self) -> MutexGuard<'_, InstanceMetrics> {
        lock(&self.metrics)
    }

    /// Snapshot of the timers, mostly useful for diagnostics.
    pub async fn timers(&self) -> RefreshTimers {
        *self.timers.lock().await
    }

    /// Runs whichever timed actions are due.
    pub async fn tick(&self) {
        let mut timers = self.timers.lock().await;
        let now = self.clock.now();
        let due = timers.due(
            now,
            self.config.config_check_interval,
            self.config.metrics_interval,
        );

        if due.push_schema {
            info!("First refresh, sending schema");
            timers.last_schema_push = Some(now);
            self.push_schema().await;
            debug!("Schema updated");
        }
        if due.pull_config {
            debug!("Checking for new configuration");
            timers.last_config_pull = Some(now);
            self.pull_config().await;
        }
        if due.push_metrics {
            debug!("Uploading metrics");
            timers.last_metrics_push = Some(now);
            self.push_metrics().await;
        }
    }

    /// Inserts or replaces a field. When the schema already went out, the
    /// schema is re-sent and config re-pulled right away so the new key gets
    /// its value; timers are left untouched.
    pub(crate) async fn declare_field(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: &str,
        field_type: FieldType,
    ) -> String {
        let key = self
            .registry()
            .schema
            .declare(key, title, description, default_value, field_type);

        let timers = self.timers.lock().await;
        if timers.schema_pushed() {
            warn!(
                key = %key,
                "Schema was updated after refresh. This might result in some abnormal behavior on \
                 administration UI and degrades the performance. Before setting any stats or \
                 instance variables always make sure all configurations have been already defined. \
                 As a remedy will now resend the updated schema."
            );
            self.push_schema().await;
            self.pull_config().await;
        }
        drop(timers);
        key
    }

    /// Writes service-wide info with the configured TTL; failures are logged.
    pub(crate) async fn put_service_info(&self, key: &str, data: &str) {
        let result = self
            .call(self.store.put_service_info(
                &self.config.service_id,
                key,
                data,
                self.config.service_info_ttl,
            ))
            .await;
        if let Err(err) = result {
            self.counters.on_store_error();
            error!(operation = "put_service_info", key, error = %err, "Failed to add service info");
        }
    }

    async fn push_schema(&self) {
        self.counters.on_schema_push();
        let schema_json = self.registry().schema.to_json();
        let schema_json = match schema_json {
            Ok(json) => json,
            Err(err) => {
                self.counters.on_store_error();
                error!(operation = "put_schema", error = %err, "Failed to serialize schema");
                return;
            }
        };
        info!("Sending schema information");
        let result = self
            .call(self.store.put_schema(&self.config.service_id, &schema_json))
            .await;
        if let Err(err) = result {
            self.counters.on_store_error();
            error!(operation = "put_schema", error = %err, "Failed to send schema");
        }
    }

    async fn pull_config(&self) {
        self.counters.on_config_pull();
        info!("Checking configuration changes");
        let raw = match self
            .call(self.store.get_config(&self.config.service_id))
            .await
        {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No configuration stored for this service yet");
                return;
            }
            Err(err) => {
                self.counters.on_store_error();
                error!(operation = "get_config", error = %err, "Failed to pull configuration data");
                return;
            }
        };

        let pending = {
            let mut guard = self.registry();
            let registry = &mut *guard;
            registry.values.apply_pulled(&registry.schema, &raw)
        };
        match pending {
            Ok(pending) => {
                let called = pending.len();
                let panicked = pending.dispatch();
                self.counters.on_listeners(called, panicked);
            }
            Err(err) => {
                self.counters.on_store_error();
                error!(
                    operation = "get_config",
                    error = %err,
                    "Failed to pull configuration data: malformed document"
                );
            }
        }
    }

    async fn push_metrics(&self) {
        self.counters.on_metrics_push();
        info!("Sending client data");
        let now = self.clock.now();
        let schema_version = {
            let registry = self.registry();
            registry.values.read(&registry.schema, VERSION_FIELD).ok()
        };
        let data = {
            let mut metrics = self.metrics();
            client_data::build(&self.facts, schema_version.as_deref(), &mut metrics, now)
        };
        let json = match serde_json::to_string(&data) {
            Ok(json) => json,
            Err(err) => {
                self.counters.on_store_error();
                error!(operation = "put_client_info", error = %err, "Failed to serialize client data");
                return;
            }
        };
        let result = self
            .call(self.store.put_client_info(
                &self.config.service_id,
                &self.client_id,
                &json,
                self.config.instance_ttl,
            ))
            .await;
        if let Err(err) = result {
            self.counters.on_store_error();
            error!(operation = "put_client_info", error = %err, "Failed to send client data");
        }
    }

    /// Bounds a store call by the configured request timeout.
    async fn call<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }
}
