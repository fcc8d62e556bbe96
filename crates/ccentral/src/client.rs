// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public client facade.
//!
//! Every operation on [`CCentral`] first gives the refresh engine a chance to
//! run its timed actions, so a process that regularly reads config or bumps
//! counters keeps its schema, config, and telemetry in sync without a
//! background task.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, API_VERSION};
use crate::counter::counter_key;
use crate::engine::{RefreshEngine, RefreshTimers};
use crate::error::ClientError;
use crate::schema::{sanitize_key, FieldType};
use crate::store::{EtcdStore, StoreClient};
use crate::sync::ConfigListener;
use crate::telemetry::EngineSnapshot;
use crate::typed;

/// Handle to a service's configuration and telemetry. Cheap to clone; all
/// clones share state.
#[derive(Debug, Clone)]
pub struct CCentral {
    engine: Arc<RefreshEngine>,
}

impl CCentral {
    /// Creates a client backed by `store`.
    pub fn new(config: ClientConfig, store: Arc<dyn StoreClient>) -> Result<Self, ClientError> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Same as [`CCentral::new`] with an explicit time source.
    pub fn with_clock(
        config: ClientConfig,
        store: Arc<dyn StoreClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let client_id = Uuid::new_v4().to_string();
        Ok(Self {
            engine: Arc::new(RefreshEngine::new(config, store, clock, client_id)),
        })
    }

    /// Creates a client talking to the etcd endpoints listed in `config`.
    pub fn connect_etcd(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let store = EtcdStore::new(config.etcd_store_config())?;
        Self::new(config, Arc::new(store))
    }

    /// Random identity of this instance, used as its client-data key.
    pub fn client_id(&self) -> &str {
        self.engine.client_id()
    }

    pub fn api_version(&self) -> &'static str {
        API_VERSION
    }

    pub fn config(&self) -> &ClientConfig {
        self.engine.config()
    }

    pub fn telemetry(&self) -> EngineSnapshot {
        self.engine.counters().snapshot()
    }

    pub async fn timers(&self) -> RefreshTimers {
        self.engine.timers().await
    }

    /// Runs whichever of schema push, config pull, and metrics upload are due.
    /// Store failures are logged, never returned.
    pub async fn refresh(&self) {
        self.engine.tick().await;
    }

    /// Declares a string field. Returns the sanitized key.
    pub async fn add_field(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: &str,
    ) -> String {
        self.add_field_type(key, title, description, default_value, FieldType::String)
            .await
    }

    /// Declares a field of any type; the default is given in its stored encoding.
    pub async fn add_field_type(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: &str,
        field_type: FieldType,
    ) -> String {
        self.engine
            .declare_field(key, title, description, default_value, field_type)
            .await
    }

    pub async fn add_int_field(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: i64,
    ) -> String {
        self.add_field_type(
            key,
            title,
            description,
            &default_value.to_string(),
            FieldType::Integer,
        )
        .await
    }

    pub async fn add_float_field(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: f64,
    ) -> String {
        self.add_field_type(
            key,
            title,
            description,
            &default_value.to_string(),
            FieldType::Float,
        )
        .await
    }

    /// Declares a field whose value is never written to logs.
    pub async fn add_password_field(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: &str,
    ) -> String {
        self.add_field_type(key, title, description, default_value, FieldType::Password)
            .await
    }

    pub async fn add_list_field<S: AsRef<str>>(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: &[S],
    ) -> Result<String, ClientError> {
        let encoded = typed::encode_list(default_value).map_err(|err| {
            ClientError::InvalidConfig(format!("default for '{key}' is not encodable: {err}"))
        })?;
        Ok(self
            .add_field_type(key, title, description, &encoded, FieldType::List)
            .await)
    }

    pub async fn add_bool_field(
        &self,
        key: &str,
        title: &str,
        description: &str,
        default_value: bool,
    ) -> String {
        self.add_field_type(
            key,
            title,
            description,
            typed::encode_bool(default_value),
            FieldType::Boolean,
        )
        .await
    }

    /// Current value of a declared field, falling back to its default.
    pub async fn get_config(&self, key: &str) -> Result<String, ClientError> {
        self.engine.tick().await;
        let key = sanitize_key(key);
        let registry = self.engine.registry();
        registry.values.read(&registry.schema, &key)
    }

    /// Like [`CCentral::get_config`], logging unknown keys instead of failing.
    pub async fn get_config_string(&self, key: &str) -> Option<String> {
        match self.get_config(key).await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "Tried to retrieve undeclared configuration");
                None
            }
        }
    }

    pub async fn get_config_int(&self, key: &str) -> Option<i64> {
        let raw = self.get_config_string(key).await?;
        typed::parse_int(key, &raw)
    }

    pub async fn get_config_float(&self, key: &str) -> Option<f64> {
        let raw = self.get_config_string(key).await?;
        typed::parse_float(key, &raw)
    }

    /// `1` is true, any other integer false.
    pub async fn get_config_bool(&self, key: &str) -> Option<bool> {
        let raw = self.get_config_string(key).await?;
        typed::parse_bool(key, &raw)
    }

    pub async fn get_config_list(&self, key: &str) -> Option<Vec<String>> {
        let raw = self.get_config_string(key).await?;
        typed::parse_list(key, &raw)
    }

    /// Registers a listener fired whenever `key` changes after its first
    /// resolution. Listeners run on the task that pulled the change.
    pub fn add_callback<L>(&self, key: &str, listener: L) -> Result<(), ClientError>
    where
        L: ConfigListener + 'static,
    {
        let key = sanitize_key(key);
        let mut guard = self.engine.registry();
        let registry = &mut *guard;
        registry
            .values
            .register_listener(&registry.schema, &key, Arc::new(listener))
    }

    /// Reports `data` as `k_<key>` in this instance's next upload.
    pub async fn add_instance_info(&self, key: &str, data: &str) {
        self.engine.tick().await;
        self.engine
            .metrics()
            .info
            .insert(sanitize_key(key), data.to_string());
    }

    /// Writes service-wide info shared by every instance.
    pub async fn add_service_info(&self, key: &str, data: &str) {
        self.engine.tick().await;
        self.engine.put_service_info(&sanitize_key(key), data).await;
    }

    pub async fn increment_counter<S: AsRef<str>>(&self, key: &str, groups: &[S]) {
        self.increment_counter_by(key, 1, groups).await;
    }

    pub async fn increment_counter_by<S: AsRef<str>>(&self, key: &str, amount: i64, groups: &[S]) {
        let name = counter_key(key, groups);
        let now = self.engine.now();
        self.engine
            .metrics()
            .counter(name, now)
            .increment(amount, now);
        self.engine.tick().await;
    }

    /// Overwrites the current window of a counter.
    pub async fn set_counter<S: AsRef<str>>(&self, key: &str, amount: i64, groups: &[S]) {
        let name = counter_key(key, groups);
        let now = self.engine.now();
        self.engine.metrics().counter(name, now).set(amount, now);
        self.engine.tick().await;
    }

    /// Records one duration sample, truncated to whole milliseconds.
    pub async fn add_histogram(&self, key: &str, duration: Duration) {
        self.engine.tick().await;
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let now = self.engine.now();
        self.engine
            .metrics()
            .histogram(sanitize_key(key), now)
            .record(millis, now);
    }
}
