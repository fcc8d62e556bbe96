// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Resolved configuration values and change listeners.
//!
//! [`ConfigSyncState`] holds what the store last reported for each declared
//! key. Applying a pulled config document diffs it against that state and
//! returns the listener invocations to run; the caller dispatches them once
//! every lock is released.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::schema::SchemaRegistry;

/// Callback fired when a configuration value changes after its first resolution.
///
/// Listeners run synchronously on the task that performed the pull and must
/// not block; a slow listener delays that caller directly.
pub trait ConfigListener: Send + Sync {
    fn config_changed(&self, key: &str);
}

impl<F> ConfigListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn config_changed(&self, key: &str) {
        self(key)
    }
}

#[derive(Default)]
struct ResolvedConfig {
    current: Option<String>,
    listeners: Vec<Arc<dyn ConfigListener>>,
}

/// Current value and listeners for every declared key.
#[derive(Default)]
pub struct ConfigSyncState {
    entries: HashMap<String, ResolvedConfig>,
}

impl fmt::Debug for ConfigSyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, entry) in &self.entries {
            map.entry(key, &(entry.current.is_some(), entry.listeners.len()));
        }
        map.finish()
    }
}

impl ConfigSyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved value for `key`, or its declared default if nothing was pulled yet.
    pub fn read(&self, schema: &SchemaRegistry, key: &str) -> Result<String, ClientError> {
        let field = schema
            .get(key)
            .ok_or_else(|| ClientError::UnknownField(key.to_string()))?;
        let value = self
            .entries
            .get(key)
            .and_then(|entry| entry.current.clone())
            .unwrap_or_else(|| field.default_value.clone());
        Ok(value)
    }

    /// Value pulled from the store, `None` if the key was never resolved.
    pub fn resolved(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|e| e.current.as_deref())
    }

    pub fn register_listener(
        &mut self,
        schema: &SchemaRegistry,
        key: &str,
        listener: Arc<dyn ConfigListener>,
    ) -> Result<(), ClientError> {
        if !schema.contains(key) {
            return Err(ClientError::UnknownField(key.to_string()));
        }
        self.entries
            .entry(key.to_string())
            .or_default()
            .listeners
            .push(listener);
        Ok(())
    }

    /// Diffs a raw config document (`{key: {"value": ..}, ..}`) against the
    /// resolved state, updating every changed key.
    ///
    /// Keys not in the schema are ignored. Listeners are only queued for keys
    /// that already had a resolved value, so the first pull after startup
    /// never fires them.
    pub fn apply_pulled(
        &mut self,
        schema: &SchemaRegistry,
        raw: &str,
    ) -> Result<PendingNotifications, serde_json::Error> {
        let document: BTreeMap<String, Value> = serde_json::from_str(raw)?;
        let mut pending = PendingNotifications::default();

        for (key, entry) in document {
            let Some(field) = schema.get(&key) else {
                continue;
            };
            let new_value = match entry.get("value") {
                Some(Value::String(value)) => value.clone(),
                Some(Value::Null) | None => {
                    warn!(key = %key, "Pulled configuration entry has no value, ignoring");
                    continue;
                }
                Some(other) => other.to_string(),
            };

            let resolved = self.entries.entry(key.clone()).or_default();
            if resolved.current.as_deref() == Some(new_value.as_str()) {
                continue;
            }

            let previous = resolved.current.replace(new_value.clone());
            if field.field_type.is_sensitive() {
                info!("Configuration value for '{}' changed.", key);
            } else {
                let old_value = previous.as_deref().unwrap_or(&field.default_value);
                info!(
                    "Configuration value for {} changed ({} => {})",
                    key, old_value, new_value
                );
            }

            if previous.is_some() {
                for listener in &resolved.listeners {
                    pending.push(key.clone(), Arc::clone(listener));
                }
            }
        }

        debug!(
            notifications = pending.len(),
            "Configuration pulled successfully"
        );
        Ok(pending)
    }
}

/// Listener invocations queued by a diff pass.
#[derive(Default)]
pub struct PendingNotifications {
    calls: Vec<(String, Arc<dyn ConfigListener>)>,
}

impl PendingNotifications {
    fn push(&mut self, key: String, listener: Arc<dyn ConfigListener>) {
        self.calls.push((key, listener));
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Runs every queued listener in order. A panicking listener is logged and
    /// skipped. Returns the number of listeners that panicked.
    pub fn dispatch(self) -> usize {
        let mut failures = 0;
        for (key, listener) in self.calls {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.config_changed(&key)));
            if let Err(panic) = outcome {
                failures += 1;
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(key = %key, panic = %message, "Configuration update listener panicked");
            }
        }
        failures
    }
}

impl fmt::Debug for PendingNotifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.calls.iter().map(|(key, _)| key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    fn schema_with_bool() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        schema.declare("bool", "title", "description", "0", FieldType::Boolean);
        schema
    }

    fn counting_listener() -> (Arc<AtomicUsize>, Arc<dyn ConfigListener>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let listener: Arc<dyn ConfigListener> = Arc::new(move |key: &str| {
            assert_eq!(key, "bool");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (calls, listener)
    }

    #[test]
    fn test_read_returns_default_before_pull() {
        let schema = schema_with_bool();
        let state = ConfigSyncState::new();
        assert_eq!(state.read(&schema, "bool").unwrap(), "0");
        assert!(state.resolved("bool").is_none());
        assert!(matches!(
            state.read(&schema, "missing"),
            Err(ClientError::UnknownField(_))
        ));
    }

    #[test]
    fn test_first_resolution_does_not_notify() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        let (calls, listener) = counting_listener();
        state.register_listener(&schema, "bool", listener).unwrap();

        let pending = state
            .apply_pulled(&schema, r#"{"bool": {"value": "1"}}"#)
            .unwrap();
        assert!(pending.is_empty());
        pending.dispatch();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.read(&schema, "bool").unwrap(), "1");
    }

    #[test]
    fn test_change_notifies_once() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        let (calls, listener) = counting_listener();
        state.register_listener(&schema, "bool", listener).unwrap();

        state
            .apply_pulled(&schema, r#"{"bool": {"value": "1"}}"#)
            .unwrap()
            .dispatch();
        state
            .apply_pulled(&schema, r#"{"bool": {"value": "1"}}"#)
            .unwrap()
            .dispatch();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        state
            .apply_pulled(&schema, r#"{"bool": {"value": "0"}}"#)
            .unwrap()
            .dispatch();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_value_equal_to_default_still_resolves() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        state
            .apply_pulled(&schema, r#"{"bool": {"value": "0"}}"#)
            .unwrap();
        assert_eq!(state.resolved("bool"), Some("0"));
    }

    #[test]
    fn test_unknown_and_malformed_entries_are_skipped() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        state
            .apply_pulled(
                &schema,
                r#"{"other": {"value": "x"}, "bool": {"changed": 1}}"#,
            )
            .unwrap();
        assert!(state.resolved("bool").is_none());
        state
            .apply_pulled(&schema, r#"{"bool": {"value": null}}"#)
            .unwrap();
        assert!(state.resolved("bool").is_none());
        state
            .apply_pulled(&schema, r#"{"bool": {"value": "1"}}"#)
            .unwrap();
        let pending = state
            .apply_pulled(&schema, r#"{"bool": {"value": null}}"#)
            .unwrap();
        assert!(pending.is_empty());
        assert_eq!(state.resolved("bool"), Some("1"));
        assert!(state.resolved("other").is_none());
        assert!(state.apply_pulled(&schema, "[1, 2]").is_err());
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        state
            .apply_pulled(&schema, r#"{"bool": {"value": 1}}"#)
            .unwrap();
        assert_eq!(state.resolved("bool"), Some("1"));
    }

    #[test]
    fn test_listener_requires_declared_key() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        let (_, listener) = counting_listener();
        assert!(matches!(
            state.register_listener(&schema, "nope", listener),
            Err(ClientError::UnknownField(key)) if key == "nope"
        ));
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        state
            .register_listener(
                &schema,
                "bool",
                Arc::new(move |_: &str| {
                    first.lock().unwrap().push("first");
                    panic!("listener failure");
                }),
            )
            .unwrap();
        let second = Arc::clone(&order);
        state
            .register_listener(
                &schema,
                "bool",
                Arc::new(move |_: &str| second.lock().unwrap().push("second")),
            )
            .unwrap();

        state
            .apply_pulled(&schema, r#"{"bool": {"value": "1"}}"#)
            .unwrap();
        let pending = state
            .apply_pulled(&schema, r#"{"bool": {"value": "0"}}"#)
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.dispatch(), 1);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    #[traced_test]
    fn test_password_value_not_logged() {
        let mut schema = SchemaRegistry::new();
        schema.declare("password_title", "title", "description", "pass1", FieldType::Password);
        let mut state = ConfigSyncState::new();
        state
            .apply_pulled(&schema, r#"{"password_title": {"value": "pass2"}}"#)
            .unwrap();

        assert!(logs_contain("Configuration value for 'password_title' changed."));
        assert!(!logs_contain("pass2"));
        assert!(!logs_contain("pass1"));
    }

    #[test]
    #[traced_test]
    fn test_plain_value_change_logged() {
        let schema = schema_with_bool();
        let mut state = ConfigSyncState::new();
        state
            .apply_pulled(&schema, r#"{"bool": {"value": "1"}}"#)
            .unwrap();
        assert!(logs_contain("Configuration value for bool changed (0 => 1)"));
    }
}
