// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Self-observation counters for the refresh engine.
//!
//! The engine never surfaces store failures to callers, so these counters are
//! the way to tell a healthy client from one that keeps failing quietly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters (all values use relaxed atomics).
#[derive(Debug, Default)]
pub struct EngineCounters {
    schema_pushes: AtomicU64,
    config_pulls: AtomicU64,
    metrics_pushes: AtomicU64,
    store_errors: AtomicU64,
    listener_calls: AtomicU64,
    listener_panics: AtomicU64,
}

impl EngineCounters {
    pub(crate) fn on_schema_push(&self) {
        self.schema_pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_config_pull(&self) {
        self.config_pulls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_metrics_push(&self) {
        self.metrics_pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_listeners(&self, called: usize, panicked: usize) {
        self.listener_calls
            .fetch_add(called as u64, Ordering::Relaxed);
        self.listener_panics
            .fetch_add(panicked as u64, Ordering::Relaxed);
    }

    /// Captures a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            schema_pushes: self.schema_pushes.load(Ordering::Relaxed),
            config_pulls: self.config_pulls.load(Ordering::Relaxed),
            metrics_pushes: self.metrics_pushes.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            listener_calls: self.listener_calls.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }
}

/// Plain data representation of [`EngineCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineSnapshot {
    /// Schema pushes attempted, including late re-pushes.
    pub schema_pushes: u64,
    /// Config pulls attempted.
    pub config_pulls: u64,
    /// Client-data uploads attempted.
    pub metrics_pushes: u64,
    /// Store operations that failed or timed out.
    pub store_errors: u64,
    /// Listener invocations.
    pub listener_calls: u64,
    /// Listener invocations that panicked.
    pub listener_panics: u64,
}

impl fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "schema_pushes={}, config_pulls={}, metrics_pushes={}, store_errors={}, listener_calls={}, listener_panics={}",
            self.schema_pushes,
            self.config_pulls,
            self.metrics_pushes,
            self.store_errors,
            self.listener_calls,
            self.listener_panics
        )
    }
}
