// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-instance telemetry document written under `clients/<client id>`.
//!
//! ```json
//! {"ts": "1700000000", "v": "3", "cv": "rust_etcd-0.1.0", "av": "1",
//!  "hostname": "web-1", "lv": "rust/x86_64", "started": 1699990000,
//!  "uinterval": "60", "k_owner": "team-a", "c_requests": [12],
//!  "h_latency": [12.0, 12.0, 12.0, 10.0]}
//! ```

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::time::SystemTime;

use serde_json::{json, Map, Value};

use crate::clock::epoch_seconds;
use crate::counter::{RollingCounter, COUNTER_WINDOW};
use crate::histogram::HistogramAggregator;

/// Counters, histograms, and instance info accumulated between uploads.
#[derive(Debug, Default)]
pub struct InstanceMetrics {
    pub counters: HashMap<String, RollingCounter>,
    pub histograms: HashMap<String, HistogramAggregator>,
    pub info: BTreeMap<String, String>,
}

impl InstanceMetrics {
    pub fn counter(&mut self, key: String, now: SystemTime) -> &mut RollingCounter {
        self.counters
            .entry(key)
            .or_insert_with(|| RollingCounter::new(now))
    }

    pub fn histogram(&mut self, key: String, now: SystemTime) -> &mut HistogramAggregator {
        self.histograms
            .entry(key)
            .or_insert_with(|| HistogramAggregator::new(now))
    }
}

/// Static facts about this process reported with every upload.
#[derive(Debug, Clone)]
pub struct ClientFacts {
    pub client_version: String,
    pub api_version: String,
    pub runtime_version: String,
    pub hostname: Option<String>,
    pub started: u64,
}

/// Hostname from the environment, `None` when unset or empty.
pub fn hostname() -> Option<String> {
    env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
}

/// Builds the upload document. `schema_version` is the resolved `v` field.
pub fn build(
    facts: &ClientFacts,
    schema_version: Option<&str>,
    metrics: &mut InstanceMetrics,
    now: SystemTime,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("ts".into(), json!(epoch_seconds(now).to_string()));
    data.insert("v".into(), json!(schema_version.unwrap_or("unknown")));
    data.insert("cv".into(), json!(facts.client_version));
    data.insert("av".into(), json!(facts.api_version));
    data.insert("hostname".into(), json!(facts.hostname));
    data.insert("lv".into(), json!(facts.runtime_version));
    data.insert("started".into(), json!(facts.started));
    data.insert(
        "uinterval".into(),
        json!(COUNTER_WINDOW.as_secs().to_string()),
    );

    for (key, value) in &metrics.info {
        data.insert(format!("k_{key}"), json!(value));
    }
    for (key, counter) in metrics.counters.iter_mut() {
        data.insert(format!("c_{key}"), json!([counter.value(now)]));
    }
    for (key, histogram) in metrics.histograms.iter_mut() {
        data.insert(
            format!("h_{key}"),
            json!(histogram.snapshot(now).upload_values()),
        );
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn facts() -> ClientFacts {
        ClientFacts {
            client_version: "rust_etcd-0.1.0".to_string(),
            api_version: "1".to_string(),
            runtime_version: "rust/test".to_string(),
            hostname: None,
            started: 1_000,
        }
    }

    #[test]
    fn test_scalar_fields() {
        let now = UNIX_EPOCH + Duration::from_secs(1_040);
        let mut metrics = InstanceMetrics::default();
        let data = build(&facts(), Some("3"), &mut metrics, now);

        assert_eq!(data["ts"], json!("1040"));
        assert_eq!(data["v"], json!("3"));
        assert_eq!(data["cv"], json!("rust_etcd-0.1.0"));
        assert_eq!(data["av"], json!("1"));
        assert_eq!(data["hostname"], Value::Null);
        assert_eq!(data["lv"], json!("rust/test"));
        assert_eq!(data["started"], json!(1_000));
        assert_eq!(data["uinterval"], json!("60"));
    }

    #[test]
    fn test_metrics_fields() {
        let start = UNIX_EPOCH + Duration::from_secs(1_000);
        let mut metrics = InstanceMetrics::default();
        metrics.counter("requests".into(), start).increment(4, start);
        let histogram = metrics.histogram("latency".into(), start);
        histogram.record(10, start);
        histogram.record(12, start);
        histogram.record(7, start);
        metrics.info.insert("owner".into(), "team-a".into());

        let now = start + Duration::from_secs(60);
        let data = build(&facts(), None, &mut metrics, now);

        assert_eq!(data["v"], json!("unknown"));
        assert_eq!(data["k_owner"], json!("team-a"));
        assert_eq!(data["c_requests"], json!([4]));
        assert_eq!(data["h_latency"], json!([12.0, 12.0, 12.0, 10.0]));
        assert_eq!(
            serde_json::to_string(&data["c_requests"]).unwrap(),
            "[4]"
        );
    }
}
