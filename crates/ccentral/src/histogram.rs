// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Latency histograms backed by an exponentially decaying reservoir.
//!
//! The reservoir keeps a fixed-size, priority-weighted sample biased toward
//! the last few minutes (forward decay): every sample gets a weight of
//! `exp(alpha * (t - landmark))`, and a random priority derived from that
//! weight decides which samples survive once the reservoir is full. Old
//! samples are therefore down-weighted rather than cut off at a fixed age.
//! The landmark is moved forward every hour and all weights rescaled so the
//! exponent never overflows.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::clock::epoch_seconds;

/// Number of samples kept, tuned for a 99.9% confidence level with a 5% margin of error.
pub const DEFAULT_SIZE: usize = 1028;
/// Decay factor; heavily biases the sample toward the last five minutes.
pub const DEFAULT_ALPHA: f64 = 0.015;
const RESCALE_THRESHOLD_SECS: u64 = 60 * 60;

/// Totally ordered `f64` so priorities can key a `BTreeMap`.
#[derive(Debug, Clone, Copy)]
struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedSample {
    value: u64,
    weight: f64,
}

/// Exponentially decaying sample reservoir.
#[derive(Debug, Clone)]
pub struct DecayingReservoir {
    samples: BTreeMap<Priority, WeightedSample>,
    size: usize,
    alpha: f64,
    landmark: u64,
    next_rescale: u64,
}

impl DecayingReservoir {
    pub fn new(now: SystemTime) -> Self {
        Self::with_params(DEFAULT_SIZE, DEFAULT_ALPHA, now)
    }

    pub fn with_params(size: usize, alpha: f64, now: SystemTime) -> Self {
        let landmark = epoch_seconds(now);
        Self {
            samples: BTreeMap::new(),
            size: size.max(1),
            alpha,
            landmark,
            next_rescale: landmark + RESCALE_THRESHOLD_SECS,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn update(&mut self, value: u64, now: SystemTime) {
        let timestamp = epoch_seconds(now);
        self.rescale_if_needed(timestamp);

        let weight = self.weight(timestamp.saturating_sub(self.landmark));
        // rand yields [0, 1); flip it so the divisor is never zero.
        let draw = 1.0 - rand::random::<f64>();
        let priority = Priority(weight / draw);
        let sample = WeightedSample { value, weight };

        if self.samples.len() < self.size {
            self.samples.entry(priority).or_insert(sample);
            return;
        }

        let lowest = match self.samples.keys().next() {
            Some(lowest) => *lowest,
            None => return,
        };
        if lowest < priority && !self.samples.contains_key(&priority) {
            self.samples.insert(priority, sample);
            self.samples.remove(&lowest);
        }
    }

    /// Weighted percentile view of the current contents.
    pub fn snapshot(&mut self, now: SystemTime) -> Snapshot {
        self.rescale_if_needed(epoch_seconds(now));
        Snapshot::from_weighted(self.samples.values().copied())
    }

    fn weight(&self, age_secs: u64) -> f64 {
        (self.alpha * age_secs as f64).exp()
    }

    fn rescale_if_needed(&mut self, now_secs: u64) {
        if now_secs < self.next_rescale {
            return;
        }
        let old_landmark = self.landmark;
        self.landmark = now_secs;
        self.next_rescale = now_secs + RESCALE_THRESHOLD_SECS;

        let scaling = (-self.alpha * (now_secs - old_landmark) as f64).exp();
        if scaling == 0.0 {
            self.samples.clear();
            return;
        }
        let rescaled = std::mem::take(&mut self.samples)
            .into_iter()
            .filter_map(|(priority, sample)| {
                let weight = sample.weight * scaling;
                if weight == 0.0 {
                    return None;
                }
                Some((
                    Priority(priority.0 * scaling),
                    WeightedSample {
                        value: sample.value,
                        weight,
                    },
                ))
            });
        for (priority, sample) in rescaled {
            self.samples.entry(priority).or_insert(sample);
        }
    }
}

/// Order statistics over a weighted sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Vec<u64>,
    quantiles: Vec<f64>,
}

impl Snapshot {
    fn from_weighted(samples: impl Iterator<Item = WeightedSample>) -> Self {
        let mut samples: Vec<WeightedSample> = samples.collect();
        samples.sort_by_key(|s| s.value);

        let total: f64 = samples.iter().map(|s| s.weight).sum();
        let mut values = Vec::with_capacity(samples.len());
        let mut quantiles = Vec::with_capacity(samples.len());
        let mut cumulative = 0.0;
        for sample in &samples {
            values.push(sample.value);
            quantiles.push(cumulative);
            cumulative += if total > 0.0 { sample.weight / total } else { 0.0 };
        }
        Self { values, quantiles }
    }

    /// Value at `quantile` in `[0, 1]`; `0.0` for an empty snapshot.
    pub fn value(&self, quantile: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let position = match self
            .quantiles
            .binary_search_by(|probe| probe.total_cmp(&quantile))
        {
            Ok(index) => index,
            Err(insertion) => insertion.saturating_sub(1),
        };
        let index = position.min(self.values.len() - 1);
        self.values[index] as f64
    }

    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Upload layout: `[p75, p95, p99, median]`.
    pub fn upload_values(&self) -> [f64; 4] {
        [self.p75(), self.p95(), self.p99(), self.median()]
    }
}

/// Duration histogram for a single metric key, in milliseconds.
#[derive(Debug, Clone)]
pub struct HistogramAggregator {
    reservoir: DecayingReservoir,
}

impl HistogramAggregator {
    pub fn new(now: SystemTime) -> Self {
        Self {
            reservoir: DecayingReservoir::new(now),
        }
    }

    pub fn record(&mut self, duration_ms: u64, now: SystemTime) {
        self.reservoir.update(duration_ms, now);
    }

    pub fn snapshot(&mut self, now: SystemTime) -> Snapshot {
        self.reservoir.snapshot(now)
    }
}
