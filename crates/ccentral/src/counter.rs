// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, SystemTime};

use crate::clock::elapsed_between;
use crate::schema::sanitize_key;

/// Width of a counter window; also reported to the store as `uinterval`.
pub const COUNTER_WINDOW: Duration = Duration::from_secs(60);

/// Counter reporting the total of the last fully elapsed one-minute window.
///
/// Writes go to the open window; reads only ever see the previous, closed one,
/// so an upload never contains a half-filled minute. Windows roll over lazily
/// on every access.
#[derive(Debug, Clone)]
pub struct RollingCounter {
    previous: i64,
    current: i64,
    window_start: SystemTime,
}

impl RollingCounter {
    pub fn new(now: SystemTime) -> Self {
        Self {
            previous: 0,
            current: 0,
            window_start: now,
        }
    }

    pub fn increment(&mut self, amount: i64, now: SystemTime) {
        self.roll(now);
        self.current = self.current.saturating_add(amount);
    }

    /// Replaces the open window's total, for gauge-like counters.
    pub fn set(&mut self, amount: i64, now: SystemTime) {
        self.roll(now);
        self.current = amount;
    }

    /// Total of the previous full window.
    pub fn value(&mut self, now: SystemTime) -> i64 {
        self.roll(now);
        self.previous
    }

    fn roll(&mut self, now: SystemTime) {
        let elapsed = elapsed_between(self.window_start, now);
        let windows = elapsed.as_secs() / COUNTER_WINDOW.as_secs();
        if windows == 0 {
            return;
        }
        // Past two windows the closed one saw no writes at all.
        self.previous = if windows == 1 { self.current } else { 0 };
        self.current = 0;
        let advance = u32::try_from(windows)
            .map(|n| COUNTER_WINDOW * n)
            .unwrap_or(elapsed);
        self.window_start += advance;
    }
}

/// Builds the composite counter name: sanitized key plus sanitized groups joined by `.`.
pub fn counter_key<S: AsRef<str>>(key: &str, groups: &[S]) -> String {
    let mut name = sanitize_key(key);
    for group in groups {
        name.push('.');
        name.push_str(&sanitize_key(group.as_ref()));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::UNIX_EPOCH;

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_value_hides_open_window() {
        let mut counter = RollingCounter::new(t(0));
        counter.increment(1, t(1));
        counter.increment(1, t(2));
        counter.increment(1, t(3));
        assert_eq!(counter.value(t(10)), 0);
        assert_eq!(counter.value(t(61)), 3);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let mut counter = RollingCounter::new(t(0));
        counter.increment(5, t(0));
        assert_eq!(counter.value(t(59)), 0);
        assert_eq!(counter.value(t(60)), 5);
        counter.increment(2, t(61));
        assert_eq!(counter.value(t(119)), 5);
        assert_eq!(counter.value(t(120)), 2);
    }

    #[test]
    fn test_long_idle_gap_decays_to_zero() {
        let mut counter = RollingCounter::new(t(0));
        counter.increment(7, t(5));
        assert_eq!(counter.value(t(125)), 0);
        counter.increment(1, t(130));
        // Window start stays aligned to whole minutes after the jump.
        assert_eq!(counter.value(t(180)), 1);
    }

    #[test]
    fn test_set_replaces_open_window() {
        let mut counter = RollingCounter::new(t(0));
        counter.increment(10, t(1));
        counter.set(4, t(2));
        assert_eq!(counter.value(t(60)), 4);
    }

    #[test]
    fn test_counter_key_groups() {
        assert_eq!(counter_key::<&str>("key", &[]), "key");
        assert_eq!(counter_key("key", &["group1", "group2"]), "key.group1.group2");
        assert_eq!(
            counter_key("key", &["invalid.character", "second character"]),
            "key.invalidcharacter.second_character"
        );
    }

    proptest! {
        #[test]
        fn prop_previous_window_total(increments in proptest::collection::vec(0i64..1_000, 0..50)) {
            let mut counter = RollingCounter::new(t(0));
            for (i, amount) in increments.iter().enumerate() {
                counter.increment(*amount, t(i as u64 % 60));
            }
            let expected: i64 = increments.iter().sum();
            prop_assert_eq!(counter.value(t(59)), 0);
            prop_assert_eq!(counter.value(t(60)), expected);
            prop_assert_eq!(counter.value(t(120)), 0);
        }
    }
}
