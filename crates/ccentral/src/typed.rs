// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed views over string-encoded configuration values.
//!
//! Parsers never fail loudly: a malformed value is logged and yields `None`,
//! which callers treat as "use your own fallback".

use tracing::warn;

pub fn parse_int(key: &str, raw: &str) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = raw, error = %err, "Could not convert configuration value to int");
            None
        }
    }
}

pub fn parse_float(key: &str, raw: &str) -> Option<f64> {
    match raw.parse::<f64>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = raw, error = %err, "Could not convert configuration value to float");
            None
        }
    }
}

/// Booleans are stored as integers; only `1` is true.
pub fn parse_bool(key: &str, raw: &str) -> Option<bool> {
    parse_int(key, raw).map(|value| value == 1)
}

/// Lists are stored as a JSON array of strings.
pub fn parse_list(key: &str, raw: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(values) => Some(values),
        Err(err) => {
            warn!(
                key,
                error = %err,
                "Could not parse configuration value. Value needs to be a valid json list of strings."
            );
            None
        }
    }
}

pub fn encode_bool(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

pub fn encode_list<S: AsRef<str>>(values: &[S]) -> Result<String, serde_json::Error> {
    let values: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
    serde_json::to_string(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("b", "1"), Some(true));
        assert_eq!(parse_bool("b", "0"), Some(false));
        assert_eq!(parse_bool("b", "2"), Some(false));
        assert_eq!(parse_bool("b", "yes"), None);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_int("i", "-42"), Some(-42));
        assert_eq!(parse_float("f", "1.5"), Some(1.5));
        assert_eq!(parse_float("f", "3"), Some(3.0));
    }

    #[test]
    #[traced_test]
    fn test_parse_int_failure_is_logged() {
        assert_eq!(parse_int("retries", "many"), None);
        assert!(logs_contain("Could not convert configuration value to int"));
    }

    #[test]
    fn test_list_encoding() {
        let encoded = encode_list(&["default"]).unwrap();
        assert_eq!(encoded, "[\"default\"]");
        assert_eq!(
            parse_list("l", &encoded),
            Some(vec!["default".to_string()])
        );
        assert_eq!(parse_list("l", "not json"), None);
        assert_eq!(parse_list("l", "[1, 2]"), None);
    }

    #[test]
    fn test_encode_bool() {
        assert_eq!(encode_bool(true), "1");
        assert_eq!(encode_bool(false), "0");
    }
}
