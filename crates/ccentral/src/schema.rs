// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Declared configuration fields.
//!
//! The schema is what the administration UI renders: one entry per field with
//! a title, description, type, and string-encoded default. It never carries
//! the runtime value pulled from the store; that lives in [`crate::sync`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Value type of a configuration field. Every value is stored as a string;
/// the type tells the UI how to edit it and the typed getters how to parse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    /// Hidden in the UI and never echoed in logs.
    Password,
    Integer,
    Float,
    /// JSON array of strings.
    List,
    /// `"1"` for true, `"0"` for false.
    Boolean,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Password => "password",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::List => "list",
            FieldType::Boolean => "boolean",
        }
    }

    /// Whether values of this type must stay out of logs.
    pub fn is_sensitive(self) -> bool {
        matches!(self, FieldType::Password)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared field, serialized as `{key, title, description, type, default}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub key: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(rename = "default")]
    pub default_value: String,
}

/// Strips a user-supplied key down to `[A-Za-z0-9_-]`, turning spaces into underscores.
///
/// Used for field keys, counter keys and groups, histogram keys, and info keys
/// so every name that ends up in a store path or JSON key is safe.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|ch| if ch == ' ' { '_' } else { ch })
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-')
        .collect()
}

/// Set of declared fields keyed by sanitized key.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    fields: BTreeMap<String, SchemaField>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field and returns its sanitized key.
    pub fn declare(
        &mut self,
        key: &str,
        title: &str,
        description: &str,
        default_value: &str,
        field_type: FieldType,
    ) -> String {
        let key = sanitize_key(key);
        self.fields.insert(
            key.clone(),
            SchemaField {
                key: key.clone(),
                title: title.to_string(),
                description: description.to_string(),
                field_type,
                default_value: default_value.to_string(),
            },
        );
        key
    }

    /// Looks up an already-sanitized key.
    pub fn get(&self, key: &str) -> Option<&SchemaField> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    /// Serializes the whole schema as the JSON document stored under `/schema`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }
}
