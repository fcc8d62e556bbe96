// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! etcd v2 keys API backend.
//!
//! Writes are `PUT /v2/keys/<path>` with a form body carrying `value` and an
//! optional `ttl`; reads are `GET /v2/keys/<path>` answering
//! `{"node": {"value": ..}}`. Several endpoints can be configured; a
//! transport failure on one moves on to the next, while an HTTP status from
//! a reachable endpoint is final.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{StoreClient, StorePaths};
use crate::error::StoreError;

const KEYS_PREFIX: &str = "/v2/keys";

/// Connection settings for [`EtcdStore`].
#[derive(Debug, Clone)]
pub struct EtcdStoreConfig {
    /// Base URLs such as `http://127.0.0.1:2379`, tried in order.
    pub endpoints: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    pub paths: StorePaths,
}

impl Default for EtcdStoreConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["http://127.0.0.1:2379".to_string()],
            timeout: Duration::from_secs(20),
            paths: StorePaths::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Option<KeysNode>,
}

#[derive(Debug, Deserialize)]
struct KeysNode {
    value: Option<String>,
}

/// [`super::StoreClient`] over HTTP against an etcd cluster.
#[derive(Debug, Clone)]
pub struct EtcdStore {
    client: Client,
    endpoints: Vec<String>,
    paths: StorePaths,
}

impl EtcdStore {
    pub fn new(config: EtcdStoreConfig) -> Result<Self, StoreError> {
        let endpoints: Vec<String> = config
            .endpoints
            .iter()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(StoreError::NoEndpoints);
        }
        for endpoint in &endpoints {
            debug!(endpoint = %endpoint, "Creating etcd connection");
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoints,
            paths: config.paths,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn put(&self, path: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut form = vec![("value", value.to_string())];
        if let Some(ttl) = ttl {
            form.push(("ttl", ttl.as_secs().to_string()));
        }
        let response = self.send(Method::PUT, path, Some(form.as_slice())).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(status_error(response).await)
    }

    async fn get(&self, path: &str) -> Result<Option<String>, StoreError> {
        let response = self.send(Method::GET, path, None).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(path, "etcd key not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(response).await);
        }
        let body = response.bytes().await?;
        let parsed: KeysResponse = serde_json::from_slice(&body)?;
        match parsed.node {
            Some(KeysNode { value: Some(value) }) => Ok(Some(value)),
            _ => Err(StoreError::Payload(format!("{path} is not a value node"))),
        }
    }

    /// Sends the request to each endpoint in turn until one answers.
    async fn send(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<reqwest::Response, StoreError> {
        let mut last_error = None;
        for endpoint in &self.endpoints {
            let url = format!("{endpoint}{KEYS_PREFIX}{path}");
            debug!(method = %method, url = %url, "etcd request");
            let builder = self.client.request(method.clone(), url.as_str());
            let builder = match form {
                Some(form) => builder.form(form),
                None => builder,
            };
            match builder.send().await {
                Ok(response) => {
                    debug!(method = %method, url = %url, status = %response.status(), "etcd response");
                    return Ok(response);
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "etcd endpoint unreachable, trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.map_or(StoreError::NoEndpoints, StoreError::Transport))
    }
}

async fn status_error(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    StoreError::Status { status, url, body }
}

#[async_trait]
impl StoreClient for EtcdStore {
    async fn put_schema(&self, service_id: &str, schema_json: &str) -> Result<(), StoreError> {
        self.put(&self.paths.schema(service_id), schema_json, None)
            .await
    }

    async fn get_config(&self, service_id: &str) -> Result<Option<String>, StoreError> {
        self.get(&self.paths.config(service_id)).await
    }

    async fn put_client_info(
        &self,
        service_id: &str,
        client_id: &str,
        json: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.put(&self.paths.client(service_id, client_id), json, Some(ttl))
            .await
    }

    async fn put_service_info(
        &self,
        service_id: &str,
        info_key: &str,
        data: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.put(&self.paths.service_info(service_id, info_key), data, Some(ttl))
            .await
    }
}
