// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client-side synchronization with a CCentral configuration service.
//!
//! A process declares the configuration fields it understands, reads their
//! values, and reports counters, histograms, and instance info. The
//! [`CCentral`] client keeps that state in sync with an etcd-backed store:
//! the schema is published once, config is pulled and diffed on an interval
//! with change listeners, and a per-instance telemetry document is uploaded
//! with a short TTL so dead instances age out.
//!
//! ```no_run
//! # async fn run() -> Result<(), ccentral::ClientError> {
//! use ccentral::{CCentral, ClientConfig};
//!
//! let client = CCentral::connect_etcd(ClientConfig::new("billing"))?;
//! client.add_int_field("workers", "Workers", "Worker pool size", 4).await;
//! let workers = client.get_config_int("workers").await.unwrap_or(4);
//! client.set_counter("pool_size", workers, &["workers"]).await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod client_data;
pub mod clock;
pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod histogram;
pub mod schema;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod typed;

pub use client::CCentral;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::{ClientError, StoreError};
pub use histogram::{HistogramAggregator, Snapshot};
pub use schema::{FieldType, SchemaField, SchemaRegistry};
pub use store::{EtcdStore, EtcdStoreConfig, MemoryStore, StoreClient, StorePaths};
pub use sync::ConfigListener;
pub use telemetry::EngineSnapshot;
