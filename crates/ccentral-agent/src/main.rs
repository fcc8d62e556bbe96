// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use ccentral::{CCentral, ClientConfig, MemoryStore};

const HEARTBEAT_INTERVAL: u64 = 10;
const ENV_OFFLINE: &str = "CCENTRAL_OFFLINE";

#[tokio::main]
pub async fn main() {
    let config = ClientConfig::from_env_iter(env::vars());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", config.log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    if let Err(e) = config.validate() {
        error!("Error creating config on ccentral agent startup: {e}");
        return;
    }

    let offline = env::var(ENV_OFFLINE)
        .map(|val| val.to_lowercase() == "true")
        .unwrap_or(false);

    let client = if offline {
        info!("Offline mode, keeping state in memory");
        let store = MemoryStore::with_paths(config.paths());
        CCentral::new(config, Arc::new(store))
    } else {
        CCentral::connect_etcd(config)
    };
    let client = match client {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to create ccentral client: {e}");
            return;
        }
    };
    info!(client_id = client.client_id(), "ccentral agent started");

    let heartbeat_key = client
        .add_int_field(
            "heartbeat_interval",
            "Heartbeat interval",
            "Seconds between agent heartbeats",
            HEARTBEAT_INTERVAL as i64,
        )
        .await;
    let log_key = client
        .add_bool_field(
            "log_telemetry",
            "Log telemetry",
            "Log engine counters on every heartbeat",
            false,
        )
        .await;
    for key in [&heartbeat_key, &log_key] {
        let registered = client.add_callback(key, |key: &str| {
            info!("Configuration '{key}' changed, applying on next heartbeat");
        });
        if let Err(e) = registered {
            error!("Unable to watch configuration '{key}': {e}");
        }
    }
    client
        .add_instance_info("agent", env!("CARGO_PKG_VERSION"))
        .await;

    let mut period = heartbeat_period(&client, &heartbeat_key).await;
    let mut heartbeat = interval(period);
    heartbeat.tick().await; // discard first tick, which is instantaneous

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down ccentral agent");
                break;
            }
        }

        let started = Instant::now();
        client.increment_counter::<&str>("heartbeat", &[]).await;
        client.refresh().await;
        client.add_histogram("refresh", started.elapsed()).await;

        if client.get_config_bool(&log_key).await.unwrap_or(false) {
            info!("Engine telemetry: {}", client.telemetry());
        }

        let next = heartbeat_period(&client, &heartbeat_key).await;
        if next != period {
            debug!("Heartbeat interval changed to {next:?}");
            period = next;
            heartbeat = interval(period);
            heartbeat.tick().await;
        }
    }
}

async fn heartbeat_period(client: &CCentral, key: &str) -> Duration {
    let secs = client
        .get_config_int(key)
        .await
        .and_then(|secs| u64::try_from(secs).ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(HEARTBEAT_INTERVAL);
    Duration::from_secs(secs)
}
