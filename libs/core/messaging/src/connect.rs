//! Broker connection and stream bootstrap.

use std::time::Duration;

use async_nats::jetstream::{self, Context};
use tracing::{debug, info};

use crate::error::BusError;
use crate::{AUTH_TOPIC, DAILY_TOPIC, LOGS_TOPIC};

const CONNECT_ATTEMPTS: u32 = 4;
const CONNECT_DELAY_STEP: Duration = Duration::from_millis(500);

/// Connect to the broker and return a JetStream context.
///
/// `servers` is a comma-separated server list.
pub async fn connect(servers: &str) -> Result<Context, BusError> {
    info!(servers = %servers, "Connecting to message broker...");

    let client = async_nats::connect(servers)
        .await
        .map_err(|e| BusError::ConnectFailed(e.to_string()))?;

    info!("Successfully connected to message broker");
    Ok(jetstream::new(client))
}

/// Connect with startup retries: four attempts, 500 ms step doubling.
pub async fn connect_with_retry(servers: &str) -> Result<Context, BusError> {
    let mut delay = CONNECT_DELAY_STEP;

    for attempt in 1..=CONNECT_ATTEMPTS {
        match connect(servers).await {
            Ok(context) => return Ok(context),
            Err(e) if attempt == CONNECT_ATTEMPTS => return Err(e),
            Err(e) => {
                debug!(
                    "Broker connection failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempt, CONNECT_ATTEMPTS, e, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    unreachable!("retry loop covers every attempt")
}

/// Create the three service streams if they do not exist yet.
///
/// Each logical topic is a stream with a single identically-named subject.
pub async fn ensure_streams(jetstream: &Context) -> Result<(), BusError> {
    for topic in [AUTH_TOPIC, DAILY_TOPIC, LOGS_TOPIC] {
        jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: topic.to_string(),
                subjects: vec![topic.to_string()],
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::StreamSetup(e.to_string()))?;
    }
    Ok(())
}
