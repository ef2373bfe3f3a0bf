//! Consuming side of the bus: durable claim loop with bounded-concurrency
//! dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::consumer::{pull, Consumer};
use async_nats::jetstream::{self, Context};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::BusError;

const FETCH_BATCH_SIZE: usize = 10;
const FETCH_EXPIRES: Duration = Duration::from_secs(5);
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Classified handler failure. Both variants are logged and the message
/// stays consumed; the distinction only shapes the log line.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The payload could not be decoded. Dropped rather than redelivered so
    /// a poison message never blocks its partition.
    #[error("malformed message: {0}")]
    Poison(String),

    /// Decoding succeeded but handling failed (e.g. the SMTP send).
    #[error("processing failed: {0}")]
    Failed(String),
}

/// A per-topic message handler.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Handle one claimed message. Called concurrently, up to the worker's
    /// admission cap.
    async fn process(&self, topic: &str, payload: &[u8]) -> Result<(), ProcessingError>;

    fn name(&self) -> &'static str;
}

/// Admission-controlled handler dispatch.
///
/// Handlers detach from the claim loop: [`Dispatcher::dispatch`] acquires a
/// semaphore permit, spawns the handler and returns. [`Dispatcher::drain`]
/// blocks until every in-flight handler has released its permit.
pub struct Dispatcher<P> {
    processor: Arc<P>,
    limiter: Arc<Semaphore>,
    max_concurrent: usize,
}

impl<P: Processor + 'static> Dispatcher<P> {
    pub fn new(processor: P, max_concurrent: usize) -> Self {
        Self {
            processor: Arc::new(processor),
            limiter: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Dispatch one message to the processor on its own task. Waits for an
    /// admission permit, so at most `max_concurrent` handlers run at once.
    pub async fn dispatch(&self, topic: &'static str, payload: Bytes) {
        let permit = self
            .limiter
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");
        let processor = self.processor.clone();

        tokio::spawn(async move {
            match processor.process(topic, &payload).await {
                Ok(()) => debug!(topic = %topic, "Message processed"),
                Err(ProcessingError::Poison(msg)) => {
                    error!(topic = %topic, error = %msg, "Dropping malformed message");
                }
                Err(ProcessingError::Failed(msg)) => {
                    error!(topic = %topic, error = %msg, "Message handler failed");
                }
            }
            drop(permit);
        });
    }

    /// Wait until all in-flight handlers have finished.
    pub async fn drain(&self) {
        let _all = self
            .limiter
            .acquire_many(self.max_concurrent as u32)
            .await
            .expect("admission semaphore is never closed");
    }
}

/// Durable consumer worker.
///
/// Joins the named consumer group on each topic and runs one claim loop per
/// topic. Claimed messages are acknowledged immediately after their handler
/// is dispatched: at-least-once across the bus, at-most-once per handler
/// run. On shutdown the claim loops exit, then [`Worker::run`] drains the
/// dispatcher before returning so no handler is abandoned mid-send.
pub struct Worker<P> {
    consumers: Vec<(&'static str, Consumer<pull::Config>)>,
    dispatcher: Arc<Dispatcher<P>>,
}

impl<P: Processor + 'static> Worker<P> {
    /// Create the worker, provisioning streams and durable consumers.
    pub async fn new(
        jetstream: &Context,
        topics: &[&'static str],
        group: &str,
        processor: P,
        max_concurrent: usize,
    ) -> Result<Self, BusError> {
        let mut consumers = Vec::with_capacity(topics.len());

        for topic in topics {
            let stream = jetstream
                .get_or_create_stream(jetstream::stream::Config {
                    name: topic.to_string(),
                    subjects: vec![topic.to_string()],
                    ..Default::default()
                })
                .await
                .map_err(|e| BusError::StreamSetup(e.to_string()))?;

            let consumer = stream
                .get_or_create_consumer(
                    group,
                    pull::Config {
                        durable_name: Some(group.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| BusError::StreamSetup(e.to_string()))?;

            consumers.push((*topic, consumer));
        }

        Ok(Self {
            consumers,
            dispatcher: Arc::new(Dispatcher::new(processor, max_concurrent)),
        })
    }

    /// Run the claim loops until shutdown, then drain in-flight handlers.
    pub async fn run(&self, shutdown_rx: watch::Receiver<bool>) -> Result<(), BusError> {
        info!(
            processor = %self.dispatcher.processor.name(),
            topics = ?self.consumers.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            "Starting consumer worker"
        );

        let mut loops = Vec::with_capacity(self.consumers.len());
        for (topic, consumer) in &self.consumers {
            loops.push(tokio::spawn(claim_loop(
                *topic,
                consumer.clone(),
                self.dispatcher.clone(),
                shutdown_rx.clone(),
            )));
        }

        for handle in loops {
            if let Err(e) = handle.await {
                error!(error = %e, "Claim loop panicked");
            }
        }

        info!("Claim loops stopped, waiting for in-flight handlers...");
        self.dispatcher.drain().await;
        info!("Consumer worker stopped");
        Ok(())
    }
}

/// Claim messages from one topic until shutdown.
///
/// Retriable consumer errors (rebalance, broker hiccup) are logged and the
/// loop re-enters after a short pause.
async fn claim_loop<P: Processor + 'static>(
    topic: &'static str,
    consumer: Consumer<pull::Config>,
    dispatcher: Arc<Dispatcher<P>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!(topic = %topic, "Shutdown signal received, stopping claim loop");
                    return;
                }
            }

            result = claim_batch(topic, &consumer, &dispatcher) => {
                if let Err(e) = result {
                    warn!(topic = %topic, error = %e, "Claim failed, re-entering loop");
                    tokio::time::sleep(RETRY_PAUSE).await;
                }
            }
        }
    }
}

/// Fetch one batch and dispatch every claimed message.
async fn claim_batch<P: Processor + 'static>(
    topic: &'static str,
    consumer: &Consumer<pull::Config>,
    dispatcher: &Dispatcher<P>,
) -> Result<(), BusError> {
    let mut batch = consumer
        .fetch()
        .max_messages(FETCH_BATCH_SIZE)
        .expires(FETCH_EXPIRES)
        .messages()
        .await
        .map_err(|e| BusError::ConsumeFailed(e.to_string()))?;

    while let Some(message) = batch.next().await {
        let message = message.map_err(|e| BusError::ConsumeFailed(e.to_string()))?;

        dispatcher.dispatch(topic, message.payload.clone()).await;

        // Commit right after dispatch, not after completion: a failed send
        // is logged and lost instead of blocking the partition.
        if let Err(e) = message.ack().await {
            warn!(topic = %topic, error = %e, "Failed to ack message");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records how many handlers run at the same time.
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
        processed: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                processed: AtomicUsize::new(0),
            }
        }
    }

    struct ProbeProcessor(Arc<ConcurrencyProbe>);

    #[async_trait]
    impl Processor for ProbeProcessor {
        async fn process(&self, _topic: &str, _payload: &[u8]) -> Result<(), ProcessingError> {
            let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.0.current.fetch_sub(1, Ordering::SeqCst);
            self.0.processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "probe"
        }
    }

    #[tokio::test]
    async fn test_dispatcher_respects_admission_cap() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let dispatcher = Dispatcher::new(ProbeProcessor(probe.clone()), 3);

        for _ in 0..20 {
            dispatcher.dispatch("auth", Bytes::from_static(b"a b c")).await;
        }
        dispatcher.drain().await;

        assert_eq!(probe.processed.load(Ordering::SeqCst), 20);
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_drain_waits_for_in_flight_handlers() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let dispatcher = Dispatcher::new(ProbeProcessor(probe.clone()), 2);

        dispatcher.dispatch("daily", Bytes::from_static(b"x y")).await;
        dispatcher.dispatch("daily", Bytes::from_static(b"x y")).await;
        dispatcher.drain().await;

        assert_eq!(probe.processed.load(Ordering::SeqCst), 2);
        assert_eq!(probe.current.load(Ordering::SeqCst), 0);
    }

    struct FailingProcessor;

    #[async_trait]
    impl Processor for FailingProcessor {
        async fn process(&self, _topic: &str, payload: &[u8]) -> Result<(), ProcessingError> {
            Err(ProcessingError::Poison(format!(
                "{} bytes of garbage",
                payload.len()
            )))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_dispatch_survives_handler_failures() {
        let dispatcher = Dispatcher::new(FailingProcessor, 2);

        for _ in 0..5 {
            dispatcher.dispatch("auth", Bytes::from_static(b"junk")).await;
        }
        // Failures are logged, never propagated; drain completes cleanly.
        dispatcher.drain().await;
    }
}
