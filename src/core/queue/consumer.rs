//! Queue consumer loop

use super::broker::{Delivery, MessageHandler, QueueBroker};
use crate::utils::error::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Transient receive errors tolerated before the broker is asked to reconnect
const RECONNECT_AFTER_FAILURES: u32 = 3;

/// Pulls deliveries from one queue and runs up to `prefetch` handlers at a time
pub struct Consumer {
    broker: Arc<dyn QueueBroker>,
    queue: String,
    handler: Arc<dyn MessageHandler>,
    prefetch: usize,
    poll_interval: Duration,
    backoff: RetryPolicy,
}

impl Consumer {
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        queue: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            handler,
            prefetch: 1,
            poll_interval: Duration::from_millis(200),
            backoff: RetryPolicy::default(),
        }
    }

    pub fn prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    /// Longest single wait on an empty queue; bounds how fast shutdown is noticed
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Backoff between failed receives
    pub fn backoff(mut self, backoff: RetryPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run until `shutdown` turns true (or its sender is dropped), then drain in-flight handlers
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Consuming {} (prefetch {})",
            self.queue, self.prefetch
        );

        let permits = Arc::new(Semaphore::new(self.prefetch));
        let mut in_flight = JoinSet::new();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match self.broker.receive(&self.queue, self.poll_interval).await {
                Ok(Some(delivery)) => {
                    failures = 0;
                    let broker = self.broker.clone();
                    let handler = self.handler.clone();
                    in_flight.spawn(async move {
                        handle_delivery(broker, handler, delivery).await;
                        drop(permit);
                    });
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    drop(permit);
                    failures += 1;
                    let delay = self.backoff.delay_for(failures);
                    warn!(
                        "Receive from {} failed ({} in a row): {}; retrying in {:?}",
                        self.queue, failures, e, delay
                    );
                    if e.is_transient() && failures % RECONNECT_AFTER_FAILURES == 0 {
                        if let Err(e) = self.broker.reconnect().await {
                            error!("Broker reconnect failed: {}", e);
                        }
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    error!("Handler task for {} panicked: {}", self.queue, e);
                }
            }
        }

        debug!(
            "Stopping consumer for {}, draining {} handlers",
            self.queue,
            in_flight.len()
        );
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                error!("Handler task for {} panicked: {}", self.queue, e);
            }
        }
        info!("Consumer for {} stopped", self.queue);
    }
}

async fn handle_delivery(
    broker: Arc<dyn QueueBroker>,
    handler: Arc<dyn MessageHandler>,
    delivery: Delivery,
) {
    let disposition = handler.handle(&delivery).await;
    debug!("Settling delivery on {} as {:?}", delivery.queue, disposition);
    if let Err(e) = broker.settle(&delivery, disposition).await {
        error!(
            "Failed to settle delivery on {} ({:?}): {}",
            delivery.queue, disposition, e
        );
    }
}
