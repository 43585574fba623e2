//! Broker and handler traits

use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A message taken from a queue and not yet settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub queue: String,
    pub body: String,
    /// Broker-specific handle used to settle the delivery
    pub tag: String,
}

/// What the broker should do with a handled delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message
    Ack,
    /// Discard the message, or put it back for immediate redelivery
    Nack { requeue: bool },
}

impl Disposition {
    pub const DISCARD: Disposition = Disposition::Nack { requeue: false };
    pub const REQUEUE: Disposition = Disposition::Nack { requeue: true };
}

/// Messages waiting in one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepth {
    pub ready: usize,
    pub delayed: usize,
    pub in_flight: usize,
}

/// At-least-once queue operations
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Ensure a queue exists; calling it again is harmless
    async fn declare(&self, queue: &str) -> Result<()>;

    /// Persist a message for delivery
    async fn publish(&self, queue: &str, body: &str) -> Result<()>;

    /// Make a message visible on `queue` no earlier than `delay` from now
    async fn publish_delayed(&self, queue: &str, body: &str, delay: Duration) -> Result<()>;

    /// Take the next message, waiting at most `wait` for one to arrive
    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>>;

    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<()>;

    /// Move this consumer's in-flight messages of `queue` back to ready,
    /// returning how many moved. Messages held by other consumers stay put.
    async fn recover(&self, queue: &str) -> Result<usize>;

    async fn depth(&self, queue: &str) -> Result<QueueDepth>;

    /// Re-establish the underlying connection after receive errors
    async fn reconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Settle a delivery according to a handler's disposition
    async fn settle(&self, delivery: &Delivery, disposition: Disposition) -> Result<()> {
        match disposition {
            Disposition::Ack => self.ack(delivery).await,
            Disposition::Nack { requeue } => self.nack(delivery, requeue).await,
        }
    }
}

/// Processes deliveries of one queue
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Disposition;
}
