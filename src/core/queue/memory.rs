//! Single-process broker

use super::broker::{Delivery, QueueBroker, QueueDepth};
use crate::utils::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<String>,
    delayed: Vec<(Instant, String)>,
    in_flight: HashMap<String, String>,
}

impl QueueState {
    /// Move due delayed messages to ready, returning the next due time still pending
    fn promote_due(&mut self, now: Instant) -> Option<Instant> {
        if self.delayed.is_empty() {
            return None;
        }
        self.delayed.sort_by_key(|(due, _)| *due);
        let split = self.delayed.partition_point(|(due, _)| *due <= now);
        for (_, body) in self.delayed.drain(..split) {
            self.ready.push_back(body);
        }
        self.delayed.first().map(|(due, _)| *due)
    }
}

#[derive(Debug, Default)]
struct Inner {
    queues: Mutex<HashMap<String, QueueState>>,
    notify: Notify,
    next_tag: AtomicU64,
}

/// In-memory `QueueBroker`; messages do not survive the process
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every ready message of a queue, promoting due delayed ones first
    pub fn drain(&self, queue: &str) -> Vec<String> {
        let mut queues = self.inner.queues.lock();
        let state = queues.entry(queue.to_string()).or_default();
        state.promote_due(Instant::now());
        state.ready.drain(..).collect()
    }

    /// Bodies of the delayed messages of a queue with their remaining delay
    pub fn delayed(&self, queue: &str) -> Vec<(Duration, String)> {
        let now = Instant::now();
        let queues = self.inner.queues.lock();
        queues
            .get(queue)
            .map(|state| {
                state
                    .delayed
                    .iter()
                    .map(|(due, body)| (due.saturating_duration_since(now), body.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Take a ready message, returning the next delayed due time when none is ready
    fn try_take(&self, queue: &str) -> (Option<Delivery>, Option<Instant>) {
        let mut queues = self.inner.queues.lock();
        let state = queues.entry(queue.to_string()).or_default();
        let next_due = state.promote_due(Instant::now());

        match state.ready.pop_front() {
            Some(body) => {
                let tag = self.inner.next_tag.fetch_add(1, Ordering::Relaxed).to_string();
                state.in_flight.insert(tag.clone(), body.clone());
                let delivery = Delivery {
                    queue: queue.to_string(),
                    body,
                    tag,
                };
                (Some(delivery), next_due)
            }
            None => (None, next_due),
        }
    }

    fn settle(&self, delivery: &Delivery, requeue: bool) {
        let mut queues = self.inner.queues.lock();
        if let Some(state) = queues.get_mut(&delivery.queue) {
            if let Some(body) = state.in_flight.remove(&delivery.tag) {
                if requeue {
                    state.ready.push_front(body);
                }
            }
        }
        drop(queues);
        if requeue {
            self.inner.notify.notify_waiters();
        }
    }
}

#[async_trait]
impl QueueBroker for MemoryBroker {
    async fn declare(&self, queue: &str) -> Result<()> {
        self.inner
            .queues
            .lock()
            .entry(queue.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &str) -> Result<()> {
        self.inner
            .queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .ready
            .push_back(body.to_string());
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn publish_delayed(&self, queue: &str, body: &str, delay: Duration) -> Result<()> {
        debug!("Delaying message on {} by {:?}", queue, delay);
        self.inner
            .queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .delayed
            .push((Instant::now() + delay, body.to_string()));
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (delivery, next_due) = self.try_take(queue);
            if delivery.is_some() {
                return Ok(delivery);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wake_at = next_due.map_or(deadline, |due| due.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.settle(delivery, false);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<()> {
        self.settle(delivery, requeue);
        Ok(())
    }

    async fn recover(&self, queue: &str) -> Result<usize> {
        let mut queues = self.inner.queues.lock();
        let state = queues.entry(queue.to_string()).or_default();
        let mut tags: Vec<String> = state.in_flight.keys().cloned().collect();
        tags.sort_by_key(|tag| tag.parse::<u64>().unwrap_or(u64::MAX));
        let recovered = tags.len();
        for tag in tags.into_iter().rev() {
            if let Some(body) = state.in_flight.remove(&tag) {
                state.ready.push_front(body);
            }
        }
        drop(queues);
        if recovered > 0 {
            self.inner.notify.notify_waiters();
        }
        Ok(recovered)
    }

    async fn depth(&self, queue: &str) -> Result<QueueDepth> {
        let mut queues = self.inner.queues.lock();
        let state = queues.entry(queue.to_string()).or_default();
        state.promote_due(Instant::now());
        Ok(QueueDepth {
            ready: state.ready.len(),
            delayed: state.delayed.len(),
            in_flight: state.in_flight.len(),
        })
    }
}
