//! Redis-backed broker
//!
//! Each queue `q` uses three keys:
//!
//! - `queue:{q}` - ready list (LPUSH on publish, consumed from the right)
//! - `queue:{q}:processing:{consumer}` - in-flight list owned by one consumer
//!   (LMOVE from ready, LREM on settle)
//! - `queue:{q}:delayed` - sorted set scored by due time in milliseconds
//!
//! Recovery only touches the recovering consumer's own in-flight list, so a
//! restarting worker never redelivers messages a live peer is still handling.
//! Each replica must therefore run with a distinct, stable consumer id.

use super::broker::{Delivery, QueueBroker, QueueDepth};
use crate::storage::redis::RedisPool;
use crate::utils::current_timestamp_millis;
use crate::utils::error::Result;
use async_trait::async_trait;
use redis::Script;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

const REGISTRY_KEY: &str = "queue:registry";
const PROMOTE_BATCH: usize = 100;

/// Moves due members of a delayed set onto the ready list in one step
const PROMOTE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
for _, member in ipairs(due) do
    redis.call('ZREM', KEYS[1], member)
    local sep = string.find(member, '|', 1, true)
    redis.call('LPUSH', KEYS[2], string.sub(member, sep + 1))
end
return #due
"#;

fn ready_key(queue: &str) -> String {
    format!("queue:{}", queue)
}

fn processing_key(queue: &str, consumer: &str) -> String {
    format!("queue:{}:processing:{}", queue, consumer)
}

fn delayed_key(queue: &str) -> String {
    format!("queue:{}:delayed", queue)
}

/// Production `QueueBroker` over the shared Redis connection
#[derive(Debug, Clone)]
pub struct RedisBroker {
    pool: RedisPool,
    poll_interval: Duration,
    consumer_id: String,
}

impl RedisBroker {
    pub fn new(pool: RedisPool, poll_interval: Duration, consumer_id: impl Into<String>) -> Self {
        Self {
            pool,
            poll_interval: poll_interval.max(Duration::from_millis(10)),
            consumer_id: consumer_id.into(),
        }
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    fn processing(&self, queue: &str) -> String {
        processing_key(queue, &self.consumer_id)
    }

    async fn promote_due(&self, queue: &str) -> Result<usize> {
        let delayed = delayed_key(queue);
        let ready = ready_key(queue);
        let now_ms = current_timestamp_millis();
        let script = Script::new(PROMOTE_SCRIPT);
        let promoted: usize = self
            .pool
            .run(|mut conn| {
                let mut invocation = script.key(&delayed);
                invocation.key(&ready).arg(now_ms).arg(PROMOTE_BATCH);
                async move { invocation.invoke_async(&mut conn).await }
            })
            .await?;
        if promoted > 0 {
            debug!("Promoted {} delayed messages on {}", promoted, queue);
        }
        Ok(promoted)
    }

    async fn take(&self, queue: &str) -> Result<Option<String>> {
        let ready = ready_key(queue);
        let processing = self.processing(queue);
        self.pool
            .run(|mut conn| {
                let cmd = redis::cmd("LMOVE")
                    .arg(&ready)
                    .arg(&processing)
                    .arg("RIGHT")
                    .arg("LEFT")
                    .to_owned();
                async move { cmd.query_async(&mut conn).await }
            })
            .await
    }

    async fn remove_in_flight(&self, delivery: &Delivery) -> Result<()> {
        let processing = self.processing(&delivery.queue);
        self.pool
            .run(|mut conn| {
                let cmd = redis::cmd("LREM")
                    .arg(&processing)
                    .arg(1)
                    .arg(&delivery.body)
                    .to_owned();
                async move { cmd.query_async(&mut conn).await }
            })
            .await
    }
}

#[async_trait]
impl QueueBroker for RedisBroker {
    async fn declare(&self, queue: &str) -> Result<()> {
        let _: () = self
            .pool
            .run(|mut conn| {
                let cmd = redis::cmd("SADD").arg(REGISTRY_KEY).arg(queue).to_owned();
                async move { cmd.query_async(&mut conn).await }
            })
            .await?;
        info!("Declared queue {}", queue);
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &str) -> Result<()> {
        let ready = ready_key(queue);
        self.pool
            .run(|mut conn| {
                let cmd = redis::cmd("LPUSH").arg(&ready).arg(body).to_owned();
                async move { cmd.query_async(&mut conn).await }
            })
            .await
    }

    async fn publish_delayed(&self, queue: &str, body: &str, delay: Duration) -> Result<()> {
        let delayed = delayed_key(queue);
        let due_ms = current_timestamp_millis() + delay.as_millis() as u64;
        let member = format!("{}|{}", Uuid::new_v4(), body);
        self.pool
            .run(|mut conn| {
                let cmd = redis::cmd("ZADD")
                    .arg(&delayed)
                    .arg(due_ms)
                    .arg(&member)
                    .to_owned();
                async move { cmd.query_async(&mut conn).await }
            })
            .await
    }

    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        loop {
            self.promote_due(queue).await?;
            if let Some(body) = self.take(queue).await? {
                return Ok(Some(Delivery {
                    queue: queue.to_string(),
                    tag: body.clone(),
                    body,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.remove_in_flight(delivery).await
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<()> {
        if requeue {
            let ready = ready_key(&delivery.queue);
            let _: () = self
                .pool
                .run(|mut conn| {
                    let cmd = redis::cmd("RPUSH")
                        .arg(&ready)
                        .arg(&delivery.body)
                        .to_owned();
                    async move { cmd.query_async(&mut conn).await }
                })
                .await?;
        }
        self.remove_in_flight(delivery).await
    }

    async fn recover(&self, queue: &str) -> Result<usize> {
        let ready = ready_key(queue);
        let processing = self.processing(queue);
        let mut recovered = 0;
        loop {
            let moved: Option<String> = self
                .pool
                .run(|mut conn| {
                    let cmd = redis::cmd("LMOVE")
                        .arg(&processing)
                        .arg(&ready)
                        .arg("LEFT")
                        .arg("RIGHT")
                        .to_owned();
                    async move { cmd.query_async(&mut conn).await }
                })
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            info!(
                "Recovered {} in-flight messages on {} for consumer {}",
                recovered, queue, self.consumer_id
            );
        }
        Ok(recovered)
    }

    async fn depth(&self, queue: &str) -> Result<QueueDepth> {
        let ready = ready_key(queue);
        let processing = self.processing(queue);
        let delayed = delayed_key(queue);
        let (ready, in_flight, delayed): (usize, usize, usize) = self
            .pool
            .run(|mut conn| {
                let pipe = redis::pipe()
                    .cmd("LLEN")
                    .arg(&ready)
                    .cmd("LLEN")
                    .arg(&processing)
                    .cmd("ZCARD")
                    .arg(&delayed)
                    .to_owned();
                async move { pipe.query_async(&mut conn).await }
            })
            .await?;
        Ok(QueueDepth {
            ready,
            delayed,
            in_flight,
        })
    }

    async fn reconnect(&self) -> Result<()> {
        self.pool.reconnect().await
    }
}
