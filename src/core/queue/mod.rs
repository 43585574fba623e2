//! Durable queues
//!
//! Stages talk to each other only through a [`QueueBroker`]. Every delivered message
//! sits in its consumer's in-flight list until the handler acks or nacks it, so a crashed
//! worker's messages can be put back with [`QueueBroker::recover`].

mod broker;
mod consumer;
mod memory;
mod redis;

pub use broker::{Delivery, Disposition, MessageHandler, QueueBroker, QueueDepth};
pub use consumer::Consumer;
pub use memory::MemoryBroker;
pub use redis::RedisBroker;
