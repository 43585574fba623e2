//! Core pipeline logic
//!
//! Domain models, the queue abstraction, the stages and the collaborators they share.

pub mod dedup;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod rate_limiter;
pub mod targets;
pub mod tracker;
