//! Configuration validation
//!
//! The validation is organized into several submodules:
//! - `trait_def`: Core Validate trait definition
//! - `storage_validators`: database, Redis and file storage validators
//! - `pipeline_validators`: queue, rate limit, ingestion, dedup and scheduler validators
//! - `tests`: Test suite for all validators

mod pipeline_validators;
mod storage_validators;
mod trait_def;

pub use trait_def::Validate;
