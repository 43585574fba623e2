//! Creation and query operations on bulk actions

mod service;

pub use service::BulkActionService;
