//! Domain models shared by every pipeline stage

pub mod action;
pub mod contact;
pub mod entity;
pub mod job;
pub mod messages;
pub mod query;

pub use action::{ActionStatus, BULK_UPDATE, BulkAction, CounterDelta, NewBulkAction, UploadedFile};
pub use contact::ContactRecord;
pub use entity::{EntityType, dedup_field_for};
pub use job::{JobCounts, JobStatus, NewPushJob, Payload, PushJob};
pub use messages::{ApplyMessage, DispatchMessage, IngestionMessage, JobPayload, decode, encode};
pub use query::{ActionFilter, JobFilter, Page, Pagination};
