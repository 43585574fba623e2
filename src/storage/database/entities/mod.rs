/// Bulk action entity module
pub mod bulk_action;
/// Contact entity module
pub mod contact;
/// Push job entity module
pub mod push_job;

pub use bulk_action::Entity as BulkAction;
pub use contact::Entity as Contact;
pub use push_job::Entity as PushJob;
