//! Domain models for mail records

mod email;
mod sort;

pub use email::{Email, EmailBuilder, MessageId, StoredEmail};
pub use sort::SortOrder;
