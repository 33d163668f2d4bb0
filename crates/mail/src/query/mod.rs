//! Query API for UI consumption
//!
//! Provides view-ready projections over stored records.

mod senders;

pub use senders::{SenderGroup, Selection, group_by_sender, list_sender_groups};
