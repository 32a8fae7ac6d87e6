//! Repository layer for database access.
//!
//! Each store is a trait with an sqlx-backed implementation so the delivery
//! and confirmation logic can be exercised against fakes.

pub mod delivery;
pub mod fallback_queue;
pub mod whatsapp_mapping;

pub use delivery::*;
pub use fallback_queue::*;
pub use whatsapp_mapping::*;
