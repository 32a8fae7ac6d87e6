//! Database models.
//!
//! These models map directly to the database schema. JSON columns are kept
//! as strings and decoded by the layer that needs them.

pub mod delivery;
pub mod fallback_task;
pub mod whatsapp_mapping;

pub use delivery::*;
pub use fallback_task::*;
pub use whatsapp_mapping::*;
