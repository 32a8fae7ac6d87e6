//! fallback-messaging library crate.
//!
//! Sends a notification on a primary channel and, unless the provider
//! confirms delivery within a grace period, resends it on a fallback
//! channel.

pub mod api;
pub mod channels;
pub mod config;
pub mod confirmation;
pub mod database;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod utils;

pub use error::{Error, Result};
