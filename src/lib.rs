//! State synchronization and navigation assist for the helmet companion app
//!
//! Services publish their current value on `tokio::sync::watch` channels;
//! the [`coordinator`] folds them into a single [`coordinator::ViewModel`]
//! for the rendering layer.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod geo;
pub mod messages;
pub mod providers;
pub mod services;

pub use error::{Error, Result};
