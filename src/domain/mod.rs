//! Domain layer for the Agora agent fleet
//!
//! This module contains core models, errors and the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
