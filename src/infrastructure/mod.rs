//! Infrastructure layer module
//!
//! This module contains the runtime plumbing around the domain:
//! - Configuration management
//! - Logging infrastructure
//! - The shared in-process chat channel and its agent runtime
//!
//! Storage and text-generation adapters live in `crate::adapters`.

pub mod channel;
pub mod config;
pub mod logging;
