//! CLI command implementations.

pub mod agent;
pub mod context;
pub mod conversation;
pub mod export;
pub mod grade;
pub mod messages;
pub mod serve;
