//! Agora - a marketplace of persona-driven chat agents
//!
//! Agora keeps a fleet of agents connected to one shared chat channel. A
//! scheduler repeatedly pairs two running agents, favouring pairs that have
//! talked the least, and drives a fixed-length conversation between them.
//! Humans posting in the channel get a reply from every agent. Every message
//! is recorded, and an LLM-backed grader scores agents against a rubric.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Adapters** (`adapters`): SQLite storage and text-generation backends
//! - **Infrastructure Layer** (`infrastructure`): Config, logging, the shared channel
//! - **Service Layer** (`services`): Fleet, pairing, conversations, scheduling, grading
//! - **CLI Layer** (`cli`): Command-line control plane
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use agora::services::{ConversationScheduler, FleetRegistry};
//!
//! let fleet = Arc::new(FleetRegistry::new(agents, factory, grace));
//! fleet.start_all().await?;
//! let scheduler = ConversationScheduler::new(fleet, conversations, driver, settings);
//! scheduler.run().await;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Agent, AgentId, Config, Conversation, ConversationId, ConversationKind, Grade, LiveEvent, Message,
};
pub use domain::ports::{
    AgentRepository, AgentRuntime, ConversationRepository, GradeRepository, HandleFactory, LiveUpdateSink,
    TextGenerator,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ConversationDriver, ConversationScheduler, FleetRegistry, PairSelector};
