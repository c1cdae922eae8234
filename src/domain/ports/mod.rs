//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - AgentRepository, ConversationRepository, GradeRepository: storage
//! - AgentRuntime / HandleFactory: live agent sessions in the shared channel
//! - TextGenerator: chat-completion backends
//! - LiveUpdateSink: dashboard event fan-out

pub mod agent_repository;
pub mod agent_runtime;
pub mod conversation_repository;
pub mod grade_repository;
pub mod live_updates;
pub mod text_generator;

pub use agent_repository::AgentRepository;
pub use agent_runtime::{AgentRuntime, HandleFactory, EMPTY_REPLY, GENERATION_FAILED_REPLY};
pub use conversation_repository::{ConversationRepository, MessageFilter};
pub use grade_repository::GradeRepository;
pub use live_updates::{LiveUpdateSink, NullSink};
pub use text_generator::TextGenerator;
