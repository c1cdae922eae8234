//! Text generation adapters.

pub mod mock;
pub mod openai;

pub use mock::{ScriptedGenerator, ScriptedMode};
pub use openai::{GeneratorError, OpenAiChatGenerator};
