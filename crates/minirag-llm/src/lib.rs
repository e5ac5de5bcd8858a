//! Answer generation against a local Ollama server.

pub mod error;
pub mod ollama;
pub mod prompt;

pub use error::LlmError;
pub use ollama::OllamaGenerator;
pub use prompt::render_prompt;
