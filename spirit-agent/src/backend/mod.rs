//! Generative backend abstraction layer.
//!
//! - OpenAI-compatible (vLLM, Ollama, OpenAI, etc.) for text and vision
//! - Mock backend for testing

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{
    CompletionRequest, CompletionResponse, ImageInput, LlmBackend, LlmError, VisionBackend,
};
