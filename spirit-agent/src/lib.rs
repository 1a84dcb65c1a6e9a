//! Spirit Agent - generative content for the Living Territory
//!
//! Narrative decoration and species identification behind trait-based backends:
//! - Text backends (OpenAI-compatible, mock) for chronicles, echoes and advice
//! - Vision backends returning a [`BioScanResult`](guardian_core::BioScanResult)
//! - Canned fallbacks so narrative never blocks a state transition
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              SpiritOracle               │
//! │   (prompts, backend selection,          │
//! │    fallback narrative)                  │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌───────────────┐
//! │ LlmBackend  │       │ VisionBackend │
//! │ (OpenAI/    │       │ (OpenAI/Mock) │
//! │  Mock)      │       │               │
//! └─────────────┘       └───────────────┘
//! ```

pub mod backend;
pub mod prompt;
pub mod service;

// Re-export main types for convenience
pub use backend::traits::{
    CompletionRequest, CompletionResponse, ImageInput, LlmBackend, LlmError, VisionBackend,
};
pub use backend::{MockBackend, OpenAiBackend};
pub use prompt::{PromptAssembler, SpiritContext, CORRUPTED_SIGNAL};
pub use service::{EchoOutcome, OracleConfig, ServiceError, SpiritOracle};
