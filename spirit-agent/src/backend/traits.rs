//! Core traits for generative backends.
//!
//! `LlmBackend` produces short flavor text. `VisionBackend` classifies a
//! species photo. Neither is ever consulted for a correctness-affecting value.

use async_trait::async_trait;
use guardian_core::BioScanResult;
use serde::{Deserialize, Serialize};

/// Error types for generative operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Backend is not available
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Rate limited by the backend
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Text generation backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend identifier (e.g., model name).
    fn id(&self) -> &str;

    /// Check if the backend is currently available.
    async fn is_available(&self) -> bool;

    /// Generate a completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Species classification backend.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    fn id(&self) -> &str;

    /// Identify the plant or animal in the image.
    async fn classify(&self, image: &ImageInput) -> Result<BioScanResult, LlmError>;
}

/// Base64 encoded image handed to a vision backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub data_base64: String,
    pub mime_type: String,
}

impl ImageInput {
    pub fn jpeg(data_base64: impl Into<String>) -> Self {
        Self {
            data_base64: data_base64.into(),
            mime_type: "image/jpeg".to_string(),
        }
    }

    /// `data:` URL form used by OpenAI-compatible APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

/// Request for text completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System prompt (optional)
    pub system_prompt: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0-2.0, default 1.0)
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new request with a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            ..Default::default()
        }
    }

    /// Add a system prompt.
    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Response from text completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Whether generation hit the token limit
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::user("hello")
            .with_system("be brief")
            .with_max_tokens(64)
            .with_temperature(5.0);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.max_tokens, Some(64));
        assert_eq!(request.temperature, Some(2.0));
    }

    #[test]
    fn test_data_url() {
        let image = ImageInput::jpeg("AAAA");
        assert_eq!(image.data_url(), "data:image/jpeg;base64,AAAA");
    }
}
