//! OpenAI-compatible backend.
//!
//! Works with any OpenAI-compatible chat completions API (vLLM, Ollama,
//! OpenAI, LocalAI). Vision requests send the photo as a `data:` URL part
//! and ask for a JSON object.

use async_trait::async_trait;
use guardian_core::BioScanResult;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::traits::*;

const SPECIES_INSTRUCTION: &str = "Identify the plant or animal in this image. Provide its common name, \
scientific name, and a short ecological fun fact (max 15 words). Return a JSON object with the keys \
commonName, scientificName, ecologyFact and confidence (a number between 0 and 1).";

/// OpenAI-compatible backend.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    /// Create a backend pointing to Ollama.
    pub fn ollama(model: &str) -> Self {
        Self::new("http://localhost:11434/v1", model, None)
    }

    /// Create a backend for OpenAI API.
    pub fn openai(model: &str, api_key: impl Into<String>) -> Self {
        Self::new("https://api.openai.com/v1", model, Some(api_key.into()))
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {}", k))
    }

    async fn send(&self, chat_request: &ChatRequest) -> Result<Choice, LlmError> {
        let mut http_request = self.client.post(self.chat_completions_url());

        if let Some(auth) = self.auth_header() {
            http_request = http_request.header(header::AUTHORIZATION, auth);
        }

        let response = http_request
            .json(chat_request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited { retry_after_ms: None });
            }
            if status.is_server_error() {
                return Err(LlmError::Unavailable(format!("HTTP {}", status)));
            }

            return Err(LlmError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("No choices in response".to_string()))
    }
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatRequest>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormatRequest {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);

        if let Some(auth) = self.auth_header() {
            request = request.header(header::AUTHORIZATION, auth);
        }

        request
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut messages: Vec<ChatMessage> = Vec::new();

        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: ChatContent::Text(system.clone()),
            });
        }

        for msg in &request.messages {
            messages.push(ChatMessage {
                role: msg.role.as_str().to_string(),
                content: ChatContent::Text(msg.content.clone()),
            });
        }

        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: None,
            stream: false,
        };

        let choice = self.send(&chat_request).await?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            truncated: choice.finish_reason.as_deref() == Some("length"),
        })
    }
}

#[async_trait]
impl VisionBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn classify(&self, image: &ImageInput) -> Result<BioScanResult, LlmError> {
        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: ChatContent::Parts(vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image.data_url() },
                    },
                    ContentPart::Text {
                        text: SPECIES_INSTRUCTION.to_string(),
                    },
                ]),
            }],
            max_tokens: Some(256),
            temperature: Some(0.2),
            response_format: Some(ResponseFormatRequest {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        };

        let choice = self.send(&chat_request).await?;
        let content = choice.message.content.unwrap_or_default();

        serde_json::from_str::<BioScanResult>(content.trim())
            .map_err(|e| LlmError::ParseError(format!("species payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_creation() {
        let backend = OpenAiBackend::ollama("llama3.2");
        assert_eq!(LlmBackend::id(&backend), "llama3.2");
        assert_eq!(backend.chat_completions_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = OpenAiBackend::new("http://localhost:8000/v1/", "m", Some("k".to_string()));
        assert_eq!(backend.chat_completions_url(), "http://localhost:8000/v1/chat/completions");
        assert_eq!(backend.auth_header().as_deref(), Some("Bearer k"));
    }

    #[test]
    fn test_vision_message_shape() {
        let message = ChatMessage {
            role: "user".to_string(),
            content: ChatContent::Parts(vec![ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/jpeg;base64,AAAA".to_string(),
                },
            }]),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["content"][0]["type"], "image_url");
        assert_eq!(json["content"][0]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
    }
}
