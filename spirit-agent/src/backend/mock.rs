//! Mock generative backend for testing.

use async_trait::async_trait;
use guardian_core::BioScanResult;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::traits::*;

/// Mock backend for testing.
///
/// Serves both text and vision with configurable responses.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    response_content: String,
    scan_result: BioScanResult,
    call_count: AtomicU32,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            response_content: "Mock response".to_string(),
            scan_result: BioScanResult {
                common_name: "Great tit".to_string(),
                scientific_name: "Parus major".to_string(),
                ecology_fact: "Eats thousands of caterpillars each spring.".to_string(),
                confidence: 0.9,
            },
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the text response content.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response_content = content.into();
        self
    }

    /// Set the vision classification result.
    pub fn with_scan_result(mut self, result: BioScanResult) -> Self {
        self.scan_result = result;
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Toggle availability on a shared instance.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of text and vision calls made.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable("Mock backend disabled".to_string()));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.check()?;
        Ok(CompletionResponse {
            content: self.response_content.clone(),
            truncated: false,
        })
    }
}

#[async_trait]
impl VisionBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn classify(&self, _image: &ImageInput) -> Result<BioScanResult, LlmError> {
        self.check()?;
        Ok(self.scan_result.clone())
    }
}
