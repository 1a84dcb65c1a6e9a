//! SpiritOracle - main entry point for generative content.
//!
//! Text generation never fails from the caller's point of view: every
//! narrative method returns a canned line when no backend answers.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use guardian_core::{BioScanResult, ImpactStats, WeatherType};

use crate::backend::traits::{CompletionRequest, ImageInput, LlmBackend, LlmError, VisionBackend};
use crate::prompt::{PromptAssembler, SpiritContext, CORRUPTED_SIGNAL};

/// Canned victory chronicle.
pub const FALLBACK_VICTORY: &str = "The territory has found its balance. Symbiosis is complete.";
/// Canned echo rewrite.
pub const FALLBACK_ECHO: &str = "A silent echo travels across the territory.";
/// Canned weather advice.
pub const FALLBACK_WEATHER_ADVICE: &str = "The sky guides your steps; listen to the breath of life.";
/// Canned oracle report.
pub const FALLBACK_REPORT: &str = "The Oracle is silent for now, Guardian.";

/// Error types for the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No backend available
    #[error("No generative backend available")]
    NoBackendAvailable,

    /// Backend error
    #[error("Backend error: {0}")]
    BackendError(#[from] LlmError),

    /// Backend did not answer in time
    #[error("Backend timed out after {0}ms")]
    Timeout(u64),
}

/// Configuration for the SpiritOracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Token budget per narrative request
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request timeout (ms)
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_tokens: 160,
            temperature: 0.9,
            timeout_ms: 15_000,
        }
    }
}

/// Result of poetizing a Guardian's echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoOutcome {
    /// Rewritten message, safe to publish
    Poetized(String),
    /// Moderation rejected the message
    Corrupted,
}

/// Generative-content collaborator.
pub struct SpiritOracle {
    config: OracleConfig,
    text_backends: Vec<Arc<dyn LlmBackend>>,
    vision_backends: Vec<Arc<dyn VisionBackend>>,
}

impl SpiritOracle {
    /// Create an oracle over the given text backends, tried in order.
    pub fn new(text_backends: Vec<Arc<dyn LlmBackend>>) -> Self {
        Self {
            config: OracleConfig::default(),
            text_backends,
            vision_backends: Vec::new(),
        }
    }

    /// An oracle with no backend: every narrative is the canned fallback.
    pub fn offline() -> Self {
        Self::new(Vec::new())
    }

    /// Add vision backends, tried in order.
    pub fn with_vision(mut self, backends: Vec<Arc<dyn VisionBackend>>) -> Self {
        self.vision_backends = backends;
        self
    }

    /// Create with configuration.
    pub fn with_config(mut self, config: OracleConfig) -> Self {
        self.config = config;
        self
    }

    /// Generate raw text for a prompt.
    pub async fn generate(&self, prompt: String) -> Result<String, ServiceError> {
        let backend = self.select_backend().await?;

        let request = CompletionRequest::user(prompt)
            .with_system(PromptAssembler::system_prompt())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        debug!(backend = backend.id(), "Requesting narrative");

        let response = tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            backend.complete(request),
        )
        .await
        .map_err(|_| ServiceError::Timeout(self.config.timeout_ms))??;

        Ok(response.content.trim().to_string())
    }

    /// Chronicle celebrating a completed collective mission.
    pub async fn narrate_victory(&self, mission_title: &str, goal_value: f64, unit: &str) -> String {
        let prompt = PromptAssembler::victory_chronicle(mission_title, goal_value, unit);
        self.generate_or(prompt, FALLBACK_VICTORY).await
    }

    /// Poetic, moderated rewrite of a Guardian's message.
    pub async fn poetize_echo(&self, raw_message: &str) -> EchoOutcome {
        let text = self
            .generate_or(PromptAssembler::poetize_echo(raw_message), FALLBACK_ECHO)
            .await;
        if text.contains(CORRUPTED_SIGNAL) {
            info!("Echo rejected by moderation");
            EchoOutcome::Corrupted
        } else {
            EchoOutcome::Poetized(text)
        }
    }

    /// Advice for the current weather.
    pub async fn weather_advice(&self, weather: WeatherType, temperature_c: f64) -> String {
        let prompt = PromptAssembler::weather_advice(weather, temperature_c);
        self.generate_or(prompt, FALLBACK_WEATHER_ADVICE).await
    }

    /// Prophetic report on a Guardian's impact.
    pub async fn guardian_report(&self, username: &str, level: u32, impact: &ImpactStats) -> String {
        let prompt = PromptAssembler::guardian_report(username, level, impact);
        self.generate_or(prompt, FALLBACK_REPORT).await
    }

    /// System instruction for a live spirit conversation.
    pub fn spirit_instruction(&self, context: &SpiritContext) -> String {
        PromptAssembler::spirit_instruction(context)
    }

    /// Identify a species. Confidence is passed through unvalidated.
    ///
    /// Backends are tried in order, each bounded by the configured timeout.
    pub async fn identify_species(&self, image: &ImageInput) -> Result<BioScanResult, ServiceError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut last_error = None;

        for backend in &self.vision_backends {
            match tokio::time::timeout(timeout, backend.classify(image)).await {
                Ok(Ok(result)) => {
                    debug!(
                        backend = backend.id(),
                        species = %result.scientific_name,
                        confidence = result.confidence,
                        "Species identified"
                    );
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    warn!(backend = backend.id(), error = %e, "Vision backend failed");
                    last_error = Some(ServiceError::BackendError(e));
                }
                Err(_) => {
                    warn!(
                        backend = backend.id(),
                        timeout_ms = self.config.timeout_ms,
                        "Vision backend timed out"
                    );
                    last_error = Some(ServiceError::Timeout(self.config.timeout_ms));
                }
            }
        }

        Err(last_error.unwrap_or(ServiceError::NoBackendAvailable))
    }

    async fn generate_or(&self, prompt: String, fallback: &str) -> String {
        match self.generate(prompt).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                warn!("Empty narrative, using fallback");
                fallback.to_string()
            }
            Err(e) => {
                warn!(error = %e, "Narrative generation failed, using fallback");
                fallback.to_string()
            }
        }
    }

    /// Select the first available text backend.
    async fn select_backend(&self) -> Result<Arc<dyn LlmBackend>, ServiceError> {
        for backend in &self.text_backends {
            if backend.is_available().await {
                return Ok(Arc::clone(backend));
            }
        }
        Err(ServiceError::NoBackendAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[tokio::test]
    async fn test_narrate_victory() {
        let backend = Arc::new(MockBackend::default().with_response("  The waters sing again.  "));
        let oracle = SpiritOracle::new(vec![backend]);

        let text = oracle.narrate_victory("Great Water Resonance", 1000.0, "Litres").await;
        assert_eq!(text, "The waters sing again.");
    }

    #[tokio::test]
    async fn test_fallback_when_unavailable() {
        let backend = Arc::new(MockBackend::default().with_available(false));
        let oracle = SpiritOracle::new(vec![backend]);

        assert_eq!(oracle.narrate_victory("x", 1.0, "u").await, FALLBACK_VICTORY);
        assert_eq!(
            oracle.weather_advice(WeatherType::Rainy, 12.0).await,
            FALLBACK_WEATHER_ADVICE
        );
    }

    #[tokio::test]
    async fn test_fallback_on_empty_text() {
        let backend = Arc::new(MockBackend::default().with_response("   "));
        let oracle = SpiritOracle::new(vec![backend]);
        assert_eq!(
            oracle.poetize_echo("hello").await,
            EchoOutcome::Poetized(FALLBACK_ECHO.to_string())
        );
    }

    #[tokio::test]
    async fn test_second_backend_used() {
        let down = Arc::new(MockBackend::new("down").with_available(false));
        let up = Arc::new(MockBackend::new("up").with_response("Moss remembers."));
        let oracle = SpiritOracle::new(vec![down.clone(), up.clone()]);

        assert_eq!(oracle.generate("x".to_string()).await.unwrap(), "Moss remembers.");
        assert_eq!(down.call_count(), 0);
        assert_eq!(up.call_count(), 1);
    }

    #[tokio::test]
    async fn test_moderation() {
        let backend = Arc::new(MockBackend::default().with_response(CORRUPTED_SIGNAL));
        let oracle = SpiritOracle::new(vec![backend]);
        assert_eq!(oracle.poetize_echo("something rude").await, EchoOutcome::Corrupted);
    }

    #[tokio::test]
    async fn test_identify_species() {
        let backend = Arc::new(MockBackend::default());
        let oracle = SpiritOracle::offline().with_vision(vec![backend]);
        let result = oracle.identify_species(&ImageInput::jpeg("AAAA")).await.unwrap();
        assert_eq!(result.common_name, "Great tit");
    }

    #[tokio::test]
    async fn test_identify_without_backend() {
        let oracle = SpiritOracle::offline();
        let result = oracle.identify_species(&ImageInput::jpeg("AAAA")).await;
        assert!(matches!(result, Err(ServiceError::NoBackendAvailable)));
    }

    #[tokio::test]
    async fn test_identify_propagates_backend_error() {
        let backend = Arc::new(MockBackend::default().with_available(false));
        let oracle = SpiritOracle::offline().with_vision(vec![backend]);
        let result = oracle.identify_species(&ImageInput::jpeg("AAAA")).await;
        assert!(matches!(result, Err(ServiceError::BackendError(LlmError::Unavailable(_)))));
    }

    /// Vision backend that answers after a fixed delay.
    struct SlowVision {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl VisionBackend for SlowVision {
        fn id(&self) -> &str {
            "slow-vision"
        }

        async fn classify(&self, image: &ImageInput) -> Result<BioScanResult, LlmError> {
            tokio::time::sleep(self.delay).await;
            MockBackend::default().classify(image).await
        }
    }

    fn short_timeout() -> OracleConfig {
        OracleConfig {
            timeout_ms: 20,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_identify_times_out() {
        let slow: Arc<dyn VisionBackend> = Arc::new(SlowVision {
            delay: Duration::from_secs(5),
        });
        let oracle = SpiritOracle::offline()
            .with_config(short_timeout())
            .with_vision(vec![slow]);

        let started = std::time::Instant::now();
        let result = oracle.identify_species(&ImageInput::jpeg("AAAA")).await;
        assert!(matches!(result, Err(ServiceError::Timeout(20))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_identify_moves_past_slow_backend() {
        let slow: Arc<dyn VisionBackend> = Arc::new(SlowVision {
            delay: Duration::from_secs(5),
        });
        let fast: Arc<dyn VisionBackend> = Arc::new(MockBackend::default());
        let oracle = SpiritOracle::offline()
            .with_config(short_timeout())
            .with_vision(vec![slow, fast]);

        let result = oracle.identify_species(&ImageInput::jpeg("AAAA")).await.unwrap();
        assert_eq!(result.scientific_name, "Parus major");
    }
}
