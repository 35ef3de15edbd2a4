//! Pluggable AI backend abstraction
//!
//! AI only ever refines decisions the pipeline can make on its own: a
//! quality score that otherwise comes from a formula, and alternative
//! descriptions that otherwise stay deterministic. Every call is best-effort.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all AI operations
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//! - `PackageAnalyzer`: AI-or-formula quality scoring with caching and timeouts
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, mock, none). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

pub mod analyzer;
mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use analyzer::{formula_quality_score, FormulaReason, PackageAnalyzer, QualityOutcome};
pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all AI backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Rate a package's value for money (0-100)
    async fn analyze_package_quality(&self, input: &PackageQualityInput)
        -> Result<QualityAssessment>;

    /// Rewrite deterministic difference notes for shoppers
    async fn describe_alternatives(
        &self,
        target: &str,
        drafts: &[AlternativeDraft],
    ) -> Result<Vec<AlternativeDescription>>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging and cache keys)
    fn model(&self) -> &str;

    /// Version of the quality prompt in use (for cache keys)
    fn quality_prompt_version(&self) -> u32;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI-compatible backend (OpenAI, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None when AI is switched off or the required variables are
    /// not set; the pipeline then runs on formulas alone.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            "none" | "off" | "disabled" | "" => None,
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, AI disabled");
                None
            }
        }
    }

    /// Create an OpenAI-compatible backend directly
    pub fn openai_compatible(host: &str, model: &str) -> Self {
        AIClient::OpenAICompatible(OpenAICompatibleBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn analyze_package_quality(
        &self,
        input: &PackageQualityInput,
    ) -> Result<QualityAssessment> {
        match self {
            AIClient::OpenAICompatible(b) => b.analyze_package_quality(input).await,
            AIClient::Mock(b) => b.analyze_package_quality(input).await,
        }
    }

    async fn describe_alternatives(
        &self,
        target: &str,
        drafts: &[AlternativeDraft],
    ) -> Result<Vec<AlternativeDescription>> {
        match self {
            AIClient::OpenAICompatible(b) => b.describe_alternatives(target, drafts).await,
            AIClient::Mock(b) => b.describe_alternatives(target, drafts).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn quality_prompt_version(&self) -> u32 {
        match self {
            AIClient::OpenAICompatible(b) => b.quality_prompt_version(),
            AIClient::Mock(b) => b.quality_prompt_version(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
    }
}
