//! Mock backend for testing
//!
//! Returns predictable responses without a running model server. Can be set
//! up to fail or to report itself unhealthy so fallback paths can be tested.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::{
    AlternativeDescription, AlternativeDraft, PackageQualityInput, QualityAssessment,
};
use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Every call returns an error
    pub failing: bool,
    /// Quality score per package title; unknown titles score 70
    pub quality_scores: HashMap<String, u32>,
    pub prompt_version: u32,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Default::default()
        }
    }

    /// Healthy, but every AI call errors
    pub fn failing() -> Self {
        Self {
            healthy: true,
            failing: true,
            ..Default::default()
        }
    }

    /// Fix the quality score returned for a package title
    pub fn with_quality(mut self, title: &str, score: u32) -> Self {
        self.quality_scores.insert(title.to_string(), score.min(100));
        self
    }

    /// Pretend to run a different quality prompt version
    pub fn with_prompt_version(mut self, version: u32) -> Self {
        self.prompt_version = version;
        self
    }

    /// Number of AI calls made so far (health checks excluded)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn analyze_package_quality(
        &self,
        input: &PackageQualityInput,
    ) -> Result<QualityAssessment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::Ai("mock backend configured to fail".into()));
        }

        let score = self.quality_scores.get(&input.title).copied().unwrap_or(70);
        Ok(QualityAssessment {
            quality_score: score,
            reasoning: Some(format!("mock assessment of {}", input.title)),
        })
    }

    async fn describe_alternatives(
        &self,
        _target: &str,
        drafts: &[AlternativeDraft],
    ) -> Result<Vec<AlternativeDescription>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::Ai("mock backend configured to fail".into()));
        }

        Ok(drafts
            .iter()
            .map(|d| AlternativeDescription {
                id: d.id,
                description: format!("Mock: {}", d.summary),
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn quality_prompt_version(&self) -> u32 {
        self.prompt_version
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
