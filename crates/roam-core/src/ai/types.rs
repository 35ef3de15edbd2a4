//! AI backend request and response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Serialize};

/// What the AI sees when rating one package
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageQualityInput {
    pub title: String,
    pub provider: String,
    /// Country name, code, or "destination {id}"
    pub destination: String,
    /// Normalized data in MB, `None` for unlimited
    pub data_mb: Option<u64>,
    pub validity_days: u32,
    pub voice_minutes: u32,
    pub sms_count: u32,
    pub retail_price: f64,
    pub currency: String,
    /// One line per competing offer in the same group
    pub peers: Vec<String>,
}

/// Result of an AI quality assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// 0-100
    pub quality_score: u32,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// A deterministic difference note handed to the AI for rewriting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeDraft {
    pub id: i64,
    pub summary: String,
}

/// One rewritten note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeDescription {
    pub id: i64,
    pub description: String,
}

/// Raw response wrapper for `describe_alternatives`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AlternativeDescriptions {
    #[serde(default)]
    pub descriptions: Vec<AlternativeDescription>,
}
