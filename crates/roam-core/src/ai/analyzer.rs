//! Package quality analysis
//!
//! Quality comes from the AI backend when one is configured and healthy,
//! and from a value-for-money formula otherwise. Which one was used is part
//! of the result, so callers never have to guess.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::AiConfig;
use crate::models::CatalogEntry;

use super::types::{AlternativeDescription, AlternativeDraft, PackageQualityInput};
use super::{AIBackend, AIClient};

/// Value-for-money quality score (0-100)
///
/// 60% data per dollar (1 GB per dollar scores 50, unlimited scores 100) and
/// 40% days per dollar (10 days per dollar scores 100). Free or unpriced
/// packages score a neutral 50.
pub fn formula_quality_score(data_mb: Option<u64>, validity_days: u32, price: f64) -> u32 {
    if !price.is_finite() || price <= 0.0 {
        return 50;
    }

    let data_score = match data_mb {
        None => 100.0,
        Some(mb) => ((mb as f64 / price) / 1024.0 * 50.0).min(100.0),
    };
    let validity_score = ((validity_days as f64 / price) * 10.0).min(100.0);

    (0.6 * data_score + 0.4 * validity_score).round().clamp(0.0, 100.0) as u32
}

/// Why the formula was used instead of the AI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaReason {
    /// The caller asked for formula scoring
    NotRequested,
    /// No backend configured, or it failed its health check
    AiUnavailable,
    /// The AI call errored or timed out
    AiFailed(String),
}

/// Where a quality score came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityOutcome {
    Ai {
        score: u32,
        reasoning: Option<String>,
    },
    Formula {
        score: u32,
        reason: FormulaReason,
    },
}

impl QualityOutcome {
    pub fn score(&self) -> u32 {
        match self {
            Self::Ai { score, .. } | Self::Formula { score, .. } => *score,
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Self::Ai { .. })
    }

    pub fn reasoning(&self) -> Option<&str> {
        match self {
            Self::Ai { reasoning, .. } => reasoning.as_deref(),
            Self::Formula { .. } => None,
        }
    }
}

/// Builds the AI input for a catalog entry
pub fn quality_input(entry: &CatalogEntry, peers: &[CatalogEntry]) -> PackageQualityInput {
    let pkg = &entry.package;
    let destination = pkg
        .country_name
        .clone()
        .or_else(|| pkg.country_code.clone())
        .or_else(|| pkg.destination_id.map(|id| format!("destination {}", id)))
        .or_else(|| pkg.region_id.map(|id| format!("region {}", id)))
        .unwrap_or_else(|| "unknown".to_string());

    PackageQualityInput {
        title: pkg.title.clone(),
        provider: entry.provider_name.clone(),
        destination,
        data_mb: pkg.data_mb,
        validity_days: pkg.validity_days,
        voice_minutes: pkg.voice_minutes,
        sms_count: pkg.sms_count,
        retail_price: pkg.retail_amount().unwrap_or(0.0),
        currency: pkg.currency.clone(),
        peers: peers
            .iter()
            .filter(|p| p.package.id != pkg.id)
            .map(|p| {
                format!(
                    "{}: {} {}",
                    p.provider_name, p.package.retail_price, p.package.currency
                )
            })
            .collect(),
    }
}

/// Cache key for an AI assessment: model, prompt version and everything the
/// prompt shows
fn cache_key(model: &str, prompt_version: u32, input: &PackageQualityInput) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\0");
    hasher.update(prompt_version.to_le_bytes());
    // PackageQualityInput is plain data; serializing cannot fail
    hasher.update(serde_json::to_vec(input).unwrap_or_default());
    hex::encode(hasher.finalize())
}

/// AI-or-formula package analyzer
pub struct PackageAnalyzer {
    client: Option<AIClient>,
    timeout: Duration,
    cache: TtlCache<String, (u32, Option<String>)>,
    healthy: OnceCell<bool>,
}

impl PackageAnalyzer {
    pub fn new(client: Option<AIClient>, config: &AiConfig) -> Self {
        Self::with_clock(client, config, Arc::new(SystemClock))
    }

    pub fn with_clock(client: Option<AIClient>, config: &AiConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            timeout: config.timeout,
            cache: TtlCache::new(config.quality_cache_ttl, clock),
            healthy: OnceCell::new(),
        }
    }

    /// Formula-only analyzer
    pub fn formula_only() -> Self {
        Self::new(None, &AiConfig::default())
    }

    /// Whether a backend is configured and passed its health check
    ///
    /// The health check runs once per analyzer.
    pub async fn ai_available(&self) -> bool {
        let Some(client) = self.client.as_ref() else {
            return false;
        };
        *self
            .healthy
            .get_or_init(|| async {
                match tokio::time::timeout(self.timeout, client.health_check()).await {
                    Ok(healthy) => {
                        if !healthy {
                            warn!(host = client.host(), "AI backend failed health check");
                        }
                        healthy
                    }
                    Err(_) => {
                        warn!(host = client.host(), "AI health check timed out");
                        false
                    }
                }
            })
            .await
    }

    /// Quality score for one entry, compared against its group peers
    pub async fn analyze(
        &self,
        entry: &CatalogEntry,
        peers: &[CatalogEntry],
        use_ai: bool,
    ) -> QualityOutcome {
        let pkg = &entry.package;
        let formula = formula_quality_score(
            pkg.data_mb,
            pkg.validity_days,
            pkg.retail_amount().unwrap_or(0.0),
        );

        if !use_ai {
            return QualityOutcome::Formula {
                score: formula,
                reason: FormulaReason::NotRequested,
            };
        }
        if !self.ai_available().await {
            return QualityOutcome::Formula {
                score: formula,
                reason: FormulaReason::AiUnavailable,
            };
        }
        let Some(client) = self.client.as_ref() else {
            return QualityOutcome::Formula {
                score: formula,
                reason: FormulaReason::AiUnavailable,
            };
        };

        let input = quality_input(entry, peers);
        let key = cache_key(client.model(), client.quality_prompt_version(), &input);
        if let Some((score, reasoning)) = self.cache.get(&key) {
            debug!(package = pkg.id, "AI quality cache hit");
            return QualityOutcome::Ai { score, reasoning };
        }

        match tokio::time::timeout(self.timeout, client.analyze_package_quality(&input)).await {
            Ok(Ok(assessment)) => {
                self.cache.insert(
                    key,
                    (assessment.quality_score, assessment.reasoning.clone()),
                );
                QualityOutcome::Ai {
                    score: assessment.quality_score,
                    reasoning: assessment.reasoning,
                }
            }
            Ok(Err(e)) => {
                warn!(package = pkg.id, "AI quality analysis failed: {}", e);
                QualityOutcome::Formula {
                    score: formula,
                    reason: FormulaReason::AiFailed(e.to_string()),
                }
            }
            Err(_) => {
                warn!(package = pkg.id, "AI quality analysis timed out");
                QualityOutcome::Formula {
                    score: formula,
                    reason: FormulaReason::AiFailed(format!(
                        "timed out after {}s",
                        self.timeout.as_secs()
                    )),
                }
            }
        }
    }

    /// AI rewrite of alternative notes, `None` on any failure
    pub async fn describe_alternatives(
        &self,
        target: &str,
        drafts: &[AlternativeDraft],
    ) -> Option<Vec<AlternativeDescription>> {
        if drafts.is_empty() || !self.ai_available().await {
            return None;
        }
        let client = self.client.as_ref()?;

        match tokio::time::timeout(self.timeout, client.describe_alternatives(target, drafts)).await
        {
            Ok(Ok(descriptions)) => Some(descriptions),
            Ok(Err(e)) => {
                warn!("AI alternative descriptions failed: {}", e);
                None
            }
            Err(_) => {
                warn!("AI alternative descriptions timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::models::{PackageType, UnifiedPackage};
    use chrono::Utc;

    fn entry(id: i64, title: &str, data_mb: Option<u64>, days: u32, retail: &str) -> CatalogEntry {
        CatalogEntry {
            package: UnifiedPackage {
                id,
                provider_id: 1,
                provider_package_table: "airalo_packages".into(),
                provider_package_id: id.to_string(),
                destination_id: Some(3),
                region_id: None,
                package_type: PackageType::Local,
                title: title.into(),
                country_code: Some("JP".into()),
                country_name: Some("Japan".into()),
                package_group_key: Some("JP_1024_7".into()),
                data_amount: "1GB".into(),
                validity: days as i64,
                data_mb,
                validity_days: days,
                voice_minutes: 0,
                sms_count: 0,
                is_unlimited: data_mb.is_none(),
                wholesale_price: "1.00".into(),
                retail_price: retail.into(),
                currency: "USD".into(),
                is_enabled: false,
                is_best_price: false,
                manual_override: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            provider_name: "Airalo".into(),
            provider_slug: "airalo".into(),
        }
    }

    #[test]
    fn test_formula_quality_score() {
        // 1GB/$1: data 50, 7 days/$1: validity 70 -> 30 + 28
        assert_eq!(formula_quality_score(Some(1024), 7, 1.0), 58);
        // unlimited 30 days at $20: data 100, validity 15 -> 60 + 6
        assert_eq!(formula_quality_score(None, 30, 20.0), 66);
        // caps at 100 per component
        assert_eq!(formula_quality_score(Some(102_400), 100, 1.0), 100);
        assert_eq!(formula_quality_score(Some(1024), 7, 0.0), 50);
        assert_eq!(formula_quality_score(Some(1024), 7, -3.0), 50);
    }

    #[tokio::test]
    async fn test_formula_when_not_requested_or_unavailable() {
        let analyzer = PackageAnalyzer::formula_only();
        let e = entry(1, "Japan 1GB", Some(1024), 7, "1.00");

        let outcome = analyzer.analyze(&e, &[], false).await;
        assert_eq!(
            outcome,
            QualityOutcome::Formula {
                score: 58,
                reason: FormulaReason::NotRequested
            }
        );

        let outcome = analyzer.analyze(&e, &[], true).await;
        assert!(matches!(
            outcome,
            QualityOutcome::Formula {
                reason: FormulaReason::AiUnavailable,
                ..
            }
        ));

        let unhealthy = PackageAnalyzer::new(
            Some(AIClient::Mock(MockBackend::unhealthy())),
            &AiConfig::default(),
        );
        assert!(!unhealthy.ai_available().await);
        assert!(!unhealthy.analyze(&e, &[], true).await.is_ai());
    }

    #[tokio::test]
    async fn test_ai_outcome_is_cached() {
        let mock = MockBackend::new().with_quality("Japan 1GB", 88);
        let analyzer =
            PackageAnalyzer::new(Some(AIClient::Mock(mock.clone())), &AiConfig::default());
        let e = entry(1, "Japan 1GB", Some(1024), 7, "3.60");

        let first = analyzer.analyze(&e, &[], true).await;
        let second = analyzer.analyze(&e, &[], true).await;
        assert_eq!(first.score(), 88);
        assert!(first.is_ai());
        assert_eq!(first, second);
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_cache_key_tracks_prompt_version() {
        let input = quality_input(&entry(1, "Japan 1GB", Some(1024), 7, "3.60"), &[]);
        let v1 = cache_key("mock", 1, &input);
        assert_eq!(v1, cache_key("mock", 1, &input));
        assert_ne!(v1, cache_key("mock", 2, &input));
        assert_ne!(v1, cache_key("other", 1, &input));

        let client = AIClient::Mock(MockBackend::new().with_prompt_version(2));
        assert_eq!(client.quality_prompt_version(), 2);
    }

    #[tokio::test]
    async fn test_ai_failure_falls_back_to_formula() {
        let analyzer = PackageAnalyzer::new(
            Some(AIClient::Mock(MockBackend::failing())),
            &AiConfig::default(),
        );
        let e = entry(1, "Japan 1GB", Some(1024), 7, "1.00");
        match analyzer.analyze(&e, &[], true).await {
            QualityOutcome::Formula {
                score,
                reason: FormulaReason::AiFailed(_),
            } => assert_eq!(score, 58),
            other => panic!("expected formula fallback, got {:?}", other),
        }
        assert!(analyzer
            .describe_alternatives("x", &[AlternativeDraft { id: 1, summary: "s".into() }])
            .await
            .is_none());
    }

    #[test]
    fn test_quality_input_lists_peers_only() {
        let a = entry(1, "A", Some(1024), 7, "3.60");
        let b = entry(2, "B", Some(1024), 7, "3.13");
        let input = quality_input(&a, &[a.clone(), b]);
        assert_eq!(input.destination, "Japan");
        assert_eq!(input.peers, vec!["Airalo: 3.13 USD".to_string()]);
        assert_eq!(input.retail_price, 3.60);
    }
}
