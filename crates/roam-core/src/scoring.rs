//! Composite package scoring
//!
//! Ranks the members of a package group by a weighted blend of price,
//! quality and provider reputation. Weights live in platform settings and
//! are cached for a short TTL; quality comes from the `PackageAnalyzer`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, warn};

use crate::ai::{PackageAnalyzer, QualityOutcome};
use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::RoamConfig;
use crate::db::{setting_keys, Database};
use crate::error::Result;
use crate::models::CatalogEntry;

/// Percent weights of the three score components, always summing to 100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    pub price_weight: u32,
    pub quality_weight: u32,
    pub provider_weight: u32,
}

impl ScoringWeights {
    /// Scale raw weights to sum to exactly 100
    ///
    /// Negative or non-finite values count as zero. If nothing is left, the
    /// defaults are used instead. Rounding drift goes to the largest weight.
    pub fn renormalize(price: f64, quality: f64, provider: f64, defaults: (f64, f64, f64)) -> Self {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let (mut p, mut q, mut r) = (clean(price), clean(quality), clean(provider));

        if p + q + r <= 0.0 {
            p = clean(defaults.0);
            q = clean(defaults.1);
            r = clean(defaults.2);
        }
        let sum = p + q + r;
        if sum <= 0.0 {
            return Self {
                price_weight: 50,
                quality_weight: 30,
                provider_weight: 20,
            };
        }

        let mut weights = [
            (p / sum * 100.0).round() as i64,
            (q / sum * 100.0).round() as i64,
            (r / sum * 100.0).round() as i64,
        ];
        let drift = 100 - weights.iter().sum::<i64>();
        if drift != 0 {
            // First of the largest, so ties resolve price > quality > provider
            let largest = (0..3)
                .fold(0, |best, i| if weights[i] > weights[best] { i } else { best });
            weights[largest] += drift;
        }

        Self {
            price_weight: weights[0].max(0) as u32,
            quality_weight: weights[1].max(0) as u32,
            provider_weight: weights[2].max(0) as u32,
        }
    }
}

/// Score breakdown for one package
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeScore {
    pub final_score: u32,
    pub price_score: u32,
    pub quality_score: u32,
    pub provider_score: u32,
    pub weights: ScoringWeights,
    pub reasoning: String,
    pub ai_enhanced: bool,
    #[serde(skip)]
    pub quality: QualityOutcome,
}

/// A catalog entry with its composite score
#[derive(Debug, Clone, Serialize)]
pub struct PackageWithScore {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub score: CompositeScore,
}

/// `round(100 * (max - p) / (max - min))`, 100 when every price is equal
pub fn price_score(price: Option<f64>, min: f64, max: f64) -> u32 {
    let Some(price) = price else {
        return 0;
    };
    if (max - min).abs() < f64::EPSILON {
        return 100;
    }
    (100.0 * (max - price) / (max - min)).round().clamp(0.0, 100.0) as u32
}

/// Weighted final score
pub fn final_score(price: u32, quality: u32, provider: u32, weights: &ScoringWeights) -> u32 {
    let total = price as f64 * weights.price_weight as f64 / 100.0
        + quality as f64 * weights.quality_weight as f64 / 100.0
        + provider as f64 * weights.provider_weight as f64 / 100.0;
    total.round().clamp(0.0, 100.0) as u32
}

/// Composite scorer over one group of comparable packages
pub struct CompositeScorer {
    db: Database,
    analyzer: Arc<PackageAnalyzer>,
    config: RoamConfig,
    weights: TtlCache<(), ScoringWeights>,
    provider_scores: Mutex<HashMap<String, u32>>,
}

impl CompositeScorer {
    pub fn new(db: Database, analyzer: Arc<PackageAnalyzer>, config: RoamConfig) -> Self {
        Self::with_clock(db, analyzer, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        db: Database,
        analyzer: Arc<PackageAnalyzer>,
        config: RoamConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = config.scoring.weights_cache_ttl;
        Self {
            db,
            analyzer,
            config,
            weights: TtlCache::new(ttl, clock),
            provider_scores: Mutex::new(HashMap::new()),
        }
    }

    /// Current weights, read from settings at most once per TTL
    pub fn get_weights(&self) -> Result<ScoringWeights> {
        if let Some(weights) = self.weights.get(&()) {
            return Ok(weights);
        }

        let defaults = &self.config.scoring;
        let price = self
            .db
            .numeric_setting(setting_keys::AI_PRICE_WEIGHT)?
            .unwrap_or(defaults.price_weight);
        let quality = self
            .db
            .numeric_setting(setting_keys::AI_QUALITY_WEIGHT)?
            .unwrap_or(defaults.quality_weight);
        let provider = self
            .db
            .numeric_setting(setting_keys::AI_PROVIDER_WEIGHT)?
            .unwrap_or(defaults.provider_weight);

        let weights = ScoringWeights::renormalize(
            price,
            quality,
            provider,
            (
                defaults.price_weight,
                defaults.quality_weight,
                defaults.provider_weight,
            ),
        );
        if (price + quality + provider - 100.0).abs() > f64::EPSILON {
            debug!(
                price,
                quality, provider, "Scoring weights renormalized to {:?}", weights
            );
        }

        self.weights.insert((), weights);
        Ok(weights)
    }

    /// Drop cached weights so the next read hits settings
    pub fn invalidate_weights(&self) {
        self.weights.clear();
    }

    /// Reputation score for a provider, cached for the scorer's lifetime
    pub fn provider_score(&self, slug: &str) -> u32 {
        let Ok(mut cache) = self.provider_scores.lock() else {
            return self.config.provider_reputation(slug);
        };
        *cache
            .entry(slug.to_string())
            .or_insert_with(|| self.config.provider_reputation(slug))
    }

    /// Score and rank packages, best first (ties keep input order)
    pub async fn score_packages(
        &self,
        packages: &[CatalogEntry],
        use_ai: bool,
    ) -> Result<Vec<PackageWithScore>> {
        if packages.is_empty() {
            return Ok(Vec::new());
        }

        let weights = self.get_weights()?;

        let prices: Vec<Option<f64>> = packages
            .iter()
            .map(|e| e.package.retail_amount())
            .collect();
        let known: Vec<f64> = prices.iter().flatten().copied().collect();
        let min = known.iter().copied().fold(f64::INFINITY, f64::min);
        let max = known.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if known.len() < packages.len() {
            warn!(
                "{} of {} packages have an unreadable retail price",
                packages.len() - known.len(),
                packages.len()
            );
        }

        let mut scored = Vec::with_capacity(packages.len());
        for (entry, price) in packages.iter().zip(prices) {
            let price_score = price_score(price, min, max);
            let quality = self.analyzer.analyze(entry, packages, use_ai).await;
            let quality_score = quality.score();
            let provider_score = self.provider_score(&entry.provider_slug);
            let final_score = final_score(price_score, quality_score, provider_score, &weights);

            let reasoning = match quality.reasoning() {
                Some(ai) => format!(
                    "price {}, quality {} (AI: {}), provider {}",
                    price_score, quality_score, ai, provider_score
                ),
                None => format!(
                    "price {}, quality {} (formula), provider {}",
                    price_score, quality_score, provider_score
                ),
            };

            scored.push(PackageWithScore {
                entry: entry.clone(),
                score: CompositeScore {
                    final_score,
                    price_score,
                    quality_score,
                    provider_score,
                    weights,
                    reasoning,
                    ai_enhanced: quality.is_ai(),
                    quality,
                },
            });
        }

        scored.sort_by(|a, b| b.score.final_score.cmp(&a.score.final_score));
        Ok(scored)
    }
}
