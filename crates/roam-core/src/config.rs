//! Pipeline configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/roam/config/roam.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Any key missing from the override keeps its built-in value.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::providers;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/roam.toml");

/// Composite scoring defaults
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub price_weight: f64,
    pub quality_weight: f64,
    pub provider_weight: f64,
    pub weights_cache_ttl: Duration,
    pub default_provider_score: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            price_weight: 50.0,
            quality_weight: 30.0,
            provider_weight: 20.0,
            weights_cache_ttl: Duration::from_secs(300),
            default_provider_score: 75,
        }
    }
}

/// AI call limits
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub timeout: Duration,
    pub quality_cache_ttl: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            quality_cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Similarity engine defaults
#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    pub group_threshold: u32,
    pub max_alternatives: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            group_threshold: 70,
            max_alternatives: 5,
        }
    }
}

/// Scheduler timing
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick: Duration,
    pub retry_after: Duration,
    pub cycle_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            retry_after: Duration::from_secs(300),
            cycle_timeout: Duration::from_secs(600),
        }
    }
}

/// Per-provider defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub reputation: u32,
    pub default_margin_percent: f64,
    pub sync_interval_hours: i64,
}

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct RoamConfig {
    pub scoring: ScoringConfig,
    pub ai: AiConfig,
    pub similarity: SimilarityConfig,
    pub scheduler: SchedulerConfig,
    /// Keyed by provider slug
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for RoamConfig {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        for (strategy, reputation, margin) in [
            (&providers::AIRALO, 90, 20.0),
            (&providers::ESIM_GO, 85, 25.0),
            (&providers::ESIM_ACCESS, 80, 25.0),
            (&providers::MAYA, 80, 25.0),
        ] {
            providers.insert(
                strategy.slug.to_string(),
                ProviderConfig {
                    name: strategy.name.to_string(),
                    reputation,
                    default_margin_percent: margin,
                    sync_interval_hours: 24,
                },
            );
        }

        Self {
            scoring: ScoringConfig::default(),
            ai: AiConfig::default(),
            similarity: SimilarityConfig::default(),
            scheduler: SchedulerConfig::default(),
            providers,
        }
    }
}

impl RoamConfig {
    /// Load from the override location, falling back to the embedded file
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit override path
    pub fn from_path(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Parse a TOML document on top of the built-in defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Reputation score for a provider slug
    pub fn provider_reputation(&self, slug: &str) -> u32 {
        self.providers
            .get(&slug.to_lowercase())
            .map(|p| p.reputation)
            .unwrap_or(self.scoring.default_provider_score)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("roam").join("config").join("roam.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<RoamConfig> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(default_config_path);

    let content = match path {
        Some(path) if path.exists() => fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    scoring: Option<RawScoring>,
    ai: Option<RawAi>,
    similarity: Option<RawSimilarity>,
    scheduler: Option<RawScheduler>,
    providers: Option<BTreeMap<String, RawProvider>>,
}

#[derive(Debug, Deserialize)]
struct RawScoring {
    price_weight: Option<f64>,
    quality_weight: Option<f64>,
    provider_weight: Option<f64>,
    weights_cache_ttl_secs: Option<u64>,
    default_provider_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawAi {
    timeout_secs: Option<u64>,
    quality_cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawSimilarity {
    group_threshold: Option<u32>,
    max_alternatives: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawScheduler {
    tick_secs: Option<u64>,
    retry_secs: Option<u64>,
    cycle_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawProvider {
    name: Option<String>,
    reputation: Option<u32>,
    default_margin_percent: Option<f64>,
    sync_interval_hours: Option<i64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<RoamConfig> {
    let raw: RawConfig = toml::from_str(content)?;
    let mut config = RoamConfig::default();

    if let Some(scoring) = raw.scoring {
        if let Some(w) = scoring.price_weight {
            config.scoring.price_weight = w;
        }
        if let Some(w) = scoring.quality_weight {
            config.scoring.quality_weight = w;
        }
        if let Some(w) = scoring.provider_weight {
            config.scoring.provider_weight = w;
        }
        if let Some(ttl) = scoring.weights_cache_ttl_secs {
            config.scoring.weights_cache_ttl = Duration::from_secs(ttl);
        }
        if let Some(score) = scoring.default_provider_score {
            config.scoring.default_provider_score = score.min(100);
        }
    }

    if let Some(ai) = raw.ai {
        if let Some(secs) = ai.timeout_secs {
            config.ai.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = ai.quality_cache_ttl_secs {
            config.ai.quality_cache_ttl = Duration::from_secs(secs);
        }
    }

    if let Some(similarity) = raw.similarity {
        if let Some(threshold) = similarity.group_threshold {
            config.similarity.group_threshold = threshold.min(100);
        }
        if let Some(max) = similarity.max_alternatives {
            config.similarity.max_alternatives = max;
        }
    }

    if let Some(scheduler) = raw.scheduler {
        if let Some(secs) = scheduler.tick_secs {
            config.scheduler.tick = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = scheduler.retry_secs {
            config.scheduler.retry_after = Duration::from_secs(secs);
        }
        if let Some(secs) = scheduler.cycle_timeout_secs {
            config.scheduler.cycle_timeout = Duration::from_secs(secs.max(1));
        }
    }

    if let Some(raw_providers) = raw.providers {
        for (slug, raw) in raw_providers {
            let slug = slug.to_lowercase();
            let base = config.providers.get(&slug).cloned().unwrap_or(ProviderConfig {
                name: slug.clone(),
                reputation: config.scoring.default_provider_score,
                default_margin_percent: 25.0,
                sync_interval_hours: 24,
            });

            let margin = raw.default_margin_percent.unwrap_or(base.default_margin_percent);
            if !margin.is_finite() || margin < 0.0 {
                return Err(Error::Config(format!(
                    "providers.{}.default_margin_percent must be non-negative",
                    slug
                )));
            }

            config.providers.insert(
                slug,
                ProviderConfig {
                    name: raw.name.unwrap_or(base.name),
                    reputation: raw.reputation.unwrap_or(base.reputation).min(100),
                    default_margin_percent: margin,
                    sync_interval_hours: raw
                        .sync_interval_hours
                        .unwrap_or(base.sync_interval_hours)
                        .max(1),
                },
            );
        }
    }

    Ok(config)
}
