//! Roam Core Library
//!
//! The package pipeline behind the Roam eSIM storefront:
//! - Database access and migrations (provider tables, unified catalog, settings)
//! - Normalization of data amounts, validity and allowances
//! - Country resolution and cross-provider group keys
//! - Unified catalog sync with per-provider margins
//! - Best-price comparison
//! - Composite price/quality/reputation scoring with optional AI quality
//! - Similarity grouping and alternative suggestions
//! - Auto-selection with manual overrides, and a periodic sync scheduler

pub mod ai;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod country;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod pricing;
pub mod prompts;
pub mod providers;
pub mod scheduler;
pub mod scoring;
pub mod selection;
pub mod similarity;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, FormulaReason, MockBackend, OpenAICompatibleBackend, PackageAnalyzer,
    QualityOutcome,
};
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use catalog::{seed_providers, CatalogSync};
pub use config::RoamConfig;
pub use db::{CatalogFilter, ComparisonScope, Database};
pub use error::{Error, Result};
pub use export::ExportFormat;
pub use models::{
    AutoSelectionResult, CatalogEntry, NewProviderPackage, PriceComparisonResult, Provider,
    SelectionMode, SyncAllResult, SyncResult, UnifiedPackage,
};
pub use pricing::PriceComparison;
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use providers::ProviderStrategy;
pub use scheduler::{CycleReport, ProviderSchedule, SyncScheduler};
pub use scoring::{CompositeScore, CompositeScorer, PackageWithScore, ScoringWeights};
pub use selection::AutoSelector;
pub use similarity::{Alternatives, DescriptionSource, PackageSpec, SimilarityEngine};
