//! Package similarity
//!
//! Pairwise similarity between package specs, greedy clustering of
//! near-equivalent offers, and alternative suggestions when a requested
//! package has no exact match.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::ai::{AlternativeDraft, PackageAnalyzer};
use crate::config::SimilarityConfig;
use crate::models::{CatalogEntry, UnifiedPackage};
use crate::normalize::format_data_mb;

/// The comparable part of a package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageSpec {
    pub destination_id: Option<i64>,
    pub region_id: Option<i64>,
    /// `None` means unlimited
    pub data_mb: Option<u64>,
    pub validity_days: u32,
    pub price: f64,
}

impl PackageSpec {
    pub fn from_package(pkg: &UnifiedPackage) -> Self {
        Self {
            destination_id: pkg.destination_id,
            region_id: pkg.region_id,
            data_mb: pkg.data_mb,
            validity_days: pkg.validity_days,
            price: pkg.retail_amount().unwrap_or(0.0),
        }
    }

    fn label(&self) -> String {
        format!(
            "{} for {} days at {:.2}",
            format_data_mb(self.data_mb),
            self.validity_days,
            self.price
        )
    }
}

/// `|a - b| / max(a, b)`, 0 when both are zero
fn variance(a: f64, b: f64) -> f64 {
    let max = a.abs().max(b.abs());
    if max <= 0.0 {
        0.0
    } else {
        (a - b).abs() / max
    }
}

/// Same destination, same region, or neither spec placed anywhere
fn shares_location(a: &PackageSpec, b: &PackageSpec) -> bool {
    let destination = a.destination_id.is_some() && a.destination_id == b.destination_id;
    let region = a.region_id.is_some() && a.region_id == b.region_id;
    let unplaced = a.destination_id.is_none()
        && a.region_id.is_none()
        && b.destination_id.is_none()
        && b.region_id.is_none();
    destination || region || unplaced
}

/// Similarity of two package specs (0-100, symmetric)
///
/// Packages for different destinations and different regions score 0.
/// Otherwise up to 40 points are deducted for data, 30 for validity and 20
/// for price, proportional to the relative difference. A package that is
/// unlimited compared to one that is not loses the full 40.
pub fn calculate_similarity(a: &PackageSpec, b: &PackageSpec) -> u32 {
    if !shares_location(a, b) {
        return 0;
    }

    let data = match (a.data_mb, b.data_mb) {
        (None, None) => 0.0,
        (None, Some(_)) | (Some(_), None) => 40.0,
        (Some(x), Some(y)) => (variance(x as f64, y as f64) * 100.0).min(40.0),
    };
    let validity =
        (variance(a.validity_days as f64, b.validity_days as f64) * 100.0).min(30.0);
    let price = (variance(a.price, b.price) * 100.0).min(20.0);

    (100.0 - data - validity - price).round().max(0.0) as u32
}

/// Greedy clustering by similarity to each group's seed
///
/// Walks the input in order; each unassigned spec seeds a group and pulls in
/// every later unassigned spec scoring at least `threshold` against the
/// seed. Results depend on input order. Returns groups of input indices.
pub fn group_similar_packages(specs: &[PackageSpec], threshold: u32) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; specs.len()];
    let mut groups = Vec::new();

    for seed in 0..specs.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut group = vec![seed];

        for other in (seed + 1)..specs.len() {
            if !assigned[other] && calculate_similarity(&specs[seed], &specs[other]) >= threshold {
                assigned[other] = true;
                group.push(other);
            }
        }
        groups.push(group);
    }

    groups
}

/// Where alternative descriptions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionSource {
    Ai,
    Deterministic,
}

/// One suggested alternative
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub entry: CatalogEntry,
    pub similarity: u32,
    pub description: String,
}

/// Ranked alternatives for a requested spec
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternatives {
    pub alternatives: Vec<Alternative>,
    pub source: DescriptionSource,
}

/// Plain-language difference between a candidate and the requested spec
pub fn describe_difference(target: &PackageSpec, candidate: &PackageSpec) -> String {
    let mut notes = Vec::new();

    match (target.data_mb, candidate.data_mb) {
        (Some(_), None) => notes.push("Unlimited data".to_string()),
        (None, Some(mb)) => notes.push(format!("{} data instead of unlimited", format_data_mb(Some(mb)))),
        (Some(want), Some(got)) if got > want => notes.push(format!(
            "More data ({} vs {})",
            format_data_mb(Some(got)),
            format_data_mb(Some(want))
        )),
        (Some(want), Some(got)) if got < want => notes.push(format!(
            "Less data ({} vs {})",
            format_data_mb(Some(got)),
            format_data_mb(Some(want))
        )),
        _ => {}
    }

    if candidate.validity_days > target.validity_days {
        notes.push(format!(
            "{} more days",
            candidate.validity_days - target.validity_days
        ));
    } else if candidate.validity_days < target.validity_days {
        notes.push(format!(
            "{} fewer days",
            target.validity_days - candidate.validity_days
        ));
    }

    let diff = candidate.price - target.price;
    if diff <= -0.005 {
        notes.push(format!("{:.2} cheaper", -diff));
    } else if diff >= 0.005 {
        notes.push(format!("{:.2} more expensive", diff));
    }

    if notes.is_empty() {
        "Same data, validity and price".to_string()
    } else {
        notes.join(", ")
    }
}

/// Alternative finder backed by the package analyzer
pub struct SimilarityEngine {
    analyzer: Arc<PackageAnalyzer>,
    config: SimilarityConfig,
}

impl SimilarityEngine {
    pub fn new(analyzer: Arc<PackageAnalyzer>, config: SimilarityConfig) -> Self {
        Self { analyzer, config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Best alternatives for `target` from `pool`
    ///
    /// Only packages for the same destination (or, for regional targets, the
    /// same region) are considered. With `use_ai`, the descriptions are
    /// rewritten by the AI backend when it answers for every result.
    pub async fn find_alternatives(
        &self,
        target: &PackageSpec,
        pool: &[CatalogEntry],
        max_results: Option<usize>,
        use_ai: bool,
    ) -> Alternatives {
        let max_results = max_results.unwrap_or(self.config.max_alternatives);

        let mut alternatives: Vec<Alternative> = pool
            .iter()
            .filter(|e| match target.destination_id {
                Some(dest) => e.package.destination_id == Some(dest),
                None => target.region_id.is_some() && e.package.region_id == target.region_id,
            })
            .map(|e| {
                let spec = PackageSpec::from_package(&e.package);
                Alternative {
                    entry: e.clone(),
                    similarity: calculate_similarity(target, &spec),
                    description: describe_difference(target, &spec),
                }
            })
            .collect();

        alternatives.sort_by(|a, b| b.similarity.cmp(&a.similarity));
        alternatives.truncate(max_results);

        let mut source = DescriptionSource::Deterministic;
        if use_ai && !alternatives.is_empty() {
            let drafts: Vec<AlternativeDraft> = alternatives
                .iter()
                .map(|a| AlternativeDraft {
                    id: a.entry.package.id,
                    summary: a.description.clone(),
                })
                .collect();

            if let Some(described) = self
                .analyzer
                .describe_alternatives(&target.label(), &drafts)
                .await
            {
                let complete = alternatives
                    .iter()
                    .all(|a| described.iter().any(|d| d.id == a.entry.package.id));
                if complete {
                    for alt in &mut alternatives {
                        if let Some(d) = described.iter().find(|d| d.id == alt.entry.package.id) {
                            alt.description = d.description.clone();
                        }
                    }
                    source = DescriptionSource::Ai;
                } else {
                    debug!("AI descriptions incomplete, keeping deterministic ones");
                }
            }
        }

        Alternatives {
            alternatives,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend};
    use crate::config::AiConfig;
    use crate::models::PackageType;
    use chrono::Utc;

    fn spec(dest: Option<i64>, data_mb: Option<u64>, days: u32, price: f64) -> PackageSpec {
        PackageSpec {
            destination_id: dest,
            region_id: None,
            data_mb,
            validity_days: days,
            price,
        }
    }

    fn entry(id: i64, dest: i64, data_mb: Option<u64>, days: u32, retail: &str) -> CatalogEntry {
        CatalogEntry {
            package: UnifiedPackage {
                id,
                provider_id: 1,
                provider_package_table: "airalo_packages".into(),
                provider_package_id: id.to_string(),
                destination_id: Some(dest),
                region_id: None,
                package_type: PackageType::Local,
                title: format!("Package {}", id),
                country_code: None,
                country_name: None,
                package_group_key: None,
                data_amount: format_data_mb(data_mb),
                validity: days as i64,
                data_mb,
                validity_days: days,
                voice_minutes: 0,
                sms_count: 0,
                is_unlimited: data_mb.is_none(),
                wholesale_price: "1.00".into(),
                retail_price: retail.into(),
                currency: "USD".into(),
                is_enabled: true,
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
    fn test_identical_specs_are_fully_similar() {
        let a = spec(Some(1), Some(1024), 7, 3.0);
        assert_eq!(calculate_similarity(&a, &a.clone()), 100);
    }

    #[test]
    fn test_different_destination_and_region_scores_zero() {
        let a = spec(Some(1), Some(1024), 7, 3.0);
        let mut b = spec(Some(2), Some(1024), 7, 3.0);
        assert_eq!(calculate_similarity(&a, &b), 0);
        b.region_id = Some(9);
        assert_eq!(calculate_similarity(&a, &b), 0);

        // same region, different destination still compares
        let mut c = a.clone();
        c.region_id = Some(9);
        assert_eq!(calculate_similarity(&c, &b), 100);
    }

    #[test]
    fn test_deductions_and_caps() {
        let a = spec(Some(1), Some(1024), 7, 4.0);
        // data 50% -> capped 40
        assert_eq!(calculate_similarity(&a, &spec(Some(1), Some(2048), 7, 4.0)), 60);
        // validity 7 vs 10: 30% -> 30
        assert_eq!(calculate_similarity(&a, &spec(Some(1), Some(1024), 10, 4.0)), 70);
        // price 4 vs 5: 20% -> 20
        assert_eq!(calculate_similarity(&a, &spec(Some(1), Some(1024), 7, 5.0)), 80);
        // one unlimited
        assert_eq!(calculate_similarity(&a, &spec(Some(1), None, 7, 4.0)), 60);
        // both unlimited
        let u = spec(Some(1), None, 7, 4.0);
        assert_eq!(calculate_similarity(&u, &u.clone()), 100);
        // everything maxed floors at 10, never below 0
        assert_eq!(calculate_similarity(&a, &spec(Some(1), None, 30, 40.0)), 10);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let specs = [
            spec(Some(1), Some(1024), 7, 3.6),
            spec(Some(1), Some(3072), 15, 9.99),
            spec(Some(1), None, 30, 25.0),
            spec(Some(1), Some(500), 1, 0.0),
            spec(Some(2), Some(1024), 7, 3.13),
        ];
        for a in &specs {
            for b in &specs {
                assert_eq!(calculate_similarity(a, b), calculate_similarity(b, a));
            }
        }
    }

    #[test]
    fn test_group_similar_packages_is_seed_order_greedy() {
        let specs = vec![
            spec(Some(1), Some(1024), 7, 3.0),
            spec(Some(1), Some(1100), 7, 3.1),
            spec(Some(1), Some(10240), 30, 20.0),
            spec(Some(2), Some(1024), 7, 3.0),
        ];
        let groups = group_similar_packages(&specs, 70);
        assert_eq!(groups, vec![vec![0, 1], vec![2], vec![3]]);
        assert_eq!(group_similar_packages(&[], 70), Vec::<Vec<usize>>::new());
    }

    #[test]
    fn test_describe_difference() {
        let target = spec(Some(1), Some(1024), 7, 4.0);
        assert_eq!(
            describe_difference(&target, &spec(Some(1), Some(2048), 10, 3.5)),
            "More data (2GB vs 1GB), 3 more days, 0.50 cheaper"
        );
        assert_eq!(
            describe_difference(&target, &spec(Some(1), None, 7, 4.0)),
            "Unlimited data"
        );
        assert_eq!(
            describe_difference(&target, &target.clone()),
            "Same data, validity and price"
        );
    }

    #[tokio::test]
    async fn test_find_alternatives_filters_and_ranks() {
        let engine = SimilarityEngine::new(
            Arc::new(PackageAnalyzer::formula_only()),
            SimilarityConfig::default(),
        );
        let pool = vec![
            entry(1, 5, Some(10240), 30, "20.00"),
            entry(2, 5, Some(2048), 7, "5.00"),
            entry(3, 6, Some(1024), 7, "3.00"),
        ];
        let target = spec(Some(5), Some(1024), 7, 3.0);

        let found = engine.find_alternatives(&target, &pool, None, false).await;
        assert_eq!(found.source, DescriptionSource::Deterministic);
        let ids: Vec<i64> = found.alternatives.iter().map(|a| a.entry.package.id).collect();
        assert_eq!(ids, vec![2, 1]);

        let top = engine.find_alternatives(&target, &pool, Some(1), false).await;
        assert_eq!(top.alternatives.len(), 1);
    }

    #[tokio::test]
    async fn test_find_alternatives_ai_rewrite_and_fallback() {
        let pool = vec![entry(2, 5, Some(2048), 7, "5.00")];
        let target = spec(Some(5), Some(1024), 7, 3.0);

        let ai = SimilarityEngine::new(
            Arc::new(PackageAnalyzer::new(
                Some(AIClient::Mock(MockBackend::new())),
                &AiConfig::default(),
            )),
            SimilarityConfig::default(),
        );
        let found = ai.find_alternatives(&target, &pool, None, true).await;
        assert_eq!(found.source, DescriptionSource::Ai);
        assert!(found.alternatives[0].description.starts_with("Mock: More data"));

        let failing = SimilarityEngine::new(
            Arc::new(PackageAnalyzer::new(
                Some(AIClient::Mock(MockBackend::failing())),
                &AiConfig::default(),
            )),
            SimilarityConfig::default(),
        );
        let found = failing.find_alternatives(&target, &pool, None, true).await;
        assert_eq!(found.source, DescriptionSource::Deterministic);
        assert!(found.alternatives[0].description.starts_with("More data"));
    }
}
