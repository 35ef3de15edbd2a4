//! Auto-selection
//!
//! Decides which unified packages customers see. In price-only mode every
//! best-price row is enabled. In composite mode each package group is ranked
//! by the `CompositeScorer` and only its winner is enabled. Rows an admin
//! has pinned with `manual_override` keep their `is_enabled` either way.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::PackageAnalyzer;
use crate::config::RoamConfig;
use crate::db::{Database, SelectionCounts};
use crate::error::{Error, Result};
use crate::models::{AiDecision, AutoSelectionResult, CatalogEntry, SelectionMode, UnifiedPackage};
use crate::scoring::CompositeScorer;

/// Cheapest member by retail price, ties to the lowest id
///
/// Members with an unreadable price only win when nothing else is priced.
pub fn cheapest_retail(members: &[CatalogEntry]) -> Option<&CatalogEntry> {
    members.iter().min_by(|a, b| {
        let pa = a.package.retail_amount().unwrap_or(f64::INFINITY);
        let pb = b.package.retail_amount().unwrap_or(f64::INFINITY);
        pa.total_cmp(&pb).then(a.package.id.cmp(&b.package.id))
    })
}

fn group_by_key(entries: Vec<CatalogEntry>) -> BTreeMap<String, Vec<CatalogEntry>> {
    let mut groups: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
    for entry in entries {
        if let Some(key) = entry.package.package_group_key.clone() {
            groups.entry(key).or_default().push(entry);
        }
    }
    groups
}

/// Runs selection over the unified catalog
pub struct AutoSelector {
    db: Database,
    analyzer: Arc<PackageAnalyzer>,
    scorer: CompositeScorer,
    config: RoamConfig,
}

impl AutoSelector {
    pub fn new(db: Database, analyzer: Arc<PackageAnalyzer>, config: RoamConfig) -> Self {
        let scorer = CompositeScorer::new(db.clone(), analyzer.clone(), config.clone());
        Self {
            db,
            analyzer,
            scorer,
            config,
        }
    }

    pub fn scorer(&self) -> &CompositeScorer {
        &self.scorer
    }

    /// Apply the configured selection strategy to the whole catalog
    ///
    /// Manual mode changes nothing. Per-group scoring problems fall back to
    /// the cheapest member and are reported in `errors`.
    pub async fn run_auto_selection(&self) -> Result<AutoSelectionResult> {
        let mode = self.db.selection_mode()?;
        if mode == SelectionMode::Manual {
            info!("Selection mode is manual, skipping auto-selection");
            return Ok(AutoSelectionResult {
                success: true,
                mode,
                ..Default::default()
            });
        }

        let mut result = AutoSelectionResult {
            success: true,
            mode,
            ..Default::default()
        };

        let mut counts = if self.db.ai_selection_enabled()? {
            result.ai_enabled = self.analyzer.ai_available().await;
            self.select_by_composite_score(&mut result).await?
        } else {
            self.db.apply_price_only_selection(false)?
        };

        counts += self.apply_preferred_provider_fallback()?;

        result.packages_enabled = counts.enabled;
        result.packages_disabled = counts.disabled;

        info!(
            enabled = result.packages_enabled,
            disabled = result.packages_disabled,
            ai = result.ai_enabled,
            groups = result.ai_decisions.len(),
            errors = result.errors.len(),
            "Auto-selection complete"
        );
        Ok(result)
    }

    async fn select_by_composite_score(
        &self,
        result: &mut AutoSelectionResult,
    ) -> Result<SelectionCounts> {
        let groups = group_by_key(self.db.list_all_catalog_entries()?);
        let mut counts = SelectionCounts::default();

        for (key, members) in groups {
            let packages: Vec<UnifiedPackage> =
                members.iter().map(|m| m.package.clone()).collect();

            let decision = if members.len() == 1 {
                let only = &members[0];
                AiDecision {
                    group_key: key.clone(),
                    selected_package_id: only.package.id,
                    provider_name: only.provider_name.clone(),
                    final_score: 100,
                    candidates: 1,
                    reasoning: None,
                    ai_enhanced: false,
                    fallback: false,
                }
            } else {
                self.decide_group(&key, &members, result).await
            };

            counts += self
                .db
                .apply_group_selection(decision.selected_package_id, &packages)?;
            result.ai_decisions.push(decision);
        }

        counts += self.db.apply_price_only_selection(true)?;
        Ok(counts)
    }

    async fn decide_group(
        &self,
        key: &str,
        members: &[CatalogEntry],
        result: &mut AutoSelectionResult,
    ) -> AiDecision {
        let budget = self.config.ai.timeout * (members.len() as u32 + 1);
        let scored = tokio::time::timeout(
            budget,
            self.scorer.score_packages(members, result.ai_enabled),
        )
        .await;

        let failure = match scored {
            Ok(Ok(ranked)) => match ranked.into_iter().next() {
                Some(best) => {
                    return AiDecision {
                        group_key: key.to_string(),
                        selected_package_id: best.entry.package.id,
                        provider_name: best.entry.provider_name,
                        final_score: best.score.final_score,
                        candidates: members.len(),
                        reasoning: Some(best.score.reasoning),
                        ai_enhanced: best.score.ai_enhanced,
                        fallback: false,
                    }
                }
                None => "scorer returned no packages".to_string(),
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => Error::Timeout(format!("scoring took longer than {:?}", budget)).to_string(),
        };

        warn!(group = key, "Composite scoring failed, using cheapest: {}", failure);
        result.errors.push(format!("group {}: {}", key, failure));

        // members is never empty here
        let (id, provider_name) = cheapest_retail(members)
            .map(|e| (e.package.id, e.provider_name.clone()))
            .unwrap_or_default();
        AiDecision {
            group_key: key.to_string(),
            selected_package_id: id,
            provider_name,
            final_score: 0,
            candidates: members.len(),
            reasoning: Some("cheapest retail price (scoring unavailable)".to_string()),
            ai_enhanced: false,
            fallback: true,
        }
    }

    /// Enable the preferred provider's package in groups left with nothing
    ///
    /// Only groups with no enabled and no best-price member are touched.
    /// Without a valid preferred provider this does nothing.
    fn apply_preferred_provider_fallback(&self) -> Result<SelectionCounts> {
        let Some(preferred) = self.db.preferred_provider_id()? else {
            return Ok(SelectionCounts::default());
        };
        if self.db.get_provider(preferred)?.is_none() {
            warn!(provider_id = preferred, "Preferred provider does not exist");
            return Ok(SelectionCounts::default());
        }

        let mut counts = SelectionCounts::default();
        for (key, members) in group_by_key(self.db.list_all_catalog_entries()?) {
            let uncovered = members
                .iter()
                .all(|m| !m.package.is_enabled && !m.package.is_best_price);
            if !uncovered {
                continue;
            }
            if let Some(pick) = members
                .iter()
                .find(|m| m.package.provider_id == preferred && !m.package.manual_override)
            {
                info!(group = %key, package = pick.package.id, "Enabling preferred provider package");
                counts += self.db.set_package_enabled(pick.package.id, true)?;
            }
        }
        Ok(counts)
    }

    /// Admin toggle: pin a package enabled or disabled
    pub fn toggle_package(&self, id: i64, enabled: bool) -> Result<()> {
        if !self.db.set_package_override(id, enabled)? {
            return Err(Error::NotFound(format!("package {}", id)));
        }
        info!(package = id, enabled, "Package pinned by admin");
        Ok(())
    }

    /// Remove an admin pin and restore the mode's default state
    ///
    /// In auto mode the package goes back to `is_enabled = is_best_price`;
    /// in manual mode it keeps its current state.
    pub fn clear_manual_override(&self, id: i64) -> Result<()> {
        let reset = self.db.selection_mode()? == SelectionMode::Auto;
        if !self.db.clear_package_override(id, reset)? {
            return Err(Error::NotFound(format!("package {}", id)));
        }
        info!(package = id, "Manual override cleared");
        Ok(())
    }

    /// Enable every package, returning how many changed
    pub fn enable_all_packages(&self) -> Result<usize> {
        let changed = self.db.enable_all_packages()?;
        info!(changed, "Enabled all packages");
        Ok(changed)
    }

    /// Disable every package not pinned by an admin, returning how many changed
    pub fn disable_all_packages(&self) -> Result<usize> {
        let changed = self.db.disable_all_packages()?;
        info!(changed, "Disabled all packages");
        Ok(changed)
    }
}
