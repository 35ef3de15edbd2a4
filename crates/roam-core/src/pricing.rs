//! Price comparison
//!
//! Groups catalog rows by their exact comparison key and flags the cheapest
//! row of each group as `is_best_price`.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::db::{ComparisonScope, Database};
use crate::error::Result;
use crate::models::{PriceComparisonResult, UnifiedPackage};
use crate::normalize::{create_comparison_key, NormalizedPackageData};

/// Pick the best-price row of every comparison group
///
/// Rows are expected in id order. Within a group the cheapest retail price
/// wins; ties go to the lowest id. Rows that cannot be keyed or priced are
/// reported in the returned errors and left out.
pub fn select_best_prices(rows: &[UnifiedPackage]) -> (Vec<i64>, Vec<String>) {
    let mut groups: BTreeMap<String, Vec<(f64, i64)>> = BTreeMap::new();
    let mut errors = Vec::new();

    for row in rows {
        let normalized = NormalizedPackageData::from_unified(row);
        let key = match create_comparison_key(row.destination_id, row.region_id, &normalized) {
            Ok(key) => key,
            Err(e) => {
                errors.push(format!("package {}: {}", row.id, e));
                continue;
            }
        };
        let Some(price) = row.retail_amount() else {
            errors.push(format!(
                "package {}: unparseable retail price '{}'",
                row.id, row.retail_price
            ));
            continue;
        };
        groups.entry(key).or_default().push((price, row.id));
    }

    let best = groups
        .into_values()
        .filter_map(|mut members| {
            // stable: equal prices keep id order
            members.sort_by(|a, b| a.0.total_cmp(&b.0));
            members.first().map(|(_, id)| *id)
        })
        .collect();

    (best, errors)
}

/// Runs price comparison over the catalog
#[derive(Clone)]
pub struct PriceComparison {
    db: Database,
}

impl PriceComparison {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Recompute `is_best_price` for the whole catalog
    pub fn run_price_comparison(&self) -> Result<PriceComparisonResult> {
        let rows = self.db.list_unified_packages()?;
        self.apply(None, &rows)
    }

    /// Recompute `is_best_price` for one destination or region only
    ///
    /// A scope covers whole comparison groups: a destination scope takes its
    /// rows, a region scope only the rows without a destination. A scoped run
    /// and a full run therefore agree on every row in scope.
    pub fn run_price_comparison_for_destination(
        &self,
        scope: ComparisonScope,
    ) -> Result<PriceComparisonResult> {
        let rows = self.db.list_unified_packages_in_scope(scope)?;
        self.apply(Some(scope), &rows)
    }

    fn apply(
        &self,
        scope: Option<ComparisonScope>,
        rows: &[UnifiedPackage],
    ) -> Result<PriceComparisonResult> {
        let (best, errors) = select_best_prices(rows);
        for e in &errors {
            warn!("{}", e);
        }

        self.db.apply_best_prices(scope, &best)?;

        match scope {
            Some(scope) => info!(
                scope = %scope,
                total = rows.len(),
                best = best.len(),
                "Scoped price comparison complete"
            ),
            None => info!(
                total = rows.len(),
                best = best.len(),
                "Price comparison complete"
            ),
        }

        Ok(PriceComparisonResult {
            success: true,
            total_packages: rows.len(),
            best_price_packages: best.len(),
            errors,
        })
    }
}
