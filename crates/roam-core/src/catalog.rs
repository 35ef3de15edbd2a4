//! Unified catalog sync
//!
//! Turns a provider's package table into unified catalog rows: wholesale
//! price from the provider's cost column, retail price from the provider
//! margin, normalized allowances, resolved country and group key. Rows that
//! vanished upstream are removed.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::RoamConfig;
use crate::country::{generate_package_group_key, is_groupable_key, resolve_country};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{CatalogRecord, Provider, ProviderPackage, SyncAllResult, SyncResult};
use crate::normalize::{classify_data_amount, normalize_package_data, DataAmount};
use crate::providers::{self, ProviderStrategy};

/// Round half away from zero to cents
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Retail price for a wholesale cost and a margin in percent
pub fn compute_retail_price(wholesale: f64, margin_percent: f64) -> f64 {
    round_to_cents(wholesale * (1.0 + margin_percent / 100.0))
}

/// Two-decimal price string as stored in the catalog
pub fn format_price(amount: f64) -> String {
    format!("{:.2}", round_to_cents(amount))
}

/// Register every known provider, using config defaults for new rows
///
/// Returns the number of providers known afterwards.
pub fn seed_providers(db: &Database, config: &RoamConfig) -> Result<usize> {
    for strategy in providers::ALL {
        let defaults = config.providers.get(strategy.slug);
        let name = defaults.map(|d| d.name.as_str()).unwrap_or(strategy.name);
        let margin = defaults.map(|d| d.default_margin_percent).unwrap_or(0.0);
        let interval = defaults.map(|d| d.sync_interval_hours).unwrap_or(24);
        db.ensure_provider(strategy.slug, name, margin, interval)?;
    }
    Ok(db.list_providers()?.len())
}

/// Build the catalog record for one provider package
///
/// Returns a data-quality message when the row has to be skipped, plus any
/// non-fatal warnings for rows that are kept.
fn build_record(
    strategy: &ProviderStrategy,
    provider: &Provider,
    pkg: &ProviderPackage,
    warnings: &mut Vec<String>,
) -> std::result::Result<CatalogRecord, String> {
    let provider_package_id = strategy
        .package_id(pkg)
        .ok_or_else(|| format!("{} package {} has no identity", strategy.name, pkg.row_id))?;

    let wholesale = strategy
        .wholesale_price(pkg)
        .map_err(|e| format!("{} package {}: {}", strategy.name, provider_package_id, e))?;

    if !pkg.is_unlimited && classify_data_amount(&pkg.data_amount) == DataAmount::Unparseable {
        return Err(format!(
            "{} package {}: unparseable data amount '{}'",
            strategy.name, provider_package_id, pkg.data_amount
        ));
    }

    let normalized = normalize_package_data(pkg);
    let country = resolve_country(strategy.country, pkg);

    let package_group_key = country
        .code
        .as_deref()
        .map(|code| {
            generate_package_group_key(Some(code), normalized.data_mb, normalized.validity_days)
        })
        .filter(|key| is_groupable_key(key));

    if !country.is_resolved() && pkg.package_type == crate::models::PackageType::Local {
        warnings.push(format!(
            "{} package {}: country not resolved from slug '{}'",
            strategy.name, provider_package_id, pkg.slug
        ));
    }

    Ok(CatalogRecord {
        provider_id: provider.id,
        provider_package_table: strategy.table.to_string(),
        provider_package_id,
        destination_id: pkg.destination_id,
        region_id: pkg.region_id,
        package_type: pkg.package_type,
        title: pkg.title.clone(),
        country_code: country.code,
        country_name: country.name,
        package_group_key,
        data_amount: pkg.data_amount.clone(),
        validity: pkg.validity,
        data_mb: normalized.data_mb,
        validity_days: normalized.validity_days,
        voice_minutes: normalized.voice_minutes,
        sms_count: normalized.sms_count,
        is_unlimited: normalized.is_unlimited(),
        wholesale_price: format_price(wholesale),
        retail_price: format_price(compute_retail_price(wholesale, provider.margin_percent)),
        currency: pkg.currency.clone(),
    })
}

/// Syncs provider tables into the unified catalog
#[derive(Clone)]
pub struct CatalogSync {
    db: Database,
}

impl CatalogSync {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Sync one provider's table into the unified catalog
    ///
    /// Row-level problems are collected in `errors` and the row is skipped;
    /// database failures abort the sync and are returned as `Err`. Every
    /// attempt is recorded in the sync history.
    pub fn sync_provider_packages(&self, slug: &str) -> Result<SyncResult> {
        let strategy = providers::strategy_for(slug)?;
        let provider = self
            .db
            .get_provider_by_slug(strategy.slug)?
            .ok_or_else(|| {
                Error::NotFound(format!("provider {} is not registered", strategy.slug))
            })?;

        if !provider.enabled {
            warn!(provider = strategy.slug, "Skipping sync of disabled provider");
            return Ok(SyncResult {
                success: false,
                provider: strategy.slug.to_string(),
                errors: vec![format!("provider {} is disabled", strategy.slug)],
                ..Default::default()
            });
        }

        let run_id = self.db.start_sync_run(strategy.slug)?;
        let outcome = self.sync_enabled_provider(strategy, &provider);

        let recorded = match &outcome {
            Ok(result) => result.clone(),
            Err(e) => SyncResult {
                success: false,
                provider: strategy.slug.to_string(),
                errors: vec![e.to_string()],
                ..Default::default()
            },
        };
        if let Err(e) = self.db.finish_sync_run(run_id, &recorded) {
            warn!(provider = strategy.slug, "Failed to record sync run: {}", e);
        }

        outcome
    }

    fn sync_enabled_provider(
        &self,
        strategy: &ProviderStrategy,
        provider: &Provider,
    ) -> Result<SyncResult> {
        let packages = self.db.list_provider_packages(strategy)?;
        debug!(provider = strategy.slug, count = packages.len(), "Loaded provider packages");

        let mut errors = Vec::new();
        let mut records = Vec::with_capacity(packages.len());
        let mut seen = HashSet::new();

        for pkg in &packages {
            let built = build_record(strategy, provider, pkg, &mut errors).and_then(|record| {
                if seen.insert(record.provider_package_id.clone()) {
                    Ok(record)
                } else {
                    Err(format!(
                        "{} package {}: duplicate package id, keeping the first row",
                        strategy.name, record.provider_package_id
                    ))
                }
            });
            match built {
                Ok(record) => records.push(record),
                Err(message) => {
                    warn!(provider = strategy.slug, "{}", message);
                    errors.push(message);
                }
            }
        }

        let counts = self.db.apply_catalog_snapshot(strategy.table, &records)?;
        self.db.mark_provider_synced(provider.id, Utc::now())?;

        info!(
            provider = strategy.slug,
            synced = counts.inserted,
            updated = counts.updated,
            removed = counts.removed,
            skipped = packages.len() - records.len(),
            "Provider sync complete"
        );

        Ok(SyncResult {
            success: true,
            provider: strategy.slug.to_string(),
            packages_synced: counts.inserted,
            packages_updated: counts.updated,
            packages_removed: counts.removed,
            errors,
        })
    }

    /// Sync every enabled provider in turn
    ///
    /// A failing provider is recorded in `errors` and the rest still run.
    pub fn sync_all_providers(&self) -> Result<SyncAllResult> {
        let mut all = SyncAllResult {
            success: true,
            ..Default::default()
        };

        for provider in self.db.list_enabled_providers()? {
            match self.sync_provider_packages(&provider.slug) {
                Ok(result) => {
                    all.packages_synced += result.packages_synced;
                    all.packages_updated += result.packages_updated;
                    all.packages_removed += result.packages_removed;
                    all.errors.extend(
                        result
                            .errors
                            .iter()
                            .map(|e| format!("{}: {}", provider.slug, e)),
                    );
                    all.success &= result.success;
                    all.providers.push(result);
                }
                Err(e) => {
                    warn!(provider = %provider.slug, "Provider sync failed: {}", e);
                    all.success = false;
                    all.errors.push(format!("{}: {}", provider.slug, e));
                    all.providers.push(SyncResult {
                        success: false,
                        provider: provider.slug.clone(),
                        errors: vec![e.to_string()],
                        ..Default::default()
                    });
                }
            }
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewProviderPackage, PackageType};

    fn setup() -> (Database, CatalogSync) {
        let db = Database::in_memory().unwrap();
        seed_providers(&db, &RoamConfig::default()).unwrap();
        (db.clone(), CatalogSync::new(db))
    }

    fn package(slug: &str, data: &str, price: &str) -> NewProviderPackage {
        NewProviderPackage {
            destination_id: Some(1),
            package_type: PackageType::Local,
            title: slug.to_string(),
            data_amount: data.to_string(),
            validity: 7,
            slug: slug.to_string(),
            price: Some(price.to_string()),
            currency: "USD".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_retail_rounding() {
        assert_eq!(format_price(compute_retail_price(3.00, 20.0)), "3.60");
        assert_eq!(format_price(compute_retail_price(2.50, 25.0)), "3.13");
        assert_eq!(format_price(compute_retail_price(10.0, 0.0)), "10.00");
        assert_eq!(format_price(0.005), "0.01");
    }

    #[test]
    fn test_unknown_provider_slug() {
        let (_, sync) = setup();
        assert!(matches!(
            sync.sync_provider_packages("acme"),
            Err(Error::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let (db, sync) = setup();
        db.insert_provider_package(&providers::ESIM_GO, &package("esim_1GB_7D_JP_V2", "1GB", "2.50"))
            .unwrap();
        db.insert_provider_package(&providers::ESIM_GO, &package("esim_2GB_7D_JP", "2GB", "abc"))
            .unwrap();
        db.insert_provider_package(&providers::ESIM_GO, &package("esim_3GB_7D_JP", "lots", "4.00"))
            .unwrap();

        let result = sync.sync_provider_packages("esim-go").unwrap();
        assert!(result.success);
        assert_eq!(result.packages_synced, 1);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(db.count_unified_packages().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_package_ids_are_reported() {
        let (db, sync) = setup();
        // a Maya feed loaded without the unique constraint can repeat maya_id
        db.conn()
            .unwrap()
            .execute_batch(
                "DROP TABLE maya_packages;
                 CREATE TABLE maya_packages (
                     id INTEGER PRIMARY KEY, maya_id TEXT, destination_id INTEGER,
                     region_id INTEGER, type TEXT NOT NULL DEFAULT 'local', title TEXT NOT NULL,
                     operator TEXT, data_amount TEXT NOT NULL, validity INTEGER NOT NULL,
                     voice_credits INTEGER, sms_credits INTEGER,
                     is_unlimited BOOLEAN NOT NULL DEFAULT 0, slug TEXT NOT NULL, coverage TEXT,
                     price TEXT, currency TEXT NOT NULL DEFAULT 'USD',
                     created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                 );",
            )
            .unwrap();

        for price in ["2.00", "9.00"] {
            let mut pkg = package("maya-jp-1gb-7d", "1GB", price);
            pkg.external_id = Some("jp-1gb".into());
            db.insert_provider_package(&providers::MAYA, &pkg).unwrap();
        }

        let result = sync.sync_provider_packages("maya").unwrap();
        assert!(result.success);
        assert_eq!(result.packages_synced, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("duplicate package id"));

        let rows = db.list_unified_packages().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].provider_package_id, "jp-1gb");
        assert_eq!(rows[0].wholesale_price, "2.00");
    }

    #[test]
    fn test_resync_of_huge_data_amount_is_a_no_op() {
        let (db, sync) = setup();
        db.insert_provider_package(
            &providers::AIRALO,
            &package("japan-7days-huge", "99999999999999999999GB", "3.00"),
        )
        .unwrap();

        let first = sync.sync_provider_packages("airalo").unwrap();
        assert_eq!(first.packages_synced, 1);
        let second = sync.sync_provider_packages("airalo").unwrap();
        assert_eq!(second.packages_updated, 0);
        assert_eq!(
            db.list_unified_packages().unwrap()[0].data_mb,
            Some(i64::MAX as u64)
        );
    }

    #[test]
    fn test_disabled_provider_is_not_synced() {
        let (db, sync) = setup();
        let maya = db.get_provider_by_slug("maya").unwrap().unwrap();
        db.set_provider_enabled(maya.id, false).unwrap();

        let result = sync.sync_provider_packages("maya").unwrap();
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(db.list_sync_runs(Some("maya"), 10).unwrap().is_empty());
    }

    #[test]
    fn test_unlimited_flag_and_group_key() {
        let (db, sync) = setup();
        let mut pkg = package("united-states-30days-unlimited", "Unlimited", "20.00");
        pkg.validity = 30;
        pkg.is_unlimited = true;
        db.insert_provider_package(&providers::AIRALO, &pkg).unwrap();

        sync.sync_provider_packages("airalo").unwrap();
        let rows = db.list_unified_packages().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data_mb, None);
        assert!(rows[0].is_unlimited);
        assert_eq!(rows[0].package_group_key.as_deref(), Some("US_UNLIMITED_30"));
        assert!(!rows[0].is_enabled);
    }

    #[test]
    fn test_unresolved_country_gets_no_group_key() {
        let (db, sync) = setup();
        db.insert_provider_package(&providers::AIRALO, &package("atlantis-7days-1gb", "1GB", "3.00"))
            .unwrap();

        let result = sync.sync_provider_packages("airalo").unwrap();
        assert_eq!(result.packages_synced, 1);
        assert_eq!(result.errors.len(), 1);
        let rows = db.list_unified_packages().unwrap();
        assert_eq!(rows[0].package_group_key, None);
        assert_eq!(rows[0].country_code, None);
    }

    #[test]
    fn test_sync_all_records_history() {
        let (db, sync) = setup();
        db.insert_provider_package(&providers::AIRALO, &package("japan-7days-1gb", "1GB", "3.00"))
            .unwrap();

        let all = sync.sync_all_providers().unwrap();
        assert!(all.success);
        assert_eq!(all.providers.len(), 4);
        assert_eq!(all.packages_synced, 1);

        let runs = db.list_sync_runs(Some("airalo"), 5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].packages_synced, 1);
        assert!(db.get_provider_by_slug("airalo").unwrap().unwrap().last_synced_at.is_some());
    }
}
