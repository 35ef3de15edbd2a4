//! Catalog commands: listing, admin toggles, and alternative suggestions

use std::sync::Arc;

use anyhow::{bail, Result};
use roam_core::ai::PackageAnalyzer;
use roam_core::db::{CatalogFilter, Database};
use roam_core::normalize::{classify_data_amount, format_data_mb, DataAmount};
use roam_core::selection::AutoSelector;
use roam_core::similarity::{DescriptionSource, PackageSpec, SimilarityEngine};

use super::{build_analyzer, load_config, truncate};

/// Toggles never call the AI backend
fn admin_selector(db: &Database) -> AutoSelector {
    AutoSelector::new(
        db.clone(),
        Arc::new(PackageAnalyzer::formula_only()),
        roam_core::RoamConfig::default(),
    )
}

pub fn cmd_packages(db: &Database, filter: &CatalogFilter, json: bool) -> Result<()> {
    let entries = db.list_catalog_entries(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No packages found. Build the catalog with:");
        println!("  roam run");
        return Ok(());
    }

    println!();
    println!("📦 Catalog ({} shown)", entries.len());
    println!("   ─────────────────────────────────────────────────────────────");

    for entry in &entries {
        let pkg = &entry.package;
        let flags = format!(
            "{}{}{}",
            if pkg.is_enabled { "●" } else { "○" },
            if pkg.is_best_price { "★" } else { " " },
            if pkg.manual_override { "📌" } else { "  " },
        );
        println!(
            "   [{:>5}] {} {:<11} {:<2} {:>9} {:>3}d {:>8} {} │ {}",
            pkg.id,
            flags,
            entry.provider_slug,
            pkg.country_code.as_deref().unwrap_or("--"),
            format_data_mb(pkg.data_mb),
            pkg.validity_days,
            pkg.retail_price,
            pkg.currency,
            truncate(&pkg.title, 32)
        );
    }

    println!();
    println!("   ● enabled  ★ best price  📌 manual override");
    Ok(())
}

pub fn cmd_toggle(db: &Database, id: i64, enabled: bool) -> Result<()> {
    admin_selector(db).toggle_package(id, enabled)?;

    let state = if enabled { "enabled" } else { "disabled" };
    println!("✅ Package {} {} (pinned until 'roam clear-override {}')", id, state, id);
    Ok(())
}

pub fn cmd_clear_override(db: &Database, id: i64) -> Result<()> {
    admin_selector(db).clear_manual_override(id)?;
    println!("✅ Package {} is back under {} selection", id, db.selection_mode()?);
    Ok(())
}

pub fn cmd_enable_all(db: &Database) -> Result<()> {
    let changed = admin_selector(db).enable_all_packages()?;
    println!("✅ Enabled {} package(s)", changed);
    Ok(())
}

pub fn cmd_disable_all(db: &Database) -> Result<()> {
    let changed = admin_selector(db).disable_all_packages()?;
    println!("✅ Disabled {} package(s) (pinned packages kept)", changed);
    Ok(())
}

/// Arguments of `roam alternatives`
pub struct AlternativesRequest<'a> {
    pub destination_id: Option<i64>,
    pub region_id: Option<i64>,
    pub data: &'a str,
    pub validity_days: u32,
    pub price: f64,
    pub max_results: Option<usize>,
    pub use_ai: bool,
}

pub async fn cmd_alternatives(db: &Database, request: &AlternativesRequest<'_>) -> Result<()> {
    if request.destination_id.is_none() && request.region_id.is_none() {
        bail!("Pass --destination or --region");
    }
    let data_mb = match classify_data_amount(request.data) {
        DataAmount::Megabytes(mb) => Some(mb),
        DataAmount::Unlimited => None,
        DataAmount::Unparseable => bail!("Could not parse data amount '{}'", request.data),
    };

    let config = load_config()?;
    let analyzer = if request.use_ai {
        build_analyzer(&config)
    } else {
        Arc::new(PackageAnalyzer::formula_only())
    };
    let engine = SimilarityEngine::new(analyzer, config.similarity);

    let target = PackageSpec {
        destination_id: request.destination_id,
        region_id: request.region_id,
        data_mb,
        validity_days: request.validity_days,
        price: request.price,
    };
    let pool = db.list_enabled_packages()?;
    let found = engine
        .find_alternatives(&target, &pool, request.max_results, request.use_ai)
        .await;

    if found.alternatives.is_empty() {
        println!("No alternatives on sale for that destination.");
        return Ok(());
    }

    println!();
    println!(
        "🔎 Alternatives for {} / {}d / {:.2}{}",
        format_data_mb(data_mb),
        request.validity_days,
        request.price,
        if found.source == DescriptionSource::Ai { " (AI descriptions)" } else { "" }
    );
    println!("   ─────────────────────────────────────────────────────────────");

    for alt in &found.alternatives {
        let pkg = &alt.entry.package;
        println!(
            "   {:>3}%  [{:>5}] {:<11} {:>9} {:>3}d {:>8} │ {}",
            alt.similarity,
            pkg.id,
            alt.entry.provider_slug,
            format_data_mb(pkg.data_mb),
            pkg.validity_days,
            pkg.retail_price,
            alt.description
        );
    }

    Ok(())
}
