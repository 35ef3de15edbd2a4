//! Provider package import
//!
//! Provider sync services normally fill the provider tables. This command
//! does the same from a JSON array of packages so the pipeline can be fed by
//! hand or from a scraped dump.

use std::path::Path;

use anyhow::{Context, Result};
use roam_core::db::Database;
use roam_core::models::NewProviderPackage;
use roam_core::providers;

pub fn cmd_import(db: &Database, provider: &str, file: &Path, replace: bool) -> Result<()> {
    let strategy = providers::strategy_for(provider)?;

    println!("📥 Importing {} packages from {}...", strategy.name, file.display());

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let packages: Vec<NewProviderPackage> =
        serde_json::from_str(&content).context("Expected a JSON array of packages")?;

    if replace {
        let before = db.count_provider_packages(strategy)?;
        db.replace_provider_packages(strategy, &packages)?;
        println!(
            "   Replaced {} row(s) with {} row(s) in {}",
            before,
            packages.len(),
            strategy.table
        );
    } else {
        for pkg in &packages {
            db.insert_provider_package(strategy, pkg)
                .with_context(|| format!("Failed to insert package '{}'", pkg.slug))?;
        }
        println!("   Added {} row(s) to {}", packages.len(), strategy.table);
    }

    println!("✅ Import complete. Run 'roam sync --provider {}' next.", strategy.slug);
    Ok(())
}
