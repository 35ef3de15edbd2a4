//! Pipeline commands: sync, compare, select, and the full run

use anyhow::Result;
use roam_core::catalog::CatalogSync;
use roam_core::db::{ComparisonScope, Database};
use roam_core::models::{AutoSelectionResult, PriceComparisonResult, SyncResult};
use roam_core::pricing::PriceComparison;
use roam_core::selection::AutoSelector;

use super::{build_analyzer, load_config};

fn print_sync(result: &SyncResult) {
    let icon = if result.success { "✓" } else { "✗" };
    println!(
        "   {} {:<12} +{} new, {} updated, -{} removed",
        icon,
        result.provider,
        result.packages_synced,
        result.packages_updated,
        result.packages_removed
    );
    for e in &result.errors {
        println!("      ⚠️  {}", e);
    }
}

fn print_comparison(result: &PriceComparisonResult) {
    println!(
        "   {} package(s) compared, {} best price(s)",
        result.total_packages, result.best_price_packages
    );
    for e in &result.errors {
        println!("      ⚠️  {}", e);
    }
}

fn print_selection(result: &AutoSelectionResult) {
    println!(
        "   Mode: {}{}",
        result.mode,
        if result.ai_enabled { " (AI scoring)" } else { "" }
    );
    println!(
        "   {} enabled, {} disabled",
        result.packages_enabled, result.packages_disabled
    );
    for decision in &result.ai_decisions {
        let tag = if decision.fallback {
            "fallback"
        } else if decision.ai_enhanced {
            "ai"
        } else {
            "formula"
        };
        println!(
            "   {:<20} → #{} {} (score {}, {} candidates, {})",
            decision.group_key,
            decision.selected_package_id,
            decision.provider_name,
            decision.final_score,
            decision.candidates,
            tag
        );
    }
    for e in &result.errors {
        println!("      ⚠️  {}", e);
    }
}

pub fn cmd_sync(db: &Database, provider: Option<&str>) -> Result<()> {
    let sync = CatalogSync::new(db.clone());

    match provider {
        Some(slug) => {
            println!("🔄 Syncing {}...", slug);
            let result = sync.sync_provider_packages(slug)?;
            print_sync(&result);
        }
        None => {
            println!("🔄 Syncing all enabled providers...");
            let result = sync.sync_all_providers()?;
            for provider in &result.providers {
                print_sync(provider);
            }
            println!(
                "   Total: +{} new, {} updated, -{} removed",
                result.packages_synced, result.packages_updated, result.packages_removed
            );
        }
    }

    println!("   Run 'roam compare' to refresh best prices.");
    Ok(())
}

pub fn cmd_compare(db: &Database, destination: Option<i64>, region: Option<i64>) -> Result<()> {
    let comparison = PriceComparison::new(db.clone());

    let result = match (destination, region) {
        (Some(id), _) => {
            println!("💰 Comparing prices for destination {}...", id);
            comparison.run_price_comparison_for_destination(ComparisonScope::Destination(id))?
        }
        (None, Some(id)) => {
            println!("💰 Comparing prices for region {}...", id);
            comparison.run_price_comparison_for_destination(ComparisonScope::Region(id))?
        }
        (None, None) => {
            println!("💰 Comparing prices across the catalog...");
            comparison.run_price_comparison()?
        }
    };

    print_comparison(&result);
    Ok(())
}

pub async fn cmd_select(db: &Database) -> Result<()> {
    let config = load_config()?;
    let selector = AutoSelector::new(db.clone(), build_analyzer(&config), config);

    println!("🎯 Running auto-selection...");
    let result = selector.run_auto_selection().await?;
    print_selection(&result);
    Ok(())
}

pub async fn cmd_run(db: &Database) -> Result<()> {
    let config = load_config()?;
    let selector = AutoSelector::new(db.clone(), build_analyzer(&config), config);

    println!("🔄 Syncing all enabled providers...");
    let sync = CatalogSync::new(db.clone()).sync_all_providers()?;
    for provider in &sync.providers {
        print_sync(provider);
    }

    println!("💰 Comparing prices...");
    let comparison = PriceComparison::new(db.clone()).run_price_comparison()?;
    print_comparison(&comparison);

    println!("🎯 Running auto-selection...");
    let selection = selector.run_auto_selection().await?;
    print_selection(&selection);

    if sync.success && comparison.success && selection.success {
        println!("✅ Pipeline complete");
    } else {
        println!("⚠️  Pipeline finished with errors");
    }
    Ok(())
}
