//! Provider management commands

use anyhow::{Context, Result};
use roam_core::db::Database;
use roam_core::models::Provider;

fn require_provider(db: &Database, slug: &str) -> Result<Provider> {
    db.get_provider_by_slug(slug)?
        .with_context(|| format!("Provider '{}' not found. Run 'roam init' first.", slug))
}

pub fn cmd_providers_list(db: &Database) -> Result<()> {
    let providers = db.list_providers()?;

    if providers.is_empty() {
        println!("No providers yet. Seed them with:");
        println!("  roam init");
        return Ok(());
    }

    println!();
    println!("🌐 Providers");
    println!("   ─────────────────────────────────────────────────────────────");

    for p in providers {
        let status = if p.enabled { "✓" } else { "✗" };
        let last_sync = p
            .last_synced_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "   {} {:<12} {:<12} margin {:>5.1}%  every {:>3}h  last sync {}",
            status, p.slug, p.name, p.margin_percent, p.sync_interval_hours, last_sync
        );
    }

    Ok(())
}

pub fn cmd_providers_margin(db: &Database, slug: &str, percent: f64) -> Result<()> {
    let provider = require_provider(db, slug)?;
    db.set_provider_margin(provider.id, percent)?;

    println!(
        "✅ {} margin: {:.1}% → {:.1}%",
        provider.name, provider.margin_percent, percent
    );
    println!("   Run 'roam sync --provider {}' to reprice its packages.", provider.slug);
    Ok(())
}

pub fn cmd_providers_set_enabled(db: &Database, slug: &str, enabled: bool) -> Result<()> {
    let provider = require_provider(db, slug)?;
    db.set_provider_enabled(provider.id, enabled)?;

    if enabled {
        println!("✅ Enabled {}", provider.name);
    } else {
        println!("✅ Disabled {} (its packages stay in the catalog until removed)", provider.name);
    }
    Ok(())
}

pub fn cmd_providers_interval(db: &Database, slug: &str, hours: i64) -> Result<()> {
    let provider = require_provider(db, slug)?;
    db.set_provider_sync_interval(provider.id, hours)?;

    println!("✅ {} now syncs every {}h", provider.name, hours);
    Ok(())
}
