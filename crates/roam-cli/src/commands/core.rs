//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` / `build_analyzer` - Pipeline setup shared by commands
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use roam_core::ai::{AIClient, PackageAnalyzer};
use roam_core::catalog::seed_providers;
use roam_core::config::{default_config_path, RoamConfig};
use roam_core::db::Database;

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Load roam.toml (override location first, embedded defaults otherwise)
pub fn load_config() -> Result<RoamConfig> {
    RoamConfig::load().context("Failed to load configuration")
}

/// Package analyzer backed by the AI client from the environment, if any
pub fn build_analyzer(config: &RoamConfig) -> Arc<PackageAnalyzer> {
    let client = AIClient::from_env();
    if client.is_none() {
        tracing::debug!("No AI backend configured, using formula scores");
    }
    Arc::new(PackageAnalyzer::new(client, &config.ai))
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    let config = load_config()?;

    let created = seed_providers(&db, &config).context("Failed to seed providers")?;
    println!("   Seeded {} new provider(s)", created);

    if let Some(path) = default_config_path() {
        if path.exists() {
            println!("   ⚙️  Config: {}", path.display());
        } else {
            println!("   ⚙️  Config: built-in defaults ({} not found)", path.display());
        }
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Load packages:   roam import --provider airalo --file airalo.json");
    println!("  2. Build catalog:   roam run");
    println!("  3. Review results:  roam packages --enabled");

    Ok(())
}
