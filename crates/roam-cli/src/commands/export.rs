//! Catalog export command

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use roam_core::db::{CatalogFilter, Database};
use roam_core::export::ExportFormat;

pub fn cmd_export(db: &Database, format: &str, output: Option<&Path>, enabled: bool) -> Result<()> {
    let format: ExportFormat = format.parse().map_err(|e: String| anyhow!(e))?;
    let filter = CatalogFilter {
        enabled_only: enabled,
        ..Default::default()
    };

    let content = db.export_catalog(&filter, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Exported catalog to {}", path.display());
        }
        None => print!("{}", content),
    }

    Ok(())
}
