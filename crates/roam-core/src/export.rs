//! Catalog export
//!
//! Writes unified catalog entries as CSV (one row per package, flat columns
//! for spreadsheets) or as JSON (the full `CatalogEntry` shape).

use serde::Serialize;

use crate::db::{CatalogFilter, Database};
use crate::error::{Error, Result};
use crate::models::CatalogEntry;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown export format: {} (expected csv or json)", s)),
        }
    }
}

/// One CSV line
#[derive(Debug, Serialize)]
struct CatalogCsvRow<'a> {
    id: i64,
    provider: &'a str,
    title: &'a str,
    #[serde(rename = "type")]
    package_type: &'static str,
    country_code: &'a str,
    group_key: &'a str,
    data: &'a str,
    data_mb: String,
    validity_days: u32,
    wholesale_price: &'a str,
    retail_price: &'a str,
    currency: &'a str,
    enabled: bool,
    best_price: bool,
    manual_override: bool,
}

impl<'a> From<&'a CatalogEntry> for CatalogCsvRow<'a> {
    fn from(entry: &'a CatalogEntry) -> Self {
        let pkg = &entry.package;
        Self {
            id: pkg.id,
            provider: &entry.provider_slug,
            title: &pkg.title,
            package_type: pkg.package_type.as_str(),
            country_code: pkg.country_code.as_deref().unwrap_or(""),
            group_key: pkg.package_group_key.as_deref().unwrap_or(""),
            data: &pkg.data_amount,
            data_mb: pkg
                .data_mb
                .map(|mb| mb.to_string())
                .unwrap_or_else(|| "unlimited".to_string()),
            validity_days: pkg.validity_days,
            wholesale_price: &pkg.wholesale_price,
            retail_price: &pkg.retail_price,
            currency: &pkg.currency,
            enabled: pkg.is_enabled,
            best_price: pkg.is_best_price,
            manual_override: pkg.manual_override,
        }
    }
}

/// Render entries as CSV with a header row
pub fn entries_to_csv(entries: &[CatalogEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for entry in entries {
        writer.serialize(CatalogCsvRow::from(entry))?;
    }
    let bytes = writer.into_inner()?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidData(format!("CSV is not UTF-8: {}", e)))
}

impl Database {
    /// Export catalog entries matching `filter`
    pub fn export_catalog(&self, filter: &CatalogFilter, format: ExportFormat) -> Result<String> {
        let entries = self.list_catalog_entries(filter)?;
        match format {
            ExportFormat::Csv => entries_to_csv(&entries),
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&entries)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{seed_providers, CatalogSync};
    use crate::config::RoamConfig;
    use crate::models::NewProviderPackage;
    use crate::providers;

    fn db_with_package(title: &str) -> Database {
        let db = Database::in_memory().unwrap();
        seed_providers(&db, &RoamConfig::default()).unwrap();
        db.insert_provider_package(
            &providers::AIRALO,
            &NewProviderPackage {
                destination_id: Some(1),
                title: title.into(),
                data_amount: "1GB".into(),
                validity: 7,
                slug: "japan-7days-1gb".into(),
                price: Some("3.00".into()),
                ..Default::default()
            },
        )
        .unwrap();
        CatalogSync::new(db.clone())
            .sync_provider_packages("airalo")
            .unwrap();
        db
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_catalog_csv() {
        let db = db_with_package("Japan, 1GB \"Lite\"");
        let csv = db
            .export_catalog(&CatalogFilter::default(), ExportFormat::Csv)
            .unwrap();

        let mut lines = csv.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with("id,provider,title,type,country_code,group_key"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Japan, 1GB \"\"Lite\"\"\""));
        assert!(row.contains("JP_1024_7"));
        assert!(row.contains("3.60"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_catalog_json() {
        let db = db_with_package("Japan 1GB");
        let json = db
            .export_catalog(&CatalogFilter::default(), ExportFormat::Json)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["provider_slug"], "airalo");
        assert_eq!(parsed[0]["retail_price"], "3.60");
    }

    #[test]
    fn test_export_respects_filter() {
        let db = db_with_package("Japan 1GB");
        let filter = CatalogFilter {
            enabled_only: true,
            ..Default::default()
        };
        let csv = db.export_catalog(&filter, ExportFormat::Csv).unwrap();
        assert!(csv.is_empty());
    }
}
