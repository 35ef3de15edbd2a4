//! Provider package tables
//!
//! The four provider tables share a layout apart from the cost and identity
//! columns described by [`ProviderStrategy`], so every query here is built
//! from the strategy instead of being written four times.

use rusqlite::{params, Connection, Row};
use tracing::warn;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{NewProviderPackage, ProviderPackage};
use crate::providers::ProviderStrategy;

fn row_to_provider_package(row: &Row<'_>) -> rusqlite::Result<ProviderPackage> {
    let type_str: String = row.get(4)?;
    let coverage_str: Option<String> = row.get(13)?;
    let row_id: i64 = row.get(0)?;

    let coverage = coverage_str.and_then(|raw| {
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(codes) => Some(codes),
            Err(e) => {
                warn!(row_id, "Ignoring malformed coverage {:?}: {}", raw, e);
                None
            }
        }
    });

    Ok(ProviderPackage {
        row_id,
        package_key: row.get(1)?,
        destination_id: row.get(2)?,
        region_id: row.get(3)?,
        package_type: type_str.parse().unwrap_or_default(),
        title: row.get(5)?,
        operator: row.get(6)?,
        data_amount: row.get(7)?,
        validity: row.get(8)?,
        voice_credits: row.get(9)?,
        sms_credits: row.get(10)?,
        is_unlimited: row.get(11)?,
        slug: row.get(12)?,
        coverage,
        price: row.get(14)?,
        provider_price: row.get(15)?,
        currency: row.get(16)?,
    })
}

fn insert_package(
    conn: &Connection,
    strategy: &ProviderStrategy,
    pkg: &NewProviderPackage,
) -> Result<i64> {
    let mut columns = vec![
        "destination_id",
        "region_id",
        "type",
        "title",
        "operator",
        "data_amount",
        "validity",
        "voice_credits",
        "sms_credits",
        "is_unlimited",
        "slug",
        "coverage",
        "price",
        "currency",
    ];

    let coverage = pkg
        .coverage
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(pkg.destination_id),
        Box::new(pkg.region_id),
        Box::new(pkg.package_type.as_str()),
        Box::new(pkg.title.clone()),
        Box::new(pkg.operator.clone()),
        Box::new(pkg.data_amount.clone()),
        Box::new(pkg.validity),
        Box::new(pkg.voice_credits),
        Box::new(pkg.sms_credits),
        Box::new(pkg.is_unlimited),
        Box::new(pkg.slug.clone()),
        Box::new(coverage),
        Box::new(pkg.price.clone()),
        Box::new(pkg.currency.clone()),
    ];

    if let Some(col) = strategy.provider_price_column {
        columns.push(col);
        values.push(Box::new(pkg.provider_price.clone()));
    }

    if let Some(col) = strategy.external_id_column {
        let external_id = pkg
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "{} packages need an external id ({})",
                    strategy.name, pkg.slug
                ))
            })?;
        columns.push(col);
        values.push(Box::new(external_id.to_string()));
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        strategy.table,
        columns.join(", "),
        placeholders
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, params_refs.as_slice())?;

    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Insert one package into a provider's table
    pub fn insert_provider_package(
        &self,
        strategy: &ProviderStrategy,
        pkg: &NewProviderPackage,
    ) -> Result<i64> {
        let conn = self.conn()?;
        insert_package(&conn, strategy, pkg)
    }

    /// Replace a provider's whole package snapshot atomically
    pub fn replace_provider_packages(
        &self,
        strategy: &ProviderStrategy,
        packages: &[NewProviderPackage],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(&format!("DELETE FROM {}", strategy.table), [])?;
        for pkg in packages {
            insert_package(&tx, strategy, pkg)?;
        }

        tx.commit()?;
        Ok(packages.len())
    }

    /// Read every package from a provider's table, in row order
    pub fn list_provider_packages(&self, strategy: &ProviderStrategy) -> Result<Vec<ProviderPackage>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT id, {}, destination_id, region_id, type, title, operator, data_amount,
                   validity, voice_credits, sms_credits, is_unlimited, slug, coverage,
                   price, {}, currency
            FROM {}
            ORDER BY id
            "#,
            strategy.identity_sql(),
            strategy.provider_price_sql(),
            strategy.table
        );

        let mut stmt = conn.prepare(&sql)?;
        let packages = stmt
            .query_map([], row_to_provider_package)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Delete one package from a provider's table
    pub fn delete_provider_package(&self, strategy: &ProviderStrategy, row_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?", strategy.table),
            params![row_id],
        )?;
        Ok(deleted > 0)
    }

    /// Count packages in a provider's table
    pub fn count_provider_packages(&self, strategy: &ProviderStrategy) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", strategy.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
