//! Unified catalog operations
//!
//! Sync owns the catalog data columns; price comparison owns `is_best_price`;
//! auto-selection and admin actions own `is_enabled` and `manual_override`.
//! Each writer below only touches its own columns.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, OptionalExtension, Row, Transaction};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{CatalogEntry, CatalogRecord, UnifiedPackage};

const UNIFIED_COLUMNS: &str = r#"
    u.id, u.provider_id, u.provider_package_table, u.provider_package_id,
    u.destination_id, u.region_id, u.type, u.title, u.country_code, u.country_name,
    u.package_group_key, u.data_amount, u.validity, u.data_mb, u.validity_days,
    u.voice_minutes, u.sms_count, u.is_unlimited, u.wholesale_price, u.retail_price,
    u.currency, u.is_enabled, u.is_best_price, u.manual_override, u.created_at, u.updated_at
"#;

fn row_to_unified(row: &Row<'_>) -> rusqlite::Result<UnifiedPackage> {
    let type_str: String = row.get(6)?;
    let data_mb: Option<i64> = row.get(13)?;
    let validity_days: i64 = row.get(14)?;
    let voice_minutes: i64 = row.get(15)?;
    let sms_count: i64 = row.get(16)?;
    let created_at_str: String = row.get(24)?;
    let updated_at_str: String = row.get(25)?;

    Ok(UnifiedPackage {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        provider_package_table: row.get(2)?,
        provider_package_id: row.get(3)?,
        destination_id: row.get(4)?,
        region_id: row.get(5)?,
        package_type: type_str.parse().unwrap_or_default(),
        title: row.get(7)?,
        country_code: row.get(8)?,
        country_name: row.get(9)?,
        package_group_key: row.get(10)?,
        data_amount: row.get(11)?,
        validity: row.get(12)?,
        data_mb: data_mb.map(|mb| mb.max(0) as u64),
        validity_days: validity_days.clamp(0, u32::MAX as i64) as u32,
        voice_minutes: voice_minutes.clamp(0, u32::MAX as i64) as u32,
        sms_count: sms_count.clamp(0, u32::MAX as i64) as u32,
        is_unlimited: row.get(17)?,
        wholesale_price: row.get(18)?,
        retail_price: row.get(19)?,
        currency: row.get(20)?,
        is_enabled: row.get(21)?,
        is_best_price: row.get(22)?,
        manual_override: row.get(23)?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

fn row_to_catalog_entry(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        package: row_to_unified(row)?,
        provider_name: row.get(26)?,
        provider_slug: row.get(27)?,
    })
}

/// Subset of the catalog a scoped price comparison works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonScope {
    Destination(i64),
    Region(i64),
}

impl ComparisonScope {
    /// Rows whose comparison key starts with this scope
    ///
    /// A row with a destination is keyed by it even when it also has a
    /// region, so a region scope only holds destination-less rows.
    fn where_clause(&self) -> (&'static str, i64) {
        match self {
            Self::Destination(id) => ("destination_id = ?", *id),
            Self::Region(id) => ("destination_id IS NULL AND region_id = ?", *id),
        }
    }
}

impl std::fmt::Display for ComparisonScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destination(id) => write!(f, "destination {}", id),
            Self::Region(id) => write!(f, "region {}", id),
        }
    }
}

/// Filters for listing catalog entries
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub provider_slug: Option<String>,
    pub destination_id: Option<i64>,
    pub region_id: Option<i64>,
    pub country_code: Option<String>,
    pub enabled_only: bool,
    pub best_price_only: bool,
    pub limit: Option<i64>,
}

/// Counts produced by applying a provider snapshot to the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Net `is_enabled` flips made by a selection write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionCounts {
    pub enabled: usize,
    pub disabled: usize,
}

impl std::ops::AddAssign for SelectionCounts {
    fn add_assign(&mut self, other: Self) {
        self.enabled += other.enabled;
        self.disabled += other.disabled;
    }
}

fn insert_record(tx: &Transaction<'_>, record: &CatalogRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO unified_packages (
            provider_id, provider_package_table, provider_package_id, destination_id, region_id,
            type, title, country_code, country_name, package_group_key, data_amount, validity,
            data_mb, validity_days, voice_minutes, sms_count, is_unlimited, wholesale_price,
            retail_price, currency, is_enabled, is_best_price, manual_override
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0)
        "#,
        params![
            record.provider_id,
            record.provider_package_table,
            record.provider_package_id,
            record.destination_id,
            record.region_id,
            record.package_type.as_str(),
            record.title,
            record.country_code,
            record.country_name,
            record.package_group_key,
            record.data_amount,
            record.validity,
            record.data_mb.map(|mb| mb as i64),
            record.validity_days,
            record.voice_minutes,
            record.sms_count,
            record.is_unlimited,
            record.wholesale_price,
            record.retail_price,
            record.currency,
        ],
    )?;
    Ok(())
}

fn update_record(tx: &Transaction<'_>, id: i64, record: &CatalogRecord) -> Result<()> {
    tx.execute(
        r#"
        UPDATE unified_packages SET
            provider_id = ?, destination_id = ?, region_id = ?, type = ?, title = ?,
            country_code = ?, country_name = ?, package_group_key = ?, data_amount = ?,
            validity = ?, data_mb = ?, validity_days = ?, voice_minutes = ?, sms_count = ?,
            is_unlimited = ?, wholesale_price = ?, retail_price = ?, currency = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        params![
            record.provider_id,
            record.destination_id,
            record.region_id,
            record.package_type.as_str(),
            record.title,
            record.country_code,
            record.country_name,
            record.package_group_key,
            record.data_amount,
            record.validity,
            record.data_mb.map(|mb| mb as i64),
            record.validity_days,
            record.voice_minutes,
            record.sms_count,
            record.is_unlimited,
            record.wholesale_price,
            record.retail_price,
            record.currency,
            id,
        ],
    )?;
    Ok(())
}

/// Set `is_enabled` on one row, returning the flip it caused
fn write_enabled(tx: &Transaction<'_>, id: i64, enabled: bool) -> Result<SelectionCounts> {
    let changed = tx.execute(
        "UPDATE unified_packages SET is_enabled = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND is_enabled != ?",
        params![enabled, id, enabled],
    )?;
    let mut counts = SelectionCounts::default();
    if changed > 0 {
        if enabled {
            counts.enabled += 1;
        } else {
            counts.disabled += 1;
        }
    }
    Ok(counts)
}

impl Database {
    /// Apply a provider's catalog snapshot in one transaction
    ///
    /// Inserts new identities, updates rows whose catalog columns changed and
    /// deletes rows of `table` whose identity is not in the snapshot. The
    /// selection columns of existing rows are left as they are.
    pub fn apply_catalog_snapshot(
        &self,
        table: &str,
        records: &[CatalogRecord],
    ) -> Result<SnapshotCounts> {
        let existing: HashMap<String, UnifiedPackage> = self
            .list_unified_packages_for_table(table)?
            .into_iter()
            .map(|p| (p.provider_package_id.clone(), p))
            .collect();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut counts = SnapshotCounts::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for record in records {
            // first record wins; CatalogSync reports the duplicates
            if !seen.insert(record.provider_package_id.as_str()) {
                continue;
            }
            match existing.get(&record.provider_package_id) {
                Some(row) if record.matches(row) => {}
                Some(row) => {
                    update_record(&tx, row.id, record)?;
                    counts.updated += 1;
                }
                None => {
                    insert_record(&tx, record)?;
                    counts.inserted += 1;
                }
            }
        }

        for (package_id, row) in &existing {
            if !seen.contains(package_id.as_str()) {
                tx.execute("DELETE FROM unified_packages WHERE id = ?", params![row.id])?;
                counts.removed += 1;
            }
        }

        tx.commit()?;
        Ok(counts)
    }

    /// Rows sourced from one provider table, in id order
    pub fn list_unified_packages_for_table(&self, table: &str) -> Result<Vec<UnifiedPackage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM unified_packages u WHERE u.provider_package_table = ? ORDER BY u.id",
            UNIFIED_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![table], row_to_unified)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every unified row, in id order
    pub fn list_unified_packages(&self) -> Result<Vec<UnifiedPackage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM unified_packages u ORDER BY u.id",
            UNIFIED_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], row_to_unified)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Unified rows within a destination or region, in id order
    pub fn list_unified_packages_in_scope(
        &self,
        scope: ComparisonScope,
    ) -> Result<Vec<UnifiedPackage>> {
        let (clause, id) = scope.where_clause();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM unified_packages u WHERE {} ORDER BY u.id",
            UNIFIED_COLUMNS, clause
        ))?;
        let rows = stmt
            .query_map(params![id], row_to_unified)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get a unified row by ID
    pub fn get_unified_package(&self, id: i64) -> Result<Option<UnifiedPackage>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM unified_packages u WHERE u.id = ?",
                    UNIFIED_COLUMNS
                ),
                params![id],
                row_to_unified,
            )
            .optional()?;
        Ok(row)
    }

    /// Find a unified row by its provider identity
    pub fn find_unified_package(
        &self,
        table: &str,
        provider_package_id: &str,
    ) -> Result<Option<UnifiedPackage>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM unified_packages u WHERE u.provider_package_table = ? AND u.provider_package_id = ?",
                    UNIFIED_COLUMNS
                ),
                params![table, provider_package_id],
                row_to_unified,
            )
            .optional()?;
        Ok(row)
    }

    /// List unified rows joined with their provider
    pub fn list_catalog_entries(&self, filter: &CatalogFilter) -> Result<Vec<CatalogEntry>> {
        let conn = self.conn()?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref slug) = filter.provider_slug {
            conditions.push("p.slug = ?");
            params_vec.push(Box::new(slug.clone()));
        }
        if let Some(id) = filter.destination_id {
            conditions.push("u.destination_id = ?");
            params_vec.push(Box::new(id));
        }
        if let Some(id) = filter.region_id {
            conditions.push("u.region_id = ?");
            params_vec.push(Box::new(id));
        }
        if let Some(ref code) = filter.country_code {
            conditions.push("u.country_code = ?");
            params_vec.push(Box::new(code.to_uppercase()));
        }
        if filter.enabled_only {
            conditions.push("u.is_enabled = 1");
        }
        if filter.best_price_only {
            conditions.push("u.is_best_price = 1");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = filter
            .limit
            .map(|l| format!("LIMIT {}", l.max(0)))
            .unwrap_or_default();

        let sql = format!(
            r#"
            SELECT {}, p.name, p.slug
            FROM unified_packages u
            JOIN providers p ON p.id = u.provider_id
            {}
            ORDER BY u.id
            {}
            "#,
            UNIFIED_COLUMNS, where_clause, limit_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let entries = stmt
            .query_map(params_refs.as_slice(), row_to_catalog_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Every catalog entry, in id order
    pub fn list_all_catalog_entries(&self) -> Result<Vec<CatalogEntry>> {
        self.list_catalog_entries(&CatalogFilter::default())
    }

    /// What the storefront sells
    pub fn list_enabled_packages(&self) -> Result<Vec<CatalogEntry>> {
        self.list_catalog_entries(&CatalogFilter {
            enabled_only: true,
            ..Default::default()
        })
    }

    /// Get one catalog entry by unified row id
    pub fn get_catalog_entry(&self, id: i64) -> Result<Option<CatalogEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    r#"
                    SELECT {}, p.name, p.slug
                    FROM unified_packages u
                    JOIN providers p ON p.id = u.provider_id
                    WHERE u.id = ?
                    "#,
                    UNIFIED_COLUMNS
                ),
                params![id],
                row_to_catalog_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Count unified rows
    pub fn count_unified_packages(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM unified_packages", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// Replace the best-price flags, globally or within one scope
    ///
    /// Resets `is_best_price` for every row in scope and sets it on `best_ids`,
    /// atomically.
    pub fn apply_best_prices(
        &self,
        scope: Option<ComparisonScope>,
        best_ids: &[i64],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        match scope {
            None => {
                tx.execute("UPDATE unified_packages SET is_best_price = 0", [])?;
            }
            Some(scope) => {
                let (clause, id) = scope.where_clause();
                tx.execute(
                    &format!("UPDATE unified_packages SET is_best_price = 0 WHERE {}", clause),
                    params![id],
                )?;
            }
        }

        {
            let mut stmt =
                tx.prepare("UPDATE unified_packages SET is_best_price = 1 WHERE id = ?")?;
            for id in best_ids {
                stmt.execute(params![id])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Price-only selection: `is_enabled = is_best_price` on non-override rows
    ///
    /// With `ungrouped_only`, rows that carry a group key are left alone.
    pub fn apply_price_only_selection(&self, ungrouped_only: bool) -> Result<SelectionCounts> {
        let group_filter = if ungrouped_only {
            "AND package_group_key IS NULL"
        } else {
            ""
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let enabled = tx.execute(
            &format!(
                "UPDATE unified_packages SET is_enabled = 1, updated_at = CURRENT_TIMESTAMP
                 WHERE manual_override = 0 AND is_best_price = 1 AND is_enabled = 0 {}",
                group_filter
            ),
            [],
        )?;
        let disabled = tx.execute(
            &format!(
                "UPDATE unified_packages SET is_enabled = 0, updated_at = CURRENT_TIMESTAMP
                 WHERE manual_override = 0 AND is_best_price = 0 AND is_enabled = 1 {}",
                group_filter
            ),
            [],
        )?;

        tx.commit()?;
        Ok(SelectionCounts { enabled, disabled })
    }

    /// Apply one group's composite decision
    ///
    /// The winner becomes best and enabled, the rest lose both flags. Rows
    /// with `manual_override` keep their `is_enabled`.
    pub fn apply_group_selection(
        &self,
        winner_id: i64,
        members: &[UnifiedPackage],
    ) -> Result<SelectionCounts> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut counts = SelectionCounts::default();

        for member in members {
            let is_winner = member.id == winner_id;
            tx.execute(
                "UPDATE unified_packages SET is_best_price = ? WHERE id = ?",
                params![is_winner, member.id],
            )?;
            if !member.manual_override {
                counts += write_enabled(&tx, member.id, is_winner)?;
            }
        }

        tx.commit()?;
        Ok(counts)
    }

    /// Set `is_enabled` on a row without touching its override flag
    pub fn set_package_enabled(&self, id: i64, enabled: bool) -> Result<SelectionCounts> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let counts = write_enabled(&tx, id, enabled)?;
        tx.commit()?;
        Ok(counts)
    }

    /// Admin toggle: set `is_enabled` and pin it with `manual_override`
    pub fn set_package_override(&self, id: i64, enabled: bool) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE unified_packages SET is_enabled = ?, manual_override = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![enabled, id],
        )?;
        Ok(changed > 0)
    }

    /// Drop a row's manual override, optionally resetting `is_enabled` to `is_best_price`
    pub fn clear_package_override(&self, id: i64, reset_to_best_price: bool) -> Result<bool> {
        let conn = self.conn()?;
        let sql = if reset_to_best_price {
            "UPDATE unified_packages SET manual_override = 0, is_enabled = is_best_price, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        } else {
            "UPDATE unified_packages SET manual_override = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        };
        let changed = conn.execute(sql, params![id])?;
        Ok(changed > 0)
    }

    /// Enable every row, returning how many changed
    pub fn enable_all_packages(&self) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE unified_packages SET is_enabled = 1, updated_at = CURRENT_TIMESTAMP WHERE is_enabled = 0",
            [],
        )?;
        Ok(changed)
    }

    /// Disable every row without a manual override, returning how many changed
    pub fn disable_all_packages(&self) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE unified_packages SET is_enabled = 0, updated_at = CURRENT_TIMESTAMP WHERE is_enabled = 1 AND manual_override = 0",
            [],
        )?;
        Ok(changed)
    }
}
