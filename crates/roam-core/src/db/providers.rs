//! Provider operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::Provider;

const PROVIDER_COLUMNS: &str =
    "id, name, slug, enabled, margin_percent, sync_interval_hours, last_synced_at, created_at";

fn row_to_provider(row: &Row<'_>) -> rusqlite::Result<Provider> {
    let last_synced_str: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        enabled: row.get(3)?,
        margin_percent: row.get(4)?,
        sync_interval_hours: row.get(5)?,
        last_synced_at: last_synced_str.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Insert a provider if its slug is not registered yet, returning its id
    ///
    /// Existing rows keep their admin-edited margin and interval.
    pub fn ensure_provider(
        &self,
        slug: &str,
        name: &str,
        margin_percent: f64,
        sync_interval_hours: i64,
    ) -> Result<i64> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM providers WHERE slug = ?",
                params![slug],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO providers (name, slug, margin_percent, sync_interval_hours) VALUES (?, ?, ?, ?)",
            params![name, slug, margin_percent, sync_interval_hours],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List all providers
    pub fn list_providers(&self) -> Result<Vec<Provider>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM providers ORDER BY id",
            PROVIDER_COLUMNS
        ))?;

        let providers = stmt
            .query_map([], row_to_provider)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(providers)
    }

    /// List providers that take part in sync
    pub fn list_enabled_providers(&self) -> Result<Vec<Provider>> {
        Ok(self
            .list_providers()?
            .into_iter()
            .filter(|p| p.enabled)
            .collect())
    }

    /// Get a provider by ID
    pub fn get_provider(&self, id: i64) -> Result<Option<Provider>> {
        let conn = self.conn()?;
        let provider = conn
            .query_row(
                &format!("SELECT {} FROM providers WHERE id = ?", PROVIDER_COLUMNS),
                params![id],
                row_to_provider,
            )
            .optional()?;

        Ok(provider)
    }

    /// Get a provider by slug
    pub fn get_provider_by_slug(&self, slug: &str) -> Result<Option<Provider>> {
        let conn = self.conn()?;
        let provider = conn
            .query_row(
                &format!("SELECT {} FROM providers WHERE slug = ?", PROVIDER_COLUMNS),
                params![slug],
                row_to_provider,
            )
            .optional()?;

        Ok(provider)
    }

    /// Update a provider's margin
    pub fn set_provider_margin(&self, id: i64, margin_percent: f64) -> Result<()> {
        if !margin_percent.is_finite() || margin_percent < 0.0 {
            return Err(Error::InvalidData(format!(
                "margin must be a non-negative number, got {}",
                margin_percent
            )));
        }
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE providers SET margin_percent = ? WHERE id = ?",
            params![margin_percent, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("provider {}", id)));
        }
        Ok(())
    }

    /// Enable or disable a provider
    pub fn set_provider_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE providers SET enabled = ? WHERE id = ?",
            params![enabled, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("provider {}", id)));
        }
        Ok(())
    }

    /// Update how often the scheduler syncs a provider
    pub fn set_provider_sync_interval(&self, id: i64, hours: i64) -> Result<()> {
        if hours < 1 {
            return Err(Error::InvalidData(format!(
                "sync interval must be at least 1 hour, got {}",
                hours
            )));
        }
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE providers SET sync_interval_hours = ? WHERE id = ?",
            params![hours, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("provider {}", id)));
        }
        Ok(())
    }

    /// Record a successful sync
    pub fn mark_provider_synced(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE providers SET last_synced_at = ? WHERE id = ?",
            params![format_datetime(&at), id],
        )?;
        Ok(())
    }
}
