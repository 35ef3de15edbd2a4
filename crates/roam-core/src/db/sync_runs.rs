//! Sync history

use rusqlite::{params, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{SyncResult, SyncRun, SyncStatus};

fn row_to_sync_run(row: &Row<'_>) -> rusqlite::Result<SyncRun> {
    let status_str: String = row.get(2)?;
    let errors_str: Option<String> = row.get(6)?;
    let started_at_str: String = row.get(7)?;
    let completed_at_str: Option<String> = row.get(8)?;

    Ok(SyncRun {
        id: row.get(0)?,
        provider_slug: row.get(1)?,
        status: status_str.parse().unwrap_or(SyncStatus::Failed),
        packages_synced: row.get(3)?,
        packages_updated: row.get(4)?,
        packages_removed: row.get(5)?,
        errors: errors_str
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        started_at: parse_datetime(&started_at_str),
        completed_at: completed_at_str.map(|s| parse_datetime(&s)),
    })
}

impl Database {
    /// Record the start of a provider sync
    pub fn start_sync_run(&self, provider_slug: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_runs (provider_slug, status) VALUES (?, 'running')",
            params![provider_slug],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record how a provider sync ended
    pub fn finish_sync_run(&self, id: i64, result: &SyncResult) -> Result<()> {
        let status = if result.success {
            SyncStatus::Completed
        } else {
            SyncStatus::Failed
        };
        let errors = serde_json::to_string(&result.errors)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE sync_runs
            SET status = ?, packages_synced = ?, packages_updated = ?, packages_removed = ?,
                errors = ?, completed_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                status.as_str(),
                result.packages_synced as i64,
                result.packages_updated as i64,
                result.packages_removed as i64,
                errors,
                id,
            ],
        )?;
        Ok(())
    }

    /// Most recent sync runs, newest first
    pub fn list_sync_runs(&self, provider_slug: Option<&str>, limit: i64) -> Result<Vec<SyncRun>> {
        let conn = self.conn()?;
        let base = "SELECT id, provider_slug, status, packages_synced, packages_updated, packages_removed, errors, started_at, completed_at FROM sync_runs";

        let runs = if let Some(slug) = provider_slug {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE provider_slug = ? ORDER BY id DESC LIMIT ?",
                base
            ))?;
            let rows = stmt
                .query_map(params![slug, limit], row_to_sync_run)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!("{} ORDER BY id DESC LIMIT ?", base))?;
            let rows = stmt
                .query_map(params![limit], row_to_sync_run)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        Ok(runs)
    }
}
