//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `providers` - Provider rows (margin, sync interval, enabled flag)
//! - `provider_packages` - Provider-specific package tables (read by sync)
//! - `unified` - The unified catalog and its selection flags
//! - `settings` - Platform key/value settings
//! - `sync_runs` - Sync history

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod provider_packages;
mod providers;
mod settings;
mod sync_runs;
mod unified;

pub use settings::keys as setting_keys;
pub use unified::{CatalogFilter, ComparisonScope, SelectionCounts, SnapshotCounts};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database file and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise see its own empty in-memory database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "roam_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the sync writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Upstream providers
            CREATE TABLE IF NOT EXISTS providers (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                margin_percent REAL NOT NULL DEFAULT 0,
                sync_interval_hours INTEGER NOT NULL DEFAULT 24,
                last_synced_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Provider package tables (written by provider sync services)
            CREATE TABLE IF NOT EXISTS airalo_packages (
                id INTEGER PRIMARY KEY,
                destination_id INTEGER,
                region_id INTEGER,
                type TEXT NOT NULL DEFAULT 'local',
                title TEXT NOT NULL,
                operator TEXT,
                data_amount TEXT NOT NULL,
                validity INTEGER NOT NULL,
                voice_credits INTEGER,
                sms_credits INTEGER,
                is_unlimited BOOLEAN NOT NULL DEFAULT 0,
                slug TEXT NOT NULL,
                coverage TEXT,                             -- JSON array of ISO codes
                airalo_price TEXT,                         -- net price charged by Airalo
                price TEXT,                                -- listed price, fallback cost
                currency TEXT NOT NULL DEFAULT 'USD',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS esim_go_packages (
                id INTEGER PRIMARY KEY,
                destination_id INTEGER,
                region_id INTEGER,
                type TEXT NOT NULL DEFAULT 'local',
                title TEXT NOT NULL,
                operator TEXT,
                data_amount TEXT NOT NULL,
                validity INTEGER NOT NULL,
                voice_credits INTEGER,
                sms_credits INTEGER,
                is_unlimited BOOLEAN NOT NULL DEFAULT 0,
                slug TEXT NOT NULL,
                coverage TEXT,
                price TEXT,
                currency TEXT NOT NULL DEFAULT 'USD',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS esim_access_packages (
                id INTEGER PRIMARY KEY,
                destination_id INTEGER,
                region_id INTEGER,
                type TEXT NOT NULL DEFAULT 'local',
                title TEXT NOT NULL,
                operator TEXT,
                data_amount TEXT NOT NULL,
                validity INTEGER NOT NULL,
                voice_credits INTEGER,
                sms_credits INTEGER,
                is_unlimited BOOLEAN NOT NULL DEFAULT 0,
                slug TEXT NOT NULL,
                coverage TEXT,
                price TEXT,
                currency TEXT NOT NULL DEFAULT 'USD',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS maya_packages (
                id INTEGER PRIMARY KEY,
                maya_id TEXT UNIQUE,                       -- Maya's own package identifier
                destination_id INTEGER,
                region_id INTEGER,
                type TEXT NOT NULL DEFAULT 'local',
                title TEXT NOT NULL,
                operator TEXT,
                data_amount TEXT NOT NULL,
                validity INTEGER NOT NULL,
                voice_credits INTEGER,
                sms_credits INTEGER,
                is_unlimited BOOLEAN NOT NULL DEFAULT 0,
                slug TEXT NOT NULL,
                coverage TEXT,
                price TEXT,
                currency TEXT NOT NULL DEFAULT 'USD',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Unified catalog (what the storefront reads)
            CREATE TABLE IF NOT EXISTS unified_packages (
                id INTEGER PRIMARY KEY,
                provider_id INTEGER NOT NULL REFERENCES providers(id) ON DELETE CASCADE,
                provider_package_table TEXT NOT NULL,
                provider_package_id TEXT NOT NULL,
                destination_id INTEGER,
                region_id INTEGER,
                type TEXT NOT NULL DEFAULT 'local',
                title TEXT NOT NULL,
                country_code TEXT,
                country_name TEXT,
                package_group_key TEXT,                    -- NULL when country unresolved
                data_amount TEXT NOT NULL,                 -- raw provider string
                validity INTEGER NOT NULL,                 -- raw provider validity
                data_mb INTEGER,                           -- NULL = unlimited
                validity_days INTEGER NOT NULL,
                voice_minutes INTEGER NOT NULL DEFAULT 0,
                sms_count INTEGER NOT NULL DEFAULT 0,
                is_unlimited BOOLEAN NOT NULL DEFAULT 0,
                wholesale_price TEXT NOT NULL,
                retail_price TEXT NOT NULL,
                currency TEXT NOT NULL DEFAULT 'USD',
                is_enabled BOOLEAN NOT NULL DEFAULT 0,
                is_best_price BOOLEAN NOT NULL DEFAULT 0,
                manual_override BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(provider_package_table, provider_package_id)
            );

            CREATE INDEX IF NOT EXISTS idx_unified_provider ON unified_packages(provider_id);
            CREATE INDEX IF NOT EXISTS idx_unified_group ON unified_packages(package_group_key);
            CREATE INDEX IF NOT EXISTS idx_unified_destination ON unified_packages(destination_id);
            CREATE INDEX IF NOT EXISTS idx_unified_region ON unified_packages(region_id);
            CREATE INDEX IF NOT EXISTS idx_unified_enabled ON unified_packages(is_enabled);

            -- Platform settings (written by admins)
            CREATE TABLE IF NOT EXISTS platform_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Sync history (one row per provider sync)
            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY,
                provider_slug TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'running',    -- running, completed, failed
                packages_synced INTEGER NOT NULL DEFAULT 0,
                packages_updated INTEGER NOT NULL DEFAULT 0,
                packages_removed INTEGER NOT NULL DEFAULT 0,
                errors TEXT,                               -- JSON array of messages
                started_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                completed_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_sync_runs_provider ON sync_runs(provider_slug);
            CREATE INDEX IF NOT EXISTS idx_sync_runs_started ON sync_runs(started_at);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
