//! Periodic provider sync
//!
//! Every tick, each enabled provider whose sync is due gets a cycle:
//! sync its table into the catalog, then (under the pipeline lock) run
//! price comparison and auto-selection. A provider never has two cycles in
//! flight; different providers may sync concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ai::PackageAnalyzer;
use crate::cache::{Clock, SystemClock};
use crate::catalog::CatalogSync;
use crate::config::RoamConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{AutoSelectionResult, PriceComparisonResult, SyncResult};
use crate::pricing::PriceComparison;
use crate::providers;
use crate::selection::AutoSelector;

/// Scheduling state of one provider
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSchedule {
    pub slug: String,
    pub next_due: DateTime<Utc>,
    pub is_running: bool,
    pub last_error: Option<String>,
}

/// What one cycle did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub provider: String,
    pub sync: SyncResult,
    pub comparison: Option<PriceComparisonResult>,
    pub selection: Option<AutoSelectionResult>,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.sync.success && self.comparison.is_some() && self.selection.is_some()
    }
}

struct Inner {
    db: Database,
    sync: CatalogSync,
    comparison: PriceComparison,
    selector: AutoSelector,
    config: RoamConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<HashMap<String, ProviderSchedule>>,
    pipeline: tokio::sync::Mutex<()>,
}

/// Per-provider sync scheduler
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

impl SyncScheduler {
    pub fn new(db: Database, analyzer: Arc<PackageAnalyzer>, config: RoamConfig) -> Self {
        Self::with_clock(db, analyzer, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        db: Database,
        analyzer: Arc<PackageAnalyzer>,
        config: RoamConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sync: CatalogSync::new(db.clone()),
                comparison: PriceComparison::new(db.clone()),
                selector: AutoSelector::new(db.clone(), analyzer, config.clone()),
                db,
                config,
                clock,
                state: Mutex::new(HashMap::new()),
                pipeline: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HashMap<String, ProviderSchedule>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every provider's schedule, ordered by slug
    pub fn schedules(&self) -> Vec<ProviderSchedule> {
        let mut all: Vec<_> = self.state().values().cloned().collect();
        all.sort_by(|a, b| a.slug.cmp(&b.slug));
        all
    }

    /// Bring the schedule in line with the enabled providers
    ///
    /// A newly enabled provider that has never synced is due immediately;
    /// otherwise it is due one interval after its last sync. Idle entries of
    /// providers that are no longer enabled are dropped.
    fn refresh_providers(&self) -> Result<()> {
        let providers = self.inner.db.list_enabled_providers()?;
        let mut state = self.state();

        state.retain(|slug, schedule| {
            let keep = schedule.is_running || providers.iter().any(|p| &p.slug == slug);
            if !keep {
                debug!(provider = %slug, "Provider disabled, removed from schedule");
            }
            keep
        });

        for provider in providers {
            state.entry(provider.slug.clone()).or_insert_with(|| {
                let next_due = provider
                    .last_synced_at
                    .map(|at| at + ChronoDuration::hours(provider.sync_interval_hours))
                    .unwrap_or_else(|| self.inner.clock.now());
                ProviderSchedule {
                    slug: provider.slug.clone(),
                    next_due,
                    is_running: false,
                    last_error: None,
                }
            });
        }
        Ok(())
    }

    /// Claim a provider for a cycle, `false` if it is already running
    fn try_start(&self, slug: &str) -> bool {
        let now = self.inner.clock.now();
        let mut state = self.state();
        let entry = state.entry(slug.to_string()).or_insert_with(|| ProviderSchedule {
            slug: slug.to_string(),
            next_due: now,
            is_running: false,
            last_error: None,
        });
        if entry.is_running {
            return false;
        }
        entry.is_running = true;
        true
    }

    fn finish(&self, slug: &str, outcome: &Result<CycleReport>) {
        let now = self.inner.clock.now();
        let interval_hours = self
            .inner
            .db
            .get_provider_by_slug(slug)
            .ok()
            .flatten()
            .map(|p| p.sync_interval_hours)
            .unwrap_or(24);

        let (next_due, last_error) = match outcome {
            Ok(report) if report.succeeded() => (now + ChronoDuration::hours(interval_hours), None),
            Ok(report) => {
                let message = report
                    .sync
                    .errors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "cycle incomplete".to_string());
                (self.retry_at(now), Some(message))
            }
            Err(e) => (self.retry_at(now), Some(e.to_string())),
        };

        let mut state = self.state();
        if let Some(entry) = state.get_mut(slug) {
            entry.is_running = false;
            entry.next_due = next_due;
            entry.last_error = last_error;
        }
        debug!(provider = slug, next_due = %next_due, "Provider rescheduled");
    }

    fn retry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + ChronoDuration::from_std(self.inner.config.scheduler.retry_after)
            .unwrap_or_else(|_| ChronoDuration::minutes(5))
    }

    /// One full cycle for a provider, bounded by the cycle timeout
    async fn run_cycle(&self, slug: String) -> Result<CycleReport> {
        let timeout = self.inner.config.scheduler.cycle_timeout;
        match tokio::time::timeout(timeout, self.cycle(slug.clone())).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(format!(
                "{} cycle exceeded {}s",
                slug,
                timeout.as_secs()
            ))),
        }
    }

    async fn cycle(&self, slug: String) -> Result<CycleReport> {
        info!(provider = %slug, "Starting sync cycle");

        let sync = self.inner.sync.clone();
        let sync_slug = slug.clone();
        let sync_result =
            tokio::task::spawn_blocking(move || sync.sync_provider_packages(&sync_slug))
                .await
                .map_err(|e| Error::Task(e.to_string()))??;

        let mut report = CycleReport {
            provider: slug.clone(),
            sync: sync_result,
            comparison: None,
            selection: None,
        };
        if !report.sync.success {
            warn!(provider = %slug, errors = ?report.sync.errors, "Sync failed, skipping selection");
            return Ok(report);
        }

        let _pipeline = self.inner.pipeline.lock().await;

        let comparison = self.inner.comparison.clone();
        report.comparison = Some(
            tokio::task::spawn_blocking(move || comparison.run_price_comparison())
                .await
                .map_err(|e| Error::Task(e.to_string()))??,
        );
        report.selection = Some(self.inner.selector.run_auto_selection().await?);

        info!(provider = %slug, "Sync cycle complete");
        Ok(report)
    }

    /// Run one cycle for a provider right now
    ///
    /// Refuses when a cycle for the same provider is already in flight.
    pub async fn run_now(&self, slug: &str) -> Result<CycleReport> {
        let strategy = providers::strategy_for(slug)?;
        if !self.try_start(strategy.slug) {
            return Err(Error::InvalidData(format!(
                "sync for {} is already running",
                strategy.slug
            )));
        }

        let outcome = self.run_cycle(strategy.slug.to_string()).await;
        if let Err(e) = &outcome {
            error!(provider = strategy.slug, "Sync cycle failed: {}", e);
        }
        self.finish(strategy.slug, &outcome);
        outcome
    }

    /// Start a cycle for every due provider that is not already running
    ///
    /// Returns the handles of the spawned cycles.
    pub fn tick(&self) -> Result<Vec<JoinHandle<()>>> {
        self.refresh_providers()?;
        let now = self.inner.clock.now();

        let due: Vec<String> = self
            .state()
            .values()
            .filter(|s| !s.is_running && s.next_due <= now)
            .map(|s| s.slug.clone())
            .collect();

        let mut handles = Vec::with_capacity(due.len());
        for slug in due {
            if !self.try_start(&slug) {
                continue;
            }
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                let outcome = scheduler.run_cycle(slug.clone()).await;
                if let Err(e) = &outcome {
                    error!(provider = %slug, "Sync cycle failed: {}", e);
                }
                scheduler.finish(&slug, &outcome);
            }));
        }
        Ok(handles)
    }

    /// Tick until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.inner.config.scheduler.tick);
        tokio::pin!(shutdown);
        info!(
            tick_secs = self.inner.config.scheduler.tick.as_secs(),
            "Sync scheduler started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("Scheduler tick failed: {}", e);
                    }
                }
            }
        }
        info!("Sync scheduler stopped");
    }

    /// Run the scheduler in the background until the process exits
    pub fn spawn(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_until(std::future::pending()).await })
    }
}
