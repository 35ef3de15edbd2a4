//! Scheduler and sync history commands

use anyhow::Result;
use roam_core::db::Database;
use roam_core::scheduler::SyncScheduler;
use tracing::{info, warn};

use super::{build_analyzer, load_config};

pub fn cmd_history(db: &Database, provider: Option<&str>, limit: i64) -> Result<()> {
    let runs = db.list_sync_runs(provider, limit)?;

    if runs.is_empty() {
        println!("No syncs recorded yet. Run one with:");
        println!("  roam sync");
        return Ok(());
    }

    println!();
    println!("🕘 Sync History");
    println!("   ─────────────────────────────────────────────────────────────");

    for run in runs {
        let duration = run
            .completed_at
            .map(|end| format!("{}s", (end - run.started_at).num_seconds()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   [{:>4}] {} {:<12} {:<9} +{} ~{} -{} ({})",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.provider_slug,
            run.status.as_str(),
            run.packages_synced,
            run.packages_updated,
            run.packages_removed,
            duration
        );
        for e in &run.errors {
            println!("          ⚠️  {}", e);
        }
    }

    Ok(())
}

pub async fn cmd_schedule(db: &Database, once: bool) -> Result<()> {
    let config = load_config()?;
    let scheduler = SyncScheduler::new(db.clone(), build_analyzer(&config), config);

    if once {
        println!("⏱️  Running due provider cycles...");
        let handles = scheduler.tick()?;
        let started = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Scheduler cycle task failed: {}", e);
            }
        }

        for schedule in scheduler.schedules() {
            let status = match &schedule.last_error {
                Some(e) => format!("⚠️  {}", e),
                None => "ok".to_string(),
            };
            println!(
                "   {:<12} next {}  {}",
                schedule.slug,
                schedule.next_due.format("%Y-%m-%d %H:%M"),
                status
            );
        }
        println!("✅ {} cycle(s) run", started);
        return Ok(());
    }

    println!("⏱️  Scheduler running. Press Ctrl+C to stop.");
    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await;

    Ok(())
}
