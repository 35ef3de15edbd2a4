//! Roam CLI - eSIM catalog pipeline
//!
//! Usage:
//!   roam init                         Initialize database and providers
//!   roam import -p airalo -f pkgs.json Load provider packages
//!   roam run                          Sync, compare prices, auto-select
//!   roam packages --enabled           Show the storefront catalog
//!   roam schedule                     Keep providers in sync periodically

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use roam_core::db::CatalogFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Providers { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(ProvidersAction::List) => commands::cmd_providers_list(&db),
                Some(ProvidersAction::Margin { slug, percent }) => {
                    commands::cmd_providers_margin(&db, &slug, percent)
                }
                Some(ProvidersAction::Enable { slug }) => {
                    commands::cmd_providers_set_enabled(&db, &slug, true)
                }
                Some(ProvidersAction::Disable { slug }) => {
                    commands::cmd_providers_set_enabled(&db, &slug, false)
                }
                Some(ProvidersAction::Interval { slug, hours }) => {
                    commands::cmd_providers_interval(&db, &slug, hours)
                }
            }
        }
        Commands::Import {
            provider,
            file,
            replace,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_import(&db, &provider, &file, replace)
        }
        Commands::Sync { provider } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_sync(&db, provider.as_deref())
        }
        Commands::Compare {
            destination,
            region,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_compare(&db, destination, region)
        }
        Commands::Select => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_select(&db).await
        }
        Commands::Run => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_run(&db).await
        }
        Commands::Packages {
            provider,
            destination,
            region,
            country,
            enabled,
            best,
            limit,
            json,
        } => {
            let db = commands::open_db(&cli.db)?;
            let filter = CatalogFilter {
                provider_slug: provider,
                destination_id: destination,
                region_id: region,
                country_code: country,
                enabled_only: enabled,
                best_price_only: best,
                limit: Some(limit),
            };
            commands::cmd_packages(&db, &filter, json)
        }
        Commands::Toggle { id, off } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_toggle(&db, id, !off)
        }
        Commands::ClearOverride { id } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_clear_override(&db, id)
        }
        Commands::EnableAll => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_enable_all(&db)
        }
        Commands::DisableAll => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_disable_all(&db)
        }
        Commands::Alternatives {
            destination,
            region,
            data,
            days,
            price,
            max,
            ai,
        } => {
            let db = commands::open_db(&cli.db)?;
            let request = commands::AlternativesRequest {
                destination_id: destination,
                region_id: region,
                data: &data,
                validity_days: days,
                price,
                max_results: max,
                use_ai: ai,
            };
            commands::cmd_alternatives(&db, &request).await
        }
        Commands::Settings { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(SettingsAction::List) => commands::cmd_settings_list(&db),
                Some(SettingsAction::Get { key }) => commands::cmd_settings_get(&db, &key),
                Some(SettingsAction::Set { key, value }) => {
                    commands::cmd_settings_set(&db, &key, &value)
                }
                Some(SettingsAction::Unset { key }) => commands::cmd_settings_unset(&db, &key),
            }
        }
        Commands::Export {
            format,
            output,
            enabled,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_export(&db, &format, output.as_deref(), enabled)
        }
        Commands::History { provider, limit } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_history(&db, provider.as_deref(), limit)
        }
        Commands::Schedule { once } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_schedule(&db, once).await
        }
    }
}
