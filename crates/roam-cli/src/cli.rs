//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Roam - eSIM catalog sync, pricing and selection
#[derive(Parser)]
#[command(name = "roam")]
#[command(about = "Unified eSIM catalog: sync providers, compare prices, pick packages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "roam.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed the known providers
    Init,

    /// Manage providers (margins, sync intervals, enabled flag)
    Providers {
        #[command(subcommand)]
        action: Option<ProvidersAction>,
    },

    /// Load provider packages from a JSON file into a provider table
    Import {
        /// Provider slug (airalo, esim-go, esim-access, maya)
        #[arg(short, long)]
        provider: String,

        /// JSON file containing an array of packages
        #[arg(short, long)]
        file: PathBuf,

        /// Replace the provider's whole table instead of appending
        #[arg(long)]
        replace: bool,
    },

    /// Sync provider tables into the unified catalog
    Sync {
        /// Only sync this provider
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Recompute best-price flags
    Compare {
        /// Only packages for this destination
        #[arg(long, conflicts_with = "region")]
        destination: Option<i64>,

        /// Only packages for this region
        #[arg(long)]
        region: Option<i64>,
    },

    /// Run auto-selection (enable/disable packages)
    Select,

    /// Full pipeline: sync, compare, select
    Run,

    /// List unified catalog packages
    Packages {
        /// Filter by provider slug
        #[arg(short, long)]
        provider: Option<String>,

        /// Filter by destination id
        #[arg(long)]
        destination: Option<i64>,

        /// Filter by region id
        #[arg(long)]
        region: Option<i64>,

        /// Filter by ISO country code
        #[arg(long)]
        country: Option<String>,

        /// Only storefront-visible packages
        #[arg(long)]
        enabled: bool,

        /// Only best-price packages
        #[arg(long)]
        best: bool,

        /// Maximum number of rows
        #[arg(short, long, default_value = "50")]
        limit: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Enable or disable a package by hand (sets a manual override)
    Toggle {
        /// Unified package id
        id: i64,

        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },

    /// Hand a package back to auto-selection
    ClearOverride {
        /// Unified package id
        id: i64,
    },

    /// Enable every package
    EnableAll,

    /// Disable every package
    DisableAll,

    /// Suggest alternatives for a package spec nobody sells exactly
    Alternatives {
        /// Destination id
        #[arg(long)]
        destination: Option<i64>,

        /// Region id (used when no destination is given)
        #[arg(long)]
        region: Option<i64>,

        /// Data amount, e.g. "2GB", "500MB" or "unlimited"
        #[arg(long)]
        data: String,

        /// Validity in days
        #[arg(long)]
        days: u32,

        /// Target retail price
        #[arg(long)]
        price: f64,

        /// Maximum number of suggestions
        #[arg(short, long)]
        max: Option<usize>,

        /// Ask the AI backend to write the descriptions
        #[arg(long)]
        ai: bool,
    },

    /// Manage platform settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Export the unified catalog
    Export {
        /// Format: csv or json
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only storefront-visible packages
        #[arg(long)]
        enabled: bool,
    },

    /// Show sync history
    History {
        /// Only runs for this provider
        #[arg(short, long)]
        provider: Option<String>,

        /// Maximum number of runs
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Run the periodic sync scheduler
    Schedule {
        /// Run a single tick and wait for its cycles instead of looping
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
pub enum ProvidersAction {
    /// List providers
    List,

    /// Set a provider's margin percentage
    Margin {
        /// Provider slug
        slug: String,

        /// Margin in percent (e.g. 25)
        percent: f64,
    },

    /// Enable a provider
    Enable {
        /// Provider slug
        slug: String,
    },

    /// Disable a provider
    Disable {
        /// Provider slug
        slug: String,
    },

    /// Set a provider's sync interval
    Interval {
        /// Provider slug
        slug: String,

        /// Hours between syncs
        hours: i64,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// List all settings
    List,

    /// Show one setting
    Get {
        /// Setting key
        key: String,
    },

    /// Set a setting
    Set {
        /// Setting key
        key: String,

        /// New value
        value: String,
    },

    /// Remove a setting (falls back to the default)
    Unset {
        /// Setting key
        key: String,
    },
}
