//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, config and analyzer setup)
//! - `export` - Catalog export
//! - `import` - Loading provider packages from JSON
//! - `packages` - Catalog listing, toggles, overrides, alternatives
//! - `pipeline` - Sync, compare, select and the full run
//! - `providers` - Provider management
//! - `schedule` - Periodic sync scheduler and sync history
//! - `settings` - Platform settings

pub mod core;
pub mod export;
pub mod import;
pub mod packages;
pub mod pipeline;
pub mod providers;
pub mod schedule;
pub mod settings;

// Re-export command functions for main.rs
pub use core::*;
pub use export::*;
pub use import::*;
pub use packages::*;
pub use pipeline::*;
pub use providers::*;
pub use schedule::*;
pub use settings::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
