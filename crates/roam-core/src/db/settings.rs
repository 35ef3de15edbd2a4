//! Platform settings (key/value)

use rusqlite::{params, OptionalExtension};
use tracing::warn;

use super::Database;
use crate::error::{Error, Result};
use crate::models::SelectionMode;

/// Setting keys read by the pipeline
pub mod keys {
    pub const PACKAGE_SELECTION_MODE: &str = "package_selection_mode";
    pub const PREFERRED_PROVIDER_ID: &str = "preferred_provider_id";
    pub const AI_SELECTION_ENABLED: &str = "ai_selection_enabled";
    pub const AI_PRICE_WEIGHT: &str = "ai_price_weight";
    pub const AI_QUALITY_WEIGHT: &str = "ai_quality_weight";
    pub const AI_PROVIDER_WEIGHT: &str = "ai_provider_weight";

    pub const ALL: &[&str] = &[
        PACKAGE_SELECTION_MODE,
        PREFERRED_PROVIDER_ID,
        AI_SELECTION_ENABLED,
        AI_PRICE_WEIGHT,
        AI_QUALITY_WEIGHT,
        AI_PROVIDER_WEIGHT,
    ];
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Reject values the pipeline could not interpret
fn validate_setting(key: &str, value: &str) -> Result<()> {
    let ok = match key {
        keys::PACKAGE_SELECTION_MODE => value.parse::<SelectionMode>().is_ok(),
        keys::PREFERRED_PROVIDER_ID => value.trim().parse::<i64>().is_ok(),
        keys::AI_SELECTION_ENABLED => parse_bool(value).is_some(),
        keys::AI_PRICE_WEIGHT | keys::AI_QUALITY_WEIGHT | keys::AI_PROVIDER_WEIGHT => value
            .trim()
            .parse::<f64>()
            .map(|w| w.is_finite() && w >= 0.0)
            .unwrap_or(false),
        _ => true,
    };

    if ok {
        Ok(())
    } else {
        Err(Error::InvalidData(format!(
            "invalid value for {}: {:?}",
            key, value
        )))
    }
}

impl Database {
    /// Get a setting value
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM platform_settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Set a setting value (validated for known keys)
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        validate_setting(key, value)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO platform_settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value.trim()],
        )?;
        Ok(())
    }

    /// Remove a setting, returning whether it existed
    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM platform_settings WHERE key = ?", params![key])?;
        Ok(deleted > 0)
    }

    /// List all settings, sorted by key
    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM platform_settings ORDER BY key")?;
        let settings = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(settings)
    }

    /// Current selection mode (`auto` when unset or unreadable)
    pub fn selection_mode(&self) -> Result<SelectionMode> {
        Ok(match self.get_setting(keys::PACKAGE_SELECTION_MODE)? {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}, using auto", e);
                SelectionMode::Auto
            }),
            None => SelectionMode::Auto,
        })
    }

    /// Whether composite (AI-assisted) selection is switched on
    pub fn ai_selection_enabled(&self) -> Result<bool> {
        Ok(self
            .get_setting(keys::AI_SELECTION_ENABLED)?
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(false))
    }

    /// Preferred provider for the empty-group fallback
    pub fn preferred_provider_id(&self) -> Result<Option<i64>> {
        Ok(self
            .get_setting(keys::PREFERRED_PROVIDER_ID)?
            .and_then(|raw| raw.trim().parse().ok()))
    }

    /// A numeric setting, `None` when unset or not a number
    pub fn numeric_setting(&self, key: &str) -> Result<Option<f64>> {
        Ok(self
            .get_setting(key)?
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_validate_known_keys() {
        assert!(validate_setting(keys::PACKAGE_SELECTION_MODE, "manual").is_ok());
        assert!(validate_setting(keys::PACKAGE_SELECTION_MODE, "sometimes").is_err());
        assert!(validate_setting(keys::AI_PRICE_WEIGHT, "-5").is_err());
        assert!(validate_setting(keys::AI_PRICE_WEIGHT, "45.5").is_ok());
        assert!(validate_setting(keys::PREFERRED_PROVIDER_ID, "two").is_err());
        assert!(validate_setting("storefront_banner", "anything").is_ok());
    }
}
