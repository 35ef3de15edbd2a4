//! Domain models for Roam

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coverage class of a package as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// Single-country package
    #[default]
    Local,
    /// Multi-country regional package
    Regional,
    /// Worldwide package
    Global,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Regional => "regional",
            Self::Global => "global",
        }
    }
}

impl std::str::FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "country" => Ok(Self::Local),
            "regional" | "region" => Ok(Self::Regional),
            "global" => Ok(Self::Global),
            _ => Err(format!("Unknown package type: {}", s)),
        }
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Global package selection mode (`package_selection_mode` setting)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Auto-selection decides which packages are visible
    #[default]
    Auto,
    /// Admins decide; auto-selection is a no-op
    Manual,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown selection mode: {}", s)),
        }
    }
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An upstream eSIM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub enabled: bool,
    /// Markup applied on top of the wholesale price, in percent
    pub margin_percent: f64,
    pub sync_interval_hours: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A raw package row read from a provider-specific table
///
/// Owned by the provider's sync process; the core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPackage {
    /// Internal row id in the provider table
    pub row_id: i64,
    /// Identity used by the unified catalog (row id or provider external id)
    pub package_key: Option<String>,
    pub destination_id: Option<i64>,
    pub region_id: Option<i64>,
    pub package_type: PackageType,
    pub title: String,
    pub operator: Option<String>,
    /// Free-text data amount ("1GB", "500 MB", "Unlimited")
    pub data_amount: String,
    /// Validity in days as supplied by the provider
    pub validity: i64,
    pub voice_credits: Option<i64>,
    pub sms_credits: Option<i64>,
    pub is_unlimited: bool,
    pub slug: String,
    /// ISO codes covered by the package, when the provider reports them
    pub coverage: Option<Vec<String>>,
    /// Generic price column
    pub price: Option<String>,
    /// Provider-specific cost column (e.g. Airalo's net price)
    pub provider_price: Option<String>,
    pub currency: String,
}

/// A provider package to be written into a provider table
///
/// This is the shape provider sync services (and `roam import`) hand over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProviderPackage {
    /// External identifier, required for providers keyed by external id (Maya)
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub destination_id: Option<i64>,
    #[serde(default)]
    pub region_id: Option<i64>,
    #[serde(default, rename = "type")]
    pub package_type: PackageType,
    pub title: String,
    #[serde(default)]
    pub operator: Option<String>,
    pub data_amount: String,
    pub validity: i64,
    #[serde(default)]
    pub voice_credits: Option<i64>,
    #[serde(default)]
    pub sms_credits: Option<i64>,
    #[serde(default)]
    pub is_unlimited: bool,
    pub slug: String,
    #[serde(default)]
    pub coverage: Option<Vec<String>>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub provider_price: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// A row in the unified catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedPackage {
    pub id: i64,
    pub provider_id: i64,
    pub provider_package_table: String,
    pub provider_package_id: String,
    pub destination_id: Option<i64>,
    pub region_id: Option<i64>,
    pub package_type: PackageType,
    pub title: String,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    /// Cross-provider grouping key, `None` when the country is unresolved
    pub package_group_key: Option<String>,
    pub data_amount: String,
    pub validity: i64,
    /// Normalized data in MB, `None` means unlimited
    pub data_mb: Option<u64>,
    pub validity_days: u32,
    pub voice_minutes: u32,
    pub sms_count: u32,
    pub is_unlimited: bool,
    pub wholesale_price: String,
    pub retail_price: String,
    pub currency: String,
    /// Visible to customers
    pub is_enabled: bool,
    /// Cheapest in its comparison group
    pub is_best_price: bool,
    /// Admin-pinned; auto-selection leaves `is_enabled` alone
    pub manual_override: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnifiedPackage {
    /// Retail price as a number, `None` if the stored string does not parse
    pub fn retail_amount(&self) -> Option<f64> {
        self.retail_price.trim().parse::<f64>().ok().filter(|p| p.is_finite())
    }
}

/// The catalog-owned fields of a unified row, as computed by sync
///
/// Selection columns (`is_enabled`, `is_best_price`, `manual_override`) are
/// deliberately absent: sync never writes them on update.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub provider_id: i64,
    pub provider_package_table: String,
    pub provider_package_id: String,
    pub destination_id: Option<i64>,
    pub region_id: Option<i64>,
    pub package_type: PackageType,
    pub title: String,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub package_group_key: Option<String>,
    pub data_amount: String,
    pub validity: i64,
    pub data_mb: Option<u64>,
    pub validity_days: u32,
    pub voice_minutes: u32,
    pub sms_count: u32,
    pub is_unlimited: bool,
    pub wholesale_price: String,
    pub retail_price: String,
    pub currency: String,
}

impl CatalogRecord {
    /// Whether an existing row already carries exactly these catalog fields
    pub fn matches(&self, row: &UnifiedPackage) -> bool {
        self.provider_id == row.provider_id
            && self.destination_id == row.destination_id
            && self.region_id == row.region_id
            && self.package_type == row.package_type
            && self.title == row.title
            && self.country_code == row.country_code
            && self.country_name == row.country_name
            && self.package_group_key == row.package_group_key
            && self.data_amount == row.data_amount
            && self.validity == row.validity
            && self.data_mb == row.data_mb
            && self.validity_days == row.validity_days
            && self.voice_minutes == row.voice_minutes
            && self.sms_count == row.sms_count
            && self.is_unlimited == row.is_unlimited
            && self.wholesale_price == row.wholesale_price
            && self.retail_price == row.retail_price
            && self.currency == row.currency
    }
}

/// A unified row joined with its provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub package: UnifiedPackage,
    pub provider_name: String,
    pub provider_slug: String,
}

/// Outcome of syncing one provider into the unified catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub provider: String,
    pub packages_synced: usize,
    pub packages_updated: usize,
    pub packages_removed: usize,
    pub errors: Vec<String>,
}

/// Outcome of syncing every enabled provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAllResult {
    pub success: bool,
    pub packages_synced: usize,
    pub packages_updated: usize,
    pub packages_removed: usize,
    pub errors: Vec<String>,
    pub providers: Vec<SyncResult>,
}

/// Outcome of a price comparison run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparisonResult {
    pub success: bool,
    pub total_packages: usize,
    pub best_price_packages: usize,
    pub errors: Vec<String>,
}

/// One composite-scored group decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiDecision {
    pub group_key: String,
    pub selected_package_id: i64,
    pub provider_name: String,
    pub final_score: u32,
    pub candidates: usize,
    pub reasoning: Option<String>,
    /// Whether the AI analyzer contributed the quality score
    pub ai_enhanced: bool,
    /// Set when the group fell back to cheapest-retail selection
    pub fallback: bool,
}

/// Outcome of an auto-selection run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSelectionResult {
    pub success: bool,
    pub mode: SelectionMode,
    pub packages_enabled: usize,
    pub packages_disabled: usize,
    pub errors: Vec<String>,
    pub ai_enabled: bool,
    pub ai_decisions: Vec<AiDecision>,
}

/// Status of a recorded sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}

/// History row for a provider sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: i64,
    pub provider_slug: String,
    pub status: SyncStatus,
    pub packages_synced: i64,
    pub packages_updated: i64,
    pub packages_removed: i64,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_type_round_trip_names() {
        assert_eq!("local".parse::<PackageType>().unwrap(), PackageType::Local);
        assert_eq!("Regional".parse::<PackageType>().unwrap(), PackageType::Regional);
        assert!("galactic".parse::<PackageType>().is_err());
        assert_eq!(PackageType::Global.to_string(), "global");
    }

    #[test]
    fn test_selection_mode_parse() {
        assert_eq!(" AUTO ".parse::<SelectionMode>().unwrap(), SelectionMode::Auto);
        assert_eq!("manual".parse::<SelectionMode>().unwrap(), SelectionMode::Manual);
        assert!("marketplace".parse::<SelectionMode>().is_err());
    }

    #[test]
    fn test_result_field_names_are_camel_case() {
        let result = SyncResult {
            success: true,
            provider: "airalo".into(),
            packages_synced: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["packagesSynced"], 2);
        assert!(json.get("packagesUpdated").is_some());
        assert!(json["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_new_provider_package_defaults() {
        let pkg: NewProviderPackage = serde_json::from_str(
            r#"{"title":"Japan 1GB","dataAmount":"1GB","validity":7,"slug":"japan-7days-1gb","price":"3.00"}"#,
        )
        .unwrap();
        assert_eq!(pkg.currency, "USD");
        assert_eq!(pkg.package_type, PackageType::Local);
        assert!(!pkg.is_unlimited);
    }
}
