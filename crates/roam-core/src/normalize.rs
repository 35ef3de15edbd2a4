//! Package normalization
//!
//! Providers describe the same offer in different ways: "1GB", "1024 MB",
//! "1.5 gb", "Unlimited". This module turns those raw fields into canonical
//! units (MB, days, minutes, SMS count) so packages from different providers
//! can be compared and grouped.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{ProviderPackage, UnifiedPackage};

/// Default relative tolerance for data amount comparison (5%)
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Canonical view of a package's allowances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPackageData {
    /// Data in MB, `None` means unlimited
    pub data_mb: Option<u64>,
    pub validity_days: u32,
    pub voice_minutes: u32,
    pub sms_count: u32,
}

impl NormalizedPackageData {
    pub fn is_unlimited(&self) -> bool {
        self.data_mb.is_none()
    }

    /// Read the normalized fields already stored on a catalog row
    pub fn from_unified(pkg: &UnifiedPackage) -> Self {
        Self {
            data_mb: pkg.data_mb,
            validity_days: pkg.validity_days,
            voice_minutes: pkg.voice_minutes,
            sms_count: pkg.sms_count,
        }
    }
}

/// Result of parsing a free-text data amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataAmount {
    Megabytes(u64),
    Unlimited,
    /// Nothing numeric and no unlimited marker
    Unparseable,
}

impl DataAmount {
    /// Parse a raw provider data string
    ///
    /// Whitespace is stripped and the string uppercased. Anything containing
    /// `UNLIMITED`/`UNLIM` is unlimited regardless of other content. Exact
    /// `<n>GB` / `<n>MB` forms are converted directly; otherwise the first
    /// number is taken and the unit guessed by magnitude (> 100 is MB).
    pub fn parse(raw: &str) -> Self {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        if compact.contains("UNLIM") {
            return Self::Unlimited;
        }

        if let Some(caps) = gb_re().captures(&compact) {
            if let Ok(n) = caps[1].parse::<f64>() {
                return Self::Megabytes(round_mb(n * 1024.0));
            }
        }

        if let Some(caps) = mb_re().captures(&compact) {
            if let Ok(n) = caps[1].parse::<f64>() {
                return Self::Megabytes(round_mb(n));
            }
        }

        // Magnitude heuristic: "500" is almost certainly MB, "3" almost certainly GB
        if let Some(m) = number_re().find(&compact) {
            if let Ok(n) = m.as_str().parse::<f64>() {
                let mb = if n > 100.0 { n } else { n * 1024.0 };
                return Self::Megabytes(round_mb(mb));
            }
        }

        Self::Unparseable
    }

    pub fn megabytes(&self) -> Option<u64> {
        match self {
            Self::Megabytes(mb) => Some(*mb),
            _ => None,
        }
    }
}

fn gb_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)GB$").expect("valid regex"))
}

fn mb_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)MB$").expect("valid regex"))
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"))
}

/// Largest amount SQLite's signed INTEGER column stores unchanged
const MAX_DATA_MB: u64 = i64::MAX as u64;

fn round_mb(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        (value.round() as u64).min(MAX_DATA_MB)
    } else {
        0
    }
}

/// Parse a data amount into MB, `None` for unlimited
///
/// A string that cannot be parsed at all is logged and also yields `None`;
/// use [`classify_data_amount`] to tell the two apart.
pub fn parse_data_amount(raw: &str) -> Option<u64> {
    match DataAmount::parse(raw) {
        DataAmount::Megabytes(mb) => Some(mb),
        DataAmount::Unlimited => None,
        DataAmount::Unparseable => {
            warn!(raw = %raw, "Could not parse data amount");
            None
        }
    }
}

/// Parse a data amount keeping unlimited and unparseable apart
pub fn classify_data_amount(raw: &str) -> DataAmount {
    DataAmount::parse(raw)
}

/// Provider validity is already expressed in days
pub fn parse_validity(validity: i64) -> u32 {
    validity.clamp(0, u32::MAX as i64) as u32
}

pub fn parse_voice_credits(credits: Option<i64>) -> u32 {
    credits.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

pub fn parse_sms_credits(credits: Option<i64>) -> u32 {
    credits.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

/// Normalize a provider package
///
/// `data_mb` is forced to `None` when the provider flags the package as
/// unlimited, whatever its data string says.
pub fn normalize_package_data(pkg: &ProviderPackage) -> NormalizedPackageData {
    let data_mb = if pkg.is_unlimited {
        None
    } else {
        parse_data_amount(&pkg.data_amount)
    };

    NormalizedPackageData {
        data_mb,
        validity_days: parse_validity(pkg.validity),
        voice_minutes: parse_voice_credits(pkg.voice_credits),
        sms_count: parse_sms_credits(pkg.sms_credits),
    }
}

/// Whether two normalized packages describe the same offer
///
/// Data amounts must be within `tolerance` of each other (relative to the
/// larger one); validity, voice and SMS must match exactly. Two unlimited
/// packages only need matching validity.
pub fn are_packages_comparable(
    a: &NormalizedPackageData,
    b: &NormalizedPackageData,
    tolerance: f64,
) -> bool {
    match (a.data_mb, b.data_mb) {
        (None, None) => a.validity_days == b.validity_days,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(da), Some(db)) => {
            let max = da.max(db) as f64;
            let within = if max == 0.0 {
                true
            } else {
                (da as f64 - db as f64).abs() / max <= tolerance
            };
            within
                && a.validity_days == b.validity_days
                && a.voice_minutes == b.voice_minutes
                && a.sms_count == b.sms_count
        }
    }
}

/// Build the exact comparison key used by price comparison
///
/// Format: `dest_{id}:{mb|unlimited}mb:{days}d[v{voice}][s{sms}]`, with
/// `region_{id}` in place of the destination when no destination is set.
pub fn create_comparison_key(
    destination_id: Option<i64>,
    region_id: Option<i64>,
    normalized: &NormalizedPackageData,
) -> Result<String> {
    let scope = match (destination_id, region_id) {
        (Some(dest), _) => format!("dest_{}", dest),
        (None, Some(region)) => format!("region_{}", region),
        (None, None) => {
            return Err(Error::InvalidData(
                "Comparison key needs a destination or a region".into(),
            ))
        }
    };

    let data = normalized
        .data_mb
        .map(|mb| mb.to_string())
        .unwrap_or_else(|| "unlimited".to_string());

    let mut key = format!("{}:{}mb:{}d", scope, data, normalized.validity_days);
    if normalized.voice_minutes > 0 {
        key.push_str(&format!("v{}", normalized.voice_minutes));
    }
    if normalized.sms_count > 0 {
        key.push_str(&format!("s{}", normalized.sms_count));
    }
    Ok(key)
}

/// Render MB back into a short human string ("1GB", "1.5GB", "500MB")
pub fn format_data_mb(data_mb: Option<u64>) -> String {
    match data_mb {
        None => "Unlimited".to_string(),
        Some(mb) if mb >= 1024 && mb % 1024 == 0 => format!("{}GB", mb / 1024),
        Some(mb) if mb >= 1024 => format!("{:.1}GB", mb as f64 / 1024.0),
        Some(mb) => format!("{}MB", mb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PackageType;

    fn provider_package(data_amount: &str, validity: i64, is_unlimited: bool) -> ProviderPackage {
        ProviderPackage {
            row_id: 1,
            package_key: Some("1".into()),
            destination_id: Some(10),
            region_id: None,
            package_type: PackageType::Local,
            title: "Test".into(),
            operator: None,
            data_amount: data_amount.into(),
            validity,
            voice_credits: None,
            sms_credits: None,
            is_unlimited,
            slug: "japan-7days-1gb".into(),
            coverage: None,
            price: Some("3.00".into()),
            provider_price: None,
            currency: "USD".into(),
        }
    }

    fn normalized(data_mb: Option<u64>, days: u32) -> NormalizedPackageData {
        NormalizedPackageData {
            data_mb,
            validity_days: days,
            voice_minutes: 0,
            sms_count: 0,
        }
    }

    #[test]
    fn test_parse_gb_and_mb() {
        assert_eq!(parse_data_amount("1GB"), Some(1024));
        assert_eq!(parse_data_amount("1.5 GB"), Some(1536));
        assert_eq!(parse_data_amount("500 MB"), Some(500));
        assert_eq!(parse_data_amount("1024mb"), Some(1024));
        assert_eq!(parse_data_amount(" 20gb "), Some(20480));
    }

    #[test]
    fn test_parse_unlimited_variants() {
        assert_eq!(parse_data_amount("Unlimited"), None);
        assert_eq!(parse_data_amount("unlim"), None);
        assert_eq!(parse_data_amount("Unlimited 5GB high speed"), None);
        assert_eq!(classify_data_amount("UNLIMITED"), DataAmount::Unlimited);
    }

    #[test]
    fn test_parse_magnitude_heuristic() {
        // No unit: large numbers are MB, small ones GB
        assert_eq!(parse_data_amount("500"), Some(500));
        assert_eq!(parse_data_amount("3"), Some(3072));
        assert_eq!(parse_data_amount("approx 2 gigs"), Some(2048));
    }

    #[test]
    fn test_parse_failure_is_none_but_classified_unparseable() {
        assert_eq!(parse_data_amount("lots of data"), None);
        assert_eq!(classify_data_amount("lots of data"), DataAmount::Unparseable);
        assert_eq!(classify_data_amount(""), DataAmount::Unparseable);
    }

    #[test]
    fn test_huge_amounts_fit_a_signed_column() {
        let mb = parse_data_amount("99999999999999999999GB").unwrap();
        assert_eq!(mb, i64::MAX as u64);
        assert_eq!(parse_data_amount("99999999999999999999999MB"), Some(i64::MAX as u64));
    }

    #[test]
    fn test_gb_inputs_are_whole_multiples_of_1024() {
        for n in 1..=50u64 {
            let mb = parse_data_amount(&format!("{}GB", n)).unwrap();
            assert_eq!(mb % 1024, 0);
            assert_eq!(format_data_mb(Some(mb)), format!("{}GB", n));
        }
        assert_eq!(format_data_mb(Some(500)), "500MB");
    }

    #[test]
    fn test_unlimited_string_overrides_flag() {
        // The substring wins even when the provider did not flag the package
        let pkg = provider_package("Unlimited", 7, false);
        assert_eq!(normalize_package_data(&pkg).data_mb, None);
    }

    #[test]
    fn test_unlimited_flag_overrides_string() {
        let pkg = provider_package("5GB", 7, true);
        let n = normalize_package_data(&pkg);
        assert!(n.is_unlimited());
        assert_eq!(n.validity_days, 7);
    }

    #[test]
    fn test_unlimited_invariant() {
        let cases = [
            ("1GB", false, false),
            ("Unlimited", false, true),
            ("3GB", true, true),
            ("500MB", false, false),
            ("unlimited data", true, true),
        ];
        for (raw, flag, expect_unlimited) in cases {
            let n = normalize_package_data(&provider_package(raw, 7, flag));
            assert_eq!(n.data_mb.is_none(), expect_unlimited, "case {}", raw);
        }
    }

    #[test]
    fn test_voice_and_sms_default_to_zero() {
        assert_eq!(parse_voice_credits(None), 0);
        assert_eq!(parse_sms_credits(Some(50)), 50);
        assert_eq!(parse_validity(-3), 0);
    }

    #[test]
    fn test_comparable_within_tolerance() {
        assert!(are_packages_comparable(
            &normalized(Some(1000), 7),
            &normalized(Some(1024), 7),
            DEFAULT_TOLERANCE
        ));
        assert!(!are_packages_comparable(
            &normalized(Some(900), 7),
            &normalized(Some(1024), 7),
            DEFAULT_TOLERANCE
        ));
        assert!(!are_packages_comparable(
            &normalized(Some(1024), 7),
            &normalized(Some(1024), 30),
            DEFAULT_TOLERANCE
        ));
    }

    #[test]
    fn test_comparable_unlimited_rules() {
        assert!(are_packages_comparable(
            &normalized(None, 7),
            &normalized(None, 7),
            DEFAULT_TOLERANCE
        ));
        assert!(!are_packages_comparable(
            &normalized(None, 7),
            &normalized(Some(1024), 7),
            DEFAULT_TOLERANCE
        ));
    }

    #[test]
    fn test_comparable_requires_matching_voice() {
        let mut a = normalized(Some(1024), 7);
        let b = normalized(Some(1024), 7);
        a.voice_minutes = 30;
        assert!(!are_packages_comparable(&a, &b, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_comparison_key_formats() {
        let mut n = normalized(Some(1024), 7);
        assert_eq!(
            create_comparison_key(Some(3), Some(9), &n).unwrap(),
            "dest_3:1024mb:7d"
        );
        assert_eq!(
            create_comparison_key(None, Some(9), &n).unwrap(),
            "region_9:1024mb:7d"
        );
        n.voice_minutes = 60;
        n.sms_count = 20;
        assert_eq!(
            create_comparison_key(Some(3), None, &n).unwrap(),
            "dest_3:1024mb:7dv60s20"
        );
        assert_eq!(
            create_comparison_key(Some(3), None, &normalized(None, 30)).unwrap(),
            "dest_3:unlimitedmb:30d"
        );
        assert!(create_comparison_key(None, None, &n).is_err());
    }
}
