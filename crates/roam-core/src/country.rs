//! Country resolution and cross-provider group keys
//!
//! Each provider identifies the country of a package differently: Airalo
//! prefixes its slugs with the country name (`united-states-7days-1gb`),
//! eSIM Go appends an ISO code (`esim_1GB_7D_US_V2`), eSIM Access leads with
//! one (`US_1_7`), and Maya embeds it between separators (`maya-us-1gb-7d`).
//! Most of them also report a `coverage` array that is preferred when it names
//! exactly one country.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{PackageType, ProviderPackage};

/// Country slug, display name, ISO 3166-1 alpha-2 code
///
/// Aliases follow the canonical entry; the reverse lookup keeps the first
/// entry seen for a code.
const COUNTRIES: &[(&str, &str, &str)] = &[
    ("afghanistan", "Afghanistan", "AF"),
    ("albania", "Albania", "AL"),
    ("algeria", "Algeria", "DZ"),
    ("andorra", "Andorra", "AD"),
    ("angola", "Angola", "AO"),
    ("anguilla", "Anguilla", "AI"),
    ("antigua-and-barbuda", "Antigua and Barbuda", "AG"),
    ("argentina", "Argentina", "AR"),
    ("armenia", "Armenia", "AM"),
    ("aruba", "Aruba", "AW"),
    ("australia", "Australia", "AU"),
    ("austria", "Austria", "AT"),
    ("azerbaijan", "Azerbaijan", "AZ"),
    ("bahamas", "Bahamas", "BS"),
    ("bahrain", "Bahrain", "BH"),
    ("bangladesh", "Bangladesh", "BD"),
    ("barbados", "Barbados", "BB"),
    ("belarus", "Belarus", "BY"),
    ("belgium", "Belgium", "BE"),
    ("belize", "Belize", "BZ"),
    ("benin", "Benin", "BJ"),
    ("bermuda", "Bermuda", "BM"),
    ("bhutan", "Bhutan", "BT"),
    ("bolivia", "Bolivia", "BO"),
    ("bosnia-and-herzegovina", "Bosnia and Herzegovina", "BA"),
    ("botswana", "Botswana", "BW"),
    ("brazil", "Brazil", "BR"),
    ("british-virgin-islands", "British Virgin Islands", "VG"),
    ("brunei", "Brunei", "BN"),
    ("bulgaria", "Bulgaria", "BG"),
    ("burkina-faso", "Burkina Faso", "BF"),
    ("burundi", "Burundi", "BI"),
    ("cambodia", "Cambodia", "KH"),
    ("cameroon", "Cameroon", "CM"),
    ("canada", "Canada", "CA"),
    ("cape-verde", "Cape Verde", "CV"),
    ("cayman-islands", "Cayman Islands", "KY"),
    ("central-african-republic", "Central African Republic", "CF"),
    ("chad", "Chad", "TD"),
    ("chile", "Chile", "CL"),
    ("china", "China", "CN"),
    ("colombia", "Colombia", "CO"),
    ("comoros", "Comoros", "KM"),
    ("congo", "Congo", "CG"),
    ("dr-congo", "DR Congo", "CD"),
    ("costa-rica", "Costa Rica", "CR"),
    ("cote-d-ivoire", "Côte d'Ivoire", "CI"),
    ("croatia", "Croatia", "HR"),
    ("cuba", "Cuba", "CU"),
    ("curacao", "Curaçao", "CW"),
    ("cyprus", "Cyprus", "CY"),
    ("czech-republic", "Czech Republic", "CZ"),
    ("denmark", "Denmark", "DK"),
    ("djibouti", "Djibouti", "DJ"),
    ("dominica", "Dominica", "DM"),
    ("dominican-republic", "Dominican Republic", "DO"),
    ("ecuador", "Ecuador", "EC"),
    ("egypt", "Egypt", "EG"),
    ("el-salvador", "El Salvador", "SV"),
    ("equatorial-guinea", "Equatorial Guinea", "GQ"),
    ("estonia", "Estonia", "EE"),
    ("eswatini", "Eswatini", "SZ"),
    ("ethiopia", "Ethiopia", "ET"),
    ("faroe-islands", "Faroe Islands", "FO"),
    ("fiji", "Fiji", "FJ"),
    ("finland", "Finland", "FI"),
    ("france", "France", "FR"),
    ("french-guiana", "French Guiana", "GF"),
    ("french-polynesia", "French Polynesia", "PF"),
    ("gabon", "Gabon", "GA"),
    ("gambia", "Gambia", "GM"),
    ("georgia", "Georgia", "GE"),
    ("germany", "Germany", "DE"),
    ("ghana", "Ghana", "GH"),
    ("gibraltar", "Gibraltar", "GI"),
    ("greece", "Greece", "GR"),
    ("greenland", "Greenland", "GL"),
    ("grenada", "Grenada", "GD"),
    ("guadeloupe", "Guadeloupe", "GP"),
    ("guam", "Guam", "GU"),
    ("guatemala", "Guatemala", "GT"),
    ("guernsey", "Guernsey", "GG"),
    ("guinea", "Guinea", "GN"),
    ("guinea-bissau", "Guinea-Bissau", "GW"),
    ("guyana", "Guyana", "GY"),
    ("haiti", "Haiti", "HT"),
    ("honduras", "Honduras", "HN"),
    ("hong-kong", "Hong Kong", "HK"),
    ("hungary", "Hungary", "HU"),
    ("iceland", "Iceland", "IS"),
    ("india", "India", "IN"),
    ("indonesia", "Indonesia", "ID"),
    ("iran", "Iran", "IR"),
    ("iraq", "Iraq", "IQ"),
    ("ireland", "Ireland", "IE"),
    ("isle-of-man", "Isle of Man", "IM"),
    ("israel", "Israel", "IL"),
    ("italy", "Italy", "IT"),
    ("jamaica", "Jamaica", "JM"),
    ("japan", "Japan", "JP"),
    ("jersey", "Jersey", "JE"),
    ("jordan", "Jordan", "JO"),
    ("kazakhstan", "Kazakhstan", "KZ"),
    ("kenya", "Kenya", "KE"),
    ("kosovo", "Kosovo", "XK"),
    ("kuwait", "Kuwait", "KW"),
    ("kyrgyzstan", "Kyrgyzstan", "KG"),
    ("laos", "Laos", "LA"),
    ("latvia", "Latvia", "LV"),
    ("lebanon", "Lebanon", "LB"),
    ("lesotho", "Lesotho", "LS"),
    ("liberia", "Liberia", "LR"),
    ("libya", "Libya", "LY"),
    ("liechtenstein", "Liechtenstein", "LI"),
    ("lithuania", "Lithuania", "LT"),
    ("luxembourg", "Luxembourg", "LU"),
    ("macau", "Macau", "MO"),
    ("madagascar", "Madagascar", "MG"),
    ("malawi", "Malawi", "MW"),
    ("malaysia", "Malaysia", "MY"),
    ("maldives", "Maldives", "MV"),
    ("mali", "Mali", "ML"),
    ("malta", "Malta", "MT"),
    ("martinique", "Martinique", "MQ"),
    ("mauritania", "Mauritania", "MR"),
    ("mauritius", "Mauritius", "MU"),
    ("mayotte", "Mayotte", "YT"),
    ("mexico", "Mexico", "MX"),
    ("moldova", "Moldova", "MD"),
    ("monaco", "Monaco", "MC"),
    ("mongolia", "Mongolia", "MN"),
    ("montenegro", "Montenegro", "ME"),
    ("montserrat", "Montserrat", "MS"),
    ("morocco", "Morocco", "MA"),
    ("mozambique", "Mozambique", "MZ"),
    ("myanmar", "Myanmar", "MM"),
    ("namibia", "Namibia", "NA"),
    ("nauru", "Nauru", "NR"),
    ("nepal", "Nepal", "NP"),
    ("netherlands", "Netherlands", "NL"),
    ("new-caledonia", "New Caledonia", "NC"),
    ("new-zealand", "New Zealand", "NZ"),
    ("nicaragua", "Nicaragua", "NI"),
    ("niger", "Niger", "NE"),
    ("nigeria", "Nigeria", "NG"),
    ("north-macedonia", "North Macedonia", "MK"),
    ("norway", "Norway", "NO"),
    ("oman", "Oman", "OM"),
    ("pakistan", "Pakistan", "PK"),
    ("palau", "Palau", "PW"),
    ("palestine", "Palestine", "PS"),
    ("panama", "Panama", "PA"),
    ("papua-new-guinea", "Papua New Guinea", "PG"),
    ("paraguay", "Paraguay", "PY"),
    ("peru", "Peru", "PE"),
    ("philippines", "Philippines", "PH"),
    ("poland", "Poland", "PL"),
    ("portugal", "Portugal", "PT"),
    ("puerto-rico", "Puerto Rico", "PR"),
    ("qatar", "Qatar", "QA"),
    ("reunion", "Réunion", "RE"),
    ("romania", "Romania", "RO"),
    ("russia", "Russia", "RU"),
    ("rwanda", "Rwanda", "RW"),
    ("saint-kitts-and-nevis", "Saint Kitts and Nevis", "KN"),
    ("saint-lucia", "Saint Lucia", "LC"),
    ("saint-vincent-and-the-grenadines", "Saint Vincent and the Grenadines", "VC"),
    ("samoa", "Samoa", "WS"),
    ("san-marino", "San Marino", "SM"),
    ("sao-tome-and-principe", "São Tomé and Príncipe", "ST"),
    ("saudi-arabia", "Saudi Arabia", "SA"),
    ("senegal", "Senegal", "SN"),
    ("serbia", "Serbia", "RS"),
    ("seychelles", "Seychelles", "SC"),
    ("sierra-leone", "Sierra Leone", "SL"),
    ("singapore", "Singapore", "SG"),
    ("sint-maarten", "Sint Maarten", "SX"),
    ("slovakia", "Slovakia", "SK"),
    ("slovenia", "Slovenia", "SI"),
    ("solomon-islands", "Solomon Islands", "SB"),
    ("somalia", "Somalia", "SO"),
    ("south-africa", "South Africa", "ZA"),
    ("south-korea", "South Korea", "KR"),
    ("south-sudan", "South Sudan", "SS"),
    ("spain", "Spain", "ES"),
    ("sri-lanka", "Sri Lanka", "LK"),
    ("sudan", "Sudan", "SD"),
    ("suriname", "Suriname", "SR"),
    ("sweden", "Sweden", "SE"),
    ("switzerland", "Switzerland", "CH"),
    ("taiwan", "Taiwan", "TW"),
    ("tajikistan", "Tajikistan", "TJ"),
    ("tanzania", "Tanzania", "TZ"),
    ("thailand", "Thailand", "TH"),
    ("timor-leste", "Timor-Leste", "TL"),
    ("togo", "Togo", "TG"),
    ("tonga", "Tonga", "TO"),
    ("trinidad-and-tobago", "Trinidad and Tobago", "TT"),
    ("tunisia", "Tunisia", "TN"),
    ("turkey", "Turkey", "TR"),
    ("turkmenistan", "Turkmenistan", "TM"),
    ("turks-and-caicos-islands", "Turks and Caicos Islands", "TC"),
    ("uganda", "Uganda", "UG"),
    ("ukraine", "Ukraine", "UA"),
    ("united-arab-emirates", "United Arab Emirates", "AE"),
    ("united-kingdom", "United Kingdom", "GB"),
    ("united-states", "United States", "US"),
    ("uruguay", "Uruguay", "UY"),
    ("us-virgin-islands", "US Virgin Islands", "VI"),
    ("uzbekistan", "Uzbekistan", "UZ"),
    ("vanuatu", "Vanuatu", "VU"),
    ("vatican-city", "Vatican City", "VA"),
    ("venezuela", "Venezuela", "VE"),
    ("vietnam", "Vietnam", "VN"),
    ("yemen", "Yemen", "YE"),
    ("zambia", "Zambia", "ZM"),
    ("zimbabwe", "Zimbabwe", "ZW"),
    // Aliases seen in provider slugs
    ("usa", "United States", "US"),
    ("uk", "United Kingdom", "GB"),
    ("great-britain", "United Kingdom", "GB"),
    ("korea", "South Korea", "KR"),
    ("uae", "United Arab Emirates", "AE"),
    ("czechia", "Czech Republic", "CZ"),
    ("turkiye", "Turkey", "TR"),
    ("viet-nam", "Vietnam", "VN"),
    ("ivory-coast", "Côte d'Ivoire", "CI"),
    ("macao", "Macau", "MO"),
    ("swaziland", "Eswatini", "SZ"),
    ("macedonia", "North Macedonia", "MK"),
    ("democratic-republic-congo", "DR Congo", "CD"),
];

/// A resolved (or unresolved) country
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryMatch {
    pub code: Option<String>,
    pub name: Option<String>,
}

impl CountryMatch {
    pub fn none() -> Self {
        Self::default()
    }

    fn from_entry(entry: &CountryEntry) -> Self {
        Self {
            code: Some(entry.code.to_string()),
            name: Some(entry.name.to_string()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.code.is_some()
    }
}

/// Reverse-table entry for an ISO code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryEntry {
    pub slug: &'static str,
    pub name: &'static str,
    pub code: &'static str,
}

struct CountryTable {
    by_slug: HashMap<&'static str, CountryEntry>,
    by_code: HashMap<&'static str, CountryEntry>,
}

fn table() -> &'static CountryTable {
    static TABLE: OnceLock<CountryTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut by_slug = HashMap::new();
        let mut by_code = HashMap::new();
        for &(slug, name, code) in COUNTRIES {
            let entry = CountryEntry { slug, name, code };
            by_slug.entry(slug).or_insert(entry);
            // First occurrence wins so aliases never replace the canonical slug
            by_code.entry(code).or_insert(entry);
        }
        CountryTable { by_slug, by_code }
    })
}

/// Look up a country by its slug (`united-states`)
pub fn lookup_slug(slug: &str) -> Option<CountryEntry> {
    table().by_slug.get(slug.to_lowercase().as_str()).copied()
}

/// Look up a country by ISO alpha-2 code (case-insensitive)
pub fn lookup_code(code: &str) -> Option<CountryEntry> {
    table().by_code.get(code.to_uppercase().as_str()).copied()
}

/// Look up a country by display name (case-insensitive)
pub fn lookup_name(name: &str) -> Option<CountryEntry> {
    let slug = name
        .trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    lookup_slug(&slug)
}

/// How a provider encodes the country in its packages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryExtractor {
    /// Country name as the leading hyphen-separated slug segments (Airalo)
    LeadingNameSegments,
    /// Coverage, else `_XX` at the end of the slug, optionally `_v2` (eSIM Go)
    TrailingCode,
    /// Coverage, else `XX_` at the start of the slug (eSIM Access)
    LeadingCode,
    /// Coverage, else `XX` between `_`/`-` separators (Maya)
    DelimitedCode,
}

impl CountryExtractor {
    pub fn extract(&self, slug: &str, coverage: Option<&[String]>) -> CountryMatch {
        match self {
            Self::LeadingNameSegments => extract_from_name_segments(slug),
            Self::TrailingCode => from_coverage(coverage)
                .unwrap_or_else(|| code_from_pattern(trailing_code_re(), slug)),
            Self::LeadingCode => from_coverage(coverage)
                .unwrap_or_else(|| code_from_pattern(leading_code_re(), slug)),
            Self::DelimitedCode => from_coverage(coverage)
                .unwrap_or_else(|| code_from_pattern(delimited_code_re(), slug)),
        }
    }
}

/// Airalo: match 4, 3, 2 then 1 leading segments against the slug table
pub fn extract_from_name_segments(slug: &str) -> CountryMatch {
    let segments: Vec<&str> = slug
        .trim()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect();

    for len in (1..=4).rev() {
        if segments.len() < len {
            continue;
        }
        let candidate = segments[..len].join("-");
        if let Some(entry) = lookup_slug(&candidate) {
            return CountryMatch::from_entry(&entry);
        }
    }
    CountryMatch::none()
}

/// A coverage array naming exactly one known country
fn from_coverage(coverage: Option<&[String]>) -> Option<CountryMatch> {
    match coverage {
        Some([single]) => lookup_code(single.trim()).map(|e| CountryMatch::from_entry(&e)),
        _ => None,
    }
}

fn code_from_pattern(re: &Regex, slug: &str) -> CountryMatch {
    re.captures(slug)
        .and_then(|caps| caps.get(1))
        .and_then(|m| lookup_code(m.as_str()))
        .map(|e| CountryMatch::from_entry(&e))
        .unwrap_or_default()
}

fn trailing_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)_([a-z]{2})(?:_v\d+)?$").expect("valid regex"))
}

fn leading_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^([a-z]{2})_").expect("valid regex"))
}

fn delimited_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[_-]([a-z]{2})[_-]").expect("valid regex"))
}

/// Resolve the country of a provider package
///
/// Only local packages carry a country; regional and global packages always
/// resolve to nothing.
pub fn resolve_country(extractor: CountryExtractor, pkg: &ProviderPackage) -> CountryMatch {
    if pkg.package_type != PackageType::Local {
        return CountryMatch::none();
    }
    extractor.extract(&pkg.slug, pkg.coverage.as_deref())
}

/// Marker used in group keys for unresolved countries
pub const UNKNOWN_COUNTRY: &str = "UNKNOWN";

/// Build the cross-provider grouping key `{country}_{dataMb}_{validityDays}`
pub fn generate_package_group_key(
    country_code: Option<&str>,
    data_mb: Option<u64>,
    validity_days: u32,
) -> String {
    let data = data_mb
        .map(|mb| mb.to_string())
        .unwrap_or_else(|| "UNLIMITED".to_string());
    format!(
        "{}_{}_{}",
        country_code.unwrap_or(UNKNOWN_COUNTRY),
        data,
        validity_days
    )
}

/// Whether a group key may be used to match packages across providers
pub fn is_groupable_key(key: &str) -> bool {
    !key.starts_with(&format!("{}_", UNKNOWN_COUNTRY))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_lookup_tables() {
        assert_eq!(lookup_slug("japan").unwrap().code, "JP");
        assert_eq!(lookup_code("jp").unwrap().name, "Japan");
        assert_eq!(lookup_name("United States").unwrap().code, "US");
        assert!(lookup_slug("atlantis").is_none());
    }

    #[test]
    fn test_reverse_lookup_keeps_first_occurrence() {
        // "usa" and "uk" are aliases listed after the canonical entries
        assert_eq!(lookup_code("US").unwrap().slug, "united-states");
        assert_eq!(lookup_code("GB").unwrap().slug, "united-kingdom");
        assert_eq!(lookup_slug("usa").unwrap().code, "US");
    }

    #[test]
    fn test_airalo_longest_prefix_wins() {
        let m = extract_from_name_segments("bosnia-and-herzegovina-7days-1gb");
        assert_eq!(m.code.as_deref(), Some("BA"));

        let m = extract_from_name_segments("united-states-30days-10gb");
        assert_eq!(m.code.as_deref(), Some("US"));
        assert_eq!(m.name.as_deref(), Some("United States"));

        let m = extract_from_name_segments("japan-7days-1gb");
        assert_eq!(m.code.as_deref(), Some("JP"));

        // "guinea-bissau" must beat "guinea"
        let m = extract_from_name_segments("guinea-bissau-7days-1gb");
        assert_eq!(m.code.as_deref(), Some("GW"));
    }

    #[test]
    fn test_airalo_unknown_slug() {
        assert!(!extract_from_name_segments("moshi-moshi-7days-1gb").is_resolved());
        assert!(!extract_from_name_segments("").is_resolved());
    }

    #[test]
    fn test_esim_go_trailing_code() {
        let e = CountryExtractor::TrailingCode;
        assert_eq!(e.extract("esim_1GB_7D_JP_V2", None).code.as_deref(), Some("JP"));
        assert_eq!(e.extract("esim_1GB_7D_FR", None).code.as_deref(), Some("FR"));
        assert!(!e.extract("esim_1GB_7D_EUROPE", None).is_resolved());
    }

    #[test]
    fn test_coverage_preferred_over_slug() {
        let e = CountryExtractor::TrailingCode;
        let cov = coverage(&["DE"]);
        assert_eq!(
            e.extract("esim_1GB_7D_JP_V2", Some(&cov)).code.as_deref(),
            Some("DE")
        );
        // Multi-country coverage is ignored and the slug decides
        let cov = coverage(&["DE", "FR"]);
        assert_eq!(
            e.extract("esim_1GB_7D_JP_V2", Some(&cov)).code.as_deref(),
            Some("JP")
        );
    }

    #[test]
    fn test_esim_access_leading_code() {
        let e = CountryExtractor::LeadingCode;
        assert_eq!(e.extract("TH_3_15", None).code.as_deref(), Some("TH"));
        assert!(!e.extract("EU-42_3_15", None).is_resolved());
    }

    #[test]
    fn test_maya_delimited_code() {
        let e = CountryExtractor::DelimitedCode;
        assert_eq!(e.extract("maya-it-5gb-30d", None).code.as_deref(), Some("IT"));
        assert_eq!(e.extract("maya_mx_1gb", None).code.as_deref(), Some("MX"));
    }

    #[test]
    fn test_group_key() {
        assert_eq!(generate_package_group_key(Some("JP"), Some(1024), 7), "JP_1024_7");
        assert_eq!(
            generate_package_group_key(Some("US"), None, 30),
            "US_UNLIMITED_30"
        );
        let unknown = generate_package_group_key(None, Some(1024), 7);
        assert_eq!(unknown, "UNKNOWN_1024_7");
        assert!(!is_groupable_key(&unknown));
        assert!(is_groupable_key("JP_1024_7"));
    }
}
