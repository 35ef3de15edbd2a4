//! Provider strategy table
//!
//! Everything that differs between upstream providers lives here as data:
//! which table holds their packages, which column carries the wholesale cost,
//! which column identifies a package across syncs, and how the country is
//! encoded. Adding a provider means adding a row, not a new branch.

use crate::country::CountryExtractor;
use crate::error::{Error, Result};
use crate::models::ProviderPackage;

/// Where the wholesale cost comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostField {
    /// Generic `price` column
    Price,
    /// Provider-specific column with fallback to `price`
    ProviderPriceThenPrice,
}

/// Which column identifies a package in the unified catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    /// Internal row id
    RowId,
    /// Provider's own external identifier
    ExternalId,
}

/// Per-provider data used by sync and country resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderStrategy {
    pub slug: &'static str,
    pub name: &'static str,
    /// Provider-specific package table
    pub table: &'static str,
    /// Name of the provider-specific cost column, if any
    pub provider_price_column: Option<&'static str>,
    /// Name of the external identity column, if any
    pub external_id_column: Option<&'static str>,
    pub cost: CostField,
    pub identity: IdentityField,
    pub country: CountryExtractor,
}

pub const AIRALO: ProviderStrategy = ProviderStrategy {
    slug: "airalo",
    name: "Airalo",
    table: "airalo_packages",
    provider_price_column: Some("airalo_price"),
    external_id_column: None,
    cost: CostField::ProviderPriceThenPrice,
    identity: IdentityField::RowId,
    country: CountryExtractor::LeadingNameSegments,
};

pub const ESIM_GO: ProviderStrategy = ProviderStrategy {
    slug: "esim-go",
    name: "eSIM Go",
    table: "esim_go_packages",
    provider_price_column: None,
    external_id_column: None,
    cost: CostField::Price,
    identity: IdentityField::RowId,
    country: CountryExtractor::TrailingCode,
};

pub const ESIM_ACCESS: ProviderStrategy = ProviderStrategy {
    slug: "esim-access",
    name: "eSIM Access",
    table: "esim_access_packages",
    provider_price_column: None,
    external_id_column: None,
    cost: CostField::Price,
    identity: IdentityField::RowId,
    country: CountryExtractor::LeadingCode,
};

pub const MAYA: ProviderStrategy = ProviderStrategy {
    slug: "maya",
    name: "Maya",
    table: "maya_packages",
    provider_price_column: None,
    external_id_column: Some("maya_id"),
    cost: CostField::Price,
    identity: IdentityField::ExternalId,
    country: CountryExtractor::DelimitedCode,
};

/// Every provider the catalog knows how to read
pub const ALL: &[ProviderStrategy] = &[AIRALO, ESIM_GO, ESIM_ACCESS, MAYA];

/// Find the strategy for a provider slug
pub fn strategy_for(slug: &str) -> Result<&'static ProviderStrategy> {
    let slug = slug.trim().to_lowercase();
    ALL.iter()
        .find(|s| s.slug == slug || s.slug.replace('-', "_") == slug)
        .ok_or(Error::UnknownProvider(slug))
}

/// Find the strategy that owns a provider table
pub fn strategy_for_table(table: &str) -> Option<&'static ProviderStrategy> {
    ALL.iter().find(|s| s.table == table)
}

impl ProviderStrategy {
    /// The raw wholesale price string for a package, per this provider's cost rule
    pub fn raw_cost<'a>(&self, pkg: &'a ProviderPackage) -> Option<&'a str> {
        let non_empty = |v: &'a Option<String>| {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        };
        match self.cost {
            CostField::Price => non_empty(&pkg.price),
            CostField::ProviderPriceThenPrice => {
                non_empty(&pkg.provider_price).or_else(|| non_empty(&pkg.price))
            }
        }
    }

    /// Parse the wholesale price, rejecting missing, non-numeric and negative values
    pub fn wholesale_price(&self, pkg: &ProviderPackage) -> std::result::Result<f64, String> {
        let raw = self
            .raw_cost(pkg)
            .ok_or_else(|| "missing wholesale price".to_string())?;
        let value: f64 = raw
            .parse()
            .map_err(|_| format!("non-numeric wholesale price '{}'", raw))?;
        if !value.is_finite() {
            return Err(format!("non-numeric wholesale price '{}'", raw));
        }
        if value < 0.0 {
            return Err(format!("negative wholesale price '{}'", raw));
        }
        Ok(value)
    }

    /// The unified-catalog identity of a package
    pub fn package_id(&self, pkg: &ProviderPackage) -> Option<String> {
        match self.identity {
            IdentityField::RowId => Some(pkg.row_id.to_string()),
            IdentityField::ExternalId => pkg
                .package_key
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }

    /// SQL expression selecting the identity column
    pub(crate) fn identity_sql(&self) -> String {
        match (self.identity, self.external_id_column) {
            (IdentityField::ExternalId, Some(col)) => col.to_string(),
            _ => "CAST(id AS TEXT)".to_string(),
        }
    }

    /// SQL expression selecting the provider-specific cost column
    pub(crate) fn provider_price_sql(&self) -> &'static str {
        self.provider_price_column.unwrap_or("NULL")
    }
}
