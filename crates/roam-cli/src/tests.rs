//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use roam_core::catalog::seed_providers;
use roam_core::config::RoamConfig;
use roam_core::db::{setting_keys, CatalogFilter, Database};

use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    let db = Database::in_memory().unwrap();
    seed_providers(&db, &RoamConfig::default()).unwrap();
    db
}

fn write_json(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const AIRALO_JSON: &str = r#"[
    {"destinationId": 81, "title": "Japan 1GB", "dataAmount": "1GB", "validity": 7,
     "slug": "japan-7days-1gb", "price": "3.00"}
]"#;

const ESIM_GO_JSON: &str = r#"[
    {"destinationId": 81, "title": "Japan 1GB 7D", "dataAmount": "1024MB", "validity": 7,
     "slug": "esim_1GB_7D_JP_V2", "price": "2.50"}
]"#;

/// Import both JP packages and run sync + compare
fn db_with_catalog() -> Database {
    let db = setup_test_db();
    let airalo = write_json(AIRALO_JSON);
    let esim_go = write_json(ESIM_GO_JSON);
    commands::cmd_import(&db, "airalo", airalo.path(), false).unwrap();
    commands::cmd_import(&db, "esim-go", esim_go.path(), false).unwrap();
    commands::cmd_sync(&db, None).unwrap();
    commands::cmd_compare(&db, None, None).unwrap();
    db
}

fn package_id(db: &Database, table: &str) -> i64 {
    db.list_unified_packages_for_table(table).unwrap()[0].id
}

// ========== Core Command Tests ==========

#[test]
fn test_open_db_and_init() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roam.db");

    commands::cmd_init(&path).unwrap();
    // init is idempotent
    commands::cmd_init(&path).unwrap();

    let db = commands::open_db(&path).unwrap();
    let slugs: Vec<String> = db.list_providers().unwrap().into_iter().map(|p| p.slug).collect();
    assert_eq!(slugs.len(), 4);
    assert!(slugs.contains(&"airalo".to_string()));
    assert!(slugs.contains(&"maya".to_string()));
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer title", 10), "a much ...");
    assert_eq!(truncate("Österreich Ünlimited", 8), "Öster...");
}

// ========== Provider Command Tests ==========

#[test]
fn test_cmd_providers_list() {
    let db = setup_test_db();
    assert!(commands::cmd_providers_list(&db).is_ok());
}

#[test]
fn test_cmd_providers_margin() {
    let db = setup_test_db();
    commands::cmd_providers_margin(&db, "maya", 30.0).unwrap();
    let maya = db.get_provider_by_slug("maya").unwrap().unwrap();
    assert_eq!(maya.margin_percent, 30.0);
}

#[test]
fn test_cmd_providers_negative_margin_rejected() {
    let db = setup_test_db();
    assert!(commands::cmd_providers_margin(&db, "maya", -5.0).is_err());
}

#[test]
fn test_cmd_providers_enable_disable() {
    let db = setup_test_db();
    commands::cmd_providers_set_enabled(&db, "esim-access", false).unwrap();
    assert!(!db.get_provider_by_slug("esim-access").unwrap().unwrap().enabled);

    commands::cmd_providers_set_enabled(&db, "esim-access", true).unwrap();
    assert!(db.get_provider_by_slug("esim-access").unwrap().unwrap().enabled);
}

#[test]
fn test_cmd_providers_interval() {
    let db = setup_test_db();
    commands::cmd_providers_interval(&db, "airalo", 6).unwrap();
    let airalo = db.get_provider_by_slug("airalo").unwrap().unwrap();
    assert_eq!(airalo.sync_interval_hours, 6);
}

#[test]
fn test_cmd_providers_unknown_slug() {
    let db = setup_test_db();
    let result = commands::cmd_providers_margin(&db, "acme", 10.0);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_appends_and_replaces() {
    let db = setup_test_db();
    let file = write_json(AIRALO_JSON);

    commands::cmd_import(&db, "airalo", file.path(), false).unwrap();
    commands::cmd_import(&db, "airalo", file.path(), false).unwrap();
    assert_eq!(
        db.count_provider_packages(&roam_core::providers::AIRALO).unwrap(),
        2
    );

    commands::cmd_import(&db, "airalo", file.path(), true).unwrap();
    assert_eq!(
        db.count_provider_packages(&roam_core::providers::AIRALO).unwrap(),
        1
    );
}

#[test]
fn test_cmd_import_rejects_bad_input() {
    let db = setup_test_db();
    let file = write_json(r#"{"not": "an array"}"#);
    assert!(commands::cmd_import(&db, "airalo", file.path(), false).is_err());

    let file = write_json(AIRALO_JSON);
    assert!(commands::cmd_import(&db, "acme", file.path(), false).is_err());
}

// ========== Pipeline Command Tests ==========

#[test]
fn test_cmd_sync_and_compare() {
    let db = db_with_catalog();

    let esim_go = db.list_unified_packages_for_table("esim_go_packages").unwrap();
    assert_eq!(esim_go.len(), 1);
    assert_eq!(esim_go[0].retail_price, "3.13");
    assert!(esim_go[0].is_best_price);

    let airalo = db.list_unified_packages_for_table("airalo_packages").unwrap();
    assert!(!airalo[0].is_best_price);
}

#[test]
fn test_cmd_sync_unknown_provider() {
    let db = setup_test_db();
    assert!(commands::cmd_sync(&db, Some("acme")).is_err());
}

#[test]
fn test_cmd_compare_scoped() {
    let db = db_with_catalog();
    assert!(commands::cmd_compare(&db, Some(81), None).is_ok());
    assert!(commands::cmd_compare(&db, None, Some(5)).is_ok());
}

#[tokio::test]
async fn test_cmd_select_enables_best_price() {
    let db = db_with_catalog();
    commands::cmd_select(&db).await.unwrap();

    let enabled = db.list_enabled_packages().unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].provider_slug, "esim-go");
}

#[tokio::test]
async fn test_cmd_run_full_pipeline() {
    let db = setup_test_db();
    let airalo = write_json(AIRALO_JSON);
    commands::cmd_import(&db, "airalo", airalo.path(), false).unwrap();

    commands::cmd_run(&db).await.unwrap();

    let enabled = db.list_enabled_packages().unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].package.retail_price, "3.60");
}

// ========== Package Command Tests ==========

#[test]
fn test_cmd_packages_list() {
    let db = db_with_catalog();
    assert!(commands::cmd_packages(&db, &CatalogFilter::default(), false).is_ok());
    assert!(commands::cmd_packages(&db, &CatalogFilter::default(), true).is_ok());

    let empty = setup_test_db();
    assert!(commands::cmd_packages(&empty, &CatalogFilter::default(), false).is_ok());
}

#[tokio::test]
async fn test_cmd_toggle_and_clear_override() {
    let db = db_with_catalog();
    commands::cmd_select(&db).await.unwrap();
    let airalo_id = package_id(&db, "airalo_packages");

    commands::cmd_toggle(&db, airalo_id, true).unwrap();
    let pkg = db.get_unified_package(airalo_id).unwrap().unwrap();
    assert!(pkg.is_enabled);
    assert!(pkg.manual_override);

    // a pinned package survives selection
    commands::cmd_select(&db).await.unwrap();
    assert!(db.get_unified_package(airalo_id).unwrap().unwrap().is_enabled);

    commands::cmd_clear_override(&db, airalo_id).unwrap();
    let pkg = db.get_unified_package(airalo_id).unwrap().unwrap();
    assert!(!pkg.manual_override);
    assert!(!pkg.is_enabled);
}

#[test]
fn test_cmd_toggle_unknown_package() {
    let db = setup_test_db();
    let result = commands::cmd_toggle(&db, 999, true);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("999"));
}

#[test]
fn test_cmd_enable_disable_all() {
    let db = db_with_catalog();

    commands::cmd_enable_all(&db).unwrap();
    assert_eq!(db.list_enabled_packages().unwrap().len(), 2);

    commands::cmd_disable_all(&db).unwrap();
    assert!(db.list_enabled_packages().unwrap().is_empty());
}

#[tokio::test]
async fn test_cmd_alternatives() {
    let db = db_with_catalog();
    commands::cmd_enable_all(&db).unwrap();

    let request = commands::AlternativesRequest {
        destination_id: Some(81),
        region_id: None,
        data: "2GB",
        validity_days: 7,
        price: 5.0,
        max_results: Some(3),
        use_ai: false,
    };
    assert!(commands::cmd_alternatives(&db, &request).await.is_ok());
}

#[tokio::test]
async fn test_cmd_alternatives_rejects_bad_input() {
    let db = setup_test_db();
    let mut request = commands::AlternativesRequest {
        destination_id: None,
        region_id: None,
        data: "1GB",
        validity_days: 7,
        price: 5.0,
        max_results: None,
        use_ai: false,
    };
    assert!(commands::cmd_alternatives(&db, &request).await.is_err());

    request.destination_id = Some(81);
    request.data = "lots";
    assert!(commands::cmd_alternatives(&db, &request).await.is_err());
}

// ========== Settings Command Tests ==========

#[test]
fn test_cmd_settings_roundtrip() {
    let db = setup_test_db();

    commands::cmd_settings_set(&db, setting_keys::PACKAGE_SELECTION_MODE, "manual").unwrap();
    assert_eq!(
        db.get_setting(setting_keys::PACKAGE_SELECTION_MODE).unwrap().as_deref(),
        Some("manual")
    );
    assert!(commands::cmd_settings_list(&db).is_ok());
    assert!(commands::cmd_settings_get(&db, setting_keys::PACKAGE_SELECTION_MODE).is_ok());

    commands::cmd_settings_unset(&db, setting_keys::PACKAGE_SELECTION_MODE).unwrap();
    assert!(db
        .get_setting(setting_keys::PACKAGE_SELECTION_MODE)
        .unwrap()
        .is_none());
}

#[test]
fn test_cmd_settings_invalid_value() {
    let db = setup_test_db();
    assert!(commands::cmd_settings_set(&db, setting_keys::AI_PRICE_WEIGHT, "-3").is_err());
    assert!(commands::cmd_settings_set(&db, setting_keys::PACKAGE_SELECTION_MODE, "random").is_err());
}

// ========== Export Command Tests ==========

#[test]
fn test_cmd_export_to_file() {
    let db = db_with_catalog();
    let dir = tempfile::tempdir().unwrap();

    let csv_path = dir.path().join("catalog.csv");
    commands::cmd_export(&db, "csv", Some(&csv_path), false).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("JP_1024_7"));

    let json_path = dir.path().join("catalog.json");
    commands::cmd_export(&db, "json", Some(&json_path), false).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
}

#[test]
fn test_cmd_export_unknown_format() {
    let db = setup_test_db();
    let result = commands::cmd_export(&db, "xml", None, false);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("xml"));
}

// ========== History / Schedule Command Tests ==========

#[test]
fn test_cmd_history() {
    let db = setup_test_db();
    assert!(commands::cmd_history(&db, None, 10).is_ok());

    commands::cmd_sync(&db, Some("airalo")).unwrap();
    let runs = db.list_sync_runs(Some("airalo"), 10).unwrap();
    assert_eq!(runs.len(), 1);
    assert!(commands::cmd_history(&db, Some("airalo"), 10).is_ok());
}

#[tokio::test]
async fn test_cmd_schedule_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = commands::open_db(&dir.path().join("roam.db")).unwrap();
    seed_providers(&db, &RoamConfig::default()).unwrap();
    let file = write_json(AIRALO_JSON);
    commands::cmd_import(&db, "airalo", file.path(), false).unwrap();

    commands::cmd_schedule(&db, true).await.unwrap();

    // every enabled provider was due on the first tick
    let runs = db.list_sync_runs(None, 10).unwrap();
    assert_eq!(runs.len(), 4);
    assert_eq!(db.list_enabled_packages().unwrap().len(), 1);

    // direct access to the file still works after the scheduler ran
    let conn = rusqlite::Connection::open(dir.path().join("roam.db")).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM unified_packages", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
