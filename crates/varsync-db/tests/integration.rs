//! Offline tests for varsync-db pool configuration and row mapping.
//! These tests do not require a live database connection.

use chrono::{TimeZone, Utc};
use varsync_core::{
    AppConfig, CatalogRecord, CollectionRef, DetectedVariantType, Environment,
    ExistingRecordPolicy, ProductFields, StoreBackend, VariantType,
};
use varsync_db::{CatalogRecordRow, DbError, PoolConfig};

fn app_config() -> AppConfig {
    AppConfig {
        env: Environment::Test,
        log_level: "info".to_string(),
        store_backend: StoreBackend::Postgres,
        database_url: Some("postgres://example".to_string()),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        shop_domain: None,
        shopify_access_token: None,
        shopify_api_version: "2024-10".to_string(),
        http_timeout_secs: 30,
        http_user_agent: "ua".to_string(),
        http_max_retries: 3,
        http_backoff_base_ms: 1000,
        sync_page_size: 50,
        sync_max_records: 500,
        sync_max_pages: 200,
        sync_max_concurrent_records: 4,
        sync_detection_confidence: 0.9,
        sync_existing_policy: ExistingRecordPolicy::Skip,
        processing_cron: "0 0 */6 * * *".to_string(),
    }
}

fn record() -> CatalogRecord {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let mut record = CatalogRecord::new(
        "8812",
        ProductFields {
            title: "Trail Runner".to_string(),
            handle: "trail-runner".to_string(),
            vendor: Some("Northwind".to_string()),
            tags: vec!["shoes".to_string()],
            collections: vec![
                CollectionRef {
                    id: "100".to_string(),
                    title: "Running".to_string(),
                    handle: "running".to_string(),
                },
                CollectionRef {
                    id: "200".to_string(),
                    title: "Sale".to_string(),
                    handle: "sale".to_string(),
                },
            ],
            ..ProductFields::default()
        },
        now,
    )
    .unwrap();
    record
        .add_detected_variant_type(DetectedVariantType {
            variant_type: VariantType::Size,
            name: "Shoe Size".to_string(),
            values: vec!["9".to_string(), "10".to_string()],
            confidence: 0.9,
            auto_detected: true,
        })
        .unwrap();
    record
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn row_denormalises_index_columns() {
    let row = CatalogRecordRow::from_record(&record()).unwrap();
    assert_eq!(row.collection_ids, vec!["100", "200"]);
    assert!(!row.display_enabled);
    assert_eq!(row.processing_state, "pending");
    assert_eq!(row.detected_variant_types[0]["type"], "size");
}

#[test]
fn row_maps_back_to_the_same_record() {
    let original = record();
    let restored = CatalogRecordRow::from_record(&original)
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(restored, original);
}

#[test]
fn unknown_state_in_row_is_an_error() {
    let mut row = CatalogRecordRow::from_record(&record()).unwrap();
    row.processing_state = "archived".to_string();
    assert!(matches!(row.into_record(), Err(DbError::Core(_))));
}

#[test]
fn malformed_jsonb_names_the_column() {
    let mut row = CatalogRecordRow::from_record(&record()).unwrap();
    row.display_settings = serde_json::json!({ "enabled": "yes" });
    match row.into_record() {
        Err(DbError::Decode {
            column,
            external_id,
            ..
        }) => {
            assert_eq!(column, "display_settings");
            assert_eq!(external_id, "8812");
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}
