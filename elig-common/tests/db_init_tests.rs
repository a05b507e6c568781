//! Tests for warehouse creation and schema provisioning

use elig_common::db::schema_sync::SchemaIntrospector;
use elig_common::db::table_schemas::{RAW_STAGING, REQUIRED_TABLES};
use elig_common::db::{open_warehouse, provision_warehouse};
use tempfile::TempDir;

#[tokio::test]
async fn test_warehouse_created_with_parent_directories() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("output").join("warehouse.db");

    let pool = open_warehouse(&db_path).await.unwrap();
    provision_warehouse(&pool).await.unwrap();

    assert!(db_path.exists(), "warehouse file was not created");
    for table in REQUIRED_TABLES {
        assert!(SchemaIntrospector::table_exists(&pool, table).await.unwrap());
    }
}

#[tokio::test]
async fn test_reopen_keeps_existing_rows() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("warehouse.db");

    {
        let pool = open_warehouse(&db_path).await.unwrap();
        provision_warehouse(&pool).await.unwrap();
        sqlx::query("INSERT INTO load_runs (load_run_id, state, started_at) VALUES ('r1', 'COMPLETE', 'now')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = open_warehouse(&db_path).await.unwrap();
    provision_warehouse(&pool).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM load_runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_provision_adds_columns_to_legacy_table() {
    let temp = TempDir::new().unwrap();
    let pool = open_warehouse(&temp.path().join("legacy.db")).await.unwrap();

    // A warehouse created before gender_raw and extra_payload existed
    sqlx::query(
        "CREATE TABLE raw_staging (load_run_id TEXT NOT NULL, source_vendor TEXT NOT NULL, \
         source_file TEXT NOT NULL, source_row INTEGER NOT NULL, ingested_at TEXT NOT NULL, \
         record_hash_raw TEXT NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();

    provision_warehouse(&pool).await.unwrap();

    let columns = SchemaIntrospector::column_names(&pool, RAW_STAGING).await.unwrap();
    assert!(columns.iter().any(|c| c == "gender_raw"));
    assert!(columns.iter().any(|c| c == "extra_payload"));
}
