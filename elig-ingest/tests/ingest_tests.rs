//! Stage 1 behaviour: registry loading, dual-write parity and payload fidelity

mod helpers;

use elig_common::db::{open_in_memory, provision_warehouse};
use elig_common::LoadRunId;
use elig_ingest::config::{FileFormat, VendorConfig, VendorRegistry};
use elig_ingest::db::raw_staging;
use elig_ingest::services::Ingestor;
use elig_ingest::IngestError;
use helpers::*;
use sqlx::SqlitePool;

async fn warehouse() -> SqlitePool {
    let pool = open_in_memory().await.unwrap();
    provision_warehouse(&pool).await.unwrap();
    pool
}

fn dental_config(project: &Project) -> VendorConfig {
    VendorConfig::load(&project.root().join("mappings").join("dental.yaml")).unwrap()
}

#[test]
fn test_registry_skips_normalization_document() {
    let project = Project::dental()
        .mapping("vision.toml", VISION_TOML)
        .mapping("notes.txt", "not a config");

    let registry = VendorRegistry::load(&project.root().join("mappings"), &[]).unwrap();
    let names: Vec<&str> = registry.iter().map(|c| c.source_vendor.as_str()).collect();
    assert_eq!(names, vec!["dental", "vision"]);
    assert_eq!(registry.get("vision").unwrap().format, FileFormat::PipeDelimited);
    assert_eq!(registry.get("vision").unwrap().delimiter, Some(b'|'));
}

#[test]
fn test_registry_honours_vendor_list() {
    let project = Project::dental().mapping("vision.toml", VISION_TOML);

    let vendors = vec!["vision".to_string()];
    let registry = VendorRegistry::load(&project.root().join("mappings"), &vendors).unwrap();
    assert_eq!(registry.len(), 1);

    let missing = vec!["dental_b".to_string()];
    let err = VendorRegistry::load(&project.root().join("mappings"), &missing).unwrap_err();
    assert!(matches!(err, IngestError::ConfigNotFound(_)));
}

#[tokio::test]
async fn test_dual_write_parity_across_batches() {
    let rows: String = (1..=5)
        .map(|i| format!("D{i},First{i},Last{i},01/0{i}/1990,EMP,{i} Main St\n"))
        .collect();
    let project = Project::dental().input(
        "dental.csv",
        &format!("member_id,first,last,dob,rel,addr\n{}", rows),
    );
    let pool = warehouse().await;
    let run_id = LoadRunId::parse("parity_run").unwrap();

    let ingestor = Ingestor::new(pool.clone(), run_id.clone(), project.root().join("input"), 2);
    let written = ingestor.ingest_vendor(&dental_config(&project)).await.unwrap();
    assert_eq!(written, 5);

    let raw = raw_staging::count_for_run(&pool, "raw_staging", "parity_run").await.unwrap();
    let payload = raw_staging::count_for_run(&pool, "raw_staging_payload", "parity_run")
        .await
        .unwrap();
    assert_eq!((raw, payload), (5, 5));

    let mismatched: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM raw_staging s JOIN raw_staging_payload p \
           ON s.load_run_id = p.load_run_id AND s.source_vendor = p.source_vendor \
          AND s.source_file = p.source_file AND s.source_row = p.source_row \
         WHERE s.load_run_id = ? AND s.record_hash_raw != p.record_hash_raw",
    )
    .bind("parity_run")
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(mismatched, 0);

    let rows: Vec<i64> = sqlx::query_scalar(
        "SELECT source_row FROM raw_staging WHERE load_run_id = ? ORDER BY source_row",
    )
    .bind("parity_run")
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_payload_keeps_source_order_and_values() {
    let project = Project::dental();
    let pool = warehouse().await;
    let run_id = LoadRunId::parse("payload_run").unwrap();

    let ingestor = Ingestor::new(pool.clone(), run_id, project.root().join("input"), 100);
    ingestor.ingest_vendor(&dental_config(&project)).await.unwrap();

    let json = raw_staging::load_payload_json(&pool, "payload_run", "dental", "dental.csv", 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        json,
        r#"{"member_id":"D1","first":"Ann","last":"O'Brien ","dob":"01/15/1990","rel":"EMP","addr":"1 Main St"}"#
    );

    let third = raw_staging::load_payload_json(&pool, "payload_run", "dental", "dental.csv", 3)
        .await
        .unwrap()
        .unwrap();
    assert!(third.ends_with(r#""addr":null}"#));

    let other_file =
        raw_staging::load_payload_json(&pool, "payload_run", "dental", "dental_old.csv", 1)
            .await
            .unwrap();
    assert_eq!(other_file, None);
}

#[tokio::test]
async fn test_identical_content_hashes_equal_across_runs() {
    let project = Project::dental();
    let pool = warehouse().await;
    let config = dental_config(&project);

    for id in ["run_a", "run_b"] {
        let ingestor = Ingestor::new(
            pool.clone(),
            LoadRunId::parse(id).unwrap(),
            project.root().join("input"),
            10,
        );
        ingestor.ingest_vendor(&config).await.unwrap();
    }

    let distinct: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT record_hash_raw) FROM raw_staging WHERE source_row = 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(distinct, 1);
}

#[tokio::test]
async fn test_unknown_target_field_rejected() {
    let project = Project::new()
        .mapping(
            "odd.yaml",
            "source_vendor: odd\nfile: odd.csv\nformat: csv\nmapping:\n  shoe_size: size\n",
        )
        .input("odd.csv", "size\n9\n");
    let pool = warehouse().await;
    let config = VendorConfig::load(&project.root().join("mappings").join("odd.yaml")).unwrap();

    let ingestor = Ingestor::new(
        pool.clone(),
        LoadRunId::parse("odd_run").unwrap(),
        project.root().join("input"),
        10,
    );
    let err = ingestor.ingest_vendor(&config).await.unwrap_err();
    match err {
        IngestError::ConfigInvalid { reason, .. } => assert!(reason.contains("shoe_size")),
        other => panic!("expected ConfigInvalid, got {:?}", other),
    }
    assert_eq!(
        raw_staging::count_for_run(&pool, "raw_staging", "odd_run").await.unwrap(),
        0
    );
}
