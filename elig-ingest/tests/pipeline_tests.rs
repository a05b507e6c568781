//! End-to-end pipeline runs against scratch projects

mod helpers;

use elig_common::db::open_warehouse;
use elig_common::LoadRunId;
use elig_ingest::db::{raw_staging, runs};
use elig_ingest::models::{RunState, StagingManifest, VendorOutcome};
use elig_ingest::services::RunController;
use helpers::*;
use sqlx::{Row, SqlitePool};

async fn silver_rows(pool: &SqlitePool, run_id: &str) -> Vec<(i64, Option<String>, Option<String>, String)> {
    sqlx::query(
        "SELECT source_row, last_name_norm, dob_norm, relationship_norm \
         FROM silver_members WHERE load_run_id = ? ORDER BY source_vendor, source_row",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .unwrap()
    .iter()
    .map(|r| {
        (
            r.get("source_row"),
            r.get("last_name_norm"),
            r.get("dob_norm"),
            r.get("relationship_norm"),
        )
    })
    .collect()
}

#[tokio::test]
async fn test_three_rows_one_bad_date_one_unmapped_code() {
    let project = Project::dental();
    let ctl = project.controller().await;

    let summary = ctl.run().await.unwrap();
    assert_eq!(summary.state, RunState::Complete, "{:?}", summary.error);
    assert_eq!(summary.ingested_rows(), 3);

    let pool = ctl.pool();
    let run_id = summary.run_id.as_str();
    assert_eq!(raw_staging::count_for_run(pool, "raw_staging", run_id).await.unwrap(), 3);
    assert_eq!(raw_staging::count_for_run(pool, "raw_staging_payload", run_id).await.unwrap(), 3);
    assert_eq!(raw_staging::count_for_run(pool, "silver_members", run_id).await.unwrap(), 3);

    let normalization = summary.normalization.as_ref().unwrap();
    assert_eq!(normalization.null_dob, 1);
    assert_eq!(normalization.other_relationship, 1);

    let rows = silver_rows(pool, run_id).await;
    assert_eq!(
        rows,
        vec![
            (1, Some("obrien".into()), Some("1990-01-15".into()), "employee".into()),
            (2, Some("smith".into()), None, "spouse".into()),
            (3, Some("jones".into()), Some("2015-03-02".into()), "OTHER".into()),
        ]
    );

    let validation = summary.validation.as_ref().unwrap();
    assert!(validation.is_valid());
    assert_eq!(validation.hash_matches, 3);

    let quality = summary.quality.as_ref().unwrap();
    assert_eq!(quality.raw_completeness[0].missing_address, 1);
    assert_eq!(quality.failed_dates[0].dob_raw.as_deref(), Some("13/45/1990"));

    let ledger = runs::load_run(pool, &LoadRunId::parse(run_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ledger.state, RunState::Complete);
    assert!(ledger.ended_at.is_some());
}

#[tokio::test]
async fn test_four_formats_in_one_run() {
    let project = Project::dental()
        .mapping("hospital.yaml", HOSPITAL_YAML)
        .workbook("hospital.xlsx", "Members", HOSPITAL_ROWS)
        .mapping("medical_c.yaml", MEDICAL_C_YAML)
        .input("medical_c.jsonl", MEDICAL_C_JSONL)
        .mapping("vision.toml", VISION_TOML)
        .input("vision.txt", VISION_TXT);
    let ctl = project.controller().await;

    let summary = ctl.run().await.unwrap();
    assert_eq!(summary.state, RunState::Complete, "{:?}", summary.error);

    let vendors: Vec<(&str, &VendorOutcome)> = summary
        .vendors
        .iter()
        .map(|v| (v.vendor.as_str(), &v.outcome))
        .collect();
    assert_eq!(
        vendors,
        vec![
            ("dental", &VendorOutcome::Ingested { rows: 3 }),
            ("hospital", &VendorOutcome::Ingested { rows: 1 }),
            ("medical_c", &VendorOutcome::Ingested { rows: 2 }),
            ("vision", &VendorOutcome::Ingested { rows: 1 }),
        ]
    );

    let pool = ctl.pool();
    let row = sqlx::query(
        "SELECT m.dob_norm, m.relationship_norm, r.extra_payload, r.plan_type \
         FROM silver_members m JOIN raw_staging r \
           ON r.load_run_id = m.load_run_id AND r.source_vendor = m.source_vendor \
          AND r.source_file = m.source_file AND r.source_row = m.source_row \
         WHERE m.load_run_id = ? AND m.source_vendor = 'medical_c' AND m.source_row = 1",
    )
    .bind(&summary.run_id)
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(row.get::<Option<String>, _>("dob_norm").as_deref(), Some("1980-07-04"));
    assert_eq!(row.get::<String, _>("relationship_norm"), "employee");
    assert_eq!(
        row.get::<Option<String>, _>("extra_payload").as_deref(),
        Some(r#"{"notes":"vip"}"#)
    );
    assert_eq!(row.get::<Option<String>, _>("plan_type").as_deref(), Some("MEDICAL"));

    let vision_dob: Option<String> = sqlx::query_scalar(
        "SELECT dob_norm FROM silver_members WHERE load_run_id = ? AND source_vendor = 'vision'",
    )
    .bind(&summary.run_id)
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(vision_dob.as_deref(), Some("1975-03-10"));

    let hospital = sqlx::query(
        "SELECT last_name_norm, dob_norm, relationship_norm FROM silver_members \
         WHERE load_run_id = ? AND source_vendor = 'hospital'",
    )
    .bind(&summary.run_id)
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(hospital.get::<Option<String>, _>("last_name_norm").as_deref(), Some("strauss"));
    assert_eq!(hospital.get::<Option<String>, _>("dob_norm").as_deref(), Some("1968-11-30"));
    assert_eq!(hospital.get::<String, _>("relationship_norm"), "employee");
}

#[tokio::test]
async fn test_failing_vendor_does_not_stop_others() {
    let project = Project::dental()
        .mapping("medical_c.yaml", MEDICAL_C_YAML)
        .input("medical_c.jsonl", "{\"member\": {\"id\": \"C1\"}}\nnot json\n");
    let ctl = project.controller().await;

    let summary = ctl.run().await.unwrap();
    assert_eq!(summary.state, RunState::Failed);
    assert!(summary.error.as_deref().unwrap().contains("medical_c"));
    assert!(summary.normalization.is_none());

    assert_eq!(summary.vendors[0].outcome, VendorOutcome::Ingested { rows: 3 });
    match &summary.vendors[1].outcome {
        VendorOutcome::Failed { reason } => assert!(reason.contains("line 2"), "{}", reason),
        other => panic!("expected failure, got {:?}", other),
    }

    let ledger = runs::load_run(ctl.pool(), &LoadRunId::parse(&summary.run_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ledger.state, RunState::Failed);
    assert!(ledger.error.unwrap().contains("medical_c"));
}

#[tokio::test]
async fn test_missing_input_file_recorded_in_manifest() {
    let project = Project::dental().mapping("vision.toml", VISION_TOML);
    let ctl = project.controller().await;

    let summary = ctl.run().await.unwrap();
    assert_eq!(summary.state, RunState::Failed);
    assert!(matches!(
        &summary.vendors[1].outcome,
        VendorOutcome::Failed { reason } if reason.contains("Source not found")
    ));

    let manifest_path = summary.manifest_path.as_ref().unwrap();
    let manifest: StagingManifest =
        serde_json::from_str(&std::fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest.load_run_id, summary.run_id);
    assert_eq!(manifest.files.len(), 2);
    assert!(!manifest.files[0].is_failed());
    assert_eq!(manifest.files[0].row_count_read, 3);
    assert!(manifest.files[1].is_failed());
    assert_eq!(manifest.files[1].relative_path, "input/vision.txt");
}

#[tokio::test]
async fn test_staged_run_detects_tampering() {
    let project = Project::dental();
    let ctl = project.controller().await;

    let ingested = ctl.ingest_only().await.unwrap();
    assert_eq!(ingested.state, RunState::Ingested);
    let run_id = LoadRunId::parse(&ingested.run_id).unwrap();

    sqlx::query("DELETE FROM raw_staging_payload WHERE load_run_id = ? AND source_row = 2")
        .bind(run_id.as_str())
        .execute(ctl.pool())
        .await
        .unwrap();

    let normalized = ctl.normalize_only(run_id.clone()).await.unwrap();
    assert_eq!(normalized.state, RunState::Normalized);

    let validated = ctl.validate_only(run_id.clone()).await.unwrap();
    assert_eq!(validated.state, RunState::Failed);
    let report = validated.validation.unwrap();
    assert_eq!(report.raw_without_payload, 1);
    assert!(!report.is_valid());

    let ledger = runs::load_run(ctl.pool(), &run_id).await.unwrap().unwrap();
    assert_eq!(ledger.state, RunState::Failed);
}

#[tokio::test]
async fn test_renormalizing_replaces_silver_rows() {
    let project = Project::dental();
    let ctl = project.controller().await;

    let summary = ctl.run().await.unwrap();
    let run_id = LoadRunId::parse(&summary.run_id).unwrap();

    let again = ctl.normalize_only(run_id.clone()).await.unwrap();
    // COMPLETE is terminal, so the ledger keeps its state
    assert_eq!(again.state, RunState::Complete);
    assert_eq!(again.normalization.unwrap().rows, 3);
    assert_eq!(
        raw_staging::count_for_run(ctl.pool(), "silver_members", run_id.as_str())
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_run_against_warehouse_file() {
    let project = Project::dental().pipeline_toml("batch_size = 2\n[logging]\nwrite_file = false\n");
    let config = project.config();
    assert_eq!(config.batch_size, 2);
    let db_path = config.database.clone();

    let summary = RunController::open(config).await.unwrap().run().await.unwrap();
    assert_eq!(summary.state, RunState::Complete);
    assert!(db_path.exists());

    let pool = open_warehouse(&db_path).await.unwrap();
    let ledger = runs::load_run(&pool, &LoadRunId::parse(&summary.run_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ledger.state, RunState::Complete);
}
