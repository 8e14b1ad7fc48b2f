use chrono::{NaiveDate, NaiveDateTime};
use nem12_meter::db::init_db;
use nem12_meter::domain::Nmi;
use nem12_meter::nem12::{latest_csv_in, RowError};
use nem12_meter::{IngestError, Ingestor, Repository};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_nem12.csv")
}

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

async fn setup() -> (Ingestor, Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    (Ingestor::new(repo.clone()), repo, temp_dir)
}

fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

#[tokio::test]
async fn test_ingest_sample_file() {
    let (ingestor, repo, _temp) = setup().await;

    let summary = ingestor.ingest_file(&fixture()).await.unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.counts.meter_blocks_created, 2);
    assert_eq!(summary.counts.interval_blocks_created, 4);
    assert_eq!(summary.counts.readings_created, 48 * 3 + 96);
    assert_eq!(summary.meters.len(), 2);

    // 100, 400, 500 and 900 records are kept for inspection.
    let codes: Vec<&str> = summary
        .unrecognized
        .iter()
        .map(|r| r.fields[0].as_str())
        .collect();
    assert_eq!(codes, vec!["100", "400", "500", "900"]);

    assert_eq!(repo.count_meter_blocks().await.unwrap(), 2);
    assert_eq!(repo.count_interval_blocks().await.unwrap(), 4);
    assert_eq!(repo.count_readings().await.unwrap(), 240);
}

#[tokio::test]
async fn test_first_and_last_reading_of_day() {
    let (ingestor, repo, _temp) = setup().await;
    ingestor.ingest_file(&fixture()).await.unwrap();

    let meter = repo
        .get_meter_block_by_nmi(Nmi::new(6102920472))
        .await
        .unwrap()
        .expect("meter stored");
    assert_eq!(meter.meter_serial, "A0804565");
    assert_eq!(meter.interval_minutes.get(), 30);

    let blocks = repo.list_interval_blocks(meter.id).await.unwrap();
    assert_eq!(blocks.len(), 3);
    let block = blocks
        .iter()
        .find(|b| b.interval_date == NaiveDate::from_ymd_opt(2019, 8, 9).unwrap())
        .unwrap();
    assert_eq!(
        block.update_timestamp,
        NaiveDateTime::parse_from_str("20190810040147", "%Y%m%d%H%M%S").unwrap()
    );

    let readings = repo.readings_for_block(block.id).await.unwrap();
    assert_eq!(readings.len(), 48);
    assert_eq!(readings[0].timestamp, ts("2019-08-09 00:00"));
    assert_eq!(readings[0].value, 0.435);
    assert_eq!(readings[47].timestamp, ts("2019-08-09 23:30"));
    assert_eq!(readings[47].value, 0.807);
}

#[tokio::test]
async fn test_trailer_fields_are_stored() {
    let (ingestor, repo, _temp) = setup().await;
    ingestor.ingest_file(&fixture()).await.unwrap();

    let meter = repo
        .get_meter_block_by_nmi(Nmi::new(6102920472))
        .await
        .unwrap()
        .unwrap();
    let blocks = repo.list_interval_blocks(meter.id).await.unwrap();
    let estimated = blocks.last().unwrap();

    assert_eq!(estimated.quality_method, "E");
    assert_eq!(estimated.reason_code, Some(79));
    assert_eq!(estimated.reason_description.as_deref(), Some("Estimated"));
    assert_eq!(
        estimated.msats_load_timestamp,
        Some(NaiveDateTime::parse_from_str("20190811041500", "%Y%m%d%H%M%S").unwrap())
    );
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let (ingestor, repo, _temp) = setup().await;

    ingestor.ingest_file(&fixture()).await.unwrap();
    let second = ingestor.ingest_file(&fixture()).await.unwrap();

    assert_eq!(second.counts.meter_blocks_created, 0);
    assert_eq!(second.counts.meter_blocks_reused, 2);
    assert_eq!(second.counts.interval_blocks_created, 0);
    assert_eq!(second.counts.interval_blocks_reused, 4);
    assert_eq!(second.counts.readings_created, 0);

    assert_eq!(repo.count_meter_blocks().await.unwrap(), 2);
    assert_eq!(repo.count_interval_blocks().await.unwrap(), 4);
    assert_eq!(repo.count_readings().await.unwrap(), 240);

    let runs: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM import_runs WHERE outcome = 'completed' AND source_sha256 IS NOT NULL",
    )
    .fetch_one(repo.pool())
    .await
    .unwrap();
    assert_eq!(runs, 2);
}

#[tokio::test]
async fn test_corrected_block_is_stored_alongside_original() {
    let (ingestor, repo, temp) = setup().await;
    ingestor.ingest_file(&fixture()).await.unwrap();

    let values = vec!["0.750"; 48].join(",");
    let body = format!(
        "200,6102920472,E1,E1,E1,,A0804565,KWH,30,\n300,20190808,{values},A,,,20190812090000,\n"
    );
    let path = write_csv(temp.path(), "correction.csv", &body);
    let summary = ingestor.ingest_file(&path).await.unwrap();

    assert_eq!(summary.counts.interval_blocks_created, 1);
    assert_eq!(summary.counts.readings_created, 48);
    assert_eq!(repo.count_interval_blocks().await.unwrap(), 5);
}

#[tokio::test]
async fn test_bad_rows_do_not_stop_the_file() {
    let (ingestor, repo, temp) = setup().await;

    let good = vec!["0.100"; 48].join(",");
    let short = vec!["0.100"; 47].join(",");
    let body = format!(
        "100,NEM12,201908110300,MDP1,Origin\n\
         200,6102920472,E1,E1,E1,,A0804565,KWH,30,\n\
         300,20190808,{short},A,,,20190809040147,\n\
         300,2019-08-09,{good},A,,,20190810040147,\n\
         300,20190810,{good},A,,,20190811040147,\n\
         200,6102920473,E1,E1,E1,,B0804566,WH,30,\n\
         300,20190810,{good},A,,,20190811040147,\n\
         900\n"
    );
    let path = write_csv(temp.path(), "mixed.csv", &body);

    let summary = ingestor.ingest_file(&path).await.unwrap();

    assert!(!summary.is_clean());
    assert_eq!(summary.counts.interval_blocks_created, 1);
    let lines: Vec<u64> = summary.rejected.iter().map(|r| r.row.line).collect();
    assert_eq!(lines, vec![3, 4, 6, 7]);
    assert_eq!(repo.count_meter_blocks().await.unwrap(), 1);
    assert_eq!(repo.count_readings().await.unwrap(), 48);
}

#[tokio::test]
async fn test_non_utf8_row_is_rejected_without_stopping_the_file() {
    let (ingestor, repo, temp) = setup().await;

    let good = vec!["0.100"; 48].join(",");
    let short = vec!["0.100"; 47].join(",");
    let mut body = Vec::new();
    body.extend_from_slice(b"200,6102920472,E1,E1,E1,,A0804565,KWH,30,\n");
    body.extend_from_slice(format!("300,20190808,{good},A,,,20190809040147,\n").as_bytes());
    body.extend_from_slice(format!("300,20190809,{short},A,,,20190810040147,\n").as_bytes());
    body.extend_from_slice(b"400,1,48,F16,79,caf\xe9\n");
    body.extend_from_slice(format!("300,20190810,{good},A,,,20190811040147,\n").as_bytes());
    let path = temp.path().join("latin1.csv");
    std::fs::write(&path, &body).unwrap();

    let summary = ingestor.ingest_file(&path).await.unwrap();

    assert_eq!(summary.counts.interval_blocks_created, 2);
    let lines: Vec<u64> = summary.rejected.iter().map(|r| r.row.line).collect();
    assert_eq!(lines, vec![3, 4]);
    assert!(matches!(
        summary.rejected[1].error,
        RowError::MalformedField { .. }
    ));
    assert_eq!(repo.count_interval_blocks().await.unwrap(), 2);
    assert_eq!(repo.count_readings().await.unwrap(), 96);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_imports_store_each_block_once() {
    let (ingestor, repo, _temp) = setup().await;
    let path = fixture();

    let (first, second) = tokio::join!(ingestor.ingest_file(&path), ingestor.ingest_file(&path));
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(
        first.counts.meter_blocks_created + second.counts.meter_blocks_created,
        2
    );
    assert_eq!(
        first.counts.interval_blocks_created + second.counts.interval_blocks_created,
        4
    );
    assert_eq!(repo.count_meter_blocks().await.unwrap(), 2);
    assert_eq!(repo.count_interval_blocks().await.unwrap(), 4);
    assert_eq!(repo.count_readings().await.unwrap(), 240);
}

#[tokio::test]
async fn test_interval_data_before_meter_details_aborts() {
    let (ingestor, repo, temp) = setup().await;

    let values = vec!["0.100"; 48].join(",");
    let body = format!("100,NEM12,201908110300,MDP1,Origin\n300,20190808,{values},A,,,20190809040147,\n");
    let path = write_csv(temp.path(), "headless.csv", &body);

    match ingestor.ingest_file(&path).await {
        Err(IngestError::NoMeterContext { line, summary }) => {
            assert_eq!(line, 2);
            assert_eq!(summary.unrecognized.len(), 1);
        }
        other => panic!("Expected NoMeterContext, got {:?}", other.map(|s| s.counts)),
    }
    assert_eq!(repo.count_interval_blocks().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_file_is_a_source_error() {
    let (ingestor, _repo, temp) = setup().await;
    let result = ingestor.ingest_file(&temp.path().join("absent.csv")).await;
    match result {
        Err(e @ IngestError::Source { .. }) => assert!(e.summary().is_none()),
        other => panic!("Expected Source error, got {:?}", other.map(|s| s.counts)),
    }
}

#[tokio::test]
async fn test_drop_dir_resolves_newest_csv() {
    let (ingestor, repo, temp) = setup().await;
    let drop_dir = temp.path().join("drop");
    std::fs::create_dir(&drop_dir).unwrap();

    let old = write_csv(&drop_dir, "old.csv", "100,NEM12\n900\n");
    std::fs::File::options()
        .write(true)
        .open(&old)
        .unwrap()
        .set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(3600))
        .unwrap();
    std::fs::copy(fixture(), drop_dir.join("new.csv")).unwrap();
    write_csv(&drop_dir, "notes.txt", "ignore me");

    let newest = latest_csv_in(&drop_dir).unwrap();
    assert_eq!(newest.file_name().unwrap(), "new.csv");

    ingestor.ingest_file(&newest).await.unwrap();
    assert_eq!(repo.count_readings().await.unwrap(), 240);
}
