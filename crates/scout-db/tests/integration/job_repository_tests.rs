use chrono::{TimeZone, Utc};
use scout_core::traits::JobStore;
use scout_db::{Database, DatabaseConfig};

use crate::common::{job, setup_test_db};

#[tokio::test]
async fn missing_table_loads_empty() {
    let db = setup_test_db().await;
    let repo = db.job_repo();

    assert!(!repo.table_exists("jobs").await.unwrap());
    assert!(repo.load_known("jobs").await.unwrap().is_empty());
}

#[tokio::test]
async fn persist_creates_table_and_round_trips_fields() {
    let db = setup_test_db().await;
    let repo = db.job_repo();
    let loaded_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

    let mut posting = job("Engineer", "Acme", "2024-02-28", "https://example.com/1/");
    posting.min_salary = 100_000;
    posting.max_salary = 150_000;

    let inserted = repo.persist(&[posting.clone()], "jobs", loaded_at).await.unwrap();
    assert_eq!(inserted, 1);
    assert!(repo.table_exists("jobs").await.unwrap());

    let known = repo.load_known("jobs").await.unwrap();
    assert_eq!(known, vec![posting]);
    let dates: Vec<String> = sqlx::query_scalar("SELECT date_loaded FROM \"jobs\"")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(dates, vec!["2024-03-01 12:30:00.000000".to_string()]);
}

#[tokio::test]
async fn persist_skips_known_triples() {
    let db = setup_test_db().await;
    let repo = db.job_repo();
    let now = Utc::now();

    let first = job("Engineer", "Acme", "2024-02-28", "https://example.com/1/");
    repo.persist(&[first.clone()], "jobs", now).await.unwrap();

    // Same triple under a new URL is still a duplicate; a new date is not.
    let relisted = job("Engineer", "Acme", "2024-02-28", "https://example.com/2/");
    let reposted = job("Engineer", "Acme", "2024-03-05", "https://example.com/3/");
    let inserted = repo
        .persist(&[relisted, reposted.clone()], "jobs", now)
        .await
        .unwrap();

    assert_eq!(inserted, 1);
    let known = repo.load_known("jobs").await.unwrap();
    assert_eq!(known, vec![first, reposted]);
}

#[tokio::test]
async fn persist_collapses_repeats_within_batch() {
    let db = setup_test_db().await;
    let repo = db.job_repo();

    let a = job("Engineer", "Acme", "2024-02-28", "https://example.com/1/");
    let b = job("Engineer", "Acme", "2024-02-28", "https://example.com/9/");
    let inserted = repo.persist(&[a, b], "jobs", Utc::now()).await.unwrap();

    assert_eq!(inserted, 1);
    assert_eq!(repo.load_known("jobs").await.unwrap().len(), 1);
}

#[tokio::test]
async fn tables_are_independent() {
    let db = setup_test_db().await;
    let repo = db.job_repo();
    let now = Utc::now();
    let posting = job("Engineer", "Acme", "2024-02-28", "https://example.com/1/");

    assert_eq!(repo.persist(&[posting.clone()], "jobs", now).await.unwrap(), 1);
    assert_eq!(
        repo.persist(&[posting], "filtered_jobs", now).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn invalid_table_name_is_rejected() {
    let db = setup_test_db().await;
    let repo = db.job_repo();

    let err = repo
        .persist(&[], "jobs\"; DROP TABLE x; --", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, scout_core::AppError::ConfigError(_)));
}

#[tokio::test]
async fn loads_legacy_rows_with_nulls() {
    let db = setup_test_db().await;
    let repo = db.job_repo();
    repo.create_table("jobs").await.unwrap();
    sqlx::query("INSERT INTO \"jobs\" (title, job_url) VALUES ('Old', 'https://example.com/old/')")
        .execute(db.pool())
        .await
        .unwrap();

    let known = repo.load_known("jobs").await.unwrap();
    assert_eq!(known.len(), 1);
    assert_eq!(known[0].title, "Old");
    assert_eq!(known[0].company, "");
    assert_eq!(known[0].min_salary, 0);
}

#[tokio::test]
async fn file_database_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::for_file(dir.path().join("jobs.db"));
    let posting = job("Engineer", "Acme", "2024-02-28", "https://example.com/1/");

    {
        let db = Database::connect(&config).await.unwrap();
        db.job_repo()
            .persist(&[posting.clone()], "jobs", Utc::now())
            .await
            .unwrap();
        db.pool().close().await;
    }

    let db = Database::connect(&config).await.unwrap();
    assert_eq!(db.job_repo().load_known("jobs").await.unwrap(), vec![posting]);
}
